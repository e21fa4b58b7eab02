//! fOS Browser - Command line shell
//!
//! Loads pages and images through the content cache, renders them to a
//! canvas and reports what the cache holds.

pub mod loader;

pub use loader::{LoadError, Loader};

use fos_content::{CacheConfig, CacheStore, ContentHandle, HandlerRegistry, RedrawParams, Status};
use fos_render::{Canvas, Color, Plotter, RenderError};

/// Browser error
#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Content(#[from] fos_content::ContentError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Cannot render {id}: {status}")]
    NotReady { id: String, status: Status },
}

/// Cache, handler registry and loader wired together
pub struct Browser {
    registry: HandlerRegistry,
    cache: CacheStore,
    loader: Loader,
}

impl Browser {
    pub fn new(config: &CacheConfig) -> Result<Self, BrowserError> {
        config.validate()?;
        let registry = HandlerRegistry::with_defaults(config)?;
        tracing::info!("Content handlers for {}", registry.mime_types().join(", "));
        Ok(Self {
            registry,
            cache: CacheStore::new(config),
            loader: Loader::new(),
        })
    }

    pub fn with_loader(mut self, loader: Loader) -> Self {
        self.loader = loader;
        self
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Load `target` laid out for a `width` x `height` viewport
    pub fn open(&self, target: &str, width: u32, height: u32) -> Result<ContentHandle, BrowserError> {
        Ok(self.loader.load(&self.cache, &self.registry, target, width, height)?)
    }

    /// Paint a converted content into a new viewport-sized canvas
    pub fn render(&self, handle: &ContentHandle, width: u32, height: u32) -> Result<Canvas, BrowserError> {
        let status = handle.status();
        if status != Status::Ready {
            return Err(BrowserError::NotReady {
                id: handle.id().to_string(),
                status,
            });
        }

        let mut canvas = Canvas::new(width, height)?;
        canvas.fill_rect(canvas.bounds(), Color::rgb(0xee, 0xee, 0xee));
        let extent = handle.borrow().extent();
        let params = RedrawParams::new(0.0, 0.0, extent.width as f32, extent.height as f32)
            .with_clip(canvas.bounds());
        handle.redraw(&mut canvas, &params)?;
        Ok(canvas)
    }

    /// Advance animations on `handle`; true if it should be repainted
    pub fn tick(&self, handle: &ContentHandle, elapsed_ms: u32) -> bool {
        handle.tick(elapsed_ms)
    }

    /// Destroy everything in the cache
    pub fn shutdown(&self) {
        self.cache.dump();
        self.cache.quit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_about_page() {
        let browser = Browser::new(&CacheConfig::default()).unwrap();
        let handle = browser.open("about:version", 200, 100).unwrap();
        let canvas = browser.render(&handle, 200, 100).unwrap();
        assert_eq!(canvas.width(), 200);
        // Page background
        assert_eq!(canvas.pixel(1, 1), Some(Color::WHITE));
    }

    #[test]
    fn test_shutdown_invalidates_handles() {
        let browser = Browser::new(&CacheConfig::default()).unwrap();
        let handle = browser.open("about:blank", 100, 100).unwrap();
        browser.shutdown();
        assert!(browser.cache().is_empty());
        assert!(matches!(
            browser.render(&handle, 100, 100),
            Err(BrowserError::NotReady { status: Status::Destroyed, .. })
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = CacheConfig::default();
        config.tab_width = 0;
        assert!(Browser::new(&config).is_err());
    }
}

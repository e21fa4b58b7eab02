//! Handler - the per-format lifecycle contract
//!
//! A handler owns everything format specific about one content: its
//! incremental decode state, its decoded representation and how that
//! representation is laid out and painted. The owning `Content` drives it
//! through the lifecycle and guarantees the call order; handlers never see
//! the cache.

use std::fmt;
use std::rc::Rc;

use fos_render::{DecodeLimits, FixedPitch, FontMetrics, Plotter, Rect};

use crate::{CacheConfig, Result};

/// Intrinsic size of converted content
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Where and how to paint content
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RedrawParams {
    /// Top-left corner of the content on the surface
    pub x: f32,
    pub y: f32,
    /// Size of the content box before scaling
    pub width: f32,
    pub height: f32,
    /// Area of the surface that needs painting
    pub clip: Rect,
    /// Scale factor applied to the content box
    pub scale: f32,
}

impl RedrawParams {
    /// Paint the whole box at 1:1
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            clip: Rect::new(x, y, width, height),
            scale: 1.0,
        }
    }

    pub fn with_clip(mut self, clip: Rect) -> Self {
        self.clip = clip;
        self
    }

    /// Set the scale; the clip is widened to cover the scaled box
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self.clip = self.dest();
        self
    }

    /// Scaled destination box
    pub fn dest(&self) -> Rect {
        Rect::new(self.x, self.y, self.width * self.scale, self.height * self.scale)
    }
}

/// Lifecycle operations implemented by every content format.
///
/// Call order is enforced by `Content`: `create` once, any number of
/// `process_data`, at most one `convert`, then any number of `reformat`,
/// `revive` and `redraw`, and finally `destroy`.
pub trait Handler {
    /// Allocate decode state before the first byte arrives
    fn create(&mut self) -> Result<()>;

    /// Advance decoding with the next chunk.
    ///
    /// Malformed input must not fail here; it is reported by `convert`.
    fn process_data(&mut self, chunk: &[u8]) -> Result<()>;

    /// Finish decoding. `source` holds every byte fed so far.
    fn convert(&mut self, source: &[u8], width: u32, height: u32) -> Result<Extent>;

    /// Lay out already decoded state for a new size
    fn reformat(&mut self, width: u32, height: u32) -> Result<Extent>;

    /// Re-derive presentation when cached content is reused
    fn revive(&mut self, width: u32, height: u32) -> Result<Extent> {
        self.reformat(width, height)
    }

    /// Paint into `plotter`; must not change decoded state
    fn redraw(&self, plotter: &mut dyn Plotter, params: &RedrawParams) -> Result<()>;

    /// Release decode state. May be called in any state.
    fn destroy(&mut self);

    /// Estimated heap usage of the decoded representation
    fn size_estimate(&self) -> usize;

    /// Document title, if the format has one
    fn title(&self) -> Option<&str> {
        None
    }

    /// Advance animations by `elapsed_ms`; true if a redraw is needed
    fn tick(&mut self, _elapsed_ms: u32) -> bool {
        false
    }
}

/// Shared settings passed to handler factories
#[derive(Clone)]
pub struct HandlerOptions {
    pub decode_limits: DecodeLimits,
    pub metrics: Rc<dyn FontMetrics>,
    pub font_size: f32,
    pub tab_width: usize,
}

impl HandlerOptions {
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            decode_limits: config.decode_limits(),
            metrics: Rc::new(FixedPitch::default()),
            font_size: config.font_size,
            tab_width: config.tab_width,
        }
    }

    pub fn with_metrics(mut self, metrics: Rc<dyn FontMetrics>) -> Self {
        self.metrics = metrics;
        self
    }
}

impl Default for HandlerOptions {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

impl fmt::Debug for HandlerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerOptions")
            .field("decode_limits", &self.decode_limits)
            .field("font_size", &self.font_size)
            .field("tab_width", &self.tab_width)
            .finish_non_exhaustive()
    }
}

/// Constructor for a handler instance
pub type HandlerFactory = fn(&HandlerOptions) -> Box<dyn Handler>;

/// Static description of a content format
pub struct HandlerDescriptor {
    /// Short name for diagnostics
    pub name: &'static str,
    /// MIME types served, lower case without parameters
    pub mime_types: &'static [&'static str],
    /// Whether layout depends on the available size
    pub can_reformat: bool,
    pub factory: HandlerFactory,
}

impl HandlerDescriptor {
    /// Build a fresh handler instance
    pub fn instantiate(&self, options: &HandlerOptions) -> Box<dyn Handler> {
        (self.factory)(options)
    }
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("name", &self.name)
            .field("mime_types", &self.mime_types)
            .field("can_reformat", &self.can_reformat)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redraw_params_scale() {
        let params = RedrawParams::new(10.0, 20.0, 30.0, 40.0).with_scale(2.0);
        assert_eq!(params.dest(), Rect::new(10.0, 20.0, 60.0, 80.0));
        assert_eq!(params.clip, params.dest());
    }

    #[test]
    fn test_extent_empty() {
        assert!(Extent::default().is_empty());
        assert!(!Extent::new(1, 1).is_empty());
    }
}

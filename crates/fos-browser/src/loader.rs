//! Page Loader
//!
//! Streams local files and about: pages into the content cache.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use fos_content::{CacheStore, Content, ContentError, ContentHandle, HandlerRegistry, ResourceId, Status};
use fos_render::ImageFormat;
use url::Url;

/// Loader error
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error(transparent)]
    Content(#[from] ContentError),
}

/// Where a target's bytes come from
enum Source {
    About(String),
    File(PathBuf),
}

/// Page loader
pub struct Loader {
    /// Bytes handed to the content per read
    chunk_size: usize,
}

impl Loader {
    /// Create a new loader
    pub fn new() -> Self {
        Self { chunk_size: 4096 }
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Resolve `target` through the cache, fetching it on a miss.
    ///
    /// Cached contents are revived for the new size. A failed conversion
    /// still returns the handle; its status is `Error`.
    pub fn load(
        &self,
        cache: &CacheStore,
        registry: &HandlerRegistry,
        target: &str,
        width: u32,
        height: u32,
    ) -> Result<ContentHandle, LoadError> {
        let (id, source) = resolve(target)?;

        if let Some(handle) = cache.get(&id) {
            tracing::info!("Reusing cached {}", id);
            if handle.status() == Status::Ready {
                handle.revive(width, height)?;
            }
            return Ok(handle);
        }

        let mime_type = match &source {
            Source::About(_) => "text/html",
            Source::File(path) => guess_mime(path)?,
        };
        let handle = cache.put(Content::new(id.clone(), mime_type, registry)?)?;
        handle.create()?;

        match &source {
            Source::About(html) => {
                for chunk in html.as_bytes().chunks(self.chunk_size) {
                    handle.process_data(chunk)?;
                }
            }
            Source::File(path) => self.stream_file(path, &handle)?,
        }

        if let Err(err) = handle.convert(width, height) {
            tracing::warn!("Failed to load {}: {}", id, err);
        }
        Ok(handle)
    }

    fn stream_file(&self, path: &Path, handle: &ContentHandle) -> Result<(), LoadError> {
        let io_error = |source| LoadError::Io { path: path.to_path_buf(), source };
        let mut file = File::open(path).map_err(io_error)?;
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            let read = file.read(&mut buf).map_err(io_error)?;
            if read == 0 {
                return Ok(());
            }
            handle.process_data(&buf[..read])?;
        }
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve(target: &str) -> Result<(ResourceId, Source), LoadError> {
    if target.starts_with("about:") {
        return Ok((ResourceId::new(target), Source::About(about_page(target))));
    }

    let path = match Url::parse(target) {
        Ok(url) if url.scheme() == "file" => url
            .to_file_path()
            .map_err(|_| LoadError::InvalidTarget(target.to_string()))?,
        Ok(url) if url.scheme().len() > 1 => {
            return Err(LoadError::InvalidTarget(format!("unsupported scheme {}", url.scheme())));
        }
        // Anything else, including Windows drive letters, is a path
        _ => PathBuf::from(target),
    };
    let path = path
        .canonicalize()
        .map_err(|source| LoadError::Io { path: path.clone(), source })?;
    let url = Url::from_file_path(&path).map_err(|_| LoadError::InvalidTarget(target.to_string()))?;
    Ok((ResourceId::from(&url), Source::File(path)))
}

/// MIME type from the file extension, falling back to sniffing
fn guess_mime(path: &Path) -> Result<&'static str, LoadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let by_extension = match ext.as_str() {
        "html" | "htm" => Some("text/html"),
        "xhtml" => Some("application/xhtml+xml"),
        "txt" | "text" | "md" | "log" | "csv" => Some("text/plain"),
        other => ImageFormat::from_extension(other).mime_type(),
    };
    if let Some(mime) = by_extension {
        return Ok(mime);
    }

    let mut head = [0u8; 16];
    let read = File::open(path)
        .and_then(|mut file| file.read(&mut head))
        .map_err(|source| LoadError::Io { path: path.to_path_buf(), source })?;
    let head = &head[..read];
    Ok(match ImageFormat::from_bytes(head).mime_type() {
        Some(mime) => mime,
        None if head.trim_ascii_start().starts_with(b"<") => "text/html",
        None => "text/plain",
    })
}

/// Load an about: page
fn about_page(url: &str) -> String {
    match url {
        "about:blank" => "<!DOCTYPE html><html><head><title>New Tab</title></head><body></body></html>".to_string(),

        "about:version" => format!(
            "<!DOCTYPE html><html><head><title>fOS Browser</title></head><body>\
             <h1>fOS Browser</h1><p>Version: {}</p><p>Built with Rust</p></body></html>",
            env!("CARGO_PKG_VERSION")
        ),

        _ => format!(
            "<!DOCTYPE html><html><head><title>Unknown Page</title></head><body>\
             <h1>Unknown about: page</h1><p>The page {} was not found.</p></body></html>",
            url
        ),
    }
}

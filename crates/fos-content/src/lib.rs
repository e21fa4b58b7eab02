//! fOS Content - Content cache and handler lifecycle
//!
//! Fetched resources become `Content` entries: bytes are streamed into a
//! format specific `Handler`, converted once, then presented at any size
//! without being decoded again. `CacheStore` keeps one entry per
//! `ResourceId` and reclaims unreferenced entries when over budget.
//!
//! ```ignore
//! let registry = HandlerRegistry::with_defaults(&config)?;
//! let cache = CacheStore::new(&config);
//!
//! let id = ResourceId::new("https://example.com/logo.png");
//! let handle = cache.get_or_insert_with(&id, || Content::new(id.clone(), "image/png", &registry))?;
//! handle.create()?;
//! for chunk in body {
//!     handle.process_data(&chunk)?;
//! }
//! handle.convert(800, 600)?;
//! handle.redraw(&mut canvas, &RedrawParams::new(0.0, 0.0, 32.0, 32.0))?;
//! ```

mod cache;
mod config;
mod content;
mod error;
mod eviction;
mod handler;
mod id;
mod registry;
pub mod handlers;

pub use cache::{CacheStats, CacheStore, ContentHandle, EntryInfo};
pub use config::CacheConfig;
pub use content::{Content, ContentEvent, ListenerId, Operation, Status};
pub use error::{ContentError, Result};
pub use eviction::LruPolicy;
pub use handler::{Extent, Handler, HandlerDescriptor, HandlerFactory, HandlerOptions, RedrawParams};
pub use id::ResourceId;
pub use registry::{normalize_mime, HandlerRegistry, RegistryBuilder};

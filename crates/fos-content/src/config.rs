//! Cache configuration

use fos_render::DecodeLimits;
use serde::Deserialize;

use crate::{ContentError, Result};

/// Content cache configuration options
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Budget for unreferenced content kept warm (bytes)
    pub budget_bytes: usize,

    /// Maximum bytes an image decoder may allocate
    pub image_max_alloc: u64,

    /// Maximum image width/height accepted by decoders
    pub image_max_dimension: u32,

    /// Base font size for text content (pixels)
    pub font_size: f32,

    /// Tab stop width for preformatted text (characters)
    pub tab_width: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            budget_bytes: 1024 * 1024, // 1MB
            image_max_alloc: 64 * 1024 * 1024,
            image_max_dimension: 16384,
            font_size: 13.0,
            tab_width: 8,
        }
    }
}

impl CacheConfig {
    pub fn with_budget(mut self, bytes: usize) -> Self {
        self.budget_bytes = bytes;
        self
    }

    pub fn with_font_size(mut self, size: f32) -> Self {
        self.font_size = size;
        self
    }

    pub fn with_image_limits(mut self, max_alloc: u64, max_dimension: u32) -> Self {
        self.image_max_alloc = max_alloc;
        self.image_max_dimension = max_dimension;
        self
    }

    /// Parse from JSON; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ContentError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `FOS_CACHE_BUDGET` / `FOS_IMAGE_MAX_ALLOC` from the environment
    pub fn from_env(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(raw) = lookup("FOS_CACHE_BUDGET") {
            match raw.trim().parse() {
                Ok(bytes) => self.budget_bytes = bytes,
                Err(_) => tracing::warn!("Ignoring invalid FOS_CACHE_BUDGET: {:?}", raw),
            }
        }
        if let Some(raw) = lookup("FOS_IMAGE_MAX_ALLOC") {
            match raw.trim().parse() {
                Ok(bytes) => self.image_max_alloc = bytes,
                Err(_) => tracing::warn!("Ignoring invalid FOS_IMAGE_MAX_ALLOC: {:?}", raw),
            }
        }
        self
    }

    /// Check values are usable
    pub fn validate(&self) -> Result<()> {
        if !(self.font_size.is_finite() && self.font_size > 0.0) {
            return Err(ContentError::Config(format!("font_size must be positive, got {}", self.font_size)));
        }
        if self.tab_width == 0 || self.tab_width > 64 {
            return Err(ContentError::Config(format!("tab_width must be 1-64, got {}", self.tab_width)));
        }
        if self.image_max_dimension == 0 {
            return Err(ContentError::Config("image_max_dimension must be non-zero".into()));
        }
        Ok(())
    }

    /// Limits handed to image decoders
    pub fn decode_limits(&self) -> DecodeLimits {
        DecodeLimits {
            max_alloc: self.image_max_alloc,
            max_dimension: self.image_max_dimension,
        }
    }
}

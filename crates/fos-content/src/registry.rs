//! Handler registry
//!
//! Maps MIME types to handler descriptors. Built once at startup and
//! read-only afterwards; adding a format means registering one more
//! descriptor.

use std::collections::HashMap;

use crate::handler::{Handler, HandlerDescriptor, HandlerOptions};
use crate::handlers::{GIF_DESCRIPTOR, HTML_DESCRIPTOR, IMAGE_DESCRIPTOR, TEXTPLAIN_DESCRIPTOR};
use crate::{CacheConfig, ContentError, Result};

/// Lower-case a MIME type and strip its parameters
pub fn normalize_mime(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Frozen MIME type to handler mapping
#[derive(Debug)]
pub struct HandlerRegistry {
    by_type: HashMap<String, &'static HandlerDescriptor>,
    options: HandlerOptions,
}

impl HandlerRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Registry with the built-in image, GIF, HTML and text handlers
    pub fn with_defaults(config: &CacheConfig) -> Result<Self> {
        Self::builder()
            .options(HandlerOptions::from_config(config))
            .register(&IMAGE_DESCRIPTOR)?
            .register(&GIF_DESCRIPTOR)?
            .register(&HTML_DESCRIPTOR)?
            .register(&TEXTPLAIN_DESCRIPTOR)?
            .build()
    }

    /// Descriptor for `mime_type`, which must already be normalised
    pub fn lookup(&self, mime_type: &str) -> Option<&'static HandlerDescriptor> {
        self.by_type.get(mime_type).copied()
    }

    /// Whether a handler exists for `mime_type` (any case, with parameters)
    pub fn supports(&self, mime_type: &str) -> bool {
        self.lookup(&normalize_mime(mime_type)).is_some()
    }

    /// New handler instance using the registry's options
    pub fn instantiate(&self, descriptor: &HandlerDescriptor) -> Box<dyn Handler> {
        descriptor.instantiate(&self.options)
    }

    pub fn options(&self) -> &HandlerOptions {
        &self.options
    }

    /// Registered MIME types, sorted
    pub fn mime_types(&self) -> Vec<&str> {
        let mut types: Vec<_> = self.by_type.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

/// Builder for `HandlerRegistry`
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    by_type: HashMap<String, &'static HandlerDescriptor>,
    options: HandlerOptions,
}

impl RegistryBuilder {
    pub fn options(mut self, options: HandlerOptions) -> Self {
        self.options = options;
        self
    }

    /// Add a descriptor under all of its MIME types
    pub fn register(mut self, descriptor: &'static HandlerDescriptor) -> Result<Self> {
        for mime_type in descriptor.mime_types {
            let key = normalize_mime(mime_type);
            if self.by_type.contains_key(&key) {
                return Err(ContentError::DuplicateType(key));
            }
            self.by_type.insert(key, descriptor);
        }
        tracing::debug!("Registered {} handler for {:?}", descriptor.name, descriptor.mime_types);
        Ok(self)
    }

    pub fn build(self) -> Result<HandlerRegistry> {
        Ok(HandlerRegistry {
            by_type: self.by_type,
            options: self.options,
        })
    }
}

//! Resource identifiers
//!
//! Cache keys are canonical strings. Absolute URLs are normalised by the
//! `url` crate (lower-case scheme and host, default port dropped, dot
//! segments resolved) and lose their fragment, since fragments never reach
//! the server. Anything else is used trimmed but otherwise verbatim.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use url::Url;

/// Canonical resource identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(Arc<str>);

impl ResourceId {
    /// Canonicalise `raw` into an identifier
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim();
        match Url::parse(trimmed) {
            Ok(mut url) => {
                url.set_fragment(None);
                Self(Arc::from(url.as_str()))
            }
            Err(_) => Self(Arc::from(trimmed)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is an absolute URL
    pub fn is_url(&self) -> bool {
        Url::parse(&self.0).is_ok()
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for ResourceId {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl From<&Url> for ResourceId {
    fn from(url: &Url) -> Self {
        Self::new(url.as_str())
    }
}

impl Borrow<str> for ResourceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ResourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

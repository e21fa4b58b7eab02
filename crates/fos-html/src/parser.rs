//! HTML5 Parser implementation
//!
//! Drives html5ever's RcDom sink incrementally: each chunk goes through a
//! lossy UTF-8 decoder that carries split multi-byte sequences over to the
//! next chunk, so the resulting tree does not depend on chunk boundaries.

use html5ever::driver::Parser;
use html5ever::parse_document;
use html5ever::tendril::stream::Utf8LossyDecoder;
use html5ever::tendril::{ByteTendril, TendrilSink};
use markup5ever_rcdom::RcDom;

use crate::{Document, ParseError};

/// Incremental HTML5 parser
pub struct HtmlParser {
    inner: Option<Utf8LossyDecoder<Parser<RcDom>>>,
    bytes_fed: usize,
}

impl HtmlParser {
    /// Create a new HTML parser ready to accept bytes
    pub fn new() -> Self {
        Self {
            inner: Some(parse_document(RcDom::default(), Default::default()).from_utf8()),
            bytes_fed: 0,
        }
    }

    /// Parse a complete HTML string
    pub fn parse_str(html: &str) -> Document {
        let mut parser = Self::new();
        parser.feed(html.as_bytes()).and_then(|_| parser.finish()).unwrap_or_default()
    }

    /// Feed the next chunk of bytes
    pub fn feed(&mut self, chunk: &[u8]) -> Result<(), ParseError> {
        let inner = self.inner.as_mut().ok_or(ParseError::Finished)?;
        if chunk.is_empty() {
            return Ok(());
        }
        inner.process(ByteTendril::from_slice(chunk));
        self.bytes_fed += chunk.len();
        Ok(())
    }

    /// Total bytes fed so far
    pub fn bytes_fed(&self) -> usize {
        self.bytes_fed
    }

    /// Whether `finish` has already been called
    pub fn is_finished(&self) -> bool {
        self.inner.is_none()
    }

    /// End of input: build the document
    pub fn finish(&mut self) -> Result<Document, ParseError> {
        let inner = self.inner.take().ok_or(ParseError::Finished)?;
        let dom = inner.finish();
        let document = Document::from_dom(&dom);

        tracing::debug!(
            "Parsed {} bytes into {} blocks",
            self.bytes_fed,
            document.blocks.len()
        );
        Ok(document)
    }
}

impl Default for HtmlParser {
    fn default() -> Self {
        Self::new()
    }
}

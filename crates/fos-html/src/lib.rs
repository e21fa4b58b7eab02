//! fOS HTML Parser
//!
//! Incremental HTML5 parser built on html5ever.
//! Bytes are fed as they arrive; finishing the parse yields a flat
//! `Document` of text blocks ready for line layout.

mod document;
mod parser;

pub use document::{Block, BlockKind, Document};
pub use parser::HtmlParser;

/// Parse a complete HTML string into a Document
pub fn parse(html: &str) -> Document {
    HtmlParser::parse_str(html)
}

/// Parse error
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("Parser already finished")]
    Finished,
}

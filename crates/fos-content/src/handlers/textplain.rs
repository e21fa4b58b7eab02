//! Plain text handler
//!
//! Wraps the input in a `<pre>` document and hands it to an owned HTML
//! handler, escaping markup characters on the way through.

use fos_render::Plotter;

use super::html::HtmlHandler;
use crate::handler::{Extent, Handler, HandlerDescriptor, HandlerOptions, RedrawParams};
use crate::Result;

pub static TEXTPLAIN_DESCRIPTOR: HandlerDescriptor = HandlerDescriptor {
    name: "textplain",
    mime_types: &["text/plain"],
    can_reformat: true,
    factory: TextPlainHandler::boxed,
};

// The newline after <pre> is dropped by the parser, so a leading newline
// in the text survives.
const HEADER: &[u8] = b"<html><head></head><body><pre>\n";
const FOOTER: &[u8] = b"</pre></body></html>";

pub struct TextPlainHandler {
    html: HtmlHandler,
    escaped: Vec<u8>,
}

impl TextPlainHandler {
    pub fn new(options: &HandlerOptions) -> Self {
        Self {
            html: HtmlHandler::new(options),
            escaped: Vec::new(),
        }
    }

    fn boxed(options: &HandlerOptions) -> Box<dyn Handler> {
        Box::new(Self::new(options))
    }
}

impl Handler for TextPlainHandler {
    fn create(&mut self) -> Result<()> {
        self.html.create()?;
        self.html.process_data(HEADER)
    }

    fn process_data(&mut self, chunk: &[u8]) -> Result<()> {
        self.escaped.clear();
        for &byte in chunk {
            match byte {
                b'<' => self.escaped.extend_from_slice(b"&lt;"),
                b'>' => self.escaped.extend_from_slice(b"&gt;"),
                b'&' => self.escaped.extend_from_slice(b"&amp;"),
                _ => self.escaped.push(byte),
            }
        }
        self.html.process_data(&self.escaped)
    }

    fn convert(&mut self, source: &[u8], width: u32, height: u32) -> Result<Extent> {
        self.html.process_data(FOOTER)?;
        self.html.convert(source, width, height)
    }

    fn reformat(&mut self, width: u32, height: u32) -> Result<Extent> {
        self.html.reformat(width, height)
    }

    fn redraw(&self, plotter: &mut dyn Plotter, params: &RedrawParams) -> Result<()> {
        self.html.redraw(plotter, params)
    }

    fn destroy(&mut self) {
        self.html.destroy();
        self.escaped = Vec::new();
    }

    fn size_estimate(&self) -> usize {
        self.html.size_estimate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fos_html::BlockKind;

    fn converted(text: &[u8]) -> TextPlainHandler {
        let mut handler = TextPlainHandler::new(&HandlerOptions::default());
        handler.create().unwrap();
        handler.process_data(text).unwrap();
        handler.convert(text, 800, 600).unwrap();
        handler
    }

    #[test]
    fn test_markup_is_literal() {
        let handler = converted(b"<b>not bold</b> & more");
        let doc = handler.html.document().unwrap();
        assert_eq!(doc.blocks.len(), 1);
        assert_eq!(doc.blocks[0].kind, BlockKind::Preformatted);
        assert_eq!(doc.blocks[0].text, "<b>not bold</b> & more");
    }

    #[test]
    fn test_leading_newline_kept() {
        let handler = converted(b"\nsecond");
        assert_eq!(handler.html.document().unwrap().blocks[0].text, "\nsecond");
    }

    #[test]
    fn test_split_entity_boundary() {
        let mut handler = TextPlainHandler::new(&HandlerOptions::default());
        handler.create().unwrap();
        handler.process_data(b"a <").unwrap();
        handler.process_data(b"> b").unwrap();
        handler.convert(b"a <> b", 800, 600).unwrap();
        assert_eq!(handler.html.document().unwrap().blocks[0].text, "a <> b");
    }

    #[test]
    fn test_empty_text() {
        let handler = converted(b"");
        assert!(handler.html.document().unwrap().blocks.is_empty());
        assert!(handler.html.title().is_none());
    }
}

//! HTML handler
//!
//! Parses incrementally as bytes arrive, then lays the flattened document
//! out as lines of text. Layout depends only on the document and the
//! available width, so reformatting is repeatable without the source.

use std::rc::Rc;

use fos_html::{Block, BlockKind, Document, HtmlParser, ParseError};
use fos_render::{Color, FontMetrics, FontStyle, Plotter};

use crate::handler::{Extent, Handler, HandlerDescriptor, HandlerOptions, RedrawParams};
use crate::Result;

pub static HTML_DESCRIPTOR: HandlerDescriptor = HandlerDescriptor {
    name: "html",
    mime_types: &["text/html", "application/xhtml+xml"],
    can_reformat: true,
    factory: HtmlHandler::boxed,
};

/// Page margin (pixels)
const MARGIN: f32 = 4.0;
/// Left indent of list items and quotes (pixels)
const INDENT: f32 = 16.0;

/// One laid out line, in content coordinates
#[derive(Debug, Clone, PartialEq)]
struct Line {
    x: f32,
    y: f32,
    text: String,
    style: FontStyle,
}

pub struct HtmlHandler {
    metrics: Rc<dyn FontMetrics>,
    font_size: f32,
    tab_width: usize,
    parser: Option<HtmlParser>,
    document: Option<Document>,
    lines: Vec<Line>,
    extent: Extent,
}

impl HtmlHandler {
    pub fn new(options: &HandlerOptions) -> Self {
        Self {
            metrics: Rc::clone(&options.metrics),
            font_size: options.font_size,
            tab_width: options.tab_width,
            parser: None,
            document: None,
            lines: Vec::new(),
            extent: Extent::default(),
        }
    }

    fn boxed(options: &HandlerOptions) -> Box<dyn Handler> {
        Box::new(Self::new(options))
    }

    /// The parsed document, once converted
    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    /// Number of laid out lines
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    fn block_style(&self, kind: BlockKind) -> FontStyle {
        let base = FontStyle::new(self.font_size);
        match kind {
            BlockKind::Heading(level) => {
                let scale = match level {
                    1 => 2.0,
                    2 => 1.5,
                    3 => 1.17,
                    4 => 1.0,
                    5 => 0.83,
                    _ => 0.67,
                };
                FontStyle::new((self.font_size * scale).round()).bold()
            }
            BlockKind::Quote => base.with_color(Color::rgb(0x44, 0x44, 0x44)),
            _ => base,
        }
    }

    fn layout(&mut self, width: u32) -> Extent {
        let mut lines = Vec::new();
        let mut y = MARGIN;
        let mut right = 0.0f32;
        let available = (width as f32 - 2.0 * MARGIN).max(1.0);

        if let Some(document) = &self.document {
            for block in &document.blocks {
                let style = self.block_style(block.kind);
                let indent = match block.kind {
                    BlockKind::ListItem | BlockKind::Quote => INDENT,
                    _ => 0.0,
                };
                let x = MARGIN + indent;
                let runs = self.break_block(block, &style, (available - indent).max(1.0));
                let line_height = self.metrics.line_height(&style);

                for text in runs {
                    right = right.max(x + self.metrics.width(&style, &text));
                    lines.push(Line { x, y, text, style });
                    y += line_height;
                }
                y += line_height * 0.5;
            }
        }

        self.lines = lines;
        let content_width = (right + MARGIN).ceil() as u32;
        self.extent = Extent::new(width.max(content_width), (y + MARGIN).ceil() as u32);
        self.extent
    }

    /// Split a block into lines no wider than `width` where possible
    fn break_block(&self, block: &Block, style: &FontStyle, width: f32) -> Vec<String> {
        let mut runs = Vec::new();
        for paragraph in block.text.split('\n') {
            if block.kind.is_preformatted() {
                self.break_preformatted(&expand_tabs(paragraph, self.tab_width), style, width, &mut runs);
            } else {
                self.break_words(paragraph, style, width, &mut runs);
            }
        }
        runs
    }

    fn break_words(&self, text: &str, style: &FontStyle, width: f32, runs: &mut Vec<String>) {
        let mut rest = text;
        loop {
            let (mut offset, _) = self.metrics.split(style, rest, width);
            if offset == 0 {
                offset = rest.len();
            }
            runs.push(rest[..offset].trim_end().to_string());
            rest = rest[offset..].trim_start();
            if rest.is_empty() {
                break;
            }
        }
    }

    /// Hard-wrap at the last character that fits; whitespace is content
    fn break_preformatted(&self, text: &str, style: &FontStyle, width: f32, runs: &mut Vec<String>) {
        let mut rest = text;
        while self.metrics.width(style, rest) > width {
            let (mut offset, _) = self.metrics.position(style, rest, width);
            // position snaps to the nearest character, which may overhang
            while offset > 0 && self.metrics.width(style, &rest[..offset]) > width {
                offset = rest[..offset].char_indices().next_back().map_or(0, |(i, _)| i);
            }
            if offset == 0 {
                offset = rest.chars().next().map_or(rest.len(), char::len_utf8);
            }
            runs.push(rest[..offset].to_string());
            rest = &rest[offset..];
        }
        runs.push(rest.to_string());
    }
}

fn expand_tabs(line: &str, tab_width: usize) -> String {
    if !line.contains('\t') {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len());
    let mut column = 0;
    for ch in line.chars() {
        if ch == '\t' {
            let pad = tab_width - column % tab_width;
            out.extend(std::iter::repeat_n(' ', pad));
            column += pad;
        } else {
            out.push(ch);
            column += 1;
        }
    }
    out
}

impl Handler for HtmlHandler {
    fn create(&mut self) -> Result<()> {
        self.parser = Some(HtmlParser::new());
        self.document = None;
        self.lines.clear();
        Ok(())
    }

    fn process_data(&mut self, chunk: &[u8]) -> Result<()> {
        self.parser.as_mut().ok_or(ParseError::Finished)?.feed(chunk)?;
        Ok(())
    }

    fn convert(&mut self, _source: &[u8], width: u32, _height: u32) -> Result<Extent> {
        let mut parser = self.parser.take().ok_or(ParseError::Finished)?;
        self.document = Some(parser.finish()?);
        Ok(self.layout(width))
    }

    fn reformat(&mut self, width: u32, _height: u32) -> Result<Extent> {
        Ok(self.layout(width))
    }

    fn redraw(&self, plotter: &mut dyn Plotter, params: &RedrawParams) -> Result<()> {
        let clip = params.clip;
        plotter.clip(clip);
        plotter.fill_rect(params.dest(), Color::WHITE);

        let scale = params.scale;
        for line in self.lines.iter().filter(|line| !line.text.is_empty()) {
            let style = FontStyle {
                size: line.style.size * scale,
                ..line.style
            };
            let y = params.y + line.y * scale;
            if y + self.metrics.line_height(&style) < clip.y || y > clip.bottom() {
                continue;
            }
            plotter.text(params.x + line.x * scale, y, &line.text, &style);
        }
        Ok(())
    }

    fn destroy(&mut self) {
        self.parser = None;
        self.document = None;
        self.lines = Vec::new();
    }

    fn size_estimate(&self) -> usize {
        let lines: usize = self.lines.iter().map(|line| line.text.capacity()).sum();
        self.document.as_ref().map_or(0, Document::memory_size) + lines
    }

    fn title(&self) -> Option<&str> {
        self.document.as_ref()?.title.as_deref()
    }
}

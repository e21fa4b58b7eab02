//! Flattened document model
//!
//! Converts an RcDom tree into a list of text blocks. Inline markup is
//! dropped; block-level elements start new blocks and `<pre>` keeps its
//! whitespace.

use markup5ever_rcdom::{Handle, NodeData, RcDom};

/// Kind of a text block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph,
    /// Heading level 1-6
    Heading(u8),
    Preformatted,
    ListItem,
    Quote,
}

impl BlockKind {
    fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "p" | "div" | "section" | "article" | "main" | "header" | "footer" | "nav" | "aside"
            | "table" | "tr" | "form" | "dl" | "dt" | "dd" | "figure" | "figcaption" | "body" => {
                Self::Paragraph
            }
            "h1" => Self::Heading(1),
            "h2" => Self::Heading(2),
            "h3" => Self::Heading(3),
            "h4" => Self::Heading(4),
            "h5" => Self::Heading(5),
            "h6" => Self::Heading(6),
            "pre" | "listing" | "xmp" | "plaintext" => Self::Preformatted,
            "li" => Self::ListItem,
            "blockquote" => Self::Quote,
            _ => return None,
        })
    }

    pub fn is_preformatted(self) -> bool {
        self == Self::Preformatted
    }
}

/// A run of text laid out as one block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    /// Block text; `\n` marks a forced line break
    pub text: String,
}

/// Parsed document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    /// Contents of `<title>`, whitespace collapsed
    pub title: Option<String>,
    /// Text blocks in document order
    pub blocks: Vec<Block>,
    /// `src` of every `<img>`, in document order
    pub images: Vec<String>,
}

impl Document {
    /// Flatten an RcDom tree
    pub fn from_dom(dom: &RcDom) -> Self {
        let mut builder = Builder {
            doc: Document::default(),
            current: String::new(),
            kind: BlockKind::Paragraph,
        };
        builder.walk(&dom.document);
        builder.flush();
        builder.doc
    }

    /// Total characters across all blocks
    pub fn text_len(&self) -> usize {
        self.blocks.iter().map(|b| b.text.chars().count()).sum()
    }

    /// Approximate heap usage in bytes
    pub fn memory_size(&self) -> usize {
        let blocks: usize = self.blocks.iter().map(|b| b.text.capacity()).sum();
        let images: usize = self.images.iter().map(|s| s.capacity()).sum();
        blocks + images + self.title.as_ref().map_or(0, |t| t.capacity())
    }
}

struct Builder {
    doc: Document,
    current: String,
    kind: BlockKind,
}

impl Builder {
    fn walk(&mut self, handle: &Handle) {
        match &handle.data {
            NodeData::Document => self.walk_children(handle),
            NodeData::Text { contents } => self.push_text(&contents.borrow()),
            NodeData::Element { name, attrs, .. } => {
                let tag: &str = &name.local;
                match tag {
                    "script" | "style" | "noscript" | "template" => {}
                    "title" => {
                        let mut text = String::new();
                        collect_text(handle, &mut text);
                        self.doc.title = Some(collapse_whitespace(&text));
                    }
                    "br" => self.current.push('\n'),
                    "img" => {
                        let attrs = attrs.borrow();
                        if let Some(src) = attrs.iter().find(|a| &*a.name.local == "src") {
                            self.doc.images.push(src.value.to_string());
                        }
                    }
                    _ => match BlockKind::from_tag(tag) {
                        Some(kind) => {
                            self.flush();
                            let outer = std::mem::replace(&mut self.kind, kind);
                            self.walk_children(handle);
                            self.flush();
                            self.kind = outer;
                        }
                        None => self.walk_children(handle),
                    },
                }
            }
            NodeData::Doctype { .. } | NodeData::Comment { .. } | NodeData::ProcessingInstruction { .. } => {}
        }
    }

    fn walk_children(&mut self, handle: &Handle) {
        for child in handle.children.borrow().iter() {
            self.walk(child);
        }
    }

    fn push_text(&mut self, text: &str) {
        if self.kind.is_preformatted() {
            self.current.push_str(text);
            return;
        }
        for ch in text.chars() {
            if ch.is_whitespace() {
                if !self.current.is_empty() && !self.current.ends_with([' ', '\n']) {
                    self.current.push(' ');
                }
            } else {
                self.current.push(ch);
            }
        }
    }

    fn flush(&mut self) {
        let raw = std::mem::take(&mut self.current);
        let text = if self.kind.is_preformatted() {
            raw.trim_end_matches('\n').to_string()
        } else {
            raw.split('\n').map(str::trim).collect::<Vec<_>>().join("\n").trim().to_string()
        };
        if !text.is_empty() {
            self.doc.blocks.push(Block { kind: self.kind, text });
        }
    }
}

fn collect_text(handle: &Handle, out: &mut String) {
    for child in handle.children.borrow().iter() {
        match &child.data {
            NodeData::Text { contents } => out.push_str(&contents.borrow()),
            _ => collect_text(child, out),
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

//! Display list - a plotter that records instead of painting
//!
//! Recording a redraw makes its output comparable: two redraws that
//! produce equal display lists paint identical pixels on any surface.

use crate::{Bitmap, Color, FontStyle, Plotter, Rect};

/// One recorded plot operation
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayItem {
    Clip(Rect),
    FillRect { rect: Rect, color: Color },
    Text { x: f32, y: f32, text: String, style: FontStyle },
    Bitmap { dest: Rect, width: u32, height: u32, checksum: u64 },
}

/// Recorded sequence of plot operations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayList {
    items: Vec<DisplayItem>,
}

impl DisplayList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[DisplayItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// All text runs in paint order
    pub fn text_runs(&self) -> impl Iterator<Item = &str> {
        self.items.iter().filter_map(|item| match item {
            DisplayItem::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

impl Plotter for DisplayList {
    fn clip(&mut self, rect: Rect) {
        self.items.push(DisplayItem::Clip(rect));
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.items.push(DisplayItem::FillRect { rect, color });
    }

    fn text(&mut self, x: f32, y: f32, text: &str, style: &FontStyle) {
        self.items.push(DisplayItem::Text {
            x,
            y,
            text: text.to_string(),
            style: *style,
        });
    }

    fn bitmap(&mut self, dest: Rect, bitmap: &Bitmap) {
        self.items.push(DisplayItem::Bitmap {
            dest,
            width: bitmap.width,
            height: bitmap.height,
            checksum: bitmap.checksum(),
        });
    }
}

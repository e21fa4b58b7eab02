//! Font metrics
//!
//! Text layout only needs three queries from a font: how wide a run is,
//! which character sits under an x coordinate, and where a run may be
//! split to fit a width. `FixedPitch` answers them for a monospace face.

use crate::Color;

/// Font style used for measuring and plotting text
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontStyle {
    /// Font size in pixels
    pub size: f32,
    /// Foreground color
    pub color: Color,
    /// Bold weight
    pub bold: bool,
}

impl FontStyle {
    pub fn new(size: f32) -> Self {
        Self { size, ..Self::default() }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }
}

impl Default for FontStyle {
    fn default() -> Self {
        Self {
            size: 13.0,
            color: Color::BLACK,
            bold: false,
        }
    }
}

/// Measurement queries used by text layout
pub trait FontMetrics {
    /// Width of `text` in pixels
    fn width(&self, style: &FontStyle, text: &str) -> f32;

    /// Character nearest to `x`.
    ///
    /// Returns the byte offset of that character and its x position.
    fn position(&self, style: &FontStyle, text: &str, x: f32) -> (usize, f32);

    /// Where to split `text` so the first part fits in `x`.
    ///
    /// Returns the byte offset of the space to split at and the width of
    /// the text before it. If no space fits, the first space is used so
    /// that an overlong word stays whole; if there is no space at all the
    /// whole run is returned.
    fn split(&self, style: &FontStyle, text: &str, x: f32) -> (usize, f32);

    /// Distance between baselines of consecutive lines
    fn line_height(&self, style: &FontStyle) -> f32;
}

/// Metrics for a fixed-pitch face
#[derive(Debug, Clone, Copy)]
pub struct FixedPitch {
    /// Advance width as a fraction of the font size
    pub advance_ratio: f32,
    /// Line height as a fraction of the font size
    pub line_ratio: f32,
}

impl FixedPitch {
    /// Advance width of a single character
    pub fn advance(&self, style: &FontStyle) -> f32 {
        let ratio = if style.bold { self.advance_ratio * 1.1 } else { self.advance_ratio };
        (style.size * ratio).round().max(1.0)
    }
}

impl Default for FixedPitch {
    fn default() -> Self {
        Self {
            advance_ratio: 0.6,
            line_ratio: 1.25,
        }
    }
}

impl FontMetrics for FixedPitch {
    fn width(&self, style: &FontStyle, text: &str) -> f32 {
        text.chars().count() as f32 * self.advance(style)
    }

    fn position(&self, style: &FontStyle, text: &str, x: f32) -> (usize, f32) {
        let advance = self.advance(style);
        let target = (x / advance).round().max(0.0) as usize;
        match text.char_indices().nth(target) {
            Some((offset, _)) => (offset, target as f32 * advance),
            None => (text.len(), self.width(style, text)),
        }
    }

    fn split(&self, style: &FontStyle, text: &str, x: f32) -> (usize, f32) {
        let advance = self.advance(style);
        let mut last_fit = None;
        let mut first_space = None;
        for (n, (offset, ch)) in text.char_indices().enumerate() {
            if ch != ' ' {
                continue;
            }
            let width = n as f32 * advance;
            if first_space.is_none() {
                first_space = Some((offset, width));
            }
            if width <= x {
                last_fit = Some((offset, width));
            } else {
                break;
            }
        }

        if self.width(style, text) <= x {
            return (text.len(), self.width(style, text));
        }
        last_fit
            .or(first_space)
            .unwrap_or_else(|| (text.len(), self.width(style, text)))
    }

    fn line_height(&self, style: &FontStyle) -> f32 {
        (style.size * self.line_ratio).round()
    }
}

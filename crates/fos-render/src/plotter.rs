//! Plotter - the drawing surface content paints into

use crate::{Bitmap, Color, FontStyle, Rect};

/// Drawing operations available to content redraw.
///
/// Coordinates are surface pixels. Every operation is clipped to the
/// rectangle set by the most recent `clip` call.
pub trait Plotter {
    /// Restrict subsequent operations to `rect`
    fn clip(&mut self, rect: Rect);

    /// Fill a rectangle with a solid color
    fn fill_rect(&mut self, rect: Rect, color: Color);

    /// Draw a run of text with its top-left corner at (x, y)
    fn text(&mut self, x: f32, y: f32, text: &str, style: &FontStyle);

    /// Draw a bitmap scaled into `dest`
    fn bitmap(&mut self, dest: Rect, bitmap: &Bitmap);
}

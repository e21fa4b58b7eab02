//! Canvas - pixel buffer backed by a tiny-skia Pixmap

use std::path::Path;

use tiny_skia::{
    FillRule, FilterQuality, IntSize, Mask, Paint, PathBuilder, Pixmap, PixmapPaint, Transform,
};

use crate::text::{FixedPitch, FontMetrics};
use crate::{Bitmap, Color, FontStyle, Plotter, Rect, RenderError};

/// Raster surface implementing [`Plotter`]
pub struct Canvas {
    pixmap: Pixmap,
    clip: Rect,
    mask: Option<Mask>,
    metrics: FixedPitch,
}

impl Canvas {
    /// Create a new canvas filled with white
    pub fn new(width: u32, height: u32) -> Result<Self, RenderError> {
        let mut pixmap = Pixmap::new(width, height)
            .ok_or(RenderError::InvalidSize { width, height })?;
        pixmap.fill(Color::WHITE.to_skia());
        Ok(Self {
            pixmap,
            clip: Rect::new(0.0, 0.0, width as f32, height as f32),
            mask: None,
            metrics: FixedPitch::default(),
        })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Bounds of the whole surface
    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width() as f32, self.height() as f32)
    }

    /// Fill the whole surface, ignoring the clip
    pub fn fill(&mut self, color: Color) {
        self.pixmap.fill(color.to_skia());
    }

    /// Read back a pixel (demultiplied)
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        let p = self.pixmap.pixel(x, y)?.demultiply();
        Some(Color::rgba(p.red(), p.green(), p.blue(), p.alpha()))
    }

    /// Get pixel data as raw bytes (RGBA, demultiplied)
    pub fn as_bytes(&self) -> Vec<u8> {
        self.pixmap
            .pixels()
            .iter()
            .flat_map(|p| {
                let c = p.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect()
    }

    /// Encode the surface as PNG
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<(), RenderError> {
        self.pixmap
            .save_png(path)
            .map_err(|e| RenderError::Encode(e.to_string()))
    }

    fn clipped(&self, rect: Rect) -> Option<Rect> {
        rect.intersect(&self.clip)
    }
}

impl Plotter for Canvas {
    fn clip(&mut self, rect: Rect) {
        let bounded = rect.intersect(&self.bounds()).unwrap_or_default();
        self.clip = bounded;

        if bounded == self.bounds() {
            self.mask = None;
            return;
        }

        let mut mask = Mask::new(self.width(), self.height());
        if let (Some(mask), Some(r)) = (mask.as_mut(), bounded.to_skia()) {
            let path = PathBuilder::from_rect(r);
            mask.fill_path(&path, FillRule::Winding, false, Transform::identity());
        }
        self.mask = mask;
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        let Some(r) = self.clipped(rect).and_then(Rect::to_skia) else {
            return;
        };
        let mut paint = Paint::default();
        paint.set_color(color.to_skia());
        paint.anti_alias = false;
        self.pixmap.fill_rect(r, &paint, Transform::identity(), None);
    }

    fn text(&mut self, x: f32, y: f32, text: &str, style: &FontStyle) {
        // No glyph rasteriser here: each visible character becomes a solid
        // cell inside its advance box.
        let advance = self.metrics.advance(style);
        let line_height = self.metrics.line_height(style);
        for (i, ch) in text.chars().enumerate() {
            if ch.is_whitespace() {
                continue;
            }
            let cell = Rect::new(
                x + i as f32 * advance + advance * 0.1,
                y + line_height * 0.2,
                advance * 0.8,
                line_height * 0.6,
            );
            self.fill_rect(cell, style.color);
        }
    }

    fn bitmap(&mut self, dest: Rect, bitmap: &Bitmap) {
        if dest.is_empty() || self.clipped(dest).is_none() {
            return;
        }
        let Some(src) = premultiplied_pixmap(bitmap) else {
            tracing::warn!("Skipping bitmap with invalid size {}x{}", bitmap.width, bitmap.height);
            return;
        };

        let sx = dest.width / bitmap.width as f32;
        let sy = dest.height / bitmap.height as f32;
        let paint = PixmapPaint {
            quality: FilterQuality::Nearest,
            ..PixmapPaint::default()
        };
        let transform = Transform::from_row(sx, 0.0, 0.0, sy, dest.x, dest.y);

        // Bitmap bounds can exceed the clip, so honour it through the mask.
        let mask = match &self.mask {
            Some(mask) => Some(mask),
            None if self.clip != self.bounds() => return,
            None => None,
        };
        self.pixmap.draw_pixmap(0, 0, src.as_ref(), &paint, transform, mask);
    }
}

/// Convert straight RGBA into a premultiplied tiny-skia pixmap
fn premultiplied_pixmap(bitmap: &Bitmap) -> Option<Pixmap> {
    let size = IntSize::from_wh(bitmap.width, bitmap.height)?;
    let mut data = bitmap.pixels.clone();
    for px in data.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((*c as u16 * a + 127) / 255) as u8;
        }
    }
    Pixmap::from_vec(data, size)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, color: Color) -> Bitmap {
        let pixels = (0..width * height)
            .flat_map(|_| [color.r, color.g, color.b, color.a])
            .collect();
        Bitmap { width, height, pixels }
    }

    #[test]
    fn test_canvas_starts_white() {
        let canvas = Canvas::new(4, 4).unwrap();
        assert_eq!(canvas.pixel(0, 0), Some(Color::WHITE));
        assert_eq!(canvas.pixel(4, 0), None);
        assert_eq!(canvas.pixel(0, 4), None);
    }

    #[test]
    fn test_pixel_past_row_end_does_not_wrap() {
        let mut canvas = Canvas::new(4, 2).unwrap();
        canvas.fill_rect(Rect::new(0.0, 1.0, 4.0, 1.0), Color::RED);
        // (4, 0) would alias (0, 1) in the flat buffer
        assert_eq!(canvas.pixel(0, 1), Some(Color::RED));
        assert_eq!(canvas.pixel(4, 0), None);
        assert_eq!(canvas.pixel(3, 0), Some(Color::WHITE));
    }

    #[test]
    fn test_zero_size_canvas_is_rejected() {
        assert!(matches!(Canvas::new(0, 10), Err(RenderError::InvalidSize { .. })));
    }

    #[test]
    fn test_fill_rect_respects_clip() {
        let mut canvas = Canvas::new(10, 10).unwrap();
        canvas.clip(Rect::new(0.0, 0.0, 5.0, 10.0));
        canvas.fill_rect(Rect::new(0.0, 0.0, 10.0, 10.0), Color::RED);

        assert_eq!(canvas.pixel(2, 2), Some(Color::RED));
        assert_eq!(canvas.pixel(7, 2), Some(Color::WHITE));
    }

    #[test]
    fn test_bitmap_scaled_into_dest() {
        let mut canvas = Canvas::new(10, 10).unwrap();
        canvas.bitmap(Rect::new(0.0, 0.0, 10.0, 10.0), &solid(2, 2, Color::BLUE));

        assert_eq!(canvas.pixel(1, 1), Some(Color::BLUE));
        assert_eq!(canvas.pixel(8, 8), Some(Color::BLUE));
    }

    #[test]
    fn test_bitmap_clipped() {
        let mut canvas = Canvas::new(10, 10).unwrap();
        canvas.clip(Rect::new(0.0, 0.0, 10.0, 5.0));
        canvas.bitmap(Rect::new(0.0, 0.0, 10.0, 10.0), &solid(1, 1, Color::GREEN));

        assert_eq!(canvas.pixel(5, 2), Some(Color::GREEN));
        assert_eq!(canvas.pixel(5, 8), Some(Color::WHITE));
    }

    #[test]
    fn test_text_paints_cells_for_visible_chars() {
        let mut canvas = Canvas::new(100, 20).unwrap();
        let style = FontStyle::default();
        canvas.text(0.0, 0.0, "a b", &style);

        let advance = FixedPitch::default().advance(&style);
        let line_height = FixedPitch::default().line_height(&style);
        let cy = (line_height * 0.5) as u32;
        assert_eq!(canvas.pixel((advance * 0.5) as u32, cy), Some(style.color));
        // The space between stays blank
        assert_eq!(canvas.pixel((advance * 1.5) as u32, cy), Some(Color::WHITE));
    }
}

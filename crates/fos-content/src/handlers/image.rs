//! Raster image handler
//!
//! Bytes are buffered by the owning content; decoding happens once in
//! `convert` through the `image` crate. Resizing never re-decodes: the
//! bitmap is scaled at paint time.

use fos_render::{DecodedImage, ImageDecoder, ImageFormat, Plotter};

use crate::handler::{Extent, Handler, HandlerDescriptor, HandlerOptions, RedrawParams};
use crate::Result;

/// Still images
pub static IMAGE_DESCRIPTOR: HandlerDescriptor = HandlerDescriptor {
    name: "image",
    mime_types: &[
        "image/png",
        "image/x-png",
        "image/jpeg",
        "image/jpg",
        "image/pjpeg",
        "image/bmp",
        "image/x-bmp",
        "image/x-ms-bmp",
        "image/webp",
    ],
    can_reformat: false,
    factory: ImageHandler::boxed,
};

/// Animated GIF
pub static GIF_DESCRIPTOR: HandlerDescriptor = HandlerDescriptor {
    name: "gif",
    mime_types: &["image/gif"],
    can_reformat: false,
    factory: ImageHandler::boxed,
};

/// Frame delay used when a GIF asks for none
const DEFAULT_FRAME_DELAY_MS: u32 = 100;

/// Bytes needed to sniff every supported format
const SNIFF_LEN: usize = 16;

pub struct ImageHandler {
    decoder: ImageDecoder,
    header: Vec<u8>,
    image: Option<DecodedImage>,
    frame: usize,
    frame_elapsed: u32,
}

impl ImageHandler {
    pub fn new(options: &HandlerOptions) -> Self {
        Self {
            decoder: ImageDecoder::new(options.decode_limits),
            header: Vec::with_capacity(SNIFF_LEN),
            image: None,
            frame: 0,
            frame_elapsed: 0,
        }
    }

    fn boxed(options: &HandlerOptions) -> Box<dyn Handler> {
        Box::new(Self::new(options))
    }

    /// Format detected from the first bytes received
    pub fn sniffed_format(&self) -> ImageFormat {
        ImageFormat::from_bytes(&self.header)
    }

    /// Index of the frame currently shown
    pub fn current_frame(&self) -> usize {
        self.frame
    }

    fn extent(&self) -> Extent {
        self.image
            .as_ref()
            .map_or_else(Extent::default, |image| Extent::new(image.width(), image.height()))
    }
}

impl Handler for ImageHandler {
    fn create(&mut self) -> Result<()> {
        self.header.clear();
        self.image = None;
        self.frame = 0;
        self.frame_elapsed = 0;
        Ok(())
    }

    fn process_data(&mut self, chunk: &[u8]) -> Result<()> {
        if self.header.len() < SNIFF_LEN {
            let take = (SNIFF_LEN - self.header.len()).min(chunk.len());
            self.header.extend_from_slice(&chunk[..take]);
            if self.header.len() == SNIFF_LEN {
                tracing::trace!("Sniffed image format {:?}", self.sniffed_format());
            }
        }
        Ok(())
    }

    fn convert(&mut self, source: &[u8], _width: u32, _height: u32) -> Result<Extent> {
        let image = self.decoder.decode(source)?;
        self.image = Some(image);
        Ok(self.extent())
    }

    fn reformat(&mut self, _width: u32, _height: u32) -> Result<Extent> {
        Ok(self.extent())
    }

    fn redraw(&self, plotter: &mut dyn Plotter, params: &RedrawParams) -> Result<()> {
        let Some(image) = &self.image else {
            return Ok(());
        };
        let Some(frame) = image.frames.get(self.frame) else {
            return Ok(());
        };
        plotter.clip(params.clip);
        plotter.bitmap(params.dest(), &frame.bitmap);
        Ok(())
    }

    fn destroy(&mut self) {
        self.image = None;
        self.header = Vec::new();
    }

    fn size_estimate(&self) -> usize {
        self.image.as_ref().map_or(0, DecodedImage::memory_size)
    }

    fn tick(&mut self, elapsed_ms: u32) -> bool {
        let Some(image) = &self.image else {
            return false;
        };
        if !image.is_animated() {
            return false;
        }

        let start = self.frame;
        self.frame_elapsed = self.frame_elapsed.saturating_add(elapsed_ms);
        loop {
            let delay = match image.frames[self.frame].delay_ms {
                0 => DEFAULT_FRAME_DELAY_MS,
                delay => delay,
            };
            if self.frame_elapsed < delay {
                break;
            }
            self.frame_elapsed -= delay;
            self.frame = (self.frame + 1) % image.frames.len();
        }
        self.frame != start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fos_render::{DisplayItem, DisplayList, Rect};
    use image::codecs::gif::GifEncoder;
    use image::{Delay, Frame as GifFrame, ImageFormat as Codec, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([0, 0, 255, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, Codec::Png).unwrap();
        out.into_inner()
    }

    fn gif_bytes(delays: &[u32]) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut out);
            let frames = delays.iter().enumerate().map(|(i, delay)| {
                let shade = (i * 100) as u8;
                let img = RgbaImage::from_pixel(2, 2, Rgba([shade, 0, 0, 255]));
                GifFrame::from_parts(img, 0, 0, Delay::from_numer_denom_ms(*delay, 1))
            });
            encoder.encode_frames(frames).unwrap();
        }
        out
    }

    fn converted(bytes: &[u8]) -> ImageHandler {
        let mut handler = ImageHandler::new(&HandlerOptions::default());
        handler.create().unwrap();
        handler.process_data(bytes).unwrap();
        handler.convert(bytes, 100, 100).unwrap();
        handler
    }

    #[test]
    fn test_sniff_across_chunks() {
        let bytes = png_bytes(1, 1);
        let mut handler = ImageHandler::new(&HandlerOptions::default());
        handler.create().unwrap();
        for piece in bytes.chunks(3) {
            handler.process_data(piece).unwrap();
        }
        assert_eq!(handler.sniffed_format(), ImageFormat::Png);
    }

    #[test]
    fn test_convert_reports_natural_size() {
        let bytes = png_bytes(7, 3);
        let mut handler = converted(&bytes);
        assert_eq!(handler.reformat(500, 500).unwrap(), Extent::new(7, 3));
        assert_eq!(handler.size_estimate(), 7 * 3 * 4);
    }

    #[test]
    fn test_convert_garbage_fails() {
        let mut handler = ImageHandler::new(&HandlerOptions::default());
        handler.create().unwrap();
        handler.process_data(b"not an image").unwrap();
        assert!(handler.convert(b"not an image", 10, 10).is_err());
    }

    #[test]
    fn test_redraw_scales_to_dest() {
        let handler = converted(&png_bytes(2, 2));
        let mut list = DisplayList::new();
        let params = RedrawParams::new(5.0, 5.0, 2.0, 2.0).with_scale(3.0);
        handler.redraw(&mut list, &params).unwrap();
        assert!(matches!(
            list.items()[1],
            DisplayItem::Bitmap { dest, width: 2, height: 2, .. } if dest == Rect::new(5.0, 5.0, 6.0, 6.0)
        ));
    }

    #[test]
    fn test_animation_advances_with_delays() {
        let mut handler = converted(&gif_bytes(&[50, 50, 50]));
        assert!(!handler.tick(20));
        assert!(handler.tick(30));
        assert_eq!(handler.current_frame(), 1);
        assert!(handler.tick(100));
        assert_eq!(handler.current_frame(), 0);
    }

    #[test]
    fn test_still_image_never_ticks() {
        let mut handler = converted(&png_bytes(1, 1));
        assert!(!handler.tick(10_000));
    }

    #[test]
    fn test_destroy_releases_bitmap() {
        let mut handler = converted(&png_bytes(4, 4));
        handler.destroy();
        assert_eq!(handler.size_estimate(), 0);
    }
}

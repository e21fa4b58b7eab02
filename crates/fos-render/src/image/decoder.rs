//! Image decoder for various formats
//!
//! Supports PNG, JPEG, GIF (animated), WebP and BMP via the image crate.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::io::Cursor;

use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage, ImageFormat as ImgFormat, ImageReader, Limits};
use image::ImageDecoder as _;

/// Supported image formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    WebP,
    Bmp,
    Unknown,
}

impl ImageFormat {
    /// Detect format from magic bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Self::Png;
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Self::Jpeg;
        }

        // GIF: GIF87a or GIF89a
        if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            return Self::Gif;
        }

        // WebP: RIFF....WEBP
        if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Self::WebP;
        }

        // BMP: BM + 32-bit file size
        if data.len() >= 14 && data.starts_with(b"BM") {
            return Self::Bmp;
        }

        Self::Unknown
    }

    /// Get format from a MIME type (parameters are ignored)
    pub fn from_mime(mime: &str) -> Self {
        let essence = mime.split(';').next().unwrap_or("").trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/png" | "image/x-png" => Self::Png,
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Self::Jpeg,
            "image/gif" => Self::Gif,
            "image/webp" => Self::WebP,
            "image/bmp" | "image/x-bmp" | "image/x-ms-bmp" => Self::Bmp,
            _ => Self::Unknown,
        }
    }

    /// Get format from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "png" => Self::Png,
            "jpg" | "jpeg" => Self::Jpeg,
            "gif" => Self::Gif,
            "webp" => Self::WebP,
            "bmp" => Self::Bmp,
            _ => Self::Unknown,
        }
    }

    /// Canonical MIME type
    pub fn mime_type(self) -> Option<&'static str> {
        match self {
            Self::Png => Some("image/png"),
            Self::Jpeg => Some("image/jpeg"),
            Self::Gif => Some("image/gif"),
            Self::WebP => Some("image/webp"),
            Self::Bmp => Some("image/bmp"),
            Self::Unknown => None,
        }
    }

    /// Convert to image crate format
    fn to_image_format(self) -> Option<ImgFormat> {
        match self {
            Self::Png => Some(ImgFormat::Png),
            Self::Jpeg => Some(ImgFormat::Jpeg),
            Self::Gif => Some(ImgFormat::Gif),
            Self::WebP => Some(ImgFormat::WebP),
            Self::Bmp => Some(ImgFormat::Bmp),
            Self::Unknown => None,
        }
    }
}

/// Straight-alpha RGBA pixel buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Bitmap {
    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 4) as usize;
        self.pixels.get(idx..idx + 4).map(|p| [p[0], p[1], p[2], p[3]])
    }

    /// Content hash of dimensions and pixels
    pub fn checksum(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.width.hash(&mut hasher);
        self.height.hash(&mut hasher);
        self.pixels.hash(&mut hasher);
        hasher.finish()
    }
}

/// One frame of a decoded image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub bitmap: Bitmap,
    /// Display time before the next frame, 0 for still images
    pub delay_ms: u32,
}

/// A decoded image ready for rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    /// Frames in display order, never empty
    pub frames: Vec<Frame>,
    /// Original format
    pub format: ImageFormat,
}

impl DecodedImage {
    /// Create a still image from raw RGBA data
    pub fn from_rgba(pixels: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            frames: vec![Frame {
                bitmap: Bitmap { width, height, pixels },
                delay_ms: 0,
            }],
            format: ImageFormat::Unknown,
        }
    }

    pub fn width(&self) -> u32 {
        self.frames.first().map_or(0, |f| f.bitmap.width)
    }

    pub fn height(&self) -> u32 {
        self.frames.first().map_or(0, |f| f.bitmap.height)
    }

    /// First frame, the still representation
    pub fn bitmap(&self) -> &Bitmap {
        &self.frames[0].bitmap
    }

    pub fn is_animated(&self) -> bool {
        self.frames.len() > 1
    }

    /// Memory size in bytes
    pub fn memory_size(&self) -> usize {
        self.frames.iter().map(|f| f.bitmap.pixels.len()).sum()
    }
}

/// Resource limits handed to the decode library
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    /// Maximum bytes the decoder may allocate
    pub max_alloc: u64,
    /// Maximum width and height
    pub max_dimension: u32,
}

impl DecodeLimits {
    fn to_image_limits(self) -> Limits {
        let mut limits = Limits::default();
        limits.max_alloc = Some(self.max_alloc);
        limits.max_image_width = Some(self.max_dimension);
        limits.max_image_height = Some(self.max_dimension);
        limits
    }
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_alloc: 64 * 1024 * 1024, // 64MB
            max_dimension: 16384,
        }
    }
}

/// Image decoder
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageDecoder {
    limits: DecodeLimits,
}

impl ImageDecoder {
    pub fn new(limits: DecodeLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> DecodeLimits {
        self.limits
    }

    /// Decode image from bytes, sniffing the format
    pub fn decode(&self, data: &[u8]) -> Result<DecodedImage, ImageError> {
        self.decode_with_format(data, ImageFormat::from_bytes(data))
    }

    /// Decode with known format
    pub fn decode_with_format(&self, data: &[u8], format: ImageFormat) -> Result<DecodedImage, ImageError> {
        let img_format = format.to_image_format().ok_or(ImageError::UnsupportedFormat)?;

        let frames = if format == ImageFormat::Gif {
            self.decode_animation(data)?
        } else {
            let mut reader = ImageReader::new(Cursor::new(data));
            reader.set_format(img_format);
            reader.limits(self.limits.to_image_limits());
            let img = reader.decode().map_err(ImageError::from_image)?;
            vec![Frame {
                bitmap: to_bitmap(img),
                delay_ms: 0,
            }]
        };

        if frames.is_empty() {
            return Err(ImageError::NoFrames);
        }
        tracing::debug!(
            "Decoded {:?} {}x{} ({} frames)",
            format,
            frames[0].bitmap.width,
            frames[0].bitmap.height,
            frames.len()
        );
        Ok(DecodedImage { frames, format })
    }

    fn decode_animation(&self, data: &[u8]) -> Result<Vec<Frame>, ImageError> {
        let mut decoder = GifDecoder::new(Cursor::new(data)).map_err(ImageError::from_image)?;
        decoder
            .set_limits(self.limits.to_image_limits())
            .map_err(ImageError::from_image)?;

        let frames = decoder
            .into_frames()
            .collect_frames()
            .map_err(ImageError::from_image)?;

        Ok(frames
            .into_iter()
            .map(|frame| {
                let (numer, denom) = frame.delay().numer_denom_ms();
                let buffer = frame.into_buffer();
                Frame {
                    bitmap: Bitmap {
                        width: buffer.width(),
                        height: buffer.height(),
                        pixels: buffer.into_raw(),
                    },
                    delay_ms: numer / denom.max(1),
                }
            })
            .collect())
    }
}

fn to_bitmap(img: DynamicImage) -> Bitmap {
    let rgba = img.into_rgba8();
    Bitmap {
        width: rgba.width(),
        height: rgba.height(),
        pixels: rgba.into_raw(),
    }
}

/// Image decoding errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ImageError {
    #[error("Unsupported image format")]
    UnsupportedFormat,

    #[error("Decode failed: {0}")]
    DecodeFailed(String),

    #[error("Decoder limits exceeded: {0}")]
    LimitsExceeded(String),

    #[error("Image has no frames")]
    NoFrames,
}

impl ImageError {
    fn from_image(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Limits(e) => Self::LimitsExceeded(e.to_string()),
            image::ImageError::Unsupported(_) => Self::UnsupportedFormat,
            other => Self::DecodeFailed(other.to_string()),
        }
    }
}

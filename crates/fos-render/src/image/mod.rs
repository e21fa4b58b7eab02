//! Image handling module
//!
//! Decoding boundary over the `image` crate. Everything past this module
//! sees straight-alpha RGBA frames and nothing of the codec.

mod decoder;

pub use decoder::{Bitmap, DecodeLimits, DecodedImage, Frame, ImageDecoder, ImageError, ImageFormat};

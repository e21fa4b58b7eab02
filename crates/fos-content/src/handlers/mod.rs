//! Built-in content handlers

mod html;
mod image;
mod textplain;

pub use html::{HtmlHandler, HTML_DESCRIPTOR};
pub use image::{ImageHandler, GIF_DESCRIPTOR, IMAGE_DESCRIPTOR};
pub use textplain::{TextPlainHandler, TEXTPLAIN_DESCRIPTOR};

//! Image acceptance checks run before any inference call.

pub mod mime_detect;
pub mod validator;

pub use mime_detect::{detect_mime_type, format_from_declared, format_from_name, format_name, is_image, mime_for_format};
pub use validator::{ImageLimits, ImageValidator};

//! MIME and format-name mapping for the image formats the validator knows.
//!
//! Config lists formats by short name (`jpeg`, `png`); transports declare
//! them as MIME types or file extensions. Everything funnels into
//! `image::ImageFormat`.

use std::path::Path;

use image::ImageFormat;

/// Detect MIME type by file extension.
pub fn detect_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png"          => "image/png",
        "gif"          => "image/gif",
        "webp"         => "image/webp",
        "bmp"          => "image/bmp",
        "tiff" | "tif" => "image/tiff",
        "heic"         => "image/heic",
        "pdf"          => "application/pdf",
        _              => "application/octet-stream",
    }
}

/// Whether a MIME type is for an image.
pub fn is_image(mime: &str) -> bool {
    mime.starts_with("image/")
}

/// Config name for a format.
pub fn format_name(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Png  => "png",
        ImageFormat::WebP => "webp",
        ImageFormat::Gif  => "gif",
        ImageFormat::Bmp  => "bmp",
        ImageFormat::Tiff => "tiff",
        _                 => "other",
    }
}

/// Parse a config name (`jpeg`, `jpg`, `png`, ...).
pub fn format_from_name(name: &str) -> Option<ImageFormat> {
    match name.trim().to_ascii_lowercase().as_str() {
        "jpeg" | "jpg" => Some(ImageFormat::Jpeg),
        "png"          => Some(ImageFormat::Png),
        "webp"         => Some(ImageFormat::WebP),
        "gif"          => Some(ImageFormat::Gif),
        "bmp"          => Some(ImageFormat::Bmp),
        "tiff" | "tif" => Some(ImageFormat::Tiff),
        _              => None,
    }
}

/// Interpret a transport's declared format: a MIME type, an extension with
/// or without the dot, or a bare name.
pub fn format_from_declared(declared: &str) -> Option<ImageFormat> {
    let declared = declared.trim();
    let name = declared
        .strip_prefix("image/")
        .or_else(|| declared.strip_prefix('.'))
        .unwrap_or(declared);
    format_from_name(name)
}

pub fn mime_for_format(format: ImageFormat) -> &'static str {
    format.to_mime_type()
}

//! Header-only image validation.
//!
//! Checks run cheapest first: byte size, then the magic bytes, then the
//! dimensions read from the image header. Pixel data is never decoded, so
//! the cost is bounded by header size rather than image size.

use std::io::Cursor;

use docintake_config::ImageConfig;
use docintake_core::{RawImage, ValidationOutcome};
use image::{ImageFormat, ImageReader};
use tracing::debug;

use crate::mime_detect::{format_from_declared, format_from_name, format_name};

/// Acceptance thresholds, resolved from config once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageLimits {
    pub min_width: u32,
    pub min_height: u32,
    pub min_bytes: usize,
    pub max_bytes: usize,
    pub allowed: Vec<ImageFormat>,
}

impl From<&ImageConfig> for ImageLimits {
    fn from(config: &ImageConfig) -> Self {
        Self {
            min_width: config.min_width(),
            min_height: config.min_height(),
            min_bytes: config.min_bytes(),
            max_bytes: config.max_bytes(),
            allowed: config
                .allowed_formats()
                .iter()
                .filter_map(|name| format_from_name(name))
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageValidator {
    limits: ImageLimits,
}

impl ImageValidator {
    pub fn new(limits: ImageLimits) -> Self {
        Self { limits }
    }

    pub fn from_config(config: &ImageConfig) -> Self {
        Self::new(ImageLimits::from(config))
    }

    pub fn limits(&self) -> &ImageLimits {
        &self.limits
    }

    /// Classify an image without contacting any model.
    pub fn validate(&self, image: &RawImage) -> ValidationOutcome {
        let bytes = image.byte_size();
        let limits = &self.limits;

        if bytes > limits.max_bytes {
            return ValidationOutcome::RejectedTooLarge { bytes, max_bytes: limits.max_bytes };
        }
        if bytes < limits.min_bytes {
            return ValidationOutcome::RejectedTooSmall { width: None, height: None, bytes };
        }

        // The content decides the format; transports routinely mislabel.
        let format = match image::guess_format(&image.data) {
            Ok(format) => format,
            Err(_) => {
                return ValidationOutcome::RejectedBadFormat {
                    detail: format!("unrecognised image data (declared {})", image.declared_format),
                };
            }
        };
        if !limits.allowed.contains(&format) {
            return ValidationOutcome::RejectedBadFormat {
                detail: format!("{} is not an accepted format", format_name(format)),
            };
        }
        if let Some(declared) = format_from_declared(&image.declared_format) {
            if declared != format {
                debug!(
                    declared = %image.declared_format,
                    actual = format_name(format),
                    "Declared image format differs from content"
                );
            }
        }

        let (width, height) = match ImageReader::with_format(Cursor::new(&image.data[..]), format).into_dimensions() {
            Ok(dims) => dims,
            Err(e) => {
                return ValidationOutcome::RejectedBadFormat {
                    detail: format!("unreadable {} header: {e}", format_name(format)),
                };
            }
        };
        if width < limits.min_width || height < limits.min_height {
            return ValidationOutcome::RejectedTooSmall {
                width: Some(width),
                height: Some(height),
                bytes,
            };
        }

        ValidationOutcome::Accepted
    }
}

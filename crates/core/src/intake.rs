//! Upload intake: media-type and size checks performed before a job exists.
//!
//! The declared media type must be one of [`ACCEPTED_MEDIA_TYPES`] and the
//! content must not contradict it. HEIC/HEIF containers are recognised by
//! their `ftyp` box since the image decoder does not sniff them.

use image::ImageFormat;

use crate::error::CoreError;
use crate::job::{ImagePayload, Job};
use crate::settings::GenerationConfig;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum accepted upload size (10 MB).
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub const MEDIA_TYPE_PNG: &str = "image/png";
pub const MEDIA_TYPE_JPEG: &str = "image/jpeg";
pub const MEDIA_TYPE_WEBP: &str = "image/webp";
pub const MEDIA_TYPE_HEIC: &str = "image/heic";
pub const MEDIA_TYPE_HEIF: &str = "image/heif";

/// All media types accepted for upload.
pub const ACCEPTED_MEDIA_TYPES: &[&str] = &[
    MEDIA_TYPE_PNG,
    MEDIA_TYPE_JPEG,
    MEDIA_TYPE_WEBP,
    MEDIA_TYPE_HEIC,
    MEDIA_TYPE_HEIF,
];

/// ISO-BMFF brands used by HEIC/HEIF files.
const HEIF_BRANDS: &[&[u8; 4]] = &[
    b"heic", b"heix", b"hevc", b"hevx", b"heim", b"heis", b"mif1", b"msf1",
];

// ---------------------------------------------------------------------------
// Media type helpers
// ---------------------------------------------------------------------------

/// Normalise a declared media type: lowercase, parameters stripped,
/// `image/jpg` folded into `image/jpeg`.
pub fn normalize_media_type(declared: &str) -> String {
    let base = declared
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match base.as_str() {
        "image/jpg" | "image/pjpeg" => MEDIA_TYPE_JPEG.to_string(),
        _ => base,
    }
}

/// Media type implied by a file extension, if it is one we accept.
pub fn media_type_for_extension(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "png" => Some(MEDIA_TYPE_PNG),
        "jpg" | "jpeg" => Some(MEDIA_TYPE_JPEG),
        "webp" => Some(MEDIA_TYPE_WEBP),
        "heic" => Some(MEDIA_TYPE_HEIC),
        "heif" => Some(MEDIA_TYPE_HEIF),
        _ => None,
    }
}

/// File extension for writing a payload of the given media type.
pub fn extension_for_media_type(media_type: &str) -> &'static str {
    match normalize_media_type(media_type).as_str() {
        MEDIA_TYPE_JPEG => "jpg",
        MEDIA_TYPE_WEBP => "webp",
        MEDIA_TYPE_HEIC => "heic",
        MEDIA_TYPE_HEIF => "heif",
        _ => "png",
    }
}

fn is_heif_container(bytes: &[u8]) -> bool {
    bytes.len() >= 12
        && &bytes[4..8] == b"ftyp"
        && HEIF_BRANDS.iter().any(|brand| &bytes[8..12] == *brand)
}

/// Media type the content itself claims to be, if recognisable.
pub fn sniff_media_type(bytes: &[u8]) -> Option<&'static str> {
    if is_heif_container(bytes) {
        return Some(MEDIA_TYPE_HEIC);
    }
    match image::guess_format(bytes).ok()? {
        ImageFormat::Png => Some(MEDIA_TYPE_PNG),
        ImageFormat::Jpeg => Some(MEDIA_TYPE_JPEG),
        ImageFormat::WebP => Some(MEDIA_TYPE_WEBP),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// IntakeFile
// ---------------------------------------------------------------------------

/// A file offered for submission.
#[derive(Debug, Clone)]
pub struct IntakeFile {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub media_type: String,
}

impl IntakeFile {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>, media_type: &str) -> Self {
        Self {
            filename: filename.into(),
            bytes,
            media_type: normalize_media_type(media_type),
        }
    }

    /// Check type, size and content.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !ACCEPTED_MEDIA_TYPES.contains(&self.media_type.as_str()) {
            return Err(CoreError::Validation(format!(
                "Unsupported media type '{}' for {}. Must be one of: {}",
                self.media_type,
                self.filename,
                ACCEPTED_MEDIA_TYPES.join(", ")
            )));
        }
        if self.bytes.is_empty() {
            return Err(CoreError::Validation(format!("{} is empty", self.filename)));
        }
        if self.bytes.len() > MAX_UPLOAD_BYTES {
            return Err(CoreError::Validation(format!(
                "{} is too large: {} bytes (max {MAX_UPLOAD_BYTES})",
                self.filename,
                self.bytes.len()
            )));
        }

        let sniffed = sniff_media_type(&self.bytes);
        let consistent = match sniffed {
            Some(MEDIA_TYPE_HEIC) => {
                self.media_type == MEDIA_TYPE_HEIC || self.media_type == MEDIA_TYPE_HEIF
            }
            Some(actual) => self.media_type == actual,
            None => false,
        };
        if !consistent {
            return Err(CoreError::Validation(format!(
                "{} is declared as {} but its content is {}",
                self.filename,
                self.media_type,
                sniffed.unwrap_or("not a recognised image")
            )));
        }
        Ok(())
    }

    /// Validate and turn the file into a queued job carrying `config`.
    pub fn into_job(self, config: GenerationConfig) -> Result<Job, CoreError> {
        self.validate()?;
        Ok(Job::new(
            self.filename,
            ImagePayload::new(self.bytes, self.media_type),
            config,
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

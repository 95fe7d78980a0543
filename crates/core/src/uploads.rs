//! Upload size limits and image sniffing.

use image::ImageFormat;

use crate::error::CoreError;

const MIB: usize = 1024 * 1024;

/// Per-file cap enforced by the server on multipart uploads.
pub const MAX_UPLOAD_BYTES: usize = 10 * MIB;

/// Maximum number of file parts accepted in one multipart request.
pub const MAX_FILES_PER_REQUEST: usize = 20;

/// Stricter cap the client applies to the face reference before uploading.
///
/// 1.91 MiB, truncated to whole bytes.
pub const FACE_REFERENCE_MAX_BYTES: usize = 2_002_780;

/// Human-readable label for [`FACE_REFERENCE_MAX_BYTES`].
pub const FACE_REFERENCE_MAX_LABEL: &str = "1.91MB";

/// Content type assumed when an upload's format cannot be determined.
pub const FALLBACK_CONTENT_TYPE: &str = "image/jpeg";

/// Format a byte count as mebibytes with two decimals, e.g. `2.20MB`.
pub fn format_megabytes(bytes: usize) -> String {
    format!("{:.2}MB", bytes as f64 / MIB as f64)
}

/// Reject a face reference larger than [`FACE_REFERENCE_MAX_BYTES`].
///
/// The message names both the limit and the actual size.
pub fn check_face_reference_size(len: usize) -> Result<(), CoreError> {
    if len > FACE_REFERENCE_MAX_BYTES {
        return Err(CoreError::PayloadTooLarge(format!(
            "FILE TOO LARGE! Maximum allowed: {FACE_REFERENCE_MAX_LABEL}. \
             Your file size: {}. Please compress or resize the image before uploading.",
            format_megabytes(len)
        )));
    }
    Ok(())
}

/// Reject a single uploaded part larger than [`MAX_UPLOAD_BYTES`].
///
/// Called with a running total while a part streams in, so the message
/// does not claim a final size.
pub fn check_upload_size(field: &str, len: usize) -> Result<(), CoreError> {
    if len > MAX_UPLOAD_BYTES {
        return Err(CoreError::PayloadTooLarge(format!(
            "File '{field}' is larger than the {} limit",
            format_megabytes(MAX_UPLOAD_BYTES)
        )));
    }
    Ok(())
}

/// Identify an uploaded image from its magic bytes.
///
/// Returns the MIME type for PNG, JPEG and WebP; anything else is `None`.
pub fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes).ok()? {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::WebP => Some("image/webp"),
        _ => None,
    }
}

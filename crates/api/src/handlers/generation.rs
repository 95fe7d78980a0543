//! Handler for `POST /api/process-single`: one face swap per request.

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use swapdeck_core::dimensions::Dimensions;
use swapdeck_core::error::CoreError;
use swapdeck_core::generation::GenerationResponse;
use swapdeck_core::uploads::{check_upload_size, sniff_image_mime, MAX_FILES_PER_REQUEST};
use swapdeck_upstream::ImageInput;

use crate::error::{AppError, AppResult};
use crate::extract::AppMultipart;
use crate::state::AppState;

/// Multipart field names.
pub const FIELD_FACE_REF: &str = "faceRef";
pub const FIELD_TARGET: &str = "target";
pub const FIELD_API_KEY: &str = "apiKey";
pub const FIELD_DIMENSIONS: &str = "dimensions";

/// Cap on `apiKey` and `dimensions`.
const MAX_TEXT_FIELD_BYTES: usize = 8 * 1024;

/// A validated image part.
struct UploadedImage {
    bytes: Vec<u8>,
    mime: &'static str,
}

impl UploadedImage {
    fn as_input(&self) -> ImageInput<'_> {
        ImageInput::new(&self.bytes, Some(self.mime))
    }
}

/// Everything `process-single` reads from the form.
#[derive(Default)]
struct SingleForm {
    face_ref: Option<UploadedImage>,
    target: Option<UploadedImage>,
    api_key: Option<String>,
    dimensions: Option<String>,
}

/// POST /api/process-single
///
/// Multipart form: `faceRef` and `target` image files, `apiKey`, and an
/// optional `dimensions` (`"<w>*<h>"`, default `2572*3576`). Admission is
/// handled by the route layer before this runs.
pub async fn process_single(
    State(state): State<AppState>,
    AppMultipart(multipart): AppMultipart,
) -> AppResult<Json<GenerationResponse>> {
    let form = read_form(multipart).await?;

    let (Some(face_ref), Some(target)) = (form.face_ref, form.target) else {
        return Err(AppError::BadRequest(
            "Both faceRef and target images are required".into(),
        ));
    };
    let api_key = form
        .api_key
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("API key required".into()))?;
    let dimensions = Dimensions::parse_or_default(form.dimensions.as_deref())?;

    tracing::info!(
        %dimensions,
        face_bytes = face_ref.bytes.len(),
        target_bytes = target.bytes.len(),
        "Processing single generation",
    );

    let output_url = state
        .upstream
        .face_swap(&api_key, face_ref.as_input(), target.as_input(), dimensions)
        .await?;

    tracing::info!(%output_url, "Generation succeeded");
    Ok(Json(GenerationResponse::succeeded(output_url)))
}

/// Drain the multipart stream, enforcing per-file size, file count and
/// image type as parts arrive.
async fn read_form(mut multipart: Multipart) -> AppResult<SingleForm> {
    let mut form = SingleForm::default();
    let mut file_count = 0usize;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        if field.file_name().is_some() {
            file_count += 1;
            if file_count > MAX_FILES_PER_REQUEST {
                return Err(AppError::BadRequest(format!(
                    "Too many files, at most {MAX_FILES_PER_REQUEST} per request"
                )));
            }
        }

        match name.as_str() {
            FIELD_FACE_REF | FIELD_TARGET => {
                let slot = if name == FIELD_FACE_REF {
                    &mut form.face_ref
                } else {
                    &mut form.target
                };
                // Each image field takes exactly one file.
                if slot.is_some() {
                    return Err(AppError::BadRequest(format!(
                        "Only one '{name}' file is allowed"
                    )));
                }
                *slot = Some(read_image(&name, field).await?);
            }
            FIELD_API_KEY => form.api_key = Some(read_text(&name, field).await?),
            FIELD_DIMENSIONS => form.dimensions = Some(read_text(&name, field).await?),
            _ => {
                // Unknown parts are drained so they still count against the
                // body limit, then ignored.
                drain(field).await?;
            }
        }
    }

    Ok(form)
}

/// Read an image part chunk by chunk, refusing it as soon as it passes the
/// per-file limit.
async fn read_image(name: &str, mut field: Field<'_>) -> AppResult<UploadedImage> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        bytes.extend_from_slice(&chunk);
        check_upload_size(name, bytes.len())?;
    }

    let mime = sniff_image_mime(&bytes).ok_or_else(|| {
        AppError::BadRequest(format!(
            "'{name}' is not a supported image (PNG, JPEG or WebP)"
        ))
    })?;

    Ok(UploadedImage { bytes, mime })
}

async fn read_text(name: &str, mut field: Field<'_>) -> AppResult<String> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        bytes.extend_from_slice(&chunk);
        if bytes.len() > MAX_TEXT_FIELD_BYTES {
            return Err(AppError::BadRequest(format!("'{name}' is too long")));
        }
    }
    String::from_utf8(bytes)
        .map_err(|_| AppError::BadRequest(format!("'{name}' is not valid UTF-8")))
}

async fn drain(mut field: Field<'_>) -> AppResult<()> {
    while field.chunk().await.map_err(multipart_error)?.is_some() {}
    Ok(())
}

/// Body-limit overruns become 413; any other malformed form is a 400.
fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::Core(CoreError::PayloadTooLarge(err.body_text()))
    } else {
        AppError::BadRequest(format!("Invalid multipart form: {}", err.body_text()))
    }
}

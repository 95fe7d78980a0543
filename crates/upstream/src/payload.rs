//! Request body for the upstream edit endpoint.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use swapdeck_core::dimensions::Dimensions;
use swapdeck_core::uploads::FALLBACK_CONTENT_TYPE;

/// Fixed seed so repeated calls with the same inputs are comparable.
pub const SEED: u64 = 42;

/// How many times the face reference is placed ahead of the target. The
/// upstream weights identity by how often an image appears in the list.
pub const FACE_REFERENCE_WEIGHT: usize = 3;

pub const PROMPT: &str = "Recreate img2 using the face identity from img1. \
Transfer only the facial features and hair (color, style, texture) from img1. \
Copy everything else exactly from img2: body proportions, pose, angle, clothing, \
accessories, background, lighting, composition. Natural photography, visible skin \
texture, realistic lighting, seamless integration";

pub const NEGATIVE_PROMPT: &str = "text, variations, different background, different pose, \
different lighting, inconsistent, caption, watermark, logo, emoji, subtitles, text overlay, \
banner, stickers, handwriting, different head position";

/// An image to embed in the request.
#[derive(Debug, Clone, Copy)]
pub struct ImageInput<'a> {
    pub bytes: &'a [u8],
    /// MIME type; [`FALLBACK_CONTENT_TYPE`] when unknown.
    pub content_type: Option<&'a str>,
}

impl<'a> ImageInput<'a> {
    pub fn new(bytes: &'a [u8], content_type: Option<&'a str>) -> Self {
        Self {
            bytes,
            content_type,
        }
    }

    /// `data:<mime>;base64,<payload>`
    pub fn to_data_url(&self) -> String {
        let mime = self.content_type.unwrap_or(FALLBACK_CONTENT_TYPE);
        format!("data:{mime};base64,{}", STANDARD.encode(self.bytes))
    }
}

/// JSON body sent to the upstream.
#[derive(Debug, Clone, Serialize)]
pub struct FaceSwapRequest {
    pub size: String,
    pub max_images: u32,
    pub enable_base64_output: bool,
    pub enable_sync_mode: bool,
    pub seed: u64,
    pub prompt: &'static str,
    pub negative_prompt: &'static str,
    pub images: Vec<String>,
}

impl FaceSwapRequest {
    /// Build the body for one generation: the face reference repeated
    /// [`FACE_REFERENCE_WEIGHT`] times, then the target.
    pub fn new(face: ImageInput<'_>, target: ImageInput<'_>, dimensions: Dimensions) -> Self {
        let face_url = face.to_data_url();
        let mut images = vec![face_url; FACE_REFERENCE_WEIGHT];
        images.push(target.to_data_url());

        Self {
            size: dimensions.to_string(),
            max_images: 1,
            enable_base64_output: false,
            enable_sync_mode: true,
            seed: SEED,
            prompt: PROMPT,
            negative_prompt: NEGATIVE_PROMPT,
            images,
        }
    }
}

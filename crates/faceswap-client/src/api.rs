//! JSON bodies exchanged with the detection and swap endpoints.

use serde::{Deserialize, Serialize};

/// `POST /face_detect` request.
#[derive(Debug, Serialize)]
pub struct DetectRequest<'a> {
    /// Base64 of the encoded image, no data URI prefix.
    pub image: &'a str,
    pub detector_size: &'a str,
}

#[derive(Debug, Default, Deserialize)]
pub struct DetectResponse {
    #[serde(default)]
    pub face_count: Option<u64>,
    #[serde(default)]
    pub faces: Option<Vec<RawDetectorFace>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl DetectResponse {
    /// Faces in response order, or an empty list when the count is absent or
    /// zero or the list is missing.
    pub fn into_faces(self) -> Vec<RawDetectorFace> {
        match (self.face_count, self.faces) {
            (Some(count), Some(faces)) if count > 0 => faces,
            _ => Vec::new(),
        }
    }
}

/// One face as reported by the detector. The box format is not declared.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDetectorFace {
    pub bounding_box: [f64; 4],
}

/// `POST /face_swap` request.
#[derive(Debug, Serialize)]
pub struct SwapRequest<'a> {
    pub source_image: String,
    pub target_image: String,
    pub enhance: bool,
    pub detector_size: &'a str,
    pub source_face_index: u32,
    pub target_face_index: u32,
    pub face_order: &'a str,
}

#[derive(Debug, Default, Deserialize)]
pub struct SwapResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub result_image: Option<String>,
    #[serde(default)]
    pub source_faces_count: Option<u64>,
    #[serde(default)]
    pub target_faces_count: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

//! Face swap round trip.

use crate::api::{SwapRequest, SwapResponse};
use crate::client::FaceSwapClient;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use faceswap_core::{DetectedFace, ImageFile};
use thiserror::Error;

const RESULT_MIME: &str = "image/jpeg";

#[derive(Error, Debug)]
pub enum SwapError {
    #[error("face id '{0}' is not a detector index")]
    InvalidFaceId(String),
    #[error("face swap request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("face swap API failed: {status} {reason}")]
    Status { status: u16, reason: String },
    #[error("invalid face swap response: {0}")]
    MalformedResponse(#[source] reqwest::Error),
    #[error("face swap error: {0}")]
    Service(String),
    #[error("face swap failed: no result image returned")]
    MissingResult,
    #[error("face swap result is not valid base64: {0}")]
    InvalidResultEncoding(#[from] base64::DecodeError),
}

/// The composite returned by the swap endpoint.
#[derive(Debug, Clone)]
pub struct ResultImage {
    encoded: String,
    bytes: Vec<u8>,
    /// Faces the service found in the source image, if reported.
    pub source_faces_count: Option<u64>,
    /// Faces the service found in the target image, if reported.
    pub target_faces_count: Option<u64>,
}

impl ResultImage {
    pub fn mime(&self) -> &'static str {
        RESULT_MIME
    }

    /// Encoded image bytes, ready to write to disk.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn data_uri(&self) -> String {
        format!("data:{RESULT_MIME};base64,{}", self.encoded)
    }
}

impl FaceSwapClient {
    /// Put `source_face` from `source` onto `target_face` in `target`.
    ///
    /// Faces are sent as detector indices parsed from their ids. The service
    /// re-detects both images on every call, so this relies on it ordering
    /// faces the same way it did during detection.
    pub async fn swap_faces(
        &self,
        source: &ImageFile,
        target: &ImageFile,
        source_face: &DetectedFace,
        target_face: &DetectedFace,
    ) -> Result<ResultImage, SwapError> {
        let source_face_index = face_index(source_face)?;
        let target_face_index = face_index(target_face)?;

        tracing::info!(
            source = source.name(),
            target = target.name(),
            source_face_index,
            target_face_index,
            "swapping faces"
        );

        let request = SwapRequest {
            source_image: source.to_base64(),
            target_image: target.to_base64(),
            enhance: self.config.enhance,
            detector_size: &self.config.detector_size,
            source_face_index,
            target_face_index,
            face_order: &self.config.face_order,
        };

        let response = self
            .http
            .post(self.config.swap_url())
            .json(&request)
            .send()
            .await
            .map_err(SwapError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SwapError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        let body: SwapResponse = response.json().await.map_err(SwapError::MalformedResponse)?;

        if let Some(message) = body.error.filter(|m| !m.is_empty()) {
            return Err(SwapError::Service(message));
        }

        let encoded = match body.result_image {
            Some(image) if body.success && !image.is_empty() => image,
            _ => return Err(SwapError::MissingResult),
        };
        let bytes = STANDARD.decode(encoded.trim())?;

        tracing::info!(
            bytes = bytes.len(),
            source_faces = ?body.source_faces_count,
            target_faces = ?body.target_faces_count,
            "face swap completed"
        );

        Ok(ResultImage {
            encoded,
            bytes,
            source_faces_count: body.source_faces_count,
            target_faces_count: body.target_faces_count,
        })
    }
}

fn face_index(face: &DetectedFace) -> Result<u32, SwapError> {
    face.index().ok_or_else(|| SwapError::InvalidFaceId(face.id.clone()))
}

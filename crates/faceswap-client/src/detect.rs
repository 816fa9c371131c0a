//! Face detection round trip.

use crate::api::{DetectRequest, DetectResponse, RawDetectorFace};
use crate::client::FaceSwapClient;
use faceswap_core::{
    crop_thumbnail, normalize_with, BoxFormat, DecodeError, DecodedImage, DetectedFace,
    GeometryError, ImageFile,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("face detection request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("face detection API failed: {status} {reason}")]
    Status { status: u16, reason: String },
    #[error("invalid face detection response: {0}")]
    MalformedResponse(#[source] reqwest::Error),
    #[error("face detection error: {0}")]
    Service(String),
    #[error("face geometry: {0}")]
    Geometry(#[from] GeometryError),
    #[error("face detection cancelled")]
    Cancelled,
    #[error("face detection task failed: {0}")]
    Task(String),
}

impl FaceSwapClient {
    /// Detect faces in `file`, returning them in the service's response order.
    ///
    /// Face `i` gets id `i.to_string()`. An image with no faces yields an
    /// empty list, not an error.
    pub async fn detect_faces(&self, file: &ImageFile) -> Result<Vec<DetectedFace>, DetectionError> {
        tracing::info!(file = file.name(), "detecting faces");

        // Dimensions are needed before any box can be normalized.
        let owned = file.clone();
        let (owned, decoded, encoded) = tokio::task::spawn_blocking(move || {
            let decoded = owned.decode()?;
            let encoded = owned.to_base64();
            Ok::<_, DecodeError>((owned, decoded, encoded))
        })
        .await
        .map_err(|e| DetectionError::Task(e.to_string()))??;

        tracing::debug!(
            file = owned.name(),
            width = decoded.width(),
            height = decoded.height(),
            "image decoded"
        );

        let response = self
            .http
            .post(self.config.detect_url())
            .json(&DetectRequest {
                image: &encoded,
                detector_size: &self.config.detector_size,
            })
            .send()
            .await
            .map_err(DetectionError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DetectionError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        let body: DetectResponse = response
            .json()
            .await
            .map_err(DetectionError::MalformedResponse)?;

        if let Some(message) = body.error.clone().filter(|m| !m.is_empty()) {
            return Err(DetectionError::Service(message));
        }

        let raw_faces = body.into_faces();
        if raw_faces.is_empty() {
            tracing::info!(file = owned.name(), "no faces detected");
            return Ok(Vec::new());
        }

        let format = self.config.box_format;
        let faces = tokio::task::spawn_blocking(move || assemble_faces(&owned, &decoded, &raw_faces, format))
            .await
            .map_err(|e| DetectionError::Task(e.to_string()))??;

        tracing::info!(count = faces.len(), "faces detected");
        Ok(faces)
    }

    /// [`detect_faces`](Self::detect_faces), abandoned as soon as `token` is cancelled.
    pub async fn detect_faces_cancellable(
        &self,
        file: &ImageFile,
        token: &CancellationToken,
    ) -> Result<Vec<DetectedFace>, DetectionError> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(DetectionError::Cancelled),
            result = self.detect_faces(file) => result,
        }
    }
}

/// Normalize and crop each raw face, keeping response order as the id.
pub fn assemble_faces(
    file: &ImageFile,
    image: &DecodedImage,
    raw_faces: &[RawDetectorFace],
    format: BoxFormat,
) -> Result<Vec<DetectedFace>, GeometryError> {
    raw_faces
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            let normalized = normalize_with(raw.bounding_box, image.width(), image.height(), format)?;
            tracing::debug!(
                index,
                bounding_box = ?raw.bounding_box,
                display_box = ?normalized.display_box,
                "face normalized"
            );
            Ok(DetectedFace {
                id: index.to_string(),
                bbox: normalized.display_box,
                thumbnail_url: crop_thumbnail(file, image, &normalized.raw_normalized_box),
            })
        })
        .collect()
}

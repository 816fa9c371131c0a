//! Per-slot state for one face swap session.
//!
//! The workspace owns a source slot and a target slot. Each upload replaces
//! its slot wholesale and hands back a [`DetectionTicket`]; detection runs
//! outside the workspace (both slots may detect concurrently) and its result
//! is applied only if the ticket still matches the slot's current upload.

use crate::client::FaceSwapClient;
use crate::detect::DetectionError;
use crate::swap::{ResultImage, SwapError};
use faceswap_core::{DetectedFace, ImageFile};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    /// The photo providing the face.
    Source,
    /// The photo the face is placed into.
    Target,
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Source => "source",
            Self::Target => "target",
        })
    }
}

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("upload both images and select a face from each")]
    NotReady,
    #[error("selected faces are not valid")]
    InvalidSelection,
    #[error("no face '{id}' in the {slot} image")]
    UnknownFace { slot: SlotKind, id: String },
    #[error("could not detect faces in the {slot} image: {source}")]
    Detection {
        slot: SlotKind,
        #[source]
        source: DetectionError,
    },
    #[error(transparent)]
    Swap(#[from] SwapError),
}

/// State of one photo slot.
#[derive(Debug, Default)]
pub struct ImageSlot {
    file: Option<Arc<ImageFile>>,
    /// `None` until detection for the current upload succeeds.
    faces: Option<Vec<DetectedFace>>,
    selected_face_id: Option<String>,
    generation: u64,
    pending: Option<CancellationToken>,
}

impl ImageSlot {
    pub fn file(&self) -> Option<&ImageFile> {
        self.file.as_deref()
    }

    /// Displayable reference to the uploaded image.
    pub fn url(&self) -> Option<String> {
        self.file.as_ref().map(|f| f.data_uri())
    }

    pub fn faces(&self) -> Option<&[DetectedFace]> {
        self.faces.as_deref()
    }

    pub fn selected_face_id(&self) -> Option<&str> {
        self.selected_face_id.as_deref()
    }

    pub fn selected_face(&self) -> Option<&DetectedFace> {
        let id = self.selected_face_id.as_deref()?;
        self.faces.as_ref()?.iter().find(|f| f.id == id)
    }

    /// True while a detection for the current upload has not been applied.
    pub fn is_detecting(&self) -> bool {
        self.pending.is_some()
    }

    fn cancel_pending(&mut self) {
        if let Some(token) = self.pending.take() {
            token.cancel();
        }
    }
}

/// Claim on one upload's detection result.
#[derive(Debug, Clone)]
pub struct DetectionTicket {
    slot: SlotKind,
    generation: u64,
    file: Arc<ImageFile>,
    token: CancellationToken,
}

impl DetectionTicket {
    pub fn slot(&self) -> SlotKind {
        self.slot
    }

    pub fn file(&self) -> &ImageFile {
        &self.file
    }

    /// Run detection for this upload. Resolves to [`DetectionError::Cancelled`]
    /// if the slot is re-uploaded or reset first.
    pub async fn run(&self, client: &FaceSwapClient) -> Result<Vec<DetectedFace>, DetectionError> {
        client.detect_faces_cancellable(&self.file, &self.token).await
    }
}

/// What happened to a detection result handed to [`Workspace::apply_detection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Faces stored on the slot.
    Applied { face_count: usize },
    /// The slot moved on to a newer upload; the result was dropped.
    Stale,
}

/// Inputs for a swap, borrowed from a ready workspace.
#[derive(Debug, Clone, Copy)]
pub struct SwapInputs<'a> {
    pub source: &'a ImageFile,
    pub target: &'a ImageFile,
    pub source_face: &'a DetectedFace,
    pub target_face: &'a DetectedFace,
}

#[derive(Debug, Default)]
pub struct Workspace {
    source: ImageSlot,
    target: ImageSlot,
    next_generation: u64,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(&self, kind: SlotKind) -> &ImageSlot {
        match kind {
            SlotKind::Source => &self.source,
            SlotKind::Target => &self.target,
        }
    }

    fn slot_mut(&mut self, kind: SlotKind) -> &mut ImageSlot {
        match kind {
            SlotKind::Source => &mut self.source,
            SlotKind::Target => &mut self.target,
        }
    }

    /// Replace a slot with a fresh upload, superseding any in-flight detection.
    pub fn upload(&mut self, kind: SlotKind, file: ImageFile) -> DetectionTicket {
        self.next_generation += 1;
        let generation = self.next_generation;
        let file = Arc::new(file);
        let token = CancellationToken::new();

        tracing::info!(slot = %kind, file = file.name(), generation, "image uploaded");

        let slot = self.slot_mut(kind);
        slot.cancel_pending();
        *slot = ImageSlot {
            file: Some(Arc::clone(&file)),
            faces: None,
            selected_face_id: None,
            generation,
            pending: Some(token.clone()),
        };

        DetectionTicket {
            slot: kind,
            generation,
            file,
            token,
        }
    }

    /// Store a detection result if its ticket is still current.
    ///
    /// A single detected face is selected automatically. A failed detection
    /// leaves the slot's face list unset.
    pub fn apply_detection(
        &mut self,
        ticket: &DetectionTicket,
        result: Result<Vec<DetectedFace>, DetectionError>,
    ) -> Result<ApplyOutcome, WorkspaceError> {
        let slot = self.slot_mut(ticket.slot);
        if slot.generation != ticket.generation || slot.file.is_none() {
            tracing::debug!(
                slot = %ticket.slot,
                ticket = ticket.generation,
                current = slot.generation,
                "discarding stale detection result"
            );
            return Ok(ApplyOutcome::Stale);
        }
        slot.pending = None;

        let faces = result.map_err(|source| WorkspaceError::Detection {
            slot: ticket.slot,
            source,
        })?;

        let face_count = faces.len();
        slot.selected_face_id = match faces.as_slice() {
            [only] => Some(only.id.clone()),
            _ => None,
        };
        slot.faces = Some(faces);

        if face_count == 0 {
            tracing::info!(slot = %ticket.slot, "no faces were detected");
        }
        Ok(ApplyOutcome::Applied { face_count })
    }

    /// Select a face by id. The id must come from the slot's detected faces.
    pub fn select_face(&mut self, kind: SlotKind, face_id: &str) -> Result<(), WorkspaceError> {
        let slot = self.slot_mut(kind);
        let known = slot
            .faces
            .as_ref()
            .is_some_and(|faces| faces.iter().any(|f| f.id == face_id));
        if !known {
            return Err(WorkspaceError::UnknownFace {
                slot: kind,
                id: face_id.to_string(),
            });
        }
        slot.selected_face_id = Some(face_id.to_string());
        Ok(())
    }

    /// Clear one slot, abandoning its in-flight detection.
    pub fn reset_slot(&mut self, kind: SlotKind) {
        let slot = self.slot_mut(kind);
        slot.cancel_pending();
        *slot = ImageSlot::default();
    }

    /// Start over: clear both slots.
    pub fn reset(&mut self) {
        self.reset_slot(SlotKind::Source);
        self.reset_slot(SlotKind::Target);
    }

    pub fn is_ready(&self) -> bool {
        self.swap_inputs().is_ok()
    }

    /// Check swap preconditions: both files present and a valid face selected in each.
    pub fn swap_inputs(&self) -> Result<SwapInputs<'_>, WorkspaceError> {
        let (Some(source), Some(target)) = (self.source.file(), self.target.file()) else {
            return Err(WorkspaceError::NotReady);
        };
        if self.source.selected_face_id.is_none() || self.target.selected_face_id.is_none() {
            return Err(WorkspaceError::NotReady);
        }
        let (Some(source_face), Some(target_face)) =
            (self.source.selected_face(), self.target.selected_face())
        else {
            return Err(WorkspaceError::InvalidSelection);
        };
        Ok(SwapInputs {
            source,
            target,
            source_face,
            target_face,
        })
    }

    /// Request the swap for the current selections. Not retried on failure.
    pub async fn swap(&self, client: &FaceSwapClient) -> Result<ResultImage, WorkspaceError> {
        let inputs = self.swap_inputs()?;
        let result = client
            .swap_faces(inputs.source, inputs.target, inputs.source_face, inputs.target_face)
            .await?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faceswap_core::BoundingBox;

    fn file(name: &str) -> ImageFile {
        ImageFile::new(name, vec![1, 2, 3])
    }

    fn faces(n: usize) -> Vec<DetectedFace> {
        (0..n)
            .map(|i| DetectedFace {
                id: i.to_string(),
                bbox: BoundingBox { x: 0.1, y: 0.1, width: 0.2, height: 0.2 },
                thumbnail_url: format!("thumb-{i}"),
            })
            .collect()
    }

    #[test]
    fn test_single_face_auto_selected() {
        let mut ws = Workspace::new();
        let ticket = ws.upload(SlotKind::Source, file("a.jpg"));
        assert!(ws.slot(SlotKind::Source).is_detecting());

        let outcome = ws.apply_detection(&ticket, Ok(faces(1))).unwrap();
        assert_eq!(outcome, ApplyOutcome::Applied { face_count: 1 });
        let slot = ws.slot(SlotKind::Source);
        assert_eq!(slot.selected_face_id(), Some("0"));
        assert!(!slot.is_detecting());
    }

    #[test]
    fn test_multiple_faces_need_selection() {
        let mut ws = Workspace::new();
        let ticket = ws.upload(SlotKind::Target, file("group.jpg"));
        ws.apply_detection(&ticket, Ok(faces(3))).unwrap();
        assert_eq!(ws.slot(SlotKind::Target).selected_face_id(), None);

        ws.select_face(SlotKind::Target, "2").unwrap();
        assert_eq!(ws.slot(SlotKind::Target).selected_face().unwrap().thumbnail_url, "thumb-2");

        let err = ws.select_face(SlotKind::Target, "7").unwrap_err();
        assert!(matches!(err, WorkspaceError::UnknownFace { slot: SlotKind::Target, .. }));
    }

    #[test]
    fn test_zero_faces_is_not_an_error() {
        let mut ws = Workspace::new();
        let ticket = ws.upload(SlotKind::Source, file("landscape.jpg"));
        let outcome = ws.apply_detection(&ticket, Ok(Vec::new())).unwrap();
        assert_eq!(outcome, ApplyOutcome::Applied { face_count: 0 });
        assert_eq!(ws.slot(SlotKind::Source).faces(), Some(&[][..]));
        assert_eq!(ws.slot(SlotKind::Source).selected_face_id(), None);
    }

    #[test]
    fn test_failed_detection_leaves_faces_unset() {
        let mut ws = Workspace::new();
        let ticket = ws.upload(SlotKind::Source, file("a.jpg"));
        let err = ws
            .apply_detection(
                &ticket,
                Err(DetectionError::Status { status: 500, reason: "Internal Server Error".into() }),
            )
            .unwrap_err();
        assert!(matches!(err, WorkspaceError::Detection { slot: SlotKind::Source, .. }));
        assert!(ws.slot(SlotKind::Source).faces().is_none());
        assert!(ws.slot(SlotKind::Source).file().is_some());
    }

    #[test]
    fn test_reupload_discards_stale_result_and_cancels() {
        let mut ws = Workspace::new();
        let first = ws.upload(SlotKind::Source, file("first.jpg"));
        let second = ws.upload(SlotKind::Source, file("second.jpg"));
        assert!(first.token.is_cancelled());
        assert!(!second.token.is_cancelled());

        assert_eq!(ws.apply_detection(&first, Ok(faces(1))).unwrap(), ApplyOutcome::Stale);
        assert!(ws.slot(SlotKind::Source).faces().is_none());

        ws.apply_detection(&second, Ok(faces(2))).unwrap();
        assert_eq!(ws.slot(SlotKind::Source).faces().unwrap().len(), 2);
        assert_eq!(ws.slot(SlotKind::Source).file().unwrap().name(), "second.jpg");
    }

    #[test]
    fn test_slots_are_independent() {
        let mut ws = Workspace::new();
        let source = ws.upload(SlotKind::Source, file("s.jpg"));
        let target = ws.upload(SlotKind::Target, file("t.jpg"));
        assert!(!source.token.is_cancelled());

        ws.apply_detection(&target, Ok(faces(1))).unwrap();
        ws.apply_detection(&source, Ok(faces(1))).unwrap();
        assert!(ws.is_ready());
    }

    #[test]
    fn test_reset_discards_in_flight_result() {
        let mut ws = Workspace::new();
        let ticket = ws.upload(SlotKind::Target, file("t.jpg"));
        ws.reset();
        assert!(ticket.token.is_cancelled());
        assert_eq!(ws.apply_detection(&ticket, Ok(faces(1))).unwrap(), ApplyOutcome::Stale);
        assert!(ws.slot(SlotKind::Target).file().is_none());
    }

    #[test]
    fn test_swap_inputs_preconditions() {
        let mut ws = Workspace::new();
        assert!(matches!(ws.swap_inputs(), Err(WorkspaceError::NotReady)));

        let s = ws.upload(SlotKind::Source, file("s.jpg"));
        let t = ws.upload(SlotKind::Target, file("t.jpg"));
        ws.apply_detection(&s, Ok(faces(1))).unwrap();
        ws.apply_detection(&t, Ok(faces(2))).unwrap();
        assert!(matches!(ws.swap_inputs(), Err(WorkspaceError::NotReady)));

        ws.select_face(SlotKind::Target, "1").unwrap();
        let inputs = ws.swap_inputs().unwrap();
        assert_eq!(inputs.source_face.id, "0");
        assert_eq!(inputs.target_face.id, "1");
        assert_eq!(inputs.target.name(), "t.jpg");
    }
}

//! faceswap-client — Detection and swap calls against a remote face-swap service.
//!
//! Each call is a single JSON round trip. Detection results are normalized
//! with `faceswap-core`; the [`Workspace`] keeps per-slot state and drops
//! results from superseded uploads.

pub mod api;
pub mod client;
pub mod config;
pub mod detect;
pub mod swap;
pub mod workspace;

pub use client::FaceSwapClient;
pub use config::{Config, ConfigError};
pub use detect::DetectionError;
pub use swap::{ResultImage, SwapError};
pub use workspace::{
    ApplyOutcome, DetectionTicket, ImageSlot, SlotKind, SwapInputs, Workspace, WorkspaceError,
};

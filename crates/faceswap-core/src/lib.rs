//! faceswap-core — Face geometry for a remote face-swap service.
//!
//! Turns the loosely specified bounding boxes returned by a remote face
//! detector into two normalized frames: one relative to the raw pixel image
//! (used for thumbnail crops) and one relative to a square viewport that shows
//! the image letterboxed with "contain" scaling (used for selection overlays).

pub mod geometry;
pub mod image_source;
pub mod thumbnail;
pub mod types;

pub use geometry::{normalize, normalize_with, GeometryError, Letterbox, NormalizedFace, PixelBox};
pub use image_source::{DecodeError, DecodedImage, ImageFile};
pub use thumbnail::crop_thumbnail;
pub use types::{BoundingBox, BoxFormat, DetectedFace, RawBox};

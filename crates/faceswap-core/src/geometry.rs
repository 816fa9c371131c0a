//! Detector box normalization and "contain" letterbox mapping.
//!
//! A detector box goes through four steps:
//! 1. decode the four numbers into origin+extent ([`RawBox`]),
//! 2. clip to the image rectangle,
//! 3. normalize against the image size (raw frame, for cropping),
//! 4. shrink by [`TIGHTEN_PADDING`] and map into the square viewport the
//!    image is displayed in (display frame, for overlays).

use crate::types::{BoundingBox, BoxFormat, RawBox};
use thiserror::Error;

/// Fraction removed from each detector box before display.
/// Detector boxes include forehead and chin margin; overlays should hug the face.
pub const TIGHTEN_PADDING: f64 = 0.15;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("detector box has non-finite coordinates: {0:?}")]
    NonFiniteBox([f64; 4]),
}

/// A box in pixel units of the original image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelBox {
    pub fn from_raw(raw: RawBox) -> Self {
        let (x, y, width, height) = raw.to_extent();
        Self { x, y, width, height }
    }

    /// Intersect with `[0, image_width] × [0, image_height]`.
    ///
    /// Boxes already inside the image come back unchanged. Boxes with negative
    /// extent collapse to zero size at their clipped origin.
    pub fn clip_to(self, image_width: f64, image_height: f64) -> Self {
        let x = self.x.clamp(0.0, image_width);
        let y = self.y.clamp(0.0, image_height);
        let right = (self.x + self.width).clamp(0.0, image_width);
        let bottom = (self.y + self.height).clamp(0.0, image_height);
        Self {
            x,
            y,
            width: (right - x).max(0.0),
            height: (bottom - y).max(0.0),
        }
    }

    /// Shrink symmetrically by `padding` of each dimension, keeping the center.
    ///
    /// Always derived from the original box: applying it twice is not the
    /// same as applying a larger padding once.
    pub fn tighten(&self, padding: f64) -> Self {
        Self {
            x: self.x + self.width * padding / 2.0,
            y: self.y + self.height * padding / 2.0,
            width: self.width * (1.0 - padding),
            height: self.height * (1.0 - padding),
        }
    }

    /// Express this box as fractions of the image size.
    pub fn normalize(&self, image_width: f64, image_height: f64) -> BoundingBox {
        BoundingBox {
            x: self.x / image_width,
            y: self.y / image_height,
            width: self.width / image_width,
            height: self.height / image_height,
        }
    }
}

/// Placement of an image shown with "contain" scaling inside a square viewport.
///
/// All values are fractions of the viewport side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale_x: f64,
    pub scale_y: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl Letterbox {
    /// Wide images fill the width and are centered vertically; tall and square
    /// images fill the height and are centered horizontally.
    pub fn contain_square(image_width: f64, image_height: f64) -> Self {
        let aspect = image_width / image_height;
        if aspect > 1.0 {
            let scale_y = 1.0 / aspect;
            Self {
                scale_x: 1.0,
                scale_y,
                offset_x: 0.0,
                offset_y: (1.0 - scale_y) / 2.0,
            }
        } else {
            Self {
                scale_x: aspect,
                scale_y: 1.0,
                offset_x: (1.0 - aspect) / 2.0,
                offset_y: 0.0,
            }
        }
    }

    /// Map a raw-image-normalized box into display-normalized coordinates.
    pub fn map(&self, b: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x: self.offset_x + b.x * self.scale_x,
            y: self.offset_y + b.y * self.scale_y,
            width: b.width * self.scale_x,
            height: b.height * self.scale_y,
        }
    }
}

/// Both frames derived from one detector box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedFace {
    /// Tightened box in the letterboxed viewport frame.
    pub display_box: BoundingBox,
    /// Untightened box in the raw image frame.
    pub raw_normalized_box: BoundingBox,
}

/// Normalize a detector box using the format heuristic.
pub fn normalize(
    raw_box: [f64; 4],
    image_width: u32,
    image_height: u32,
) -> Result<NormalizedFace, GeometryError> {
    normalize_with(raw_box, image_width, image_height, BoxFormat::Auto)
}

/// Normalize a detector box read according to `format`.
pub fn normalize_with(
    raw_box: [f64; 4],
    image_width: u32,
    image_height: u32,
    format: BoxFormat,
) -> Result<NormalizedFace, GeometryError> {
    if image_width == 0 || image_height == 0 {
        return Err(GeometryError::InvalidDimensions {
            width: image_width,
            height: image_height,
        });
    }
    if raw_box.iter().any(|c| !c.is_finite()) {
        return Err(GeometryError::NonFiniteBox(raw_box));
    }

    let w = f64::from(image_width);
    let h = f64::from(image_height);

    let pixel = PixelBox::from_raw(RawBox::decode(raw_box, format)).clip_to(w, h);
    let raw_normalized_box = pixel.normalize(w, h);

    let tight = pixel.tighten(TIGHTEN_PADDING).normalize(w, h);
    let display_box = Letterbox::contain_square(w, h).map(&tight);

    tracing::trace!(
        ?raw_box,
        %format,
        width = image_width,
        height = image_height,
        ?display_box,
        "normalized detector box"
    );

    Ok(NormalizedFace {
        display_box,
        raw_normalized_box,
    })
}

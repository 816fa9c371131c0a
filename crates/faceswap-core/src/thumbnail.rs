//! Face thumbnails cropped from the uploaded image.

use crate::image_source::{DecodedImage, ImageFile};
use crate::types::BoundingBox;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::ImageFormat;
use std::io::Cursor;

/// Pixel rectangle `(x, y, width, height)` covered by a raw-normalized box,
/// clipped to the image. `None` when the rectangle is empty.
pub fn pixel_rect(bbox: &BoundingBox, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    let w = f64::from(width);
    let h = f64::from(height);
    let x0 = (bbox.x * w).round().clamp(0.0, w) as u32;
    let y0 = (bbox.y * h).round().clamp(0.0, h) as u32;
    let x1 = ((bbox.x + bbox.width) * w).round().clamp(0.0, w) as u32;
    let y1 = ((bbox.y + bbox.height) * h).round().clamp(0.0, h) as u32;
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some((x0, y0, x1 - x0, y1 - y0))
}

/// Crop `bbox` (raw-image-normalized) out of `image` and return it as a PNG data URI.
///
/// Never fails: if no crop can be produced, the unmodified `source` file is
/// returned as a data URI instead.
pub fn crop_thumbnail(source: &ImageFile, image: &DecodedImage, bbox: &BoundingBox) -> String {
    let Some((x, y, w, h)) = pixel_rect(bbox, image.width(), image.height()) else {
        tracing::warn!(file = source.name(), ?bbox, "empty crop rectangle; using full image");
        return source.data_uri();
    };

    let cropped = image.pixels().crop_imm(x, y, w, h);
    let mut png = Vec::new();
    if let Err(e) = cropped.write_to(&mut Cursor::new(&mut png), ImageFormat::Png) {
        tracing::warn!(file = source.name(), error = %e, "thumbnail encode failed; using full image");
        return source.data_uri();
    }

    format!("data:image/png;base64,{}", STANDARD.encode(&png))
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Axis-aligned box normalized to [0, 1] against some reference frame.
///
/// The same shape is used for the raw-image frame (thumbnail crops) and the
/// display frame (letterboxed viewport overlays). Which frame a value lives in
/// is carried by the field or variable that holds it, never by the type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// True if the box lies inside [0,1]×[0,1], allowing `tolerance` of slack.
    pub fn is_within_unit(&self, tolerance: f64) -> bool {
        self.x >= -tolerance
            && self.y >= -tolerance
            && self.right() <= 1.0 + tolerance
            && self.bottom() <= 1.0 + tolerance
    }
}

/// A face reported by the detection endpoint, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedFace {
    /// Position of the face in the detector's response ("0", "1", ...).
    ///
    /// The swap endpoint addresses faces by this same index, so it must never
    /// be reassigned or reordered once created.
    pub id: String,
    /// Display-normalized box for overlay rendering.
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    /// Data URI of the cropped face.
    pub thumbnail_url: String,
}

impl DetectedFace {
    /// Parse the id back into the detector index it was assigned from.
    pub fn index(&self) -> Option<u32> {
        self.id.parse().ok()
    }

    /// One-based label shown to users ("Face 1", "Face 2", ...).
    pub fn label(&self) -> String {
        match self.index() {
            Some(i) => format!("Face {}", i + 1),
            None => format!("Face {}", self.id),
        }
    }
}

/// How the four numbers of a detector `bounding_box` should be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoxFormat {
    /// Guess per box: corner pair when `c3 > c1 && c4 > c2`, origin+extent otherwise.
    #[default]
    Auto,
    /// Always `[x1, y1, x2, y2]`.
    Corners,
    /// Always `[x, y, width, height]`.
    Extent,
}

impl FromStr for BoxFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "corners" | "xyxy" => Ok(Self::Corners),
            "extent" | "xywh" => Ok(Self::Extent),
            other => Err(format!("unknown box format '{other}' (expected auto, corners or extent)")),
        }
    }
}

impl fmt::Display for BoxFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Auto => "auto",
            Self::Corners => "corners",
            Self::Extent => "extent",
        };
        f.write_str(s)
    }
}

/// A detector box in pixel units, tagged with how it was read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawBox {
    Corners { x1: f64, y1: f64, x2: f64, y2: f64 },
    Extent { x: f64, y: f64, width: f64, height: f64 },
}

impl RawBox {
    /// Heuristic decode used when the service does not declare its box format.
    ///
    /// Known limitation: a small origin+extent box far from the origin
    /// (e.g. `[300, 300, 20, 20]`) is read correctly, but one near the origin
    /// whose extent exceeds its offset (e.g. `[5, 5, 40, 40]`) is read as a
    /// corner pair.
    pub fn infer(coords: [f64; 4]) -> Self {
        let [c1, c2, c3, c4] = coords;
        if c3 > c1 && c4 > c2 {
            Self::Corners { x1: c1, y1: c2, x2: c3, y2: c4 }
        } else {
            Self::Extent { x: c1, y: c2, width: c3, height: c4 }
        }
    }

    /// Decode according to a configured format, falling back to [`RawBox::infer`].
    pub fn decode(coords: [f64; 4], format: BoxFormat) -> Self {
        let [c1, c2, c3, c4] = coords;
        match format {
            BoxFormat::Auto => Self::infer(coords),
            BoxFormat::Corners => Self::Corners { x1: c1, y1: c2, x2: c3, y2: c4 },
            BoxFormat::Extent => Self::Extent { x: c1, y: c2, width: c3, height: c4 },
        }
    }

    /// Origin and extent as `(x, y, width, height)` in pixels.
    pub fn to_extent(self) -> (f64, f64, f64, f64) {
        match self {
            Self::Corners { x1, y1, x2, y2 } => (x1, y1, x2 - x1, y2 - y1),
            Self::Extent { x, y, width, height } => (x, y, width, height),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(id: &str) -> DetectedFace {
        DetectedFace {
            id: id.into(),
            bbox: BoundingBox { x: 0.0, y: 0.0, width: 0.5, height: 0.5 },
            thumbnail_url: String::new(),
        }
    }

    #[test]
    fn test_infer_corner_pair() {
        let raw = RawBox::infer([100.0, 50.0, 300.0, 250.0]);
        assert_eq!(raw, RawBox::Corners { x1: 100.0, y1: 50.0, x2: 300.0, y2: 250.0 });
        assert_eq!(raw.to_extent(), (100.0, 50.0, 200.0, 200.0));
    }

    #[test]
    fn test_infer_extent_when_third_not_greater() {
        let raw = RawBox::infer([300.0, 300.0, 40.0, 60.0]);
        assert_eq!(raw.to_extent(), (300.0, 300.0, 40.0, 60.0));
    }

    #[test]
    fn test_infer_extent_when_only_one_axis_greater() {
        // c3 > c1 but c4 <= c2: not a corner pair
        let raw = RawBox::infer([10.0, 200.0, 50.0, 80.0]);
        assert!(matches!(raw, RawBox::Extent { .. }));
    }

    #[test]
    fn test_infer_misreads_small_extent_near_origin() {
        // Documented limitation: an extent box [5, 5, 40, 40] is taken as corners.
        let raw = RawBox::infer([5.0, 5.0, 40.0, 40.0]);
        assert_eq!(raw.to_extent(), (5.0, 5.0, 35.0, 35.0));
    }

    #[test]
    fn test_pinned_format_bypasses_heuristic() {
        let coords = [5.0, 5.0, 40.0, 40.0];
        assert_eq!(RawBox::decode(coords, BoxFormat::Extent).to_extent(), (5.0, 5.0, 40.0, 40.0));
        assert_eq!(
            RawBox::decode([300.0, 300.0, 40.0, 60.0], BoxFormat::Corners).to_extent(),
            (300.0, 300.0, -260.0, -240.0)
        );
    }

    #[test]
    fn test_box_format_parse() {
        assert_eq!("auto".parse::<BoxFormat>().unwrap(), BoxFormat::Auto);
        assert_eq!("XYXY".parse::<BoxFormat>().unwrap(), BoxFormat::Corners);
        assert_eq!(" extent ".parse::<BoxFormat>().unwrap(), BoxFormat::Extent);
        assert!("diagonal".parse::<BoxFormat>().is_err());
    }

    #[test]
    fn test_face_index_and_label() {
        assert_eq!(face("0").index(), Some(0));
        assert_eq!(face("1").label(), "Face 2");
        assert_eq!(face("abc").index(), None);
    }

    #[test]
    fn test_detected_face_serializes_box_field() {
        let json = serde_json::to_value(face("3")).unwrap();
        assert_eq!(json["id"], "3");
        assert!(json.get("box").is_some());
        assert!(json.get("bbox").is_none());
    }

    #[test]
    fn test_within_unit_tolerance() {
        let b = BoundingBox { x: 0.5, y: 0.5, width: 0.5 + 1e-12, height: 0.5 };
        assert!(b.is_within_unit(1e-9));
        assert!(!b.is_within_unit(0.0));
    }
}

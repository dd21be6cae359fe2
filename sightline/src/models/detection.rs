//! Grounding detections returned by the vision backend.

use serde::{Deserialize, Serialize};

/// An oriented bounding box in image pixel space.
///
/// Rotation is about the box center, in radians, counter-clockwise positive
/// in the backend's convention (y grows downward). On the wire the box is the
/// 5-element array `[cx, cy, w, h, theta]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 5]", into = "[f64; 5]")]
pub struct OrientedBox {
    /// Center X coordinate in pixels.
    pub cx: f64,
    /// Center Y coordinate in pixels.
    pub cy: f64,
    /// Box width in pixels.
    pub width: f64,
    /// Box height in pixels.
    pub height: f64,
    /// Rotation about the center in radians.
    pub theta: f64,
}

impl OrientedBox {
    /// Top-left corner at rotation zero.
    pub fn top_left(&self) -> (f64, f64) {
        (self.cx - self.width / 2.0, self.cy - self.height / 2.0)
    }

    /// The rotation pivot.
    pub const fn center(&self) -> (f64, f64) {
        (self.cx, self.cy)
    }
}

impl From<[f64; 5]> for OrientedBox {
    fn from([cx, cy, width, height, theta]: [f64; 5]) -> Self {
        Self {
            cx,
            cy,
            width,
            height,
            theta,
        }
    }
}

impl From<OrientedBox> for [f64; 5] {
    fn from(b: OrientedBox) -> Self {
        [b.cx, b.cy, b.width, b.height, b.theta]
    }
}

/// One recognized object in an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Oriented box locating the object.
    pub bbox: OrientedBox,
    /// Confidence score in [0, 1].
    pub score: f64,
    /// Object class label.
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_decodes_from_wire_array() {
        let detection: Detection =
            serde_json::from_str(r#"{"bbox":[100.0,100.0,40.0,20.0,0.5],"score":0.8,"label":"car"}"#)
                .unwrap();
        assert_eq!(detection.bbox.cx, 100.0);
        assert_eq!(detection.bbox.width, 40.0);
        assert_eq!(detection.bbox.theta, 0.5);
        assert_eq!(detection.label, "car");
    }

    #[test]
    fn bbox_roundtrips_as_array() {
        let b = OrientedBox::from([10.0, 20.0, 30.0, 40.0, 1.0]);
        let json = serde_json::to_string(&b).unwrap();
        assert_eq!(json, "[10.0,20.0,30.0,40.0,1.0]");
    }

    #[test]
    fn top_left_is_center_minus_half_extent() {
        let b = OrientedBox::from([100.0, 100.0, 40.0, 20.0, 0.0]);
        assert_eq!(b.top_left(), (80.0, 90.0));
    }
}

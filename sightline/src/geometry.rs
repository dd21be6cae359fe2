//! Projection of grounding detections into drawable primitives.
//!
//! Everything here is pure math in the image's natural pixel space. Rotation
//! is stored in radians end to end and converted to degrees only where a
//! primitive is built, because that is what rendering surfaces take. Callers
//! scale the whole coordinate space uniformly (one viewport transform) and
//! never scale stroke widths or font sizes on their own.

use crate::models::Detection;

/// Score above which a detection uses the active mode's accent color.
pub const SCORE_THRESHOLD: f64 = 0.6;
/// High-confidence stroke in detection mode.
pub const DETECTION_ACCENT: &str = "#00ff00";
/// High-confidence stroke and connector color in distance mode.
pub const DISTANCE_ACCENT: &str = "#ff3b3b";
/// Shared low-confidence stroke, both modes.
pub const LOW_CONFIDENCE: &str = "#ffcc00";
/// Box and connector stroke width in pixels.
pub const STROKE_WIDTH: f64 = 4.0;

/// Label plate width per label character.
pub const LABEL_CHAR_WIDTH: f64 = 12.0;
/// Label plate width padding.
pub const LABEL_PADDING: f64 = 20.0;
/// Label plate height.
pub const LABEL_HEIGHT: f64 = 24.0;
/// Label plate fill opacity.
pub const LABEL_OPACITY: f64 = 0.9;
/// Horizontal text inset from the plate's left edge.
pub const LABEL_TEXT_INSET: f64 = 5.0;
/// Text baseline raise above the box's top edge.
pub const LABEL_TEXT_RAISE: f64 = 7.0;
/// Label font size.
pub const LABEL_FONT_SIZE: f64 = 16.0;

/// Radius of the connector midpoint marker.
pub const MIDPOINT_RADIUS: f64 = 6.0;
/// Dash pattern of the connector line (on, off).
pub const CONNECTOR_DASH: (f64, f64) = (8.0, 6.0);

/// How the overlay is being viewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    /// Plain object detection.
    #[default]
    Detection,
    /// Distance inspection: the first two detections get connected.
    Distance,
}

impl DisplayMode {
    /// Accent color for high-confidence strokes in this mode.
    pub const fn accent(self) -> &'static str {
        match self {
            Self::Detection => DETECTION_ACCENT,
            Self::Distance => DISTANCE_ACCENT,
        }
    }
}

/// Stroke color for one detection under the given mode.
pub fn stroke_color(score: f64, mode: DisplayMode) -> &'static str {
    if score > SCORE_THRESHOLD {
        mode.accent()
    } else {
        LOW_CONFIDENCE
    }
}

/// An oriented rectangle outline.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxOutline {
    /// Top-left X at rotation zero.
    pub x: f64,
    /// Top-left Y at rotation zero.
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Rigid rotation shared with the label plate, in degrees.
    pub rotation_deg: f64,
    /// Rotation pivot (the box center).
    pub pivot: (f64, f64),
    pub stroke: &'static str,
    pub stroke_width: f64,
}

/// The filled plate and text sitting flush above a box's top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelPlate {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub fill: &'static str,
    pub opacity: f64,
    pub text: String,
    pub text_x: f64,
    pub text_y: f64,
    pub font_size: f64,
    /// Same rotation and pivot as the owning box.
    pub rotation_deg: f64,
    pub pivot: (f64, f64),
}

/// Dashed line and midpoint marker between two detection centers.
#[derive(Debug, Clone, PartialEq)]
pub struct Connector {
    pub from: (f64, f64),
    pub to: (f64, f64),
    pub midpoint: (f64, f64),
    pub color: &'static str,
    pub stroke_width: f64,
    pub dash: (f64, f64),
    pub midpoint_radius: f64,
}

/// One rendered detection: box and label plate rotate together.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub outline: BoxOutline,
    pub plate: LabelPlate,
}

/// Drawable overlay for one image, in natural pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    /// Natural image width in pixels (viewport extent).
    pub width: u32,
    /// Natural image height in pixels.
    pub height: u32,
    /// One annotation per detection, in backend order.
    pub annotations: Vec<Annotation>,
    /// Present only in distance mode with at least two detections.
    pub connector: Option<Connector>,
}

/// Project detections onto an image's natural pixel space.
pub fn project(width: u32, height: u32, detections: &[Detection], mode: DisplayMode) -> Scene {
    let annotations = detections.iter().map(|d| annotate(d, mode)).collect();
    let connector = match (mode, detections) {
        (DisplayMode::Distance, [a, b, ..]) => Some(connect(a, b, mode)),
        _ => None,
    };
    Scene {
        width,
        height,
        annotations,
        connector,
    }
}

fn annotate(detection: &Detection, mode: DisplayMode) -> Annotation {
    let bbox = detection.bbox;
    let (x, y) = bbox.top_left();
    let rotation_deg = bbox.theta.to_degrees();
    let pivot = bbox.center();
    let stroke = stroke_color(detection.score, mode);
    #[allow(clippy::cast_precision_loss)]
    let plate_width = detection.label.chars().count() as f64 * LABEL_CHAR_WIDTH + LABEL_PADDING;
    Annotation {
        outline: BoxOutline {
            x,
            y,
            width: bbox.width,
            height: bbox.height,
            rotation_deg,
            pivot,
            stroke,
            stroke_width: STROKE_WIDTH,
        },
        plate: LabelPlate {
            x,
            y: y - LABEL_HEIGHT,
            width: plate_width,
            height: LABEL_HEIGHT,
            fill: stroke,
            opacity: LABEL_OPACITY,
            text: detection.label.clone(),
            text_x: x + LABEL_TEXT_INSET,
            text_y: y - LABEL_TEXT_RAISE,
            font_size: LABEL_FONT_SIZE,
            rotation_deg,
            pivot,
        },
    }
}

fn connect(a: &Detection, b: &Detection, mode: DisplayMode) -> Connector {
    let from = a.bbox.center();
    let to = b.bbox.center();
    Connector {
        from,
        to,
        midpoint: ((from.0 + to.0) / 2.0, (from.1 + to.1) / 2.0),
        color: mode.accent(),
        stroke_width: STROKE_WIDTH,
        dash: CONNECTOR_DASH,
        midpoint_radius: MIDPOINT_RADIUS,
    }
}

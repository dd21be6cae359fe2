//! SVG serialization of a projected scene.
//!
//! Purely presentational: every coordinate comes out of `geometry` untouched,
//! and the `viewBox` carries the natural image extent so the document scales
//! to any display size as one unit. Box strokes opt out of that scaling with
//! `vector-effect`, matching how the overlay is meant to render.

use std::fmt::Write;

use crate::geometry::{Annotation, Connector, Scene};

/// Serialize a scene as a standalone SVG document.
pub fn scene_to_svg(scene: &Scene) -> String {
    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {} {}">"#,
        scene.width, scene.height
    );
    for annotation in &scene.annotations {
        push_annotation(&mut svg, annotation);
    }
    if let Some(connector) = &scene.connector {
        push_connector(&mut svg, connector);
    }
    svg.push_str("</svg>\n");
    svg
}

fn push_annotation(svg: &mut String, annotation: &Annotation) {
    let outline = &annotation.outline;
    let plate = &annotation.plate;
    let (px, py) = outline.pivot;
    let _ = writeln!(
        svg,
        r#"  <g transform="rotate({} {px} {py})">"#,
        outline.rotation_deg
    );
    let _ = writeln!(
        svg,
        r#"    <rect x="{}" y="{}" width="{}" height="{}" fill="none" stroke="{}" stroke-width="{}" vector-effect="non-scaling-stroke"/>"#,
        outline.x, outline.y, outline.width, outline.height, outline.stroke, outline.stroke_width
    );
    let _ = writeln!(
        svg,
        r#"    <rect x="{}" y="{}" width="{}" height="{}" fill="{}" opacity="{}"/>"#,
        plate.x, plate.y, plate.width, plate.height, plate.fill, plate.opacity
    );
    let _ = writeln!(
        svg,
        r#"    <text x="{}" y="{}" fill="black" font-size="{}" font-weight="bold" font-family="monospace">{}</text>"#,
        plate.text_x,
        plate.text_y,
        plate.font_size,
        escape_text(&plate.text)
    );
    svg.push_str("  </g>\n");
}

fn push_connector(svg: &mut String, connector: &Connector) {
    let _ = writeln!(
        svg,
        r#"  <line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="{}" stroke-dasharray="{} {}"/>"#,
        connector.from.0,
        connector.from.1,
        connector.to.0,
        connector.to.1,
        connector.color,
        connector.stroke_width,
        connector.dash.0,
        connector.dash.1
    );
    let _ = writeln!(
        svg,
        r#"  <circle cx="{}" cy="{}" r="{}" fill="{}"/>"#,
        connector.midpoint.0, connector.midpoint.1, connector.midpoint_radius, connector.color
    );
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

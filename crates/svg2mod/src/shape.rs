//! Drawable shapes and their presentation style.
//!
//! ## Rust Lesson #12: Traits + Enums
//!
//! Every drawable thing answers the same three questions: how big is it,
//! move it, and what does it look like as straight lines. That is the
//! [`Shape`] trait. The concrete shapes are small structs, and
//! [`ShapeKind`] is a closed enum over them, so the exporter can `match`
//! when it needs to know what it holds (a circle on a drill layer becomes
//! a hole, not an outline) and call the trait when it doesn't care.

use std::f64::consts::TAU;

use log::debug;

use crate::error::Result;
use crate::geometry::{BoundingBox, Point};
use crate::matrix::Matrix;
use crate::path::{EllipticalArc, Path, PathCommand, bisect, frame_max_radius};
use crate::polygon::PolygonSegment;

/// Common behavior of everything that can be drawn.
pub trait Shape {
    /// Bounds in current coordinates, `None` for shapes with no geometry.
    fn bounding_box(&self) -> Option<BoundingBox>;

    /// Apply `matrix` to the geometry in place.
    fn transform(&mut self, matrix: &Matrix);

    /// Flatten into point lists, one per subpath.
    fn segments(&self, precision: f64) -> Vec<Vec<Point>>;
}

// ============================================================================
// STYLE
// ============================================================================

/// The presentation properties the exporter cares about.
#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    /// Fill paint, `None` for `fill:none`.
    pub fill: Option<String>,
    pub fill_opacity: f64,
    /// Stroke paint, `None` for `stroke:none`.
    pub stroke: Option<String>,
    /// Stroke width in user units; scaled by the transform pass.
    pub stroke_width: f64,
    pub stroke_opacity: f64,
    pub even_odd: bool,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            fill: Some("#000000".to_string()),
            fill_opacity: 1.0,
            stroke: None,
            stroke_width: 1.0,
            stroke_opacity: 1.0,
            even_odd: false,
        }
    }
}

fn paint(value: &str) -> Option<String> {
    match value.trim() {
        "none" | "" => None,
        other => Some(other.to_string()),
    }
}

fn opacity(name: &str, value: &str) -> Result<f64> {
    let value = value.trim();
    let parsed = match value.strip_suffix('%') {
        Some(percent) => percent.trim().parse::<f64>().map(|v| v / 100.0),
        None => value.parse::<f64>(),
    };
    parsed
        .map(|v| v.clamp(0.0, 1.0))
        .map_err(|_| crate::Error::attribute(name, value))
}

impl Style {
    /// Set one property. Returns `false` for properties this crate does not
    /// track, which callers are free to ignore.
    pub fn set(&mut self, name: &str, value: &str) -> Result<bool> {
        let value = value.trim();
        if value == "inherit" {
            return Ok(true);
        }
        match name {
            "fill" => self.fill = paint(value),
            "stroke" => self.stroke = paint(value),
            "fill-opacity" => self.fill_opacity = opacity(name, value)?,
            "stroke-opacity" => self.stroke_opacity = opacity(name, value)?,
            "stroke-width" => self.stroke_width = crate::svg::parse_length(name, value)?,
            "fill-rule" => self.even_odd = value == "evenodd",
            _ => return Ok(false),
        }
        Ok(true)
    }

    pub fn fills(&self) -> bool {
        self.fill.is_some() && self.fill_opacity != 0.0
    }

    pub fn strokes(&self) -> bool {
        self.stroke.is_some() && self.stroke_opacity != 0.0
    }
}

// ============================================================================
// ELLIPSE
// ============================================================================

/// A full ellipse (or circle), stored as the map of the unit circle.
#[derive(Debug, Clone, PartialEq)]
pub struct Ellipse {
    frame: Matrix,
    /// Came from a `<circle>` element.
    pub circle: bool,
}

impl Ellipse {
    pub fn new(center: Point, rx: f64, ry: f64) -> Self {
        Self {
            frame: Matrix::new(rx, 0.0, 0.0, ry, center.x, center.y),
            circle: false,
        }
    }

    pub fn circle(center: Point, r: f64) -> Self {
        Self {
            circle: true,
            ..Self::new(center, r, r)
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.frame.e, self.frame.f)
    }

    /// Lengths of the frame's axes. For an untransformed or uniformly
    /// scaled ellipse these are the x and y radii.
    pub fn radii(&self) -> (f64, f64) {
        let f = &self.frame;
        ((f.a * f.a + f.b * f.b).sqrt(), (f.c * f.c + f.d * f.d).sqrt())
    }

    pub fn point_at_angle(&self, theta: f64) -> Point {
        let (sin, cos) = theta.sin_cos();
        self.frame.apply(Point::new(cos, sin))
    }
}

impl Shape for Ellipse {
    fn bounding_box(&self) -> Option<BoundingBox> {
        let f = &self.frame;
        let half_w = (f.a * f.a + f.c * f.c).sqrt();
        let half_h = (f.b * f.b + f.d * f.d).sqrt();
        Some(BoundingBox::new(
            Point::new(f.e - half_w, f.f - half_h),
            Point::new(f.e + half_w, f.f + half_h),
        ))
    }

    fn transform(&mut self, matrix: &Matrix) {
        self.frame = *matrix * self.frame;
    }

    fn segments(&self, precision: f64) -> Vec<Vec<Point>> {
        let radius = frame_max_radius(&self.frame);
        if radius < precision {
            debug!("Ellipse smaller than precision, drawing its center only");
            return vec![vec![self.center()]];
        }
        let mut points = bisect(|t| self.point_at_angle(t * TAU), 2.0 * radius, precision);
        if let (Some(first), Some(last)) = (points.first().copied(), points.last_mut()) {
            *last = first;
        }
        vec![points]
    }
}

// ============================================================================
// RECT
// ============================================================================

/// A rectangle, optionally with rounded corners, kept as an outline path.
#[derive(Debug, Clone, PartialEq)]
pub struct Rect {
    pub outline: Path,
}

struct OutlineBuilder {
    commands: Vec<PathCommand>,
    current: Point,
}

impl OutlineBuilder {
    fn start(at: Point) -> Self {
        Self {
            commands: vec![PathCommand::MoveTo(at)],
            current: at,
        }
    }

    fn line_to(&mut self, end: Point) {
        if end != self.current {
            self.commands.push(PathCommand::LineSegment { start: self.current, end });
        }
        self.current = end;
    }

    fn corner_to(&mut self, rx: f64, ry: f64, end: Point) {
        match EllipticalArc::new(self.current, rx, ry, 0.0, false, true, end) {
            Some(arc) => self.commands.push(PathCommand::Arc(arc)),
            None => self.line_to(end),
        }
        self.current = end;
    }
}

impl Rect {
    /// Build the outline. Corner radii follow the SVG rules: a missing one
    /// copies the other, and both are clamped to half the side length.
    pub fn new(x: f64, y: f64, width: f64, height: f64, rx: Option<f64>, ry: Option<f64>) -> Self {
        if width <= 0.0 || height <= 0.0 {
            debug!("Rect with non-positive size {}x{} is not rendered", width, height);
            return Self { outline: Path::default() };
        }

        let (rx, ry) = match (rx, ry) {
            (Some(rx), Some(ry)) => (rx, ry),
            (Some(r), None) | (None, Some(r)) => (r, r),
            (None, None) => (0.0, 0.0),
        };
        let rx = rx.abs().min(width / 2.0);
        let ry = ry.abs().min(height / 2.0);

        let right = x + width;
        let bottom = y + height;

        let mut b = OutlineBuilder::start(Point::new(x + rx, y));
        b.line_to(Point::new(right - rx, y));
        b.corner_to(rx, ry, Point::new(right, y + ry));
        b.line_to(Point::new(right, bottom - ry));
        b.corner_to(rx, ry, Point::new(right - rx, bottom));
        b.line_to(Point::new(x + rx, bottom));
        b.corner_to(rx, ry, Point::new(x, bottom - ry));
        b.line_to(Point::new(x, y + ry));
        b.corner_to(rx, ry, Point::new(x + rx, y));

        Self {
            outline: Path::new(b.commands),
        }
    }
}

impl Shape for Rect {
    fn bounding_box(&self) -> Option<BoundingBox> {
        self.outline.bounding_box()
    }

    fn transform(&mut self, matrix: &Matrix) {
        self.outline.transform(matrix);
    }

    fn segments(&self, precision: f64) -> Vec<Vec<Point>> {
        self.outline.segments(precision)
    }
}

// ============================================================================
// POLYLINE
// ============================================================================

/// `<polyline>`, `<polygon>` and `<line>`: straight segments through the
/// given points, closed back to the first one for polygons.
#[derive(Debug, Clone, PartialEq)]
pub struct Polyline {
    pub points: Vec<Point>,
    pub closed: bool,
}

impl Shape for Polyline {
    fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.points.iter().copied())
    }

    fn transform(&mut self, matrix: &Matrix) {
        for p in &mut self.points {
            *p = matrix.apply(*p);
        }
    }

    fn segments(&self, _precision: f64) -> Vec<Vec<Point>> {
        if self.points.is_empty() {
            return Vec::new();
        }
        let mut points = self.points.clone();
        if self.closed && points.first() != points.last() {
            points.push(points[0]);
        }
        vec![points]
    }
}

impl Shape for Path {
    fn bounding_box(&self) -> Option<BoundingBox> {
        Path::bounding_box(self)
    }

    fn transform(&mut self, matrix: &Matrix) {
        Path::transform(self, matrix);
    }

    fn segments(&self, precision: f64) -> Vec<Vec<Point>> {
        Path::segments(self, precision)
    }
}

// ============================================================================
// SHAPE KIND
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ShapeKind {
    Path(Path),
    Ellipse(Ellipse),
    Rect(Rect),
    Polyline(Polyline),
    /// Already flattened outlines handed in by a caller.
    Segments(Vec<PolygonSegment>),
    /// An element that has no outline representation (`text`, `image`).
    Unsupported { tag: String },
}

impl ShapeKind {
    /// Short name for listings and log messages.
    pub fn kind_name(&self) -> &str {
        match self {
            ShapeKind::Path(_) => "path",
            ShapeKind::Ellipse(e) if e.circle => "circle",
            ShapeKind::Ellipse(_) => "ellipse",
            ShapeKind::Rect(_) => "rect",
            ShapeKind::Polyline(p) if p.closed => "polygon",
            ShapeKind::Polyline(_) => "polyline",
            ShapeKind::Segments(_) => "segments",
            ShapeKind::Unsupported { tag } => tag.as_str(),
        }
    }
}

impl Shape for ShapeKind {
    fn bounding_box(&self) -> Option<BoundingBox> {
        match self {
            ShapeKind::Path(s) => Shape::bounding_box(s),
            ShapeKind::Ellipse(s) => s.bounding_box(),
            ShapeKind::Rect(s) => s.bounding_box(),
            ShapeKind::Polyline(s) => s.bounding_box(),
            ShapeKind::Segments(segments) => segments
                .iter()
                .map(|s| s.bbox)
                .reduce(|a, b| a.union(&b)),
            ShapeKind::Unsupported { .. } => None,
        }
    }

    fn transform(&mut self, matrix: &Matrix) {
        match self {
            ShapeKind::Path(s) => Shape::transform(s, matrix),
            ShapeKind::Ellipse(s) => s.transform(matrix),
            ShapeKind::Rect(s) => s.transform(matrix),
            ShapeKind::Polyline(s) => s.transform(matrix),
            ShapeKind::Segments(segments) => {
                for s in segments {
                    s.map_points(|p| matrix.apply(p));
                }
            }
            ShapeKind::Unsupported { .. } => {}
        }
    }

    fn segments(&self, precision: f64) -> Vec<Vec<Point>> {
        match self {
            ShapeKind::Path(s) => Shape::segments(s, precision),
            ShapeKind::Ellipse(s) => s.segments(precision),
            ShapeKind::Rect(s) => s.segments(precision),
            ShapeKind::Polyline(s) => s.segments(precision),
            ShapeKind::Segments(segments) => segments.iter().map(|s| s.points.clone()).collect(),
            ShapeKind::Unsupported { .. } => Vec::new(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    #[test]
    fn default_style_fills_black() {
        let style = Style::default();
        assert!(style.fills());
        assert!(!style.strokes());
        assert_eq!(style.stroke_width, 1.0);
    }

    #[test]
    fn style_properties() {
        let mut style = Style::default();
        assert!(style.set("fill", "none").unwrap());
        assert!(style.set("stroke", "#ff0000").unwrap());
        assert!(style.set("stroke-width", "2px").unwrap());
        assert!(style.set("stroke-opacity", "50%").unwrap());
        assert!(!style.set("font-family", "Sans").unwrap());
        assert!(!style.fills());
        assert!(style.strokes());
        assert_eq!(style.stroke_width, 2.0);
        assert_eq!(style.stroke_opacity, 0.5);
    }

    #[test]
    fn zero_opacity_disables_paint() {
        let mut style = Style::default();
        style.set("fill-opacity", "0").unwrap();
        assert!(!style.fills());
    }

    #[test]
    fn bad_opacity_is_an_error() {
        assert!(Style::default().set("fill-opacity", "lots").is_err());
    }

    #[test]
    fn circle_flattens_closed_within_precision() {
        let circle = Ellipse::circle(pt(5.0, 5.0), 10.0);
        let segments = circle.segments(1.0);
        assert_eq!(segments.len(), 1);
        let pts = &segments[0];
        assert_eq!(pts.first(), pts.last());
        for w in pts.windows(2) {
            assert!(w[0].distance(w[1]) <= 1.0 + 1e-9);
        }
        for p in pts {
            assert!((p.distance(pt(5.0, 5.0)) - 10.0).abs() < 1e-9);
        }
    }

    #[test]
    fn tiny_ellipse_is_its_center() {
        let e = Ellipse::new(pt(1.0, 2.0), 0.1, 0.2);
        assert_eq!(e.segments(1.0), vec![vec![pt(1.0, 2.0)]]);
    }

    #[test]
    fn rotated_ellipse_bounding_box() {
        let mut e = Ellipse::new(pt(0.0, 0.0), 4.0, 2.0);
        e.transform(&Matrix::rotate(std::f64::consts::FRAC_PI_2));
        let bbox = e.bounding_box().unwrap();
        assert!((bbox.min.x + 2.0).abs() < 1e-9);
        assert!((bbox.max.y - 4.0).abs() < 1e-9);
        let (rx, ry) = e.radii();
        assert!((rx - 4.0).abs() < 1e-9 && (ry - 2.0).abs() < 1e-9);
    }

    #[test]
    fn plain_rect_is_closed_square() {
        let rect = Rect::new(0.0, 0.0, 10.0, 5.0, None, None);
        assert_eq!(
            rect.segments(1.0),
            vec![vec![pt(0.0, 0.0), pt(10.0, 0.0), pt(10.0, 5.0), pt(0.0, 5.0), pt(0.0, 0.0)]]
        );
    }

    #[test]
    fn rounded_rect_corners_are_arcs() {
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0, Some(2.0), None);
        let pts = &rect.segments(0.1)[0];
        assert_eq!(pts.first(), pts.last());
        assert!(pts.len() > 8);
        // corner points never reach the square's corner
        for p in pts {
            assert!(p.distance(pt(0.0, 0.0)) > 0.5);
            assert!(p.distance(pt(10.0, 10.0)) > 0.5);
        }
        let bbox = rect.bounding_box().unwrap();
        assert!((bbox.max.x - 10.0).abs() < 1e-9);
        assert!((bbox.max.y - 10.0).abs() < 1e-9);
    }

    #[test]
    fn oversized_corner_radius_is_clamped() {
        let rect = Rect::new(0.0, 0.0, 10.0, 4.0, Some(50.0), Some(50.0));
        let bbox = rect.bounding_box().unwrap();
        assert!((bbox.min.y - 0.0).abs() < 1e-9);
        assert!((bbox.max.y - 4.0).abs() < 1e-9);
    }

    #[test]
    fn empty_rect_draws_nothing() {
        let rect = Rect::new(0.0, 0.0, 0.0, 4.0, None, None);
        assert!(rect.segments(1.0).is_empty());
        assert!(rect.bounding_box().is_none());
    }

    #[test]
    fn polygon_closes_polyline_does_not() {
        let points = vec![pt(0.0, 0.0), pt(1.0, 0.0), pt(1.0, 1.0)];
        let polygon = Polyline { points: points.clone(), closed: true };
        let polyline = Polyline { points: points.clone(), closed: false };
        assert_eq!(polygon.segments(1.0)[0].len(), 4);
        assert_eq!(polyline.segments(1.0)[0], points);
    }

    #[test]
    fn kind_names() {
        assert_eq!(ShapeKind::Ellipse(Ellipse::circle(pt(0.0, 0.0), 1.0)).kind_name(), "circle");
        assert_eq!(ShapeKind::Unsupported { tag: "text".into() }.kind_name(), "text");
        let unsupported = ShapeKind::Unsupported { tag: "image".into() };
        assert!(unsupported.segments(1.0).is_empty());
        assert!(unsupported.bounding_box().is_none());
    }
}

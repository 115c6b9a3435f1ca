//! SVG path data parsing and curve flattening.
//!
//! ## Curve Flattening
//!
//! The footprint formats only know straight lines, so every curve has to be
//! "flattened" into points before it leaves this module:
//!
//! - Bézier curves are sampled uniformly. The sample count is derived from
//!   the length of the control polygon divided by the precision, clamped to
//!   `1..=1000`, and each sample is evaluated with de Casteljau's algorithm.
//! - Elliptical arcs are bisected in parameter space until every chord is no
//!   longer than the precision.
//!
//! ## Rust Lesson #23: Hand-rolled Scanners
//!
//! Path data is a tiny language: a command letter followed by numbers,
//! with separators that are optional whenever the text stays unambiguous
//! (`M10-5` is two numbers, arc flags may be glued together like `0110,10`).
//! A byte cursor with a couple of `peek`/`bump` helpers handles that more
//! predictably than a regex tokenizer.

use std::f64::consts::TAU;

use log::debug;
use lyon_geom::{CubicBezierSegment, QuadraticBezierSegment, point};
use thiserror::Error;

use crate::geometry::{BoundingBox, Point};
use crate::matrix::Matrix;

/// Upper bound on Bézier samples per curve.
pub const MAX_BEZIER_SAMPLES: usize = 1000;

/// Upper bound on arc bisection rounds (2^16 chords).
const MAX_ARC_DEPTH: u32 = 16;

/// Errors raised while reading a `d` attribute.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PathError {
    #[error("unrecognized path command '{command}' at offset {offset}")]
    UnknownCommand { command: char, offset: usize },

    #[error("command '{command}' is missing arguments at offset {offset}")]
    MissingArgument { command: char, offset: usize },

    #[error("invalid arc flag at offset {offset}, expected '0' or '1'")]
    InvalidFlag { offset: usize },

    #[error("path data must start with a moveto (offset {offset})")]
    MissingMoveTo { offset: usize },

    #[error("expected a command letter at offset {offset}")]
    ExpectedCommand { offset: usize },
}

/// One drawing command with absolute coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum PathCommand {
    MoveTo(Point),
    LineSegment { start: Point, end: Point },
    CubicBezier([Point; 4]),
    QuadraticBezier([Point; 3]),
    Arc(EllipticalArc),
}

/// An elliptical arc in endpoint form, with its center form derived once
/// at construction.
///
/// The ellipse is stored as `frame`, the affine map taking the unit circle
/// onto it. Transforming the arc only has to pre-multiply that frame, so
/// rotation, mirroring and non-uniform scale all stay exact.
#[derive(Debug, Clone, PartialEq)]
pub struct EllipticalArc {
    pub start: Point,
    pub end: Point,
    /// Radii after any scale-up needed to reach both endpoints.
    pub rx: f64,
    pub ry: f64,
    /// Rotation of the ellipse's x axis, in degrees.
    pub x_rotation: f64,
    pub large_arc: bool,
    pub sweep: bool,
    start_angle: f64,
    end_angle: f64,
    frame: Matrix,
}

/// A parsed `d` attribute.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Path {
    pub commands: Vec<PathCommand>,
}

// ============================================================================
// ARC
// ============================================================================

impl EllipticalArc {
    /// Build an arc from its endpoint parameterization.
    ///
    /// Returns `None` for the degenerate cases that are not arcs at all:
    /// a zero radius (a straight line) or coincident endpoints (nothing).
    pub fn new(
        start: Point,
        rx: f64,
        ry: f64,
        x_rotation: f64,
        large_arc: bool,
        sweep: bool,
        end: Point,
    ) -> Option<Self> {
        if rx == 0.0 || ry == 0.0 || start == end {
            return None;
        }

        let phi = x_rotation.to_radians();
        let (sin, cos) = phi.sin_cos();

        // Chord midpoint vector in the ellipse's unrotated frame.
        let half = (start - end) * 0.5;
        let p = Point::new(cos * half.x + sin * half.y, -sin * half.x + cos * half.y);

        let mut rx = rx.abs();
        let mut ry = ry.abs();

        // Radii too small to span the chord: grow them uniformly.
        let lambda = (p.x * p.x) / (rx * rx) + (p.y * p.y) / (ry * ry);
        if lambda > 1.0 {
            let factor = lambda.sqrt();
            debug!("Arc radii too small for its endpoints, scaling by {:.6}", factor);
            rx *= factor;
            ry *= factor;
        }

        let rx2 = rx * rx;
        let ry2 = ry * ry;
        let numerator = rx2 * ry2 - rx2 * p.y * p.y - ry2 * p.x * p.x;
        let denominator = rx2 * p.y * p.y + ry2 * p.x * p.x;
        let mut coef = (numerator / denominator).max(0.0).sqrt();
        if large_arc == sweep {
            coef = -coef;
        }

        let cp = Point::new(coef * rx * p.y / ry, -coef * ry * p.x / rx);
        let mid = start.lerp(end, 0.5);
        let center = Point::new(cos * cp.x - sin * cp.y + mid.x, sin * cp.x + cos * cp.y + mid.y);

        let start_angle = ((p.y - cp.y) / ry).atan2((p.x - cp.x) / rx);
        let mut end_angle = ((-p.y - cp.y) / ry).atan2((-p.x - cp.x) / rx);
        if sweep && end_angle < start_angle {
            end_angle += TAU;
        } else if !sweep && end_angle > start_angle {
            end_angle -= TAU;
        }

        let frame = Matrix::translate(center.x, center.y) * Matrix::rotate(phi) * Matrix::scale(rx, ry);

        Some(Self {
            start,
            end,
            rx,
            ry,
            x_rotation,
            large_arc,
            sweep,
            start_angle,
            end_angle,
            frame,
        })
    }

    pub fn center(&self) -> Point {
        Point::new(self.frame.e, self.frame.f)
    }

    /// Start and end angles (radians) in the ellipse's own frame. Their
    /// difference is positive for a sweep-flag arc, negative otherwise.
    pub fn angles(&self) -> (f64, f64) {
        (self.start_angle, self.end_angle)
    }

    /// Point at ellipse angle `theta`.
    pub fn point_at_angle(&self, theta: f64) -> Point {
        let (sin, cos) = theta.sin_cos();
        self.frame.apply(Point::new(cos, sin))
    }

    /// Point at `t` in `[0, 1]` along the arc.
    pub fn point_at(&self, t: f64) -> Point {
        self.point_at_angle(self.start_angle + t * (self.end_angle - self.start_angle))
    }

    /// Largest radius of the (possibly transformed) ellipse's frame.
    pub fn max_radius(&self) -> f64 {
        frame_max_radius(&self.frame)
    }

    pub fn transform(&mut self, matrix: &Matrix) {
        self.start = matrix.apply(self.start);
        self.end = matrix.apply(self.end);
        self.frame = *matrix * self.frame;
    }

    pub fn flatten(&self, precision: f64) -> Vec<Point> {
        let radius = self.max_radius();
        if radius < precision {
            return vec![self.start, self.end];
        }
        let mut points = bisect(|t| self.point_at(t), 2.0 * radius, precision);
        // Pin the endpoints so neighbouring commands join exactly.
        if let Some(first) = points.first_mut() {
            *first = self.start;
        }
        if let Some(last) = points.last_mut() {
            *last = self.end;
        }
        points
    }
}

pub(crate) fn frame_max_radius(frame: &Matrix) -> f64 {
    let x = (frame.a * frame.a + frame.b * frame.b).sqrt();
    let y = (frame.c * frame.c + frame.d * frame.d).sqrt();
    x.max(y)
}

/// Sample `curve` over `[0, 1]`, halving every interval until the longest
/// chord is at most `precision`.
pub(crate) fn bisect<F: Fn(f64) -> Point>(curve: F, initial_chord: f64, precision: f64) -> Vec<Point> {
    let mut ts = vec![0.0, 1.0];
    let mut chord = initial_chord;
    let mut depth = 0;

    while chord > precision && depth < MAX_ARC_DEPTH {
        let mut next = Vec::with_capacity(ts.len() * 2 - 1);
        for w in ts.windows(2) {
            next.push(w[0]);
            next.push((w[0] + w[1]) / 2.0);
        }
        next.push(1.0);
        ts = next;
        depth += 1;

        chord = ts
            .windows(2)
            .map(|w| curve(w[0]).distance(curve(w[1])))
            .fold(0.0, f64::max);
    }

    ts.into_iter().map(curve).collect()
}

// ============================================================================
// BÉZIER
// ============================================================================

/// Evaluate a Bézier curve of any degree at `t` by repeated interpolation.
fn de_casteljau(control: &[Point], t: f64) -> Point {
    let mut work = control.to_vec();
    for k in (1..work.len()).rev() {
        for i in 0..k {
            work[i] = work[i].lerp(work[i + 1], t);
        }
    }
    work[0]
}

/// Number of samples for a curve with the given control polygon.
pub fn bezier_sample_count(control: &[Point], precision: f64) -> usize {
    if precision <= 0.0 {
        return MAX_BEZIER_SAMPLES;
    }
    let control_length: f64 = control.windows(2).map(|w| w[0].distance(w[1])).sum();
    let n = (control_length / precision).round();
    (n as usize).clamp(1, MAX_BEZIER_SAMPLES)
}

fn flatten_bezier(control: &[Point], precision: f64) -> Vec<Point> {
    let n = bezier_sample_count(control, precision);
    let mut points: Vec<Point> = (0..=n).map(|i| de_casteljau(control, i as f64 / n as f64)).collect();
    if let (Some(last), Some(end)) = (points.last_mut(), control.last()) {
        *last = *end;
    }
    points
}

fn lyon_point(p: Point) -> lyon_geom::Point<f64> {
    point(p.x, p.y)
}

fn from_lyon_box(b: lyon_geom::Box2D<f64>) -> BoundingBox {
    BoundingBox::new(Point::new(b.min.x, b.min.y), Point::new(b.max.x, b.max.y))
}

// ============================================================================
// COMMANDS
// ============================================================================

impl PathCommand {
    /// Flattened points of this command. A `MoveTo` yields nothing.
    pub fn flatten(&self, precision: f64) -> Vec<Point> {
        match self {
            PathCommand::MoveTo(_) => Vec::new(),
            PathCommand::LineSegment { start, end } => vec![*start, *end],
            PathCommand::CubicBezier(c) => flatten_bezier(c, precision),
            PathCommand::QuadraticBezier(c) => flatten_bezier(c, precision),
            PathCommand::Arc(arc) => arc.flatten(precision),
        }
    }

    pub fn transform(&mut self, matrix: &Matrix) {
        match self {
            PathCommand::MoveTo(p) => *p = matrix.apply(*p),
            PathCommand::LineSegment { start, end } => {
                *start = matrix.apply(*start);
                *end = matrix.apply(*end);
            }
            PathCommand::CubicBezier(c) => c.iter_mut().for_each(|p| *p = matrix.apply(*p)),
            PathCommand::QuadraticBezier(c) => c.iter_mut().for_each(|p| *p = matrix.apply(*p)),
            PathCommand::Arc(arc) => arc.transform(matrix),
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        match self {
            PathCommand::MoveTo(p) => BoundingBox::new(*p, *p),
            PathCommand::LineSegment { start, end } => {
                let mut b = BoundingBox::new(*start, *start);
                b.include(*end);
                b
            }
            PathCommand::CubicBezier([p0, p1, p2, p3]) => from_lyon_box(
                CubicBezierSegment {
                    from: lyon_point(*p0),
                    ctrl1: lyon_point(*p1),
                    ctrl2: lyon_point(*p2),
                    to: lyon_point(*p3),
                }
                .bounding_box(),
            ),
            PathCommand::QuadraticBezier([p0, p1, p2]) => from_lyon_box(
                QuadraticBezierSegment {
                    from: lyon_point(*p0),
                    ctrl: lyon_point(*p1),
                    to: lyon_point(*p2),
                }
                .bounding_box(),
            ),
            PathCommand::Arc(arc) => {
                let coarse = arc.max_radius() / 8.0;
                let mut b = BoundingBox::new(arc.start, arc.start);
                for p in arc.flatten(coarse) {
                    b.include(p);
                }
                b
            }
        }
    }
}

// ============================================================================
// PATH
// ============================================================================

impl Path {
    pub fn new(commands: Vec<PathCommand>) -> Self {
        Self { commands }
    }

    /// Parse SVG path data.
    pub fn parse(data: &str) -> Result<Path, PathError> {
        Parser::new(data).run().map(Path::new)
    }

    /// Flatten into one point list per subpath. Subpaths split at every
    /// moveto, and points repeated where two commands join appear once.
    pub fn segments(&self, precision: f64) -> Vec<Vec<Point>> {
        let mut out = Vec::new();
        let mut current: Vec<Point> = Vec::new();

        for command in &self.commands {
            if let PathCommand::MoveTo(_) = command {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
                continue;
            }
            for p in command.flatten(precision) {
                if current.last() != Some(&p) {
                    current.push(p);
                }
            }
        }

        if !current.is_empty() {
            out.push(current);
        }
        out
    }

    pub fn transform(&mut self, matrix: &Matrix) {
        for command in &mut self.commands {
            command.transform(matrix);
        }
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.commands
            .iter()
            .map(PathCommand::bounding_box)
            .reduce(|a, b| a.union(&b))
    }
}

// ============================================================================
// PARSER
// ============================================================================

const COMMANDS: &[u8] = b"MmLlHhVvCcSsQqTtAaZz";

struct Parser<'a> {
    data: &'a [u8],
    pos: usize,
    current: Point,
    subpath_start: Point,
    /// Second control point of the previous command if it was `C`/`S`.
    last_cubic_ctrl: Option<Point>,
    /// Control point of the previous command if it was `Q`/`T`.
    last_quad_ctrl: Option<Point>,
    commands: Vec<PathCommand>,
}

impl<'a> Parser<'a> {
    fn new(data: &'a str) -> Self {
        Self {
            data: data.as_bytes(),
            pos: 0,
            current: Point::default(),
            subpath_start: Point::default(),
            last_cubic_ctrl: None,
            last_quad_ctrl: None,
            commands: Vec::new(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn skip_separators(&mut self) {
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() || b == b',' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn run(mut self) -> Result<Vec<PathCommand>, PathError> {
        // Command to repeat when coordinates follow without a letter.
        let mut implicit: Option<u8> = None;

        loop {
            self.skip_separators();
            let Some(b) = self.peek() else { break };
            let offset = self.pos;

            let command = if b.is_ascii_alphabetic() {
                self.pos += 1;
                if !COMMANDS.contains(&b) {
                    return Err(PathError::UnknownCommand { command: b as char, offset });
                }
                if self.commands.is_empty() && !matches!(b, b'M' | b'm') {
                    return Err(PathError::MissingMoveTo { offset });
                }
                b
            } else if let Some(c) = implicit {
                c
            } else if self.commands.is_empty() {
                return Err(PathError::MissingMoveTo { offset });
            } else {
                return Err(PathError::ExpectedCommand { offset });
            };

            self.command(command)?;

            implicit = match command {
                b'M' => Some(b'L'),
                b'm' => Some(b'l'),
                b'Z' | b'z' => None,
                c => Some(c),
            };
        }

        Ok(self.commands)
    }

    fn number(&mut self, command: u8) -> Result<f64, PathError> {
        self.skip_separators();
        let start = self.pos;
        let missing = PathError::MissingArgument { command: command as char, offset: start };

        if matches!(self.peek(), Some(b'+' | b'-')) {
            self.pos += 1;
        }
        let mut digits = 0;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
            digits += 1;
        }
        if self.peek() == Some(b'.') {
            self.pos += 1;
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.pos += 1;
                digits += 1;
            }
        }
        if digits == 0 {
            self.pos = start;
            return Err(missing);
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            let mark = self.pos;
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            if matches!(self.peek(), Some(b'0'..=b'9')) {
                while matches!(self.peek(), Some(b'0'..=b'9')) {
                    self.pos += 1;
                }
            } else {
                self.pos = mark;
            }
        }

        std::str::from_utf8(&self.data[start..self.pos])
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or(missing)
    }

    /// Arc flags are a single `0` or `1` and may be glued to what follows.
    fn flag(&mut self, command: u8) -> Result<bool, PathError> {
        self.skip_separators();
        let offset = self.pos;
        match self.peek() {
            Some(b'0') => {
                self.pos += 1;
                Ok(false)
            }
            Some(b'1') => {
                self.pos += 1;
                Ok(true)
            }
            Some(_) => Err(PathError::InvalidFlag { offset }),
            None => Err(PathError::MissingArgument { command: command as char, offset }),
        }
    }

    fn point(&mut self, command: u8, relative: bool) -> Result<Point, PathError> {
        let x = self.number(command)?;
        let y = self.number(command)?;
        let p = Point::new(x, y);
        Ok(if relative { p + self.current } else { p })
    }

    fn command(&mut self, command: u8) -> Result<(), PathError> {
        let relative = command.is_ascii_lowercase();
        let start = self.current;
        let mut cubic_ctrl = None;
        let mut quad_ctrl = None;

        match command.to_ascii_uppercase() {
            b'M' => {
                let p = self.point(command, relative)?;
                self.commands.push(PathCommand::MoveTo(p));
                self.current = p;
                self.subpath_start = p;
            }
            b'L' => {
                let p = self.point(command, relative)?;
                self.line_to(p);
            }
            b'H' => {
                let x = self.number(command)?;
                let x = if relative { start.x + x } else { x };
                self.line_to(Point::new(x, start.y));
            }
            b'V' => {
                let y = self.number(command)?;
                let y = if relative { start.y + y } else { y };
                self.line_to(Point::new(start.x, y));
            }
            b'C' => {
                let c1 = self.point(command, relative)?;
                let c2 = self.point(command, relative)?;
                let p = self.point(command, relative)?;
                self.commands.push(PathCommand::CubicBezier([start, c1, c2, p]));
                cubic_ctrl = Some(c2);
                self.current = p;
            }
            b'S' => {
                let c1 = match self.last_cubic_ctrl {
                    Some(prev) => start * 2.0 - prev,
                    None => start,
                };
                let c2 = self.point(command, relative)?;
                let p = self.point(command, relative)?;
                self.commands.push(PathCommand::CubicBezier([start, c1, c2, p]));
                cubic_ctrl = Some(c2);
                self.current = p;
            }
            b'Q' => {
                let c = self.point(command, relative)?;
                let p = self.point(command, relative)?;
                self.commands.push(PathCommand::QuadraticBezier([start, c, p]));
                quad_ctrl = Some(c);
                self.current = p;
            }
            b'T' => {
                let c = match self.last_quad_ctrl {
                    Some(prev) => start * 2.0 - prev,
                    None => start,
                };
                let p = self.point(command, relative)?;
                self.commands.push(PathCommand::QuadraticBezier([start, c, p]));
                quad_ctrl = Some(c);
                self.current = p;
            }
            b'A' => {
                let rx = self.number(command)?;
                let ry = self.number(command)?;
                let rotation = self.number(command)?;
                let large_arc = self.flag(command)?;
                let sweep = self.flag(command)?;
                let p = self.point(command, relative)?;
                match EllipticalArc::new(start, rx, ry, rotation, large_arc, sweep, p) {
                    Some(arc) => self.commands.push(PathCommand::Arc(arc)),
                    None if start != p => self.line_to(p),
                    None => {}
                }
                self.current = p;
            }
            b'Z' => {
                let end = self.subpath_start;
                self.commands.push(PathCommand::LineSegment { start, end });
                self.current = end;
            }
            _ => unreachable!("command letters are validated before dispatch"),
        }

        self.last_cubic_ctrl = cubic_ctrl;
        self.last_quad_ctrl = quad_ctrl;
        Ok(())
    }

    fn line_to(&mut self, end: Point) {
        self.commands.push(PathCommand::LineSegment { start: self.current, end });
        self.current = end;
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

    fn close(a: Point, b: Point, eps: f64) -> bool {
        (a.x - b.x).abs() < eps && (a.y - b.y).abs() < eps
    }

    /// Is `p` on the ellipse with the given center, radii and rotation (degrees)?
    fn on_ellipse(p: Point, center: Point, rx: f64, ry: f64, rotation: f64) -> f64 {
        let local = (p - center).rotate(-rotation.to_radians(), Point::default());
        (local.x / rx).powi(2) + (local.y / ry).powi(2)
    }

    #[test]
    fn closed_triangle_flattens_to_its_vertices() {
        let path = Path::parse("M0,0 L10,0 L10,10 Z").unwrap();
        let segments = path.segments(1.0);
        assert_eq!(segments, vec![vec![pt(0.0, 0.0), pt(10.0, 0.0), pt(10.0, 10.0), pt(0.0, 0.0)]]);
    }

    #[test]
    fn line_only_path_yields_one_point_per_vertex() {
        let path = Path::parse("M 1 2 L 3 4 l 1 1 H 10 v -3 h -2 L 0 0").unwrap();
        for precision in [0.01, 1.0, 100.0] {
            let segments = path.segments(precision);
            assert_eq!(segments.len(), 1);
            assert_eq!(
                segments[0],
                vec![pt(1.0, 2.0), pt(3.0, 4.0), pt(4.0, 5.0), pt(10.0, 5.0), pt(10.0, 2.0), pt(8.0, 2.0), pt(0.0, 0.0)]
            );
        }
    }

    #[test]
    fn implicit_lineto_after_moveto() {
        let abs = Path::parse("M0 0 10 0 10 10").unwrap();
        let rel = Path::parse("m0 0 10 0 0 10").unwrap();
        let expected = vec![vec![pt(0.0, 0.0), pt(10.0, 0.0), pt(10.0, 10.0)]];
        assert_eq!(abs.segments(1.0), expected);
        assert_eq!(rel.segments(1.0), expected);
    }

    #[test]
    fn moveto_splits_subpaths() {
        let path = Path::parse("M0,0 L1,0 M5,5 L6,5 L6,6 z").unwrap();
        let segments = path.segments(1.0);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].last(), Some(&pt(5.0, 5.0)));
    }

    #[test]
    fn close_resets_current_point() {
        let path = Path::parse("M10,10 l5,0 l0,5 z l-5,0").unwrap();
        let segments = path.segments(1.0);
        assert_eq!(segments[0].last(), Some(&pt(5.0, 10.0)));
    }

    #[test]
    fn numbers_without_separators() {
        let path = Path::parse("M10-5L.5.5l1e1-1E+1").unwrap();
        let segments = path.segments(1.0);
        assert_eq!(segments[0], vec![pt(10.0, -5.0), pt(0.5, 0.5), pt(10.5, -9.5)]);
    }

    #[test]
    fn smooth_cubic_reflects_previous_control() {
        let path = Path::parse("M0,0 C0,10 10,10 10,0 S20,-10 20,0").unwrap();
        match &path.commands[2] {
            PathCommand::CubicBezier(c) => {
                assert_eq!(c[0], pt(10.0, 0.0));
                assert_eq!(c[1], pt(10.0, -10.0));
            }
            other => panic!("expected cubic, got {:?}", other),
        }
    }

    #[test]
    fn smooth_cubic_without_previous_curve_uses_current_point() {
        let path = Path::parse("M0,0 L5,5 S10,10 15,5").unwrap();
        match &path.commands[2] {
            PathCommand::CubicBezier(c) => assert_eq!(c[1], pt(5.0, 5.0)),
            other => panic!("expected cubic, got {:?}", other),
        }
    }

    #[test]
    fn repeated_smooth_cubic_keeps_reflecting() {
        let path = Path::parse("M0,0 C0,5 5,5 5,0 S10,-5 10,0 15,5 15,0").unwrap();
        match &path.commands[3] {
            // previous S had ctrl2 (10,-5) ending at (10,0)
            PathCommand::CubicBezier(c) => assert_eq!(c[1], pt(10.0, 5.0)),
            other => panic!("expected cubic, got {:?}", other),
        }
    }

    #[test]
    fn smooth_quadratic_only_reflects_quadratics() {
        let after_quad = Path::parse("M0,0 Q5,5 10,0 T20,0").unwrap();
        match &after_quad.commands[2] {
            PathCommand::QuadraticBezier(c) => assert_eq!(c[1], pt(15.0, -5.0)),
            other => panic!("expected quadratic, got {:?}", other),
        }

        let after_cubic = Path::parse("M0,0 C0,5 5,5 10,0 T20,0").unwrap();
        match &after_cubic.commands[2] {
            PathCommand::QuadraticBezier(c) => assert_eq!(c[1], pt(10.0, 0.0)),
            other => panic!("expected quadratic, got {:?}", other),
        }
    }

    #[test]
    fn bezier_sample_count_follows_control_polygon() {
        let control = [pt(0.0, 0.0), pt(0.0, 10.0), pt(10.0, 10.0), pt(10.0, 0.0)];
        assert_eq!(bezier_sample_count(&control, 1.0), 30);
        assert_eq!(bezier_sample_count(&control, 1000.0), 1);
        assert_eq!(bezier_sample_count(&control, 0.0001), MAX_BEZIER_SAMPLES);
        assert_eq!(bezier_sample_count(&control, 0.0), MAX_BEZIER_SAMPLES);
    }

    #[test]
    fn flattened_bezier_hits_both_endpoints() {
        let path = Path::parse("M0,0 C0,10 10,10 10,0").unwrap();
        let pts = &path.segments(1.0)[0];
        assert_eq!(pts.len(), 31);
        assert_eq!(pts[0], pt(0.0, 0.0));
        assert_eq!(*pts.last().unwrap(), pt(10.0, 0.0));
        // the curve peaks at 3/4 of the control height
        assert!(close(pts[15], pt(5.0, 7.5), 1e-9));
    }

    #[test]
    fn arc_endpoints_lie_on_reconstructed_ellipse() {
        let arc = EllipticalArc::new(pt(0.0, 0.0), 5.0, 3.0, 30.0, false, true, pt(8.0, 0.0)).unwrap();
        let c = arc.center();
        assert!((on_ellipse(arc.start, c, arc.rx, arc.ry, 30.0) - 1.0).abs() < 1e-6);
        assert!((on_ellipse(arc.end, c, arc.rx, arc.ry, 30.0) - 1.0).abs() < 1e-6);
        assert!(close(arc.point_at(0.0), arc.start, 1e-6));
        assert!(close(arc.point_at(1.0), arc.end, 1e-6));
        let (a0, a1) = arc.angles();
        assert!(a1 > a0, "sweep flag means increasing angle");
    }

    #[test]
    fn arc_center_matches_lyon() {
        use lyon_geom::{Angle, ArcFlags, SvgArc, vector};

        for (large_arc, sweep) in [(false, false), (false, true), (true, false), (true, true)] {
            let ours = EllipticalArc::new(pt(0.0, 0.0), 5.0, 3.0, 30.0, large_arc, sweep, pt(8.0, 0.0)).unwrap();
            let theirs = SvgArc {
                from: point(0.0, 0.0),
                to: point(8.0, 0.0),
                radii: vector(5.0, 3.0),
                x_rotation: Angle::degrees(30.0),
                flags: ArcFlags { large_arc, sweep },
            }
            .to_arc();
            let c = ours.center();
            assert!(close(c, pt(theirs.center.x, theirs.center.y), 1e-9), "flags {large_arc} {sweep}");
        }
    }

    #[test]
    fn large_arc_sweeps_more_than_half_a_turn() {
        let small = EllipticalArc::new(pt(0.0, 0.0), 5.0, 3.0, 30.0, false, false, pt(8.0, 0.0)).unwrap();
        let large = EllipticalArc::new(pt(0.0, 0.0), 5.0, 3.0, 30.0, true, false, pt(8.0, 0.0)).unwrap();
        let sweep = |a: &EllipticalArc| {
            let (a0, a1) = a.angles();
            (a1 - a0).abs()
        };
        assert!(sweep(&small) < std::f64::consts::PI);
        assert!(sweep(&large) > std::f64::consts::PI);
    }

    #[test]
    fn undersized_radii_are_scaled_up() {
        let arc = EllipticalArc::new(pt(0.0, 0.0), 1.0, 1.0, 0.0, false, true, pt(10.0, 0.0)).unwrap();
        assert!((arc.rx - 5.0).abs() < 1e-9);
        assert!(close(arc.center(), pt(5.0, 0.0), 1e-9));
        assert!(close(arc.point_at(1.0), pt(10.0, 0.0), 1e-9));
    }

    #[test]
    fn degenerate_arcs() {
        assert!(EllipticalArc::new(pt(0.0, 0.0), 0.0, 3.0, 0.0, false, true, pt(1.0, 0.0)).is_none());
        assert!(EllipticalArc::new(pt(1.0, 1.0), 3.0, 3.0, 0.0, false, true, pt(1.0, 1.0)).is_none());

        // A zero radius arc in path data is drawn as a line.
        let path = Path::parse("M0,0 A0,5 0 0 1 10,0").unwrap();
        assert_eq!(path.segments(1.0), vec![vec![pt(0.0, 0.0), pt(10.0, 0.0)]]);
    }

    #[test]
    fn arc_flattening_respects_precision() {
        let path = Path::parse("M0,0 A10,10 0 0 1 20,0").unwrap();
        let pts = &path.segments(0.5)[0];
        assert_eq!(pts[0], pt(0.0, 0.0));
        assert_eq!(*pts.last().unwrap(), pt(20.0, 0.0));
        for w in pts.windows(2) {
            assert!(w[0].distance(w[1]) <= 0.5 + 1e-9);
        }
        for p in pts {
            assert!((p.distance(pt(10.0, 0.0)) - 10.0).abs() < 1e-9);
        }
    }

    #[test]
    fn tiny_arc_collapses_to_endpoints() {
        let path = Path::parse("M0,0 a0.1,0.1 0 0 1 0.2,0").unwrap();
        assert_eq!(path.segments(1.0), vec![vec![pt(0.0, 0.0), pt(0.2, 0.0)]]);
    }

    #[test]
    fn glued_arc_flags() {
        let spaced = Path::parse("M0,0 A5,5 0 1 0 10,0").unwrap();
        let glued = Path::parse("M0,0 A5,5 0 1010,0").unwrap();
        assert_eq!(spaced, glued);
    }

    #[test]
    fn invalid_arc_flag_is_an_error() {
        let err = Path::parse("M0,0 A5,5 0 2 0 10,0").unwrap_err();
        assert_eq!(err, PathError::InvalidFlag { offset: 12 });
    }

    #[test]
    fn unknown_command_is_an_error() {
        let err = Path::parse("M0,0 X10,10").unwrap_err();
        assert_eq!(err, PathError::UnknownCommand { command: 'X', offset: 5 });
    }

    #[test]
    fn missing_arguments_is_an_error() {
        assert!(matches!(
            Path::parse("M0,0 L10"),
            Err(PathError::MissingArgument { command: 'L', .. })
        ));
        assert!(matches!(
            Path::parse("M0,0 C1,1 2,2"),
            Err(PathError::MissingArgument { command: 'C', .. })
        ));
    }

    #[test]
    fn path_must_start_with_moveto() {
        assert!(matches!(Path::parse("L10,10"), Err(PathError::MissingMoveTo { .. })));
        assert!(matches!(Path::parse("10,10"), Err(PathError::MissingMoveTo { .. })));
        assert!(matches!(Path::parse("M0,0 Z 5,5"), Err(PathError::ExpectedCommand { .. })));
        assert_eq!(Path::parse("").unwrap().commands.len(), 0);
    }

    #[test]
    fn transform_mirrors_arc_exactly() {
        let mut path = Path::parse("M0,0 A5,3 30 0 1 8,0").unwrap();
        let before = path.segments(0.25);
        path.transform(&Matrix::scale(-1.0, 1.0));
        let after = path.segments(0.25);
        assert_eq!(before[0].len(), after[0].len());
        for (a, b) in before[0].iter().zip(&after[0]) {
            assert!(close(pt(-a.x, a.y), *b, 1e-9));
        }
    }

    #[test]
    fn bounding_box_of_curve_is_tight() {
        let path = Path::parse("M0,0 C0,10 10,10 10,0").unwrap();
        let bbox = path.bounding_box().unwrap();
        assert!(close(bbox.min, pt(0.0, 0.0), 1e-9));
        assert!(close(bbox.max, pt(10.0, 7.5), 1e-9));
    }
}

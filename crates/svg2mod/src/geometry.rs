//! Core geometry types for svg2mod.
//!
//! ## Rust Lesson #3: Structs & Derives
//!
//! The `#[derive(...)]` macro auto-generates common functionality:
//! - `Debug` = lets you print with `{:?}`
//! - `Clone` / `Copy` = small values are duplicated implicitly
//! - `PartialEq` = can compare with `==`
//!
//! Point equality is exact. Callers that need tolerance round first
//! (see [`Point::round`]), which is what `PolygonSegment` does on construction.

use std::ops::{Add, Mul, Neg, Sub};

/// A 2D point with x,y coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// A straight segment between two points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

// ============================================================================
// POINT
// ============================================================================

impl Point {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Distance to another point.
    #[inline]
    pub fn distance(&self, other: Point) -> f64 {
        (*self - other).length()
    }

    /// Length of the vector from the origin to this point.
    #[inline]
    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Rotate around `origin` by `angle` radians (counter-clockwise in a y-up frame).
    pub fn rotate(&self, angle: f64, origin: Point) -> Point {
        let (sin, cos) = angle.sin_cos();
        let d = *self - origin;
        Point::new(
            d.x * cos - d.y * sin + origin.x,
            d.x * sin + d.y * cos + origin.y,
        )
    }

    /// Round both coordinates to `digits` decimal places.
    pub fn round(&self, digits: i32) -> Point {
        let factor = 10f64.powi(digits);
        Point::new(
            (self.x * factor).round() / factor,
            (self.y * factor).round() / factor,
        )
    }

    /// Linear interpolation towards `other`; `t = 0` is `self`.
    #[inline]
    pub fn lerp(&self, other: Point, t: f64) -> Point {
        *self + (other - *self) * t
    }
}

// ## Rust Lesson #8: Operator Overloading
//
// Implementing the `std::ops` traits lets us write `a + b` and `p * 2.0`
// for our own types. Because Point is `Copy`, the operators take their
// arguments by value without any ownership headaches.

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;
    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Point {
    type Output = Point;
    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

// ============================================================================
// SEGMENT
// ============================================================================

/// Turn direction of the triplet (p, q, r).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Orientation {
    Collinear,
    Clockwise,
    CounterClockwise,
}

fn orientation(p: Point, q: Point, r: Point) -> Orientation {
    let val = (q.y - p.y) * (r.x - q.x) - (q.x - p.x) * (r.y - q.y);
    if val == 0.0 {
        Orientation::Collinear
    } else if val > 0.0 {
        Orientation::Clockwise
    } else {
        Orientation::CounterClockwise
    }
}

/// Does `q` lie within the box spanned by `p` and `r`? Only meaningful
/// for collinear triplets.
fn on_segment(p: Point, q: Point, r: Point) -> bool {
    q.x <= p.x.max(r.x) && q.x >= p.x.min(r.x) && q.y <= p.y.max(r.y) && q.y >= p.y.min(r.y)
}

impl Segment {
    #[inline]
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.start.distance(self.end)
    }

    #[inline]
    pub fn midpoint(&self) -> Point {
        self.start.lerp(self.end, 0.5)
    }

    /// True if the two segments touch or cross, including collinear overlap
    /// and shared endpoints.
    pub fn intersects(&self, other: &Segment) -> bool {
        let (p1, q1, p2, q2) = (self.start, self.end, other.start, other.end);

        let o1 = orientation(p1, q1, p2);
        let o2 = orientation(p1, q1, q2);
        let o3 = orientation(p2, q2, p1);
        let o4 = orientation(p2, q2, q1);

        if o1 != o2 && o3 != o4 {
            return true;
        }

        (o1 == Orientation::Collinear && on_segment(p1, p2, q1))
            || (o2 == Orientation::Collinear && on_segment(p1, q2, q1))
            || (o3 == Orientation::Collinear && on_segment(p2, p1, q2))
            || (o4 == Orientation::Collinear && on_segment(p2, q1, q2))
    }

    /// True if the segments share an endpoint.
    pub fn connects(&self, other: &Segment) -> bool {
        self.start == other.start
            || self.start == other.end
            || self.end == other.start
            || self.end == other.end
    }

    /// True if `p` lies on this segment (exactly, no tolerance).
    pub fn contains(&self, p: Point) -> bool {
        orientation(self.start, self.end, p) == Orientation::Collinear
            && on_segment(self.start, p, self.end)
    }

    /// Perpendicular distance from `p` to the infinite line through this
    /// segment. A degenerate segment measures the distance to its start.
    pub fn perpendicular_distance(&self, p: Point) -> f64 {
        let d = self.end - self.start;
        let len = d.length();
        if len == 0.0 {
            return p.distance(self.start);
        }
        ((p.x - self.start.x) * d.y - (p.y - self.start.y) * d.x).abs() / len
    }
}

// ============================================================================
// BOUNDING BOX
// ============================================================================

impl BoundingBox {
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    /// Box around a set of points, `None` if the iterator is empty.
    pub fn from_points<I: IntoIterator<Item = Point>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bbox = BoundingBox::new(first, first);
        for p in iter {
            bbox.include(p);
        }
        Some(bbox)
    }

    pub fn include(&mut self, p: Point) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let mut out = *self;
        out.include(other.min);
        out.include(other.max);
        out
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Point {
        self.min.lerp(self.max, 0.5)
    }

    /// Length of the min→max diagonal, used to rank shapes by size.
    pub fn diagonal(&self) -> f64 {
        self.min.distance(self.max)
    }

    /// True if `other` lies strictly inside this box on all four sides.
    pub fn strictly_contains(&self, other: &BoundingBox) -> bool {
        self.min.x < other.min.x
            && self.min.y < other.min.y
            && self.max.x > other.max.x
            && self.max.y > other.max.y
    }
}

// ============================================================================
// SIMPLIFICATION
// ============================================================================

/// Ramer-Douglas-Peucker reduction of a polyline.
///
/// Keeps the first and last points, recursing on the point furthest from
/// the chord while it is further than `tolerance`. A non-positive
/// tolerance returns the input untouched.
pub fn simplify(points: &[Point], tolerance: f64) -> Vec<Point> {
    if tolerance <= 0.0 || points.len() < 3 {
        return points.to_vec();
    }

    let first = points[0];
    let last = points[points.len() - 1];
    let chord = Segment::new(first, last);

    // First point of maximum distance wins ties.
    let mut index = 0;
    let mut max_distance = 0.0;
    for (i, p) in points.iter().enumerate().skip(1).take(points.len() - 2) {
        let d = chord.perpendicular_distance(*p);
        if d > max_distance {
            index = i;
            max_distance = d;
        }
    }

    if max_distance > tolerance {
        let mut left = simplify(&points[..=index], tolerance);
        let right = simplify(&points[index..], tolerance);
        left.pop();
        left.extend(right);
        left
    } else {
        vec![first, last]
    }
}

// ============================================================================
// TESTS
// ============================================================================

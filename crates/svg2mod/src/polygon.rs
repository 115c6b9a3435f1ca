//! Flattened outlines ready for export.
//!
//! A [`PolygonSegment`] is one subpath after flattening: an ordered list of
//! points with consecutive duplicates removed and a bounding box that is
//! kept in sync with the points. It carries the containment and
//! intersection queries the hole inliner is built on.

use log::warn;

use crate::geometry::{self, BoundingBox, Point, Segment};

/// Decimal places points are rounded to on construction.
const ROUND_DIGITS: i32 = 10;

/// Vertical nudge for the containment ray so it rarely hits a vertex.
const RAY_OFFSET: f64 = 1e-7;

#[derive(Debug, Clone, PartialEq)]
pub struct PolygonSegment {
    pub points: Vec<Point>,
    pub bbox: BoundingBox,
}

fn dedup(points: impl IntoIterator<Item = Point>) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::new();
    for p in points {
        if out.last() != Some(&p) {
            out.push(p);
        }
    }
    out
}

impl PolygonSegment {
    /// Round the points, drop consecutive repeats and compute the bounds.
    /// Returns `None` for an empty point list.
    pub fn new(points: Vec<Point>) -> Option<Self> {
        let points = dedup(points.into_iter().map(|p| p.round(ROUND_DIGITS)));
        let bbox = BoundingBox::from_points(points.iter().copied())?;
        if points.len() < 3 {
            warn!("Path segment has only {} points (not a polygon?)", points.len());
        }
        Some(Self { points, bbox })
    }

    fn recompute_bbox(&mut self) {
        if let Some(bbox) = BoundingBox::from_points(self.points.iter().copied()) {
            self.bbox = bbox;
        }
    }

    /// Map every point, then drop repeats the mapping created.
    pub fn map_points<F: Fn(Point) -> Point>(&mut self, f: F) {
        self.points = dedup(self.points.iter().map(|p| f(*p)));
        self.recompute_bbox();
    }

    /// Move the outline into output coordinates.
    ///
    /// `transform` is applied first, then x is negated when `flip` is set.
    /// Filled outlines are closed back to their first point.
    pub fn process<F: Fn(Point) -> Point>(&mut self, transform: F, flip: bool, fill: bool) {
        self.map_points(|p| {
            let q = transform(p);
            if flip { Point::new(-q.x, q.y) } else { q }
        });
        if fill && !self.is_closed() {
            self.points.push(self.points[0]);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.points.len() > 1 && self.points.first() == self.points.last()
    }

    /// Consecutive point pairs.
    pub fn edges(&self) -> impl Iterator<Item = Segment> + '_ {
        self.points.windows(2).map(|w| Segment::new(w[0], w[1]))
    }

    /// First edge touching `line`. With `check_connects`, edges sharing an
    /// endpoint with `line` are ignored.
    pub fn intersecting_edge(&self, line: &Segment, check_connects: bool) -> Option<Segment> {
        self.edges()
            .filter(|edge| !(check_connects && line.connects(edge)))
            .find(|edge| line.intersects(edge))
    }

    pub fn intersects(&self, line: &Segment, check_connects: bool) -> bool {
        self.intersecting_edge(line, check_connects).is_some()
    }

    /// Number of edges `line` crosses. A crossing exactly through a vertex
    /// is counted once, not once for each edge meeting there.
    pub fn count_intersections(&self, line: &Segment, check_connects: bool) -> usize {
        let edges: Vec<Segment> = self.edges().collect();
        let last = edges.len().saturating_sub(1);
        let closed = self.is_closed();

        let mut count = 0;
        let mut skip_next = false;
        let mut first_hit_at_start = false;

        for (i, edge) in edges.iter().enumerate() {
            if std::mem::take(&mut skip_next) {
                continue;
            }
            if check_connects && line.connects(edge) {
                continue;
            }
            if !line.intersects(edge) {
                continue;
            }
            // Wrapped around onto the vertex the first edge already counted.
            if i == last && closed && first_hit_at_start && line.contains(edge.end) {
                continue;
            }
            count += 1;
            if i == 0 && line.contains(edge.start) {
                first_hit_at_start = true;
            }
            if line.contains(edge.end) {
                skip_next = true;
            }
        }
        count
    }

    /// False if one outline lies inside the other.
    ///
    /// The quick test is bounding-box containment; only when the larger box
    /// strictly contains the smaller one is a horizontal ray cast from the
    /// smaller outline's first point. An odd number of crossings with the
    /// larger outline means it is inside.
    pub fn are_distinct(&self, other: &PolygonSegment) -> bool {
        let (smaller, larger) = if self.bbox.diagonal() <= other.bbox.diagonal() {
            (self, other)
        } else {
            (other, self)
        };

        if !larger.bbox.strictly_contains(&smaller.bbox) {
            return true;
        }

        let origin = smaller.points[0];
        let y = origin.y + RAY_OFFSET;
        let ray = Segment::new(Point::new(origin.x, y), Point::new(larger.bbox.max.x + 1.0, y));
        larger.count_intersections(&ray, false) % 2 == 0
    }

    /// The point list rotated to start (and end) at `index`.
    pub fn points_starting_on_index(&self, index: usize) -> Vec<Point> {
        if index == 0 || index >= self.points.len() {
            return self.points.clone();
        }
        let ring = if self.is_closed() {
            &self.points[..self.points.len() - 1]
        } else {
            &self.points[..]
        };
        let mut out: Vec<Point> = ring[index..].iter().chain(&ring[..index]).copied().collect();
        out.push(out[0]);
        out
    }

    /// Ramer-Douglas-Peucker reduction in place. Non-positive tolerances
    /// leave the outline alone.
    pub fn simplify(&mut self, tolerance: f64) {
        if tolerance > 0.0 {
            self.points = geometry::simplify(&self.points, tolerance);
            self.recompute_bbox();
        }
    }

    /// Shoelace area, positive for counter-clockwise in a y-up frame.
    pub fn signed_area(&self) -> f64 {
        let n = self.points.len();
        let twice: f64 = (0..n)
            .map(|i| {
                let a = self.points[i];
                let b = self.points[(i + 1) % n];
                a.x * b.y - b.x * a.y
            })
            .sum();
        twice / 2.0
    }

    pub fn reverse(&mut self) {
        self.points.reverse();
    }
}

// ============================================================================
// TESTS
// ============================================================================

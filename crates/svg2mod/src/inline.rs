//! Hole inlining.
//!
//! The footprint formats draw a filled polygon as one outline and have no
//! notion of holes. A letter "O" therefore has to be drawn as a single
//! closed walk: along the outer contour to a bridge point, across the
//! bridge, once around the hole, and back across the same bridge.
//!
//! ```text
//!   +-----------+          +-----------+
//!   |           |          |           |
//!   |   +---+   |   ==>    |   +---+   |
//!   |   |   |   |          |   |   |   |
//!   |   +---+   |          |  /+---+   |
//!   |           |          | /         |
//!   +-----------+          +/----------+
//! ```
//!
//! ## Rust Lesson #27: Bounded Loops
//!
//! Finding a bridge is a search that may revise its own candidate when the
//! candidate clips a polygon it is allowed to touch. Written as recursion it
//! can chase its tail forever on awkward input; as a `for` loop over a fixed
//! number of steps it always terminates, and the caller just moves on to the
//! next candidate pair.

use std::iter::once;

use log::debug;
use thiserror::Error;

use crate::geometry::{Point, Segment};
use crate::polygon::PolygonSegment;

/// Upper bound on candidate revisions for a single bridge.
const MAX_WALK_STEPS: usize = 64;

/// No bridge to a hole could be found that stays clear of the other
/// outlines.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("no bridge to hole {hole} of {holes} avoids the other outlines")]
pub struct BridgeError {
    /// Index of the hole in bridging order.
    pub hole: usize,
    pub holes: usize,
}

/// A chosen bridge and the hole outline to splice in after it.
struct Insertion {
    /// Where the bridge starts, on the outline or an already bridged hole.
    from: Point,
    /// The hole, rotated to start and end where the bridge lands.
    hole_points: Vec<Point>,
    /// Index of the hole among all polygons.
    hole: usize,
}

impl Insertion {
    fn bridge(&self) -> Segment {
        Segment::new(self.from, self.hole_points[0])
    }
}

/// Sort largest first and pair every outline with the outlines directly
/// inside it. Outlines nested inside a hole are islands and come back as
/// outlines of their own. Unfilled shapes never get holes, and outlines
/// with fewer than three points are never treated as one.
pub fn group_nested(mut segments: Vec<PolygonSegment>, fill: bool) -> Vec<(PolygonSegment, Vec<PolygonSegment>)> {
    segments.sort_by(|a, b| b.bbox.diagonal().total_cmp(&a.bbox.diagonal()));

    let mut groups = Vec::new();
    while !segments.is_empty() {
        let outer = segments.remove(0);
        let mut holes: Vec<PolygonSegment> = Vec::new();
        let mut rest = Vec::with_capacity(segments.len());

        for seg in segments {
            let inside = fill
                && seg.points.len() >= 3
                && !outer.are_distinct(&seg)
                && holes.iter().all(|h| h.are_distinct(&seg));
            if inside {
                holes.push(seg);
            } else {
                rest.push(seg);
            }
        }

        segments = rest;
        groups.push((outer, holes));
    }
    groups
}

impl PolygonSegment {
    /// This outline with `holes` spliced in, as one closed point list.
    ///
    /// Holes are bridged nearest first (by the distance from this outline's
    /// first point to the hole's bounding-box corner) and are walked in the
    /// opposite direction to the outline, so the result's signed area is the
    /// outline's minus the holes'.
    pub fn inline(&self, holes: &[PolygonSegment]) -> Result<Vec<Point>, BridgeError> {
        if holes.is_empty() {
            return Ok(self.points.clone());
        }
        debug!("  Inlining {} segments...", holes.len());

        let origin = self.points[0];
        let mut holes = holes.to_vec();
        holes.sort_by(|a, b| origin.distance(a.bbox.min).total_cmp(&origin.distance(b.bbox.min)));

        let orientation = self.signed_area().signum();
        for hole in &mut holes {
            if orientation != 0.0 && hole.signed_area().signum() == orientation {
                hole.reverse();
            }
        }

        // Holes first, this outline last.
        let all: Vec<&PolygonSegment> = holes.iter().chain(once(self)).collect();

        let mut insertions: Vec<Insertion> = Vec::new();
        for index in 0..holes.len() {
            let insertion = find_insertion(&all, index, &insertions).ok_or(BridgeError {
                hole: index,
                holes: holes.len(),
            })?;
            insertions.push(insertion);
        }

        let mut points = self.points.clone();
        for insertion in &insertions {
            let ip = points
                .iter()
                .position(|p| *p == insertion.from)
                .ok_or(BridgeError {
                    hole: insertion.hole,
                    holes: holes.len(),
                })?;
            let anchor = points[ip];
            let hole = &insertion.hole_points;
            // A hole touching the outline needs no bridge of its own.
            let body = if anchor == hole[0] { &hole[1..hole.len() - 1] } else { &hole[..] };
            let spliced: Vec<Point> = body.iter().copied().chain(once(anchor)).collect();
            points.splice(ip + 1..ip + 1, spliced);
        }

        Ok(points)
    }
}

/// Search for a bridge to `all[hole]`, trying hole vertices in order, then
/// connected polygons, then their vertices. The first acceptable bridge wins.
fn find_insertion(all: &[&PolygonSegment], hole: usize, insertions: &[Insertion]) -> Option<Insertion> {
    let outer = all.len() - 1;
    let connected: Vec<usize> = once(outer).chain(insertions.iter().map(|i| i.hole)).collect();
    let bridges: Vec<Segment> = insertions.iter().map(Insertion::bridge).collect();
    let target = all[hole];

    for hp in 0..target.points.len().saturating_sub(1) {
        for &poly in &connected {
            let candidates = &all[poly].points;
            for pp in 0..candidates.len().saturating_sub(1) {
                let Some((from, landing)) =
                    walk_bridge(all, hole, &connected, &bridges, candidates[pp], target.points[hp])
                else {
                    continue;
                };
                let index = target.points.iter().position(|p| *p == landing)?;
                return Some(Insertion {
                    from,
                    hole_points: target.points_starting_on_index(index),
                    hole,
                });
            }
        }
    }
    None
}

/// Validate the bridge `from -> to`, revising it when it clips a polygon it
/// is allowed to touch (the hole itself or anything already connected).
///
/// Clipping the target hole moves the landing point to the clipped edge's
/// start; clipping a connected polygon moves the bridge start instead. The
/// other end of the clipped edge is kept as a fallback for when the revised
/// bridge turns out to be blocked.
fn walk_bridge(
    all: &[&PolygonSegment],
    hole: usize,
    connected: &[usize],
    bridges: &[Segment],
    from: Point,
    to: Point,
) -> Option<(Point, Point)> {
    let mut bridge = Segment::new(from, to);
    let mut landing = to;
    let mut fallback: Option<Segment> = None;

    for _ in 0..MAX_WALK_STEPS {
        if bridges.iter().any(|b| bridge.intersects(b)) {
            return None;
        }

        let mut revised = false;
        let mut blocked = false;

        for (k, poly) in all.iter().enumerate() {
            let related = k == hole || connected.contains(&k);
            if !related {
                if poly.intersects(&bridge, false) {
                    blocked = true;
                    break;
                }
                continue;
            }
            if let Some(edge) = poly.intersecting_edge(&bridge, true) {
                revised = true;
                if k == hole {
                    landing = edge.start;
                    bridge = Segment::new(bridge.start, edge.start);
                    fallback = Some(Segment::new(bridge.start, edge.end));
                } else {
                    bridge = Segment::new(edge.start, landing);
                    fallback = Some(Segment::new(edge.end, landing));
                }
                break;
            }
        }

        if !revised && !blocked {
            return Some((bridge.start, landing));
        }
        if blocked {
            let next = fallback.take()?;
            bridge = next;
            landing = next.end;
        }
    }

    None
}

// ============================================================================
// TESTS
// ============================================================================

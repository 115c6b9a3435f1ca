//! # svg2mod
//!
//! Convert layered SVG drawings into KiCad footprint modules.
//!
//! The pipeline is strictly one-way:
//!
//! ```text
//! markup ─► Document (svg) ─► layers (layer) ─► flattened outlines (path, shape)
//!        ─► holes inlined (polygon, inline) ─► .mod / .kicad_mod text (export)
//! ```
//!
//! ## Rust Lesson #7: Modules
//!
//! Every module is declared here with `pub mod`, and the types most
//! callers need are re-exported with `pub use` so they can write
//! `svg2mod::Document` instead of `svg2mod::svg::Document`.

pub mod error;
pub mod export;
pub mod geometry;
pub mod inline;
pub mod layer;
pub mod matrix;
pub mod path;
pub mod polygon;
pub mod shape;
pub mod svg;

/// Log target for progress messages that are shown at any verbosity.
pub const UNFILTERED: &str = "svg2mod::unfiltered";

// Re-export common types at crate root for convenience.
pub use error::{Error, Result};
pub use export::{
    build_footprint, Dialect, ExportOptions, Footprint, FootprintInfo, Legacy, LegacyUpdater, Pretty, Units,
};
pub use geometry::{BoundingBox, Point, Segment};
pub use inline::BridgeError;
pub use layer::{force_layer, prune_to_layers, Format, LayerTable, MatchedLayer, Pruned, TargetLayer};
pub use matrix::Matrix;
pub use path::{Path, PathCommand, PathError};
pub use polygon::PolygonSegment;
pub use shape::{Shape, ShapeKind, Style};
pub use svg::{Document, Group, Item, Node};

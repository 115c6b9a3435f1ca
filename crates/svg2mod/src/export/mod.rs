//! Footprint export.
//!
//! [`Footprint`] is the format-independent half of the exporter: it prunes
//! the document down to the layers of the target format, works out the
//! translation and scale, flattens every item, inlines holes and hands the
//! resulting point lists to a [`Dialect`], which only knows how to spell
//! them.
//!
//! ## Rust Lesson #31: Strategy Objects with Traits
//!
//! The three output formats differ in *how* a polygon or a pad is written,
//! not in *what* gets written. A trait with one method per record type
//! captures exactly that difference:
//!
//! ```text
//! Footprint::write(&mut dialect)
//!     dialect.library_intro(..)
//!     for each module: module_header, polygon/outline/thru_hole.., module_footer
//!     dialect.library_footer(..)
//! ```
//!
//! The driver is generic over `D: Dialect + ?Sized`, so it works with a
//! concrete type (monomorphized) as well as with a `&mut dyn Dialect`
//! picked at runtime.

pub mod legacy;
pub mod pretty;

use std::fmt;

use chrono::{DateTime, Local};
use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::geometry::{self, BoundingBox, Point};
use crate::inline::group_nested;
use crate::layer::{self, Format, LayerTable, MatchedLayer, Pruned, TargetLayer};
use crate::polygon::PolygonSegment;
use crate::shape::{Shape, ShapeKind};
use crate::svg::{Document, Group, Item, Node};

pub use legacy::{Legacy, LegacyUpdater};
pub use pretty::Pretty;

/// Smallest stroke width written; zero widths are replaced by this.
pub const MINIMUM_SIZE: f64 = 1e-5;

/// Keepout zones are always filled and drawn with this width (mm).
pub const KEEPOUT_WIDTH: f64 = 0.508;

/// Decimal units per inch.
const DECIMAL_PER_INCH: f64 = 10000.0;
const MM_PER_INCH: f64 = 25.4;
const MM_PER_DECIMAL: f64 = 0.00254;

/// Label placement and size, in decimal units.
const LABEL_OFFSET: f64 = 1200.0;
const LABEL_SIZE: f64 = 600.0;
const LABEL_PEN: f64 = 120.0;

/// Coordinate unit of the output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Units {
    Mm,
    /// Ten-thousandths of an inch, written as integers.
    Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub format: Format,
    /// Center the content on the origin.
    pub center: bool,
    pub scale_factor: f64,
    /// Flattening precision in document units.
    pub precision: f64,
    pub units: Units,
    pub dpi: f64,
    /// Write every `F.Cu`/`B.Cu` shape as a custom pad.
    pub convert_pads: bool,
    /// RDP tolerance applied to flattened outlines; 0 disables it.
    pub simplify: f64,
    pub ignore_hidden: bool,
    /// Treat the whole drawing as this layer.
    pub force_layer: Option<String>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: Format::Latest,
            center: false,
            scale_factor: 1.0,
            precision: 5.0,
            units: Units::Mm,
            dpi: 96.0,
            convert_pads: false,
            simplify: 0.0,
            ignore_hidden: false,
            force_layer: None,
        }
    }
}

/// Module name, value and provenance written into the file.
#[derive(Debug, Clone, PartialEq)]
pub struct FootprintInfo {
    pub module_name: String,
    pub module_value: String,
    pub created: DateTime<Local>,
    /// The invoking command line, quoted for display.
    pub command_line: String,
}

impl Default for FootprintInfo {
    fn default() -> Self {
        Self {
            module_name: "svg2mod".to_string(),
            module_value: "G***".to_string(),
            created: Local::now(),
            command_line: String::new(),
        }
    }
}

/// A number as written to the output: integral values without a fraction,
/// float noise past 12 places dropped and no negative zero.
#[derive(Debug, Clone, Copy)]
pub struct Num(pub f64);

impl fmt::Display for Num {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = (self.0 * 1e12).round() / 1e12;
        let v = if v == 0.0 { 0.0 } else { v };
        write!(f, "{}", v)
    }
}

/// Per-module values handed to the dialect.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleContext {
    pub name: String,
    pub value: String,
    pub flip: bool,
    pub reference_y: f64,
    pub value_y: f64,
    pub label_size: f64,
    pub label_pen: f64,
}

/// One flattened outline ready to be written.
#[derive(Debug, Clone, Copy)]
pub struct Outline<'a> {
    pub points: &'a [Point],
    pub layer: &'a TargetLayer,
    pub stroke_width: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ThruHole<'a> {
    pub center: Point,
    pub radius: f64,
    pub stroke_width: f64,
    pub layer: &'a TargetLayer,
}

impl ThruHole<'_> {
    pub fn plated(&self) -> bool {
        self.layer.name == "Drill.Cu"
    }

    /// `(pad size, drill size)`. A stroke widens the annular ring; on
    /// unplated holes the drill follows the outer edge.
    pub fn sizes(&self) -> (f64, f64) {
        let mut drill = 2.0 * self.radius;
        if self.stroke_width > 0.0 {
            let size = self.stroke_width + drill;
            if self.plated() {
                drill -= self.stroke_width;
                (size, drill)
            } else {
                (size, size)
            }
        } else {
            (drill, drill)
        }
    }
}

/// The format-specific half of the exporter.
pub trait Dialect {
    /// Whether a mirrored `-rev` module follows the front one.
    fn writes_reverse(&self) -> bool {
        false
    }

    fn library_intro(&mut self, out: &mut String, footprint: &Footprint) -> Result<()>;

    fn module_header(&mut self, out: &mut String, footprint: &Footprint, module: &ModuleContext) -> Result<()>;

    fn module_footer(&mut self, out: &mut String, footprint: &Footprint, module: &ModuleContext) -> Result<()>;

    fn library_footer(&mut self, _out: &mut String, _footprint: &Footprint) -> Result<()> {
        Ok(())
    }

    /// A closed, filled outline.
    fn polygon(&mut self, out: &mut String, footprint: &Footprint, outline: &Outline) -> Result<()>;

    /// A stroked, unfilled outline.
    fn outline(&mut self, out: &mut String, footprint: &Footprint, outline: &Outline) -> Result<()>;

    fn thru_hole(&mut self, out: &mut String, footprint: &Footprint, hole: &ThruHole) -> Result<()>;
}

// ============================================================================
// PAINT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
struct Paint {
    fill: bool,
    stroke: bool,
    stroke_width: f64,
}

// ============================================================================
// FOOTPRINT
// ============================================================================

/// A document pruned to one format's layers, positioned for output.
#[derive(Debug, Clone)]
pub struct Footprint {
    pruned: Pruned,
    bbox: BoundingBox,
    options: ExportOptions,
    info: FootprintInfo,
    translation: Point,
    scale: f64,
}

impl Footprint {
    pub fn new(mut document: Document, options: ExportOptions, info: FootprintInfo) -> Result<Self> {
        if options.format.is_pretty() && options.units == Units::Decimal {
            return Err(Error::Config(format!(
                "decimal units are only supported by the legacy format, not {}",
                options.format
            )));
        }

        if options.ignore_hidden {
            document.prune_hidden();
        }
        if let Some(name) = &options.force_layer {
            layer::force_layer(&mut document, name);
        }

        let table = LayerTable::new(options.format)?;
        let pruned = layer::prune_to_layers(document, &table)?;
        if pruned.item_count() == 0 {
            return Err(Error::NoContent);
        }

        let bbox = pruned.bounding_box();
        let translation = if options.center {
            -bbox.center()
        } else {
            Point::default()
        };

        let per_inch = match options.units {
            Units::Mm => MM_PER_INCH,
            Units::Decimal => DECIMAL_PER_INCH,
        };
        let scale = options.scale_factor * per_inch / options.dpi;
        debug!("Output scale: {} per px, translation ({}, {})", scale, translation.x, translation.y);

        Ok(Self {
            pruned,
            bbox,
            options,
            info,
            translation,
            scale,
        })
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    pub fn info(&self) -> &FootprintInfo {
        &self.info
    }

    pub fn layers(&self) -> &[MatchedLayer] {
        &self.pruned.layers
    }

    /// Output units per document pixel.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Name of the front module, or of its mirrored twin.
    pub fn module_name(&self, flip: bool) -> String {
        if flip {
            format!("{}-rev", self.info.module_name)
        } else {
            self.info.module_name.clone()
        }
    }

    /// Document coordinates to output coordinates.
    pub fn transform_point(&self, p: Point, flip: bool) -> Point {
        let mut q = (p + self.translation) * self.scale;
        if flip {
            q.x = -q.x;
        }
        match self.options.units {
            Units::Decimal => Point::new(q.x.round(), q.y.round()),
            Units::Mm => q.round(12),
        }
    }

    /// Decimal-unit lengths converted to the output unit.
    fn label_length(&self, decimal: f64) -> f64 {
        match self.options.units {
            Units::Decimal => decimal,
            Units::Mm => decimal * MM_PER_DECIMAL,
        }
    }

    fn module_context(&self, flip: bool) -> ModuleContext {
        let min = self.transform_point(self.bbox.min, false);
        let max = self.transform_point(self.bbox.max, false);
        let offset = self.label_length(LABEL_OFFSET);
        ModuleContext {
            name: self.module_name(flip),
            value: self.info.module_value.clone(),
            flip,
            reference_y: min.y - offset,
            value_y: max.y + offset,
            label_size: self.label_length(LABEL_SIZE),
            label_pen: self.label_length(LABEL_PEN),
        }
    }

    /// Render the whole library into a string.
    pub fn write<D: Dialect + ?Sized>(&self, dialect: &mut D) -> Result<String> {
        let mut out = String::new();
        dialect.library_intro(&mut out, self)?;
        self.write_module(&mut out, dialect, false)?;
        if dialect.writes_reverse() {
            self.write_module(&mut out, dialect, true)?;
        }
        dialect.library_footer(&mut out, self)?;
        Ok(out)
    }

    fn write_module<D: Dialect + ?Sized>(&self, out: &mut String, dialect: &mut D, flip: bool) -> Result<()> {
        let module = self.module_context(flip);
        dialect.module_header(out, self, &module)?;
        for layer in &self.pruned.layers {
            self.write_group(out, dialect, layer, &layer.group, flip)?;
        }
        dialect.module_footer(out, self, &module)
    }

    fn write_group<D: Dialect + ?Sized>(
        &self,
        out: &mut String,
        dialect: &mut D,
        layer: &MatchedLayer,
        group: &Group,
        flip: bool,
    ) -> Result<()> {
        for child in &group.children {
            match child {
                Node::Group(g) => self.write_group(out, dialect, layer, g, flip)?,
                Node::Item(item) => self.write_item(out, dialect, layer, item, flip)?,
            }
        }
        Ok(())
    }

    fn paint(&self, item: &Item, target: &TargetLayer) -> Paint {
        let mut fill = item.style.fills();
        let mut stroke = item.style.strokes();
        let mut stroke_width = item.style.stroke_width * self.scale;
        if stroke_width == 0.0 {
            stroke_width = MINIMUM_SIZE;
        }

        if !self.options.ignore_hidden && !fill && !stroke {
            stroke = true;
            stroke_width = stroke_width.max(MINIMUM_SIZE);
        }
        if !stroke {
            stroke_width = 0.0;
        }

        if target.name == "Edge.Cuts" {
            fill = false;
            stroke = true;
            stroke_width = stroke_width.max(MINIMUM_SIZE);
        } else if target.is_keepout() {
            fill = true;
            stroke_width = KEEPOUT_WIDTH;
        }

        Paint {
            fill,
            stroke,
            stroke_width,
        }
    }

    fn write_item<D: Dialect + ?Sized>(
        &self,
        out: &mut String,
        dialect: &mut D,
        layer: &MatchedLayer,
        item: &Item,
        flip: bool,
    ) -> Result<()> {
        let target = &layer.target;
        let paint = self.paint(item, target);
        let kind = item.shape.kind_name();

        if target.is_drill() {
            let ShapeKind::Ellipse(ellipse) = &item.shape else {
                warn!("Non-circle SVG element on drill layer {}: {}", target.name, kind);
                return Ok(());
            };
            let (rx, ry) = ellipse.radii();
            if !ellipse.circle {
                info!("Converting ellipse to a drill hole with the mean radius of {} and {}", rx, ry);
            }
            let hole = ThruHole {
                center: self.transform_point(ellipse.center(), flip),
                radius: (rx + ry) / 2.0 * self.scale,
                stroke_width: paint.stroke_width,
                layer: target,
            };
            return dialect.thru_hole(out, self, &hole);
        }

        if let ShapeKind::Unsupported { tag } = &item.shape {
            warn!("Unsupported SVG element: {}", tag);
            return Ok(());
        }

        let mut segments: Vec<PolygonSegment> = item
            .shape
            .segments(self.options.precision)
            .into_iter()
            .filter_map(|points| {
                if self.options.simplify > 0.0 {
                    PolygonSegment::new(geometry::simplify(&points, self.options.simplify))
                } else {
                    PolygonSegment::new(points)
                }
            })
            .collect();
        for segment in &mut segments {
            segment.process(|p| self.transform_point(p, false), flip, paint.fill);
        }

        if segments.len() > 1 {
            for (outer, holes) in group_nested(segments, paint.fill) {
                let points = outer.inline(&holes).map_err(|source| Error::Bridge {
                    layer: layer.raw_name.clone(),
                    item: item_label(item),
                    source,
                })?;
                self.write_polygon(out, dialect, target, &paint, kind, &points)?;
            }
        } else {
            for segment in &segments {
                self.write_polygon(out, dialect, target, &paint, kind, &segment.points)?;
            }
        }
        Ok(())
    }

    fn write_polygon<D: Dialect + ?Sized>(
        &self,
        out: &mut String,
        dialect: &mut D,
        target: &TargetLayer,
        paint: &Paint,
        kind: &str,
        points: &[Point],
    ) -> Result<()> {
        if points.is_empty() {
            info!("  Skipping {} with 0 points", kind);
            return Ok(());
        }
        info!("  Writing {} with {} points", kind, points.len());

        if paint.fill && points.len() > 2 {
            let outline = Outline {
                points,
                layer: target,
                stroke_width: paint.stroke_width,
            };
            dialect.polygon(out, self, &outline)
        } else if paint.stroke {
            let doubled;
            let points = if points.len() == 1 {
                doubled = [points[0], points[0]];
                &doubled[..]
            } else {
                points
            };
            let outline = Outline {
                points,
                layer: target,
                stroke_width: paint.stroke_width,
            };
            dialect.outline(out, self, &outline)
        } else {
            if points.len() < 3 {
                debug!("Not writing non-polygon with no stroke.");
            } else {
                debug!("Polygon has no stroke or fill. Skipping.");
            }
            Ok(())
        }
    }
}

fn item_label(item: &Item) -> String {
    item.name
        .clone()
        .or_else(|| item.id.clone())
        .unwrap_or_else(|| item.shape.kind_name().to_string())
}

/// Convert a parsed document with the dialect `options.format` selects.
/// Existing legacy libraries are updated through [`LegacyUpdater`] instead.
pub fn build_footprint(document: Document, options: ExportOptions, info: FootprintInfo) -> Result<String> {
    let footprint = Footprint::new(document, options, info)?;
    match footprint.options.format {
        Format::Legacy => footprint.write(&mut Legacy),
        Format::Pretty | Format::Latest => footprint.write(&mut Pretty),
    }
}

// ============================================================================
// TESTS
// ============================================================================

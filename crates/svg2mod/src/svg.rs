//! SVG document parsing.
//!
//! Streams the markup with quick-xml and builds a small tree of groups and
//! drawable items. There is no CSS engine here: presentation attributes and
//! the `style` attribute are read directly and inherited down the tree.
//!
//! ## Coordinate Pipeline
//!
//! ```text
//! element geometry ──local transform──► parent ... ──viewBox──► document units
//! ```
//!
//! Every node keeps its own `transform` as parsed. Once the whole tree is
//! built, [`Group::apply_transforms`] walks it top-down, multiplying each
//! local matrix onto the accumulated one exactly once and transforming the
//! item geometry in place. After that, all geometry is in document pixels.

use std::collections::HashMap;
use std::str::FromStr;

use log::{debug, info, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use svgtypes::{Length, LengthUnit, PointsParser, ViewBox};

use crate::UNFILTERED;
use crate::error::{Error, Result};
use crate::geometry::{BoundingBox, Point};
use crate::matrix::Matrix;
use crate::path::Path;
use crate::shape::{Ellipse, Polyline, Rect, Shape, ShapeKind, Style};

/// Viewport assumed when percentages have nothing better to refer to.
const DEFAULT_VIEWPORT: (f64, f64) = (800.0, 600.0);

/// A parsed SVG document.
#[derive(Debug, Clone)]
pub struct Document {
    pub root: Group,
    /// Document units per user unit of the root viewBox, rounded to 6 places.
    pub viewport_scale: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Group(Group),
    Item(Item),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Group {
    pub id: Option<String>,
    /// Editor label, falling back to the id.
    pub name: Option<String>,
    pub hidden: bool,
    pub style: Style,
    /// The node's own transform.
    pub matrix: Matrix,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: Option<String>,
    pub name: Option<String>,
    pub hidden: bool,
    pub style: Style,
    pub matrix: Matrix,
    pub shape: ShapeKind,
}

// ============================================================================
// LENGTHS
// ============================================================================

/// Reference length for percentages of the attribute `name`.
fn percent_reference(name: &str) -> f64 {
    let (w, h) = DEFAULT_VIEWPORT;
    match name {
        "x" | "cx" | "rx" | "x1" | "x2" | "width" | "dx" => w,
        "y" | "cy" | "ry" | "y1" | "y2" | "height" | "dy" => h,
        _ => ((w * w + h * h) / 2.0).sqrt(),
    }
}

/// Convert a length to user units (CSS pixels at 96 DPI).
pub fn length_to_px(length: Length, reference: f64) -> f64 {
    let n = length.number;
    match length.unit {
        LengthUnit::None | LengthUnit::Px => n,
        LengthUnit::In => n * 96.0,
        LengthUnit::Cm => n * 96.0 / 2.54,
        LengthUnit::Mm => n * 96.0 / 25.4,
        LengthUnit::Pt => n * 96.0 / 72.0,
        LengthUnit::Pc => n * 16.0,
        LengthUnit::Em => n * 10.0,
        LengthUnit::Ex => n * 5.0,
        LengthUnit::Percent => n * reference / 100.0,
    }
}

/// Parse the length attribute `name` into user units.
pub fn parse_length(name: &str, value: &str) -> Result<f64> {
    let length = Length::from_str(value.trim()).map_err(|_| Error::attribute(name, value))?;
    Ok(length_to_px(length, percent_reference(name)))
}

// ============================================================================
// ATTRIBUTES
// ============================================================================

/// The attributes of one element, by local name. Namespaced attributes are
/// dropped except for the editor label.
struct Attributes {
    values: HashMap<String, String>,
    label: Option<String>,
}

impl Attributes {
    fn read(e: &BytesStart, position: u64) -> Result<Self> {
        let xml_error = |message: String| Error::Xml { position, message };

        let mut values = HashMap::new();
        let mut label = None;

        for attr in e.attributes() {
            let attr = attr.map_err(|err| xml_error(err.to_string()))?;
            let local = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|err| xml_error(err.to_string()))?
                .into_owned();

            if attr.key.prefix().is_some() {
                if local == "label" {
                    label = Some(value);
                }
                continue;
            }
            values.insert(local, value);
        }

        Ok(Self { values, label })
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    fn length(&self, name: &str) -> Result<Option<f64>> {
        self.get(name).map(|v| parse_length(name, v)).transpose()
    }

    fn length_or_zero(&self, name: &str) -> Result<f64> {
        Ok(self.length(name)?.unwrap_or(0.0))
    }

    fn id(&self) -> Option<String> {
        self.get("id").map(str::to_string)
    }

    fn name(&self) -> Option<String> {
        self.label.clone().or_else(|| self.id())
    }

    fn matrix(&self) -> Result<Matrix> {
        match self.get("transform") {
            Some(t) => Matrix::parse(t),
            None => Ok(Matrix::IDENTITY),
        }
    }

    /// Inherited style with this element's overrides, and whether the
    /// element is hidden.
    fn presentation(&self, parent: &Style) -> Result<(Style, bool)> {
        let mut style = parent.clone();
        let mut hidden = false;

        let mut apply = |name: &str, value: &str| -> Result<()> {
            match name {
                "display" => hidden |= value.trim() == "none",
                "visibility" => hidden |= matches!(value.trim(), "hidden" | "collapse"),
                _ => {
                    style.set(name, value)?;
                }
            }
            Ok(())
        };

        for name in [
            "fill",
            "fill-opacity",
            "stroke",
            "stroke-width",
            "stroke-opacity",
            "fill-rule",
            "display",
            "visibility",
        ] {
            if let Some(value) = self.get(name) {
                apply(name, value)?;
            }
        }

        if let Some(declarations) = self.get("style") {
            for declaration in declarations.split(';') {
                if let Some((name, value)) = declaration.split_once(':') {
                    apply(name.trim(), value)?;
                }
            }
        }

        Ok((style, hidden))
    }
}

// ============================================================================
// TREE
// ============================================================================

impl Node {
    pub fn name(&self) -> Option<&str> {
        match self {
            Node::Group(g) => g.name.as_deref(),
            Node::Item(i) => i.name.as_deref(),
        }
    }

    pub fn hidden(&self) -> bool {
        match self {
            Node::Group(g) => g.hidden,
            Node::Item(i) => i.hidden,
        }
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        match self {
            Node::Group(g) => g.bounding_box(),
            Node::Item(i) => i.shape.bounding_box(),
        }
    }
}

impl Group {
    /// An empty, visible group with the default style.
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::default()
        }
    }

    fn from_attributes(attrs: &Attributes, parent: &Style) -> Result<Self> {
        let (style, hidden) = attrs.presentation(parent)?;
        let mut matrix = attrs.matrix()?;
        // A nested <svg> is placed by its x/y.
        if let (Some(x), Some(y)) = (attrs.length("x")?, attrs.length("y")?) {
            matrix = Matrix::translate(x, y) * matrix;
        }
        Ok(Self {
            id: attrs.id(),
            name: attrs.name(),
            hidden,
            style,
            matrix,
            children: Vec::new(),
        })
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.children
            .iter()
            .filter_map(Node::bounding_box)
            .reduce(|a, b| a.union(&b))
    }

    /// Multiply every node's matrix onto `parent` and transform item
    /// geometry in place. Stroke widths scale with the mean axis scale.
    pub fn apply_transforms(&mut self, parent: &Matrix) {
        let accumulated = *parent * self.matrix;
        for child in &mut self.children {
            match child {
                Node::Group(g) => g.apply_transforms(&accumulated),
                Node::Item(item) => {
                    let m = accumulated * item.matrix;
                    if !m.is_identity() {
                        item.shape.transform(&m);
                    }
                    item.style.stroke_width *= m.mean_scale();
                }
            }
        }
    }

    /// Remove hidden children (and their subtrees), recursively.
    pub fn prune_hidden(&mut self) {
        self.children.retain(|child| {
            if child.hidden() {
                if let Some(name) = child.name() {
                    warn!("Ignoring hidden SVG item: {}", name);
                }
                false
            } else {
                true
            }
        });
        for child in &mut self.children {
            if let Node::Group(g) = child {
                g.prune_hidden();
            }
        }
    }

    /// Number of items below this group.
    pub fn item_count(&self) -> usize {
        self.children
            .iter()
            .map(|c| match c {
                Node::Group(g) => g.item_count(),
                Node::Item(_) => 1,
            })
            .sum()
    }
}

impl Item {
    /// An item in document coordinates with the default style.
    pub fn new(name: &str, shape: ShapeKind) -> Self {
        Self {
            id: None,
            name: Some(name.to_string()),
            hidden: false,
            style: Style::default(),
            matrix: Matrix::IDENTITY,
            shape,
        }
    }

    fn from_element(tag: &str, attrs: &Attributes, parent: &Style) -> Result<Option<Self>> {
        let (style, hidden) = attrs.presentation(parent)?;
        let name = attrs.name();
        let label = name.clone().unwrap_or_else(|| tag.to_string());

        let shape = match tag {
            "path" => {
                let d = attrs.get("d").unwrap_or("");
                let path = Path::parse(d).map_err(|source| Error::Path { item: label.clone(), source })?;
                ShapeKind::Path(path)
            }
            "rect" => ShapeKind::Rect(Rect::new(
                attrs.length_or_zero("x")?,
                attrs.length_or_zero("y")?,
                attrs.length_or_zero("width")?,
                attrs.length_or_zero("height")?,
                attrs.length("rx")?,
                attrs.length("ry")?,
            )),
            "circle" => {
                let r = attrs.length_or_zero("r")?;
                if r <= 0.0 {
                    debug!("Circle '{}' has no radius, skipping", label);
                    return Ok(None);
                }
                let center = Point::new(attrs.length_or_zero("cx")?, attrs.length_or_zero("cy")?);
                ShapeKind::Ellipse(Ellipse::circle(center, r))
            }
            "ellipse" => {
                let rx = attrs.length_or_zero("rx")?;
                let ry = attrs.length_or_zero("ry")?;
                if rx <= 0.0 || ry <= 0.0 {
                    debug!("Ellipse '{}' has no radius, skipping", label);
                    return Ok(None);
                }
                let center = Point::new(attrs.length_or_zero("cx")?, attrs.length_or_zero("cy")?);
                ShapeKind::Ellipse(Ellipse::new(center, rx, ry))
            }
            "line" => ShapeKind::Polyline(Polyline {
                points: vec![
                    Point::new(attrs.length_or_zero("x1")?, attrs.length_or_zero("y1")?),
                    Point::new(attrs.length_or_zero("x2")?, attrs.length_or_zero("y2")?),
                ],
                closed: false,
            }),
            "polyline" | "polygon" => {
                let points = PointsParser::from(attrs.get("points").unwrap_or(""))
                    .map(|(x, y)| Point::new(x, y))
                    .collect();
                ShapeKind::Polyline(Polyline {
                    points,
                    closed: tag == "polygon",
                })
            }
            other => ShapeKind::Unsupported { tag: other.to_string() },
        };

        if style.even_odd {
            warn!("Item '{}' uses fill-rule:evenodd, holes are detected from the geometry instead", label);
        }

        Ok(Some(Self {
            id: attrs.id(),
            name,
            hidden,
            style,
            matrix: attrs.matrix()?,
            shape,
        }))
    }
}

// ============================================================================
// DOCUMENT
// ============================================================================

const SHAPE_TAGS: &[&str] = &[
    "path", "rect", "circle", "ellipse", "line", "polyline", "polygon", "text", "image", "use",
];

const GROUP_TAGS: &[&str] = &["g", "a", "switch", "svg"];

/// Incremental tree builder fed by the XML event loop.
#[derive(Default)]
struct TreeBuilder {
    stack: Vec<Group>,
    root: Option<Group>,
    /// Depth inside a subtree being skipped.
    skip_depth: usize,
    viewport_scale: f64,
}

impl TreeBuilder {
    fn start(&mut self, e: &BytesStart, empty: bool, position: u64) -> Result<()> {
        if self.skip_depth > 0 {
            if !empty {
                self.skip_depth += 1;
            }
            return Ok(());
        }

        let tag = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();

        let Some(parent) = self.stack.last_mut() else {
            if self.root.is_some() {
                return Err(Error::Xml {
                    position,
                    message: format!("unexpected <{}> after the root element", tag),
                });
            }
            if tag != "svg" {
                return Err(Error::Xml {
                    position,
                    message: format!("root element is <{}>, expected <svg>", tag),
                });
            }
            let attrs = Attributes::read(e, position)?;
            let root = self.root_group(&attrs)?;
            if empty {
                self.root = Some(root);
            } else {
                self.stack.push(root);
            }
            return Ok(());
        };

        if GROUP_TAGS.contains(&tag.as_str()) {
            let attrs = Attributes::read(e, position)?;
            let group = Group::from_attributes(&attrs, &parent.style)?;
            if empty {
                parent.children.push(Node::Group(group));
            } else {
                self.stack.push(group);
            }
            return Ok(());
        }

        if SHAPE_TAGS.contains(&tag.as_str()) {
            let attrs = Attributes::read(e, position)?;
            if let Some(item) = Item::from_element(&tag, &attrs, &parent.style)? {
                parent.children.push(Node::Item(item));
            }
        } else {
            debug!("Skipping <{}> element", tag);
        }

        if !empty {
            self.skip_depth = 1;
        }
        Ok(())
    }

    fn end(&mut self) {
        if self.skip_depth > 0 {
            self.skip_depth -= 1;
            return;
        }
        let Some(group) = self.stack.pop() else {
            return;
        };
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(Node::Group(group)),
            None => self.root = Some(group),
        }
    }

    /// The `<svg>` element: size, viewBox and the matrix mapping the
    /// viewBox onto the document size.
    fn root_group(&mut self, attrs: &Attributes) -> Result<Group> {
        let view_box = attrs
            .get("viewBox")
            .map(|v| ViewBox::from_str(v).map_err(|_| Error::attribute("viewBox", v)))
            .transpose()?;

        let width = attrs.length("width")?;
        let height = attrs.length("height")?;

        let (width, height) = match (width, height, view_box) {
            (Some(w), Some(h), _) => (w, h),
            (w, h, Some(vb)) => (w.unwrap_or(vb.w), h.unwrap_or(vb.h)),
            _ => return Err(Error::MissingSize),
        };

        let mut group = Group::from_attributes(attrs, &Style::default())?;
        group.matrix = attrs.matrix()?;
        self.viewport_scale = 1.0;

        if let Some(vb) = view_box {
            if vb.w > 0.0 && vb.h > 0.0 && width > 0.0 && height > 0.0 {
                let fit = Matrix::scale(width / vb.w, height / vb.h) * Matrix::translate(-vb.x, -vb.y);
                group.matrix = fit * group.matrix;
                self.viewport_scale = ((vb.w / width) * 1e6).round() / 1e6;
                info!("SVG viewport scale: {}", self.viewport_scale);
            }
        }

        debug!("SVG size {}x{} px", width, height);
        Ok(group)
    }

    fn finish(mut self) -> Result<Document> {
        // Unclosed groups are folded up so a truncated file still reports
        // the XML error first.
        while !self.stack.is_empty() {
            self.end();
        }
        let root = self.root.ok_or_else(|| Error::Xml {
            position: 0,
            message: "no <svg> element found".to_string(),
        })?;
        Ok(Document {
            root,
            viewport_scale: self.viewport_scale,
        })
    }
}

impl Document {
    /// Parse SVG markup and bring all geometry into document coordinates.
    pub fn parse(content: &str) -> Result<Document> {
        info!(target: UNFILTERED, "Parsing SVG...");

        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);

        let mut builder = TreeBuilder::default();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => builder.start(e, false, reader.buffer_position())?,
                Ok(Event::Empty(ref e)) => builder.start(e, true, reader.buffer_position())?,
                Ok(Event::End(_)) => builder.end(),
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::Xml {
                        position: reader.error_position(),
                        message: e.to_string(),
                    });
                }
                _ => {}
            }
            buf.clear();
        }

        let mut document = builder.finish()?;
        document.root.apply_transforms(&Matrix::IDENTITY);
        Ok(document)
    }

    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Document> {
        let content = std::fs::read_to_string(path)?;
        Document::parse(&content)
    }

    /// Bounds of everything in the document; a zero box at the origin when
    /// there is nothing.
    pub fn bounding_box(&self) -> BoundingBox {
        self.root
            .bounding_box()
            .unwrap_or_else(|| BoundingBox::new(Point::default(), Point::default()))
    }

    /// Append an already-built item under a new group named `layer`. The
    /// item is taken as being in document coordinates.
    pub fn add_item(&mut self, layer: &str, item: Item) {
        let mut group = Group::named(layer);
        group.children.push(Node::Item(item));
        self.root.children.push(Node::Group(group));
    }

    pub fn prune_hidden(&mut self) {
        self.root.prune_hidden();
    }
}

// ============================================================================
// TESTS
// ============================================================================

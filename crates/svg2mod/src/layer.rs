//! Mapping SVG groups onto footprint layers.
//!
//! A group (or a single item) whose name matches one of the recognized
//! layer names is exported to that layer. The name may carry options
//! after the first `:` or `;`:
//!
//! ```text
//! F.Cu;pad:3,mask                      copper pad number 3 with a mask opening
//! F.Cu:pad                             unnumbered copper pad
//! F&B.Keepout;allowed:vias;hatch:edge  keepout zone on both outer layers
//! ```
//!
//! Options are only understood by the s-expression formats; the legacy
//! format has no pads or zones and ignores them.

use std::collections::BTreeMap;
use std::fmt;

use log::{debug, info, warn};
use regex::Regex;

use crate::UNFILTERED;
use crate::error::{Error, Result};
use crate::geometry::{BoundingBox, Point};
use crate::svg::{Document, Group, Node};

/// Output file dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Line-oriented `.mod` libraries.
    Legacy,
    /// S-expression `.kicad_mod` files as read by KiCad 5.
    Pretty,
    /// S-expression `.kicad_mod` files with keepout zones (KiCad 6+).
    Latest,
}

impl Format {
    pub fn is_pretty(self) -> bool {
        matches!(self, Format::Pretty | Format::Latest)
    }

    pub fn extension(self) -> &'static str {
        match self {
            Format::Legacy => ".mod",
            Format::Pretty | Format::Latest => ".kicad_mod",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Format::Legacy => "legacy",
            Format::Pretty => "pretty",
            Format::Latest => "latest",
        })
    }
}

/// Items a keepout zone may still allow.
pub const KEEPOUT_ALLOWED: [&str; 5] = ["tracks", "vias", "pads", "copperpour", "footprints"];

/// (layer, legacy layer number)
const LEGACY_LAYERS: [(&str, u8); 15] = [
    ("F.Cu", 15),
    ("B.Cu", 0),
    ("F.Adhes", 17),
    ("B.Adhes", 16),
    ("F.Paste", 19),
    ("B.Paste", 18),
    ("F.SilkS", 21),
    ("B.SilkS", 20),
    ("F.Mask", 23),
    ("B.Mask", 22),
    ("Dwgs.User", 24),
    ("Cmts.User", 25),
    ("Eco1.User", 26),
    ("Eco2.User", 27),
    ("Edge.Cuts", 28),
];

const PRETTY_EXTRA_LAYERS: [&str; 6] = ["F.CrtYd", "B.CrtYd", "F.Fab", "B.Fab", "Drill.Cu", "Drill.Mech"];

pub const KEEPOUT: &str = "Keepout";

// ============================================================================
// OPTIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PadOptions {
    /// Pad number; an unnumbered pad is written with an empty name.
    pub number: Option<u32>,
    pub mask: bool,
    pub paste: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepoutSide {
    Front,
    Back,
    Inner,
}

impl KeepoutSide {
    fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'F' => Some(KeepoutSide::Front),
            'B' => Some(KeepoutSide::Back),
            'I' => Some(KeepoutSide::Inner),
            _ => None,
        }
    }

    pub fn letter(self) -> char {
        match self {
            KeepoutSide::Front => 'F',
            KeepoutSide::Back => 'B',
            KeepoutSide::Inner => 'I',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct KeepoutOptions {
    pub sides: Vec<KeepoutSide>,
    /// Entries of [`KEEPOUT_ALLOWED`] the zone permits.
    pub allowed: Vec<String>,
    /// `none`, `edge` or `full`; `None` means full.
    pub hatch: Option<String>,
}

/// A resolved output layer.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetLayer {
    /// Layer name in the output file, `Keepout` for zones.
    pub name: &'static str,
    /// Layer number in the legacy format.
    pub number: Option<u8>,
    pub pad: Option<PadOptions>,
    pub keepout: Option<KeepoutOptions>,
}

impl TargetLayer {
    pub fn is_keepout(&self) -> bool {
        self.name == KEEPOUT
    }

    pub fn is_drill(&self) -> bool {
        self.name.starts_with("Drill.")
    }

    pub fn is_copper(&self) -> bool {
        self.name.ends_with(".Cu")
    }

    /// `F.Cu` → `F`, used to derive the matching mask and paste layers.
    pub fn side_prefix(&self) -> &str {
        self.name.split('.').next().unwrap_or(self.name)
    }
}

/// Split a raw layer name at the first `:` or `;` into base and options.
pub fn split_layer_name(raw: &str) -> (&str, Option<&str>) {
    match raw.find([':', ';']) {
        Some(i) => (&raw[..i], Some(&raw[i + 1..])),
        None => (raw, None),
    }
}

fn parse_keepout_sides(base: &str) -> Result<Vec<KeepoutSide>> {
    let prefix = base.strip_suffix(".Keepout").unwrap_or(base);
    let bad = |letter: &str| Error::Layer {
        layer: base.to_string(),
        message: format!("unexpected keepout layer '{}'", letter),
    };

    if prefix == "*" {
        return Ok(vec![KeepoutSide::Front, KeepoutSide::Back, KeepoutSide::Inner]);
    }

    let mut sides = Vec::new();
    for letter in prefix.chars().filter(|c| *c != '&') {
        let side = KeepoutSide::from_letter(letter).ok_or_else(|| bad(&letter.to_string()))?;
        if !sides.contains(&side) {
            sides.push(side);
        }
    }
    if sides.is_empty() {
        return Err(bad(prefix));
    }
    Ok(sides)
}

fn parse_pad_option(arg: &str, name: &str, pad: &mut PadOptions) {
    let Some((_, values)) = arg.split_once(':') else {
        return;
    };
    for value in values.split(',').map(str::trim).filter(|v| !v.is_empty()) {
        if let Ok(number) = value.parse::<u32>() {
            pad.number = Some(number);
        } else if value.eq_ignore_ascii_case("mask") && name != "Drill.Cu" {
            pad.mask = true;
        } else if value.eq_ignore_ascii_case("paste") && name != "Drill.Cu" {
            pad.paste = true;
        } else {
            warn!("Invalid pad option '{}' for layer {}", value, name);
        }
    }
}

// ============================================================================
// TABLE
// ============================================================================

struct LayerEntry {
    pattern: Regex,
    name: &'static str,
    number: Option<u8>,
}

/// The layers recognized by one output format, in output order.
pub struct LayerTable {
    format: Format,
    entries: Vec<LayerEntry>,
    pad_option: Regex,
    allowed_option: Regex,
    hatch_option: Regex,
}

fn anchored(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^{}$", pattern)).map_err(|e| Error::Config(e.to_string()))
}

impl LayerTable {
    pub fn new(format: Format) -> Result<Self> {
        let mut entries = Vec::new();
        for (name, number) in LEGACY_LAYERS {
            entries.push(LayerEntry {
                pattern: anchored(&regex::escape(name))?,
                name,
                number: Some(number),
            });
        }
        if format.is_pretty() {
            for name in PRETTY_EXTRA_LAYERS {
                entries.push(LayerEntry {
                    pattern: anchored(&regex::escape(name))?,
                    name,
                    number: None,
                });
            }
        }
        if format == Format::Latest {
            entries.push(LayerEntry {
                pattern: anchored(r"\S+\.Keepout")?,
                name: KEEPOUT,
                number: None,
            });
        }

        Ok(Self {
            format,
            entries,
            pad_option: anchored(r"(?i)pad(:.*)?")?,
            allowed_option: anchored(r"(?i)allowed:\w.*")?,
            hatch_option: anchored(r"(?i)hatch:(none|edge|full)")?,
        })
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Output layer names, in table order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|e| e.name)
    }

    /// Index of the entry whose pattern matches the whole `base`.
    pub fn position(&self, base: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.pattern.is_match(base))
    }

    /// Resolve a raw layer name. `Ok(None)` when it is not a layer at all.
    pub fn resolve(&self, raw: &str) -> Result<Option<TargetLayer>> {
        let (base, options) = split_layer_name(raw);
        let Some(index) = self.position(base) else {
            return Ok(None);
        };
        let entry = &self.entries[index];

        let mut target = TargetLayer {
            name: entry.name,
            number: entry.number,
            pad: None,
            keepout: None,
        };

        if !self.format.is_pretty() {
            if options.is_some_and(|o| !o.trim().is_empty()) {
                warn!("Layer options are ignored by the legacy format: {}", raw);
            }
            return Ok(Some(target));
        }

        if target.is_keepout() {
            target.keepout = Some(KeepoutOptions {
                sides: parse_keepout_sides(base)?,
                ..KeepoutOptions::default()
            });
        }

        let Some(options) = options else {
            return Ok(Some(target));
        };

        for arg in options.split(';') {
            let arg = arg.trim_matches(|c: char| c == ' ' || c == ',' || c == ':');
            if arg.is_empty() {
                continue;
            }

            if let Some(keepout) = target.keepout.as_mut().filter(|_| self.allowed_option.is_match(arg)) {
                let list = arg.split_once(':').map(|(_, v)| v).unwrap_or("");
                keepout.allowed.clear();
                for allowed in list.split(',').map(|a| a.trim().to_lowercase()) {
                    if KEEPOUT_ALLOWED.contains(&allowed.as_str()) {
                        keepout.allowed.push(allowed);
                    } else {
                        warn!("Invalid allowed option in keepout: {} in {}", allowed, arg);
                    }
                }
            } else if let Some(keepout) = target.keepout.as_mut().filter(|_| self.hatch_option.is_match(arg)) {
                keepout.hatch = arg.split_once(':').map(|(_, v)| v.to_lowercase());
            } else if target.is_copper() && self.pad_option.is_match(arg) {
                let pad = target.pad.get_or_insert_with(PadOptions::default);
                parse_pad_option(arg, entry.name, pad);
            } else {
                warn!("Unexpected option: {} for {}", arg, base);
            }
        }

        Ok(Some(target))
    }
}

// ============================================================================
// PRUNING
// ============================================================================

/// A group exported to one layer.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedLayer {
    /// The group's name as written in the drawing, options included.
    pub raw_name: String,
    pub target: TargetLayer,
    pub group: Group,
}

/// The layers of interest, in output order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pruned {
    pub layers: Vec<MatchedLayer>,
}

impl Pruned {
    /// Bounds of everything kept; a zero box at the origin when empty.
    pub fn bounding_box(&self) -> BoundingBox {
        self.layers
            .iter()
            .filter_map(|l| l.group.bounding_box())
            .reduce(|a, b| a.union(&b))
            .unwrap_or_else(|| BoundingBox::new(Point::default(), Point::default()))
    }

    pub fn item_count(&self) -> usize {
        self.layers.iter().map(|l| l.group.item_count()).sum()
    }
}

struct Collector<'a> {
    table: &'a LayerTable,
    found: Vec<(usize, MatchedLayer)>,
    names: BTreeMap<String, Vec<String>>,
}

impl Collector<'_> {
    fn collect(&mut self, children: Vec<Node>) -> Result<()> {
        for child in children {
            let Some(raw) = child.name().map(str::to_string) else {
                if let Node::Group(g) = child {
                    self.collect(g.children)?;
                }
                continue;
            };

            let (base, _) = split_layer_name(&raw);
            let Some(index) = self.table.position(base) else {
                debug!("Skipping unmatched SVG layer: {}", raw);
                if let Node::Group(g) = child {
                    self.collect(g.children)?;
                }
                continue;
            };

            if let Node::Group(g) = &child {
                if g.children.is_empty() {
                    continue;
                }
            }

            let Some(target) = self.table.resolve(&raw)? else {
                debug!("Skipping unmatched SVG layer: {}", raw);
                continue;
            };

            self.names.entry(base.to_string()).or_default().push(raw.clone());

            let group = match child {
                Node::Group(g) => g,
                Node::Item(item) => {
                    let mut g = Group::named(&raw);
                    g.children.push(Node::Item(item));
                    g
                }
            };

            self.found.push((
                index,
                MatchedLayer {
                    raw_name: raw,
                    target,
                    group,
                },
            ));
        }
        Ok(())
    }
}

/// Keep only the groups and items named after a layer of `table`.
///
/// Matching stops at the first named ancestor: a layer group nested inside
/// another layer group belongs to the outer one.
pub fn prune_to_layers(document: Document, table: &LayerTable) -> Result<Pruned> {
    let mut collector = Collector {
        table,
        found: Vec::new(),
        names: BTreeMap::new(),
    };
    collector.collect(document.root.children)?;

    for (base, raw_names) in &collector.names {
        info!(target: UNFILTERED, "Found SVG layer: {}", base);
        debug!("  Detailed names: [{}]", raw_names.join(", "));
    }

    if collector.found.is_empty() {
        warn!("No valid items found. Maybe try --force Layer.Name");
        return Err(Error::NoLayers);
    }

    // Table order, document order within a layer.
    collector.found.sort_by_key(|(index, _)| *index);
    Ok(Pruned {
        layers: collector.found.into_iter().map(|(_, layer)| layer).collect(),
    })
}

/// Put all of the document's content into a single group named `layer`.
pub fn force_layer(document: &mut Document, layer: &str) {
    let mut group = Group::named(layer);
    group.children = std::mem::take(&mut document.root.children);
    document.root.children.push(Node::Group(group));
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(format: Format, raw: &str) -> Option<TargetLayer> {
        LayerTable::new(format).unwrap().resolve(raw).unwrap()
    }

    fn doc(svg: &str) -> Document {
        Document::parse(svg).unwrap()
    }

    #[test]
    fn split_at_first_separator() {
        assert_eq!(split_layer_name("F.Cu"), ("F.Cu", None));
        assert_eq!(split_layer_name("F.Cu;pad:3,mask"), ("F.Cu", Some("pad:3,mask")));
        assert_eq!(split_layer_name("F.Cu:pad:3,mask"), ("F.Cu", Some("pad:3,mask")));
    }

    #[test]
    fn legacy_numbers_and_no_extra_layers() {
        assert_eq!(resolve(Format::Legacy, "F.SilkS").unwrap().number, Some(21));
        assert_eq!(resolve(Format::Legacy, "Edge.Cuts").unwrap().number, Some(28));
        assert!(resolve(Format::Legacy, "F.Fab").is_none());
        assert!(resolve(Format::Legacy, "Drill.Cu").is_none());
    }

    #[test]
    fn names_match_exactly() {
        assert!(resolve(Format::Pretty, "FxCu").is_none());
        assert!(resolve(Format::Pretty, "F.Cu2").is_none());
        assert!(resolve(Format::Pretty, "layer1").is_none());
    }

    #[test]
    fn keepout_only_in_latest() {
        assert!(resolve(Format::Pretty, "F.Keepout").is_none());
        let target = resolve(Format::Latest, "F.Keepout").unwrap();
        assert!(target.is_keepout());
        assert_eq!(target.keepout.unwrap().sides, vec![KeepoutSide::Front]);
    }

    #[test]
    fn keepout_sides() {
        let all = resolve(Format::Latest, "*.Keepout").unwrap().keepout.unwrap();
        assert_eq!(all.sides, vec![KeepoutSide::Front, KeepoutSide::Back, KeepoutSide::Inner]);
        let joined = resolve(Format::Latest, "F&I.Keepout").unwrap().keepout.unwrap();
        assert_eq!(joined.sides, vec![KeepoutSide::Front, KeepoutSide::Inner]);
    }

    #[test]
    fn bad_keepout_side_is_an_error() {
        let table = LayerTable::new(Format::Latest).unwrap();
        match table.resolve("X.Keepout") {
            Err(Error::Layer { layer, .. }) => assert_eq!(layer, "X.Keepout"),
            other => panic!("expected layer error, got {:?}", other),
        }
    }

    #[test]
    fn keepout_options() {
        let keepout = resolve(Format::Latest, "B.Keepout;allowed:tracks,vias,bogus;hatch:Edge")
            .unwrap()
            .keepout
            .unwrap();
        assert_eq!(keepout.allowed, vec!["tracks".to_string(), "vias".to_string()]);
        assert_eq!(keepout.hatch.as_deref(), Some("edge"));
    }

    #[test]
    fn pad_options() {
        let pad = resolve(Format::Pretty, "F.Cu;pad:3,mask").unwrap().pad.unwrap();
        assert_eq!(pad, PadOptions { number: Some(3), mask: true, paste: false });

        let plain = resolve(Format::Pretty, "B.Cu:pad").unwrap().pad.unwrap();
        assert_eq!(plain, PadOptions::default());

        let drill = resolve(Format::Pretty, "Drill.Cu;pad:7,mask").unwrap().pad.unwrap();
        assert_eq!(drill, PadOptions { number: Some(7), mask: false, paste: false });
    }

    #[test]
    fn pad_option_needs_copper() {
        assert!(resolve(Format::Pretty, "F.SilkS;pad:1").unwrap().pad.is_none());
    }

    #[test]
    fn legacy_ignores_options() {
        let target = resolve(Format::Legacy, "F.Cu;pad:1").unwrap();
        assert!(target.pad.is_none());
        assert_eq!(target.number, Some(15));
    }

    #[test]
    fn prune_keeps_layers_in_table_order() {
        let d = doc(r#"<svg width="10" height="10">
            <g id="F.SilkS"><rect width="1" height="1"/></g>
            <g id="stuff"><g id="F.Cu"><rect width="1" height="1"/></g></g>
            <g id="notes"><rect width="1" height="1"/></g>
            <rect id="Edge.Cuts" width="5" height="5"/>
            <g id="B.SilkS"></g>
        </svg>"#);
        let pruned = prune_to_layers(d, &LayerTable::new(Format::Pretty).unwrap()).unwrap();
        let names: Vec<_> = pruned.layers.iter().map(|l| l.target.name).collect();
        assert_eq!(names, vec!["F.Cu", "F.SilkS", "Edge.Cuts"]);
        // the lone rect was wrapped into a group of its own
        assert_eq!(pruned.layers[2].group.item_count(), 1);
        assert_eq!(pruned.bounding_box().max.x, 5.0);
    }

    #[test]
    fn nothing_matching_is_an_error() {
        let d = doc(r#"<svg width="10" height="10"><g id="layer1"><rect width="1" height="1"/></g></svg>"#);
        assert!(matches!(
            prune_to_layers(d, &LayerTable::new(Format::Latest).unwrap()),
            Err(Error::NoLayers)
        ));
    }

    #[test]
    fn force_layer_wraps_everything() {
        let mut d = doc(r#"<svg width="10" height="10"><g id="layer1"><rect width="1" height="1"/></g></svg>"#);
        force_layer(&mut d, "F.SilkS");
        let pruned = prune_to_layers(d, &LayerTable::new(Format::Latest).unwrap()).unwrap();
        assert_eq!(pruned.layers.len(), 1);
        assert_eq!(pruned.layers[0].raw_name, "F.SilkS");
        assert_eq!(pruned.item_count(), 1);
    }
}

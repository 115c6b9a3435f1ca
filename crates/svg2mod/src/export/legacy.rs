//! The line-oriented `.mod` library format.
//!
//! A library holds an `$INDEX` of module names followed by the modules
//! themselves. [`Legacy`] writes a fresh library with the front module and
//! its mirrored `-rev` twin; [`LegacyUpdater`] rewrites those two modules
//! inside an existing library and copies every other module through
//! untouched.

use std::fmt::Write;
use std::path::Path;

use log::{debug, warn};
use regex::Regex;

use super::{Dialect, Footprint, ModuleContext, Num, Outline, ThruHole, Units};
use crate::error::{Error, Result};
use crate::layer::TargetLayer;

const DATE_FORMAT: &str = "%a %d %b %Y %I:%M:%S %p %Z";

/// Pen width of filled polygons.
fn polygon_pen(units: Units) -> Num {
    match units {
        Units::Decimal => Num(1.0),
        Units::Mm => Num(0.00254),
    }
}

/// Decimal-unit widths are whole numbers; round and keep them visible.
fn stroke_width(units: Units, width: f64) -> Num {
    match units {
        Units::Decimal => Num(width.round().max(1.0)),
        Units::Mm => Num(width),
    }
}

fn layer_number(layer: &TargetLayer) -> Result<u8> {
    layer.number.ok_or_else(|| Error::Layer {
        layer: layer.name.to_string(),
        message: "not available in the legacy format".to_string(),
    })
}

fn write_index(out: &mut String, names: &[String]) -> Result<()> {
    for name in names {
        writeln!(out, "{}", name)?;
    }
    out.push_str("$EndINDEX\n");
    Ok(())
}

fn write_provenance(out: &mut String, footprint: &Footprint) -> Result<()> {
    write!(
        out,
        "#\n# Converted using: {}\n#\n",
        footprint.info().command_line.replace('\\', "\\\\")
    )?;
    Ok(())
}

/// Writes a new legacy library.
#[derive(Debug, Clone, Copy, Default)]
pub struct Legacy;

impl Dialect for Legacy {
    fn writes_reverse(&self) -> bool {
        true
    }

    fn library_intro(&mut self, out: &mut String, footprint: &Footprint) -> Result<()> {
        let info = footprint.info();
        write!(out, "PCBNEW-LibModule-V1  {}", info.created.format(DATE_FORMAT))?;
        if footprint.options().units == Units::Mm {
            out.push_str("\nUnits mm");
        }
        out.push_str("\n$INDEX\n");
        write_index(out, &[footprint.module_name(false), footprint.module_name(true)])?;
        write_provenance(out, footprint)
    }

    fn module_header(&mut self, out: &mut String, _footprint: &Footprint, module: &ModuleContext) -> Result<()> {
        let size = Num(module.label_size);
        let pen = Num(module.label_pen);
        write!(
            out,
            "$MODULE {name}\n\
             Po 0 0 0 15 00000000 00000000 ~~\n\
             Li {name}\n\
             T0 0 {ref_y} {size} {size} 0 {pen} N I 21 \"{name}\"\n\
             T1 0 {val_y} {size} {size} 0 {pen} N I 21 \"{value}\"\n",
            name = module.name,
            value = module.value,
            ref_y = Num(module.reference_y),
            val_y = Num(module.value_y),
            size = size,
            pen = pen,
        )?;
        Ok(())
    }

    fn module_footer(&mut self, out: &mut String, _footprint: &Footprint, module: &ModuleContext) -> Result<()> {
        writeln!(out, "$EndMODULE {}", module.name)?;
        Ok(())
    }

    fn library_footer(&mut self, out: &mut String, _footprint: &Footprint) -> Result<()> {
        out.push_str("$EndLIBRARY");
        Ok(())
    }

    fn polygon(&mut self, out: &mut String, footprint: &Footprint, outline: &Outline) -> Result<()> {
        let units = footprint.options().units;
        writeln!(
            out,
            "DP 0 0 0 0 {} {} {}",
            outline.points.len(),
            polygon_pen(units),
            layer_number(outline.layer)?
        )?;
        for p in outline.points {
            writeln!(out, "Dl {} {}", Num(p.x), Num(p.y))?;
        }
        Ok(())
    }

    fn outline(&mut self, out: &mut String, footprint: &Footprint, outline: &Outline) -> Result<()> {
        let width = stroke_width(footprint.options().units, outline.stroke_width);
        let layer = layer_number(outline.layer)?;
        for pair in outline.points.windows(2) {
            writeln!(
                out,
                "DS {} {} {} {} {} {}",
                Num(pair[0].x),
                Num(pair[0].y),
                Num(pair[1].x),
                Num(pair[1].y),
                width,
                layer
            )?;
        }
        Ok(())
    }

    fn thru_hole(&mut self, _out: &mut String, _footprint: &Footprint, hole: &ThruHole) -> Result<()> {
        warn!("Drill holes are not supported by the legacy format ({})", hole.layer.name);
        Ok(())
    }
}

// ============================================================================
// UPDATER
// ============================================================================

/// A module copied through from the old file.
#[derive(Debug, Clone, PartialEq)]
struct PreservedModule {
    name: String,
    text: String,
}

/// Rewrites the converted modules inside an existing legacy library.
///
/// Everything before `$INDEX` and between `$EndINDEX` and the first module
/// is copied verbatim, and so is every module not being replaced. The
/// index is rebuilt in case-insensitive order and the replaced modules
/// are slotted in at their sorted position.
#[derive(Debug, Clone)]
pub struct LegacyUpdater {
    pre_index: String,
    post_index: String,
    index: Vec<String>,
    modules: Vec<PreservedModule>,
    units: Units,
}

fn sort_key(name: &str) -> String {
    name.to_lowercase()
}

impl LegacyUpdater {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let units_mm = Regex::new(r"Units\s+mm").map_err(|e| Error::Config(e.to_string()))?;
        let module_start = Regex::new(r"^\$MODULE\s+(\S+)").map_err(|e| Error::Config(e.to_string()))?;

        let mut lines = text.split_inclusive('\n').peekable();
        let mut units = Units::Decimal;

        let mut pre_index = String::new();
        loop {
            let line = lines
                .next()
                .ok_or_else(|| Error::Legacy("missing $INDEX".to_string()))?;
            if units_mm.is_match(line) {
                units = Units::Mm;
            }
            pre_index.push_str(line);
            if line.trim() == "$INDEX" {
                break;
            }
        }

        let mut index = Vec::new();
        loop {
            let line = lines
                .next()
                .ok_or_else(|| Error::Legacy("missing $EndINDEX".to_string()))?;
            let name = line.trim();
            if name == "$EndINDEX" {
                break;
            }
            if !name.is_empty() {
                index.push(name.to_string());
            }
        }

        let mut post_index = String::new();
        while let Some(line) = lines.peek() {
            let trimmed = line.trim();
            if trimmed.starts_with("$MODULE") || trimmed == "$EndLIBRARY" {
                break;
            }
            post_index.push_str(line);
            lines.next();
        }

        let mut modules = Vec::new();
        while let Some(line) = lines.next() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed == "$EndLIBRARY" {
                break;
            }
            let Some(caps) = module_start.captures(trimmed) else {
                return Err(Error::Legacy(format!("expected $EndLIBRARY, found '{}'", trimmed)));
            };
            let name = caps[1].to_string();
            let mut text = line.to_string();
            let mut closed = false;
            for line in lines.by_ref() {
                text.push_str(line);
                let mut words = line.split_whitespace();
                if words.next() == Some("$EndMODULE") && words.next() == Some(name.as_str()) {
                    closed = true;
                    break;
                }
            }
            if !closed {
                return Err(Error::Legacy(format!("expected $EndMODULE {}", name)));
            }
            if !text.ends_with('\n') {
                text.push('\n');
            }
            debug!("Preserving module {}", name);
            modules.push(PreservedModule { name, text });
        }

        Ok(Self {
            pre_index,
            post_index,
            index,
            modules,
            units,
        })
    }

    /// The coordinate unit the existing file is written in.
    pub fn units(&self) -> Units {
        self.units
    }

    /// Names of modules that will be copied through unchanged.
    pub fn preserved(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(|m| m.name.as_str())
    }

    fn write_preserved_before(&mut self, out: &mut String, name: Option<&str>) {
        let key = name.map(sort_key);
        let (before, after): (Vec<_>, Vec<_>) = std::mem::take(&mut self.modules)
            .into_iter()
            .partition(|m| key.as_ref().is_none_or(|k| sort_key(&m.name) < *k));
        for module in before {
            out.push_str(&module.text);
        }
        self.modules = after;
    }
}

impl Dialect for LegacyUpdater {
    fn writes_reverse(&self) -> bool {
        true
    }

    fn library_intro(&mut self, out: &mut String, footprint: &Footprint) -> Result<()> {
        let ours = [footprint.module_name(false), footprint.module_name(true)];
        self.modules.retain(|m| !ours.contains(&m.name));

        let mut names: Vec<String> = self
            .index
            .iter()
            .cloned()
            .chain(self.modules.iter().map(|m| m.name.clone()))
            .chain(ours.iter().cloned())
            .collect();
        names.sort_by_key(|n| sort_key(n));
        names.dedup();

        out.push_str(&self.pre_index);
        write_index(out, &names)?;
        out.push_str(&self.post_index);
        Ok(())
    }

    fn module_header(&mut self, out: &mut String, footprint: &Footprint, module: &ModuleContext) -> Result<()> {
        self.write_preserved_before(out, Some(module.name.as_str()));
        Legacy.module_header(out, footprint, module)
    }

    fn module_footer(&mut self, out: &mut String, footprint: &Footprint, module: &ModuleContext) -> Result<()> {
        Legacy.module_footer(out, footprint, module)
    }

    fn library_footer(&mut self, out: &mut String, footprint: &Footprint) -> Result<()> {
        self.write_preserved_before(out, None);
        Legacy.library_footer(out, footprint)
    }

    fn polygon(&mut self, out: &mut String, footprint: &Footprint, outline: &Outline) -> Result<()> {
        Legacy.polygon(out, footprint, outline)
    }

    fn outline(&mut self, out: &mut String, footprint: &Footprint, outline: &Outline) -> Result<()> {
        Legacy.outline(out, footprint, outline)
    }

    fn thru_hole(&mut self, out: &mut String, footprint: &Footprint, hole: &ThruHole) -> Result<()> {
        Legacy.thru_hole(out, footprint, hole)
    }
}

// ============================================================================
// TESTS
// ============================================================================

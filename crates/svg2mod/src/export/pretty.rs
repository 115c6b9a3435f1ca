//! The s-expression `.kicad_mod` format.
//!
//! One file holds one module. Besides plain `fp_poly`/`fp_line` graphics
//! this dialect can write copper as custom-shape pads and, for the latest
//! format, keepout zones.

use std::fmt::Write;

use super::{Dialect, Footprint, MINIMUM_SIZE, ModuleContext, Num, Outline, ThruHole};
use crate::error::Result;
use crate::geometry::Point;
use crate::layer::{Format, KEEPOUT_ALLOWED, KeepoutOptions, KeepoutSide, TargetLayer};

/// Number of inner copper layers a keepout on `I` covers.
const INNER_LAYERS: usize = 30;

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn visible_width(width: f64) -> f64 {
    if width == 0.0 { MINIMUM_SIZE } else { width }
}

fn is_latest(footprint: &Footprint) -> bool {
    footprint.options().format == Format::Latest
}

/// Whether shapes on `layer` become pads instead of graphics.
fn creates_pad(footprint: &Footprint, layer: &TargetLayer) -> bool {
    layer.pad.is_some() || (footprint.options().convert_pads && matches!(layer.name, "F.Cu" | "B.Cu"))
}

fn pad_number(layer: &TargetLayer) -> String {
    layer
        .pad
        .as_ref()
        .and_then(|p| p.number)
        .map(|n| n.to_string())
        .unwrap_or_default()
}

fn pad_layers(layer: &TargetLayer) -> String {
    let mut layers = layer.name.to_string();
    if let Some(pad) = &layer.pad {
        let side = layer.side_prefix();
        if pad.mask {
            layers.push_str(&format!(" {}.Mask", side));
        }
        if pad.paste {
            layers.push_str(&format!(" {}.Paste", side));
        }
    }
    layers
}

fn zone_layers(keepout: &KeepoutOptions) -> String {
    let has = |side| keepout.sides.contains(&side);
    if has(KeepoutSide::Front) && has(KeepoutSide::Back) && has(KeepoutSide::Inner) {
        return "\"*.Cu\"".to_string();
    }
    if !has(KeepoutSide::Inner) {
        let joined: Vec<String> = keepout.sides.iter().map(|s| s.letter().to_string()).collect();
        return format!("\"{}.Cu\"", joined.join("&"));
    }
    let mut layers: Vec<String> = keepout
        .sides
        .iter()
        .filter(|s| **s != KeepoutSide::Inner)
        .map(|s| format!("\"{}.Cu\"", s.letter()))
        .collect();
    layers.extend((1..=INNER_LAYERS).map(|i| format!("\"In{}.Cu\"", i)));
    layers.join(" ")
}

/// Writes `.kicad_mod` files, in either the pretty or the latest flavor.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pretty;

impl Pretty {
    fn pad_header(out: &mut String, layer: &TargetLayer, at: Point, width: f64) -> Result<()> {
        write!(
            out,
            "\n  (pad \"{num}\" smd custom (at {x} {y}) (size {w:.6} {w:.6}) (layers {layers})\n    \
             (zone_connect 0)\n    \
             (options (clearance outline) (anchor circle))",
            num = pad_number(layer),
            x = Num(at.x),
            y = Num(at.y),
            w = visible_width(width),
            layers = pad_layers(layer),
        )?;
        Ok(())
    }

    fn write_pad(&self, out: &mut String, footprint: &Footprint, outline: &Outline, fill: bool) -> Result<()> {
        let origin = outline.points[0];
        Self::pad_header(out, outline.layer, origin, outline.stroke_width)?;

        if outline.points.len() < 2 {
            out.push_str("\n  )");
            return Ok(());
        }

        out.push_str("\n    (primitives\n      (gr_poly (pts \n");
        for p in outline.points {
            writeln!(out, "          (xy {} {})", Num(p.x - origin.x), Num(p.y - origin.y))?;
        }
        write!(
            out,
            "      )\n    (width {}){})\n  ))",
            Num(visible_width(outline.stroke_width)),
            fill_none(footprint, fill)
        )?;
        Ok(())
    }

    fn write_zone(&self, out: &mut String, outline: &Outline, keepout: &KeepoutOptions) -> Result<()> {
        let width = outline.stroke_width;
        let rules: Vec<String> = KEEPOUT_ALLOWED
            .iter()
            .map(|item| {
                let allowed = keepout.allowed.iter().any(|a| a == item);
                format!("{} {}allowed", item, if allowed { "" } else { "not_" })
            })
            .collect();

        write!(
            out,
            "\n  (zone (net 0) (net_name \"\") (layers {layers}) (hatch {hatch} {w:.6})\n    \
             (connect_pads (clearance 0))\n    \
             (min_thickness {half:.6})\n    \
             (keepout ({rules}))\n    \
             (fill (thermal_gap {w:.6}) (thermal_bridge_width {w:.6}))\n    \
             (polygon\n      \
             (pts\n",
            layers = zone_layers(keepout),
            hatch = keepout.hatch.as_deref().unwrap_or("full"),
            w = width,
            half = width / 2.0,
            rules = rules.join(") ("),
        )?;
        for p in outline.points {
            writeln!(out, "          (xy {} {})", Num(p.x), Num(p.y))?;
        }
        out.push_str("      )\n    )\n  )");
        Ok(())
    }

    fn write_poly(&self, out: &mut String, footprint: &Footprint, outline: &Outline, fill: bool) -> Result<()> {
        if let Some(keepout) = &outline.layer.keepout {
            return self.write_zone(out, outline, keepout);
        }
        if creates_pad(footprint, outline.layer) {
            return self.write_pad(out, footprint, outline, fill);
        }

        out.push_str("\n  (fp_poly\n    (pts \n");
        for p in outline.points {
            writeln!(out, "      (xy {} {})", Num(p.x), Num(p.y))?;
        }
        write!(
            out,
            "    )\n    (layer {})\n    (width {}){}\n  )",
            outline.layer.name,
            Num(visible_width(outline.stroke_width)),
            fill_none(footprint, fill)
        )?;
        Ok(())
    }
}

fn fill_none(footprint: &Footprint, fill: bool) -> &'static str {
    if !fill && is_latest(footprint) {
        " (fill none)"
    } else {
        ""
    }
}

impl Dialect for Pretty {
    fn library_intro(&mut self, out: &mut String, footprint: &Footprint) -> Result<()> {
        let info = footprint.info();
        write!(
            out,
            "(module {name} (layer F.Cu) (tedit {stamp:08X})\n  \
             (attr virtual)\n  \
             (descr \"Converted using: {cmdline}\")\n  \
             (tags svg2mod)\n",
            name = footprint.module_name(false),
            stamp = info.created.timestamp().max(0),
            cmdline = escape(&info.command_line),
        )?;
        Ok(())
    }

    fn module_header(&mut self, out: &mut String, _footprint: &Footprint, module: &ModuleContext) -> Result<()> {
        let side = if module.flip { "B" } else { "F" };
        let size = Num(module.label_size);
        let pen = Num(module.label_pen);
        write!(
            out,
            "  (fp_text reference {name} (at 0 {ref_y}) (layer {side}.SilkS) hide\n    \
             (effects (font (size {size} {size}) (thickness {pen})))\n  \
             )\n  \
             (fp_text value {value} (at 0 {val_y}) (layer {side}.SilkS) hide\n    \
             (effects (font (size {size} {size}) (thickness {pen})))\n  \
             )",
            name = module.name,
            value = module.value,
            ref_y = Num(module.reference_y),
            val_y = Num(module.value_y),
            side = side,
            size = size,
            pen = pen,
        )?;
        Ok(())
    }

    fn module_footer(&mut self, out: &mut String, _footprint: &Footprint, _module: &ModuleContext) -> Result<()> {
        out.push_str("\n)\n");
        Ok(())
    }

    fn polygon(&mut self, out: &mut String, footprint: &Footprint, outline: &Outline) -> Result<()> {
        self.write_poly(out, footprint, outline, true)
    }

    fn outline(&mut self, out: &mut String, footprint: &Footprint, outline: &Outline) -> Result<()> {
        if is_latest(footprint) {
            return self.write_poly(out, footprint, outline, false);
        }

        let width = Num(visible_width(outline.stroke_width));
        let pad = creates_pad(footprint, outline.layer);
        for pair in outline.points.windows(2) {
            let (start, end) = (pair[0], pair[1]);
            if pad {
                Self::pad_header(out, outline.layer, start, outline.stroke_width)?;
                write!(
                    out,
                    "\n    (primitives\n      (gr_line (start 0 0) (end {} {}) (width {}))\n  ))",
                    Num(end.x - start.x),
                    Num(end.y - start.y),
                    width
                )?;
            } else {
                write!(
                    out,
                    "\n  (fp_line\n        (start {} {}) (end {} {})\n        (layer {}) (width {})\n    )",
                    Num(start.x),
                    Num(start.y),
                    Num(end.x),
                    Num(end.y),
                    outline.layer.name,
                    width
                )?;
            }
        }
        Ok(())
    }

    fn thru_hole(&mut self, out: &mut String, footprint: &Footprint, hole: &ThruHole) -> Result<()> {
        let (size, drill) = hole.sizes();
        let plated = hole.plated();
        write!(
            out,
            "\n  (pad \"{num}\" {kind}thru_hole circle (at {x} {y}) (size {s} {s}) (drill {d}) (layers *.Mask{cu}){extra})",
            num = pad_number(hole.layer),
            kind = if plated { "" } else { "np_" },
            x = Num(hole.center.x),
            y = Num(hole.center.y),
            s = Num(size),
            d = Num(drill),
            cu = if plated { " *.Cu" } else { "" },
            extra = if plated && is_latest(footprint) {
                " (remove_unused_layers) (keep_end_layers)"
            } else {
                ""
            },
        )?;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{ExportOptions, FootprintInfo};
    use crate::svg::Document;

    fn render(format: Format, convert_pads: bool, body: &str) -> String {
        let document = Document::parse(&format!(r#"<svg width="100" height="100">{}</svg>"#, body)).unwrap();
        let footprint = Footprint::new(
            document,
            ExportOptions {
                format,
                convert_pads,
                dpi: 25.4,
                ..ExportOptions::default()
            },
            FootprintInfo {
                module_name: "logo".to_string(),
                command_line: r#"svg2mod "my art.svg""#.to_string(),
                ..FootprintInfo::default()
            },
        )
        .unwrap();
        footprint.write(&mut Pretty).unwrap()
    }

    const SQUARE: &str = r#"<rect id="F.SilkS" width="10" height="10"/>"#;

    #[test]
    fn module_frame() {
        let out = render(Format::Pretty, false, SQUARE);
        assert!(out.starts_with("(module logo (layer F.Cu) (tedit "));
        assert!(out.contains("  (attr virtual)\n  (descr \"Converted using: svg2mod \\\"my art.svg\\\"\")\n  (tags svg2mod)\n"));
        assert!(out.contains("  (fp_text reference logo (at 0 -3.048) (layer F.SilkS) hide\n"));
        assert!(out.contains("    (effects (font (size 1.524 1.524) (thickness 0.3048)))\n"));
        assert!(out.contains("  (fp_text value G*** (at 0 13.048) (layer F.SilkS) hide\n"));
        assert!(out.ends_with("\n)\n"));
        assert!(!out.contains("logo-rev"));
    }

    #[test]
    fn filled_polygon() {
        let out = render(Format::Pretty, false, SQUARE);
        assert!(out.contains(
            "\n  (fp_poly\n    (pts \n      (xy 0 0)\n      (xy 10 0)\n      (xy 10 10)\n      (xy 0 10)\n      (xy 0 0)\n    )\n    (layer F.SilkS)\n    (width 0.00001)\n  )"
        ));
    }

    #[test]
    fn pretty_outline_is_lines_latest_is_unfilled_poly() {
        let body = r#"<rect id="F.SilkS" width="10" height="10" style="fill:none;stroke:#000;stroke-width:0.5"/>"#;
        let pretty = render(Format::Pretty, false, body);
        assert_eq!(pretty.matches("(fp_line").count(), 4);
        assert!(pretty.contains("(start 0 0) (end 10 0)\n        (layer F.SilkS) (width 0.5)"));

        let latest = render(Format::Latest, false, body);
        assert_eq!(latest.matches("(fp_line").count(), 0);
        assert!(latest.contains("(width 0.5) (fill none)\n  )"));
    }

    #[test]
    fn pad_with_number_and_mask() {
        let out = render(Format::Latest, false, r#"<rect id="F.Cu;pad:3,mask" x="2" y="2" width="4" height="4"/>"#);
        assert!(out.contains("(pad \"3\" smd custom (at 2 2) (size 0.000010 0.000010) (layers F.Cu F.Mask)"));
        assert!(out.contains("(gr_poly (pts \n          (xy 0 0)\n          (xy 4 0)\n"));
        assert!(!out.contains("fp_poly"));
    }

    #[test]
    fn convert_pads_turns_copper_into_pads() {
        let body = r#"<rect id="F.Cu" width="4" height="4"/>"#;
        assert!(render(Format::Latest, false, body).contains("(fp_poly"));
        let out = render(Format::Latest, true, body);
        assert!(out.contains("(pad \"\" smd custom (at 0 0)"));
    }

    #[test]
    fn keepout_zone() {
        let out = render(
            Format::Latest,
            false,
            r#"<rect id="F&amp;B.Keepout;allowed:vias;hatch:edge" width="4" height="4"/>"#,
        );
        assert!(out.contains("(zone (net 0) (net_name \"\") (layers \"F&B.Cu\") (hatch edge 0.508000)"));
        assert!(out.contains("(min_thickness 0.254000)"));
        assert!(out.contains(
            "(keepout (tracks not_allowed) (vias allowed) (pads not_allowed) (copperpour not_allowed) (footprints not_allowed))"
        ));
        assert!(out.contains("(pts\n          (xy 0 0)\n"));
    }

    #[test]
    fn keepout_layer_lists() {
        let all = KeepoutOptions {
            sides: vec![KeepoutSide::Front, KeepoutSide::Back, KeepoutSide::Inner],
            ..KeepoutOptions::default()
        };
        assert_eq!(zone_layers(&all), "\"*.Cu\"");
        let inner = KeepoutOptions {
            sides: vec![KeepoutSide::Front, KeepoutSide::Inner],
            ..KeepoutOptions::default()
        };
        let layers = zone_layers(&inner);
        assert!(layers.starts_with("\"F.Cu\" \"In1.Cu\""));
        assert!(layers.ends_with("\"In30.Cu\""));
    }

    #[test]
    fn drill_holes() {
        let out = render(
            Format::Latest,
            false,
            r#"<circle id="Drill.Cu" cx="5" cy="5" r="1" style="stroke:#000;stroke-width:0.5"/>
               <circle id="Drill.Mech" cx="10" cy="5" r="1"/>
               <rect id="Drill.Mech" width="1" height="1"/>"#,
        );
        assert!(out.contains(
            "(pad \"\" thru_hole circle (at 5 5) (size 2.5 2.5) (drill 1.5) (layers *.Mask *.Cu) (remove_unused_layers) (keep_end_layers))"
        ));
        assert!(out.contains("(pad \"\" np_thru_hole circle (at 10 5) (size 2 2) (drill 2) (layers *.Mask))"));
        assert_eq!(out.matches("thru_hole").count(), 2);
    }
}

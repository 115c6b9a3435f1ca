//! Layers command - show how the drawing's groups map onto footprint layers.
//!
//! Handy for finding out why a group did not make it into the output:
//! every named group and item is listed with the layer it resolves to
//! (if any), whether it is hidden, and how many items it holds.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use log::warn;
use serde::Serialize;

use svg2mod::layer::split_layer_name;
use svg2mod::{Document, Format, Group, LayerTable, Node};

use super::FormatArg;

#[derive(Args, Debug)]
pub struct LayersArgs {
    /// SVG file to inspect
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub input: PathBuf,

    /// Layer table to match against
    #[arg(long, value_enum, default_value_t = FormatArg::Latest)]
    pub format: FormatArg,

    /// Print JSON instead of a tree
    #[arg(long)]
    pub json: bool,

    /// Indented list without tree lines
    #[arg(long, conflicts_with = "json")]
    pub compact: bool,
}

/// One group or item in the drawing.
#[derive(Debug, Serialize)]
pub struct LayerNode {
    /// `g` for groups, the element kind for items
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Output layer the name resolves to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
    pub item_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<LayerNode>,
}

fn resolve(table: &LayerTable, name: Option<&str>) -> Option<String> {
    let name = name?;
    match table.resolve(name) {
        Ok(target) => target.map(|t| {
            let (base, _) = split_layer_name(name);
            if t.is_keepout() { base.to_string() } else { t.name.to_string() }
        }),
        Err(e) => {
            warn!("{}", e);
            None
        }
    }
}

/// Build the tree below `group`.
pub fn build_tree(group: &Group, kind: &str, table: &LayerTable) -> LayerNode {
    let children = group
        .children
        .iter()
        .map(|child| match child {
            Node::Group(g) => build_tree(g, "g", table),
            Node::Item(item) => LayerNode {
                kind: item.shape.kind_name().to_string(),
                name: item.name.clone(),
                layer: resolve(table, item.name.as_deref()),
                hidden: item.hidden,
                item_count: 1,
                children: vec![],
            },
        })
        .collect();

    LayerNode {
        kind: kind.to_string(),
        name: group.name.clone(),
        layer: resolve(table, group.name.as_deref()),
        hidden: group.hidden,
        item_count: group.item_count(),
        children,
    }
}

fn describe(node: &LayerNode) -> String {
    let name = node.name.as_ref().map(|s| format!(" \"{}\"", s)).unwrap_or_default();
    let layer = node.layer.as_ref().map(|l| format!(" -> {}", l)).unwrap_or_default();
    let count = if node.kind == "g" {
        format!(" ({})", node.item_count)
    } else {
        String::new()
    };
    let hidden = if node.hidden { " [hidden]" } else { "" };
    format!("{}{}{}{}{}", node.kind, name, count, layer, hidden)
}

/// Render tree in human-readable text format.
pub fn render_tree_text(node: &LayerNode, indent: usize, is_last: bool, prefix: &str) -> String {
    let mut output = String::new();

    let connector = if indent == 0 {
        ""
    } else if is_last {
        "└── "
    } else {
        "├── "
    };
    output.push_str(&format!("{}{}{}\n", prefix, connector, describe(node)));

    let child_prefix = if indent == 0 {
        String::new()
    } else {
        format!("{}{}   ", prefix, if is_last { " " } else { "│" })
    };

    let child_count = node.children.len();
    for (i, child) in node.children.iter().enumerate() {
        output.push_str(&render_tree_text(child, indent + 1, i + 1 == child_count, &child_prefix));
    }

    output
}

/// Simplified tree rendering for compact output.
pub fn render_tree_compact(node: &LayerNode, indent: usize) -> String {
    let mut output = format!("{}{}\n", "  ".repeat(indent), describe(node));
    for child in &node.children {
        output.push_str(&render_tree_compact(child, indent + 1));
    }
    output
}

pub fn execute(args: &LayersArgs) -> anyhow::Result<()> {
    let content = fs::read_to_string(&args.input)
        .with_context(|| format!("Cannot read '{}'", args.input.display()))?;
    let document = Document::parse(&content)
        .with_context(|| format!("Failed to parse '{}'", args.input.display()))?;
    let table = LayerTable::new(Format::from(args.format))?;

    let tree = build_tree(&document.root, "svg", &table);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&tree)?);
    } else if args.compact {
        print!("{}", render_tree_compact(&tree, 0));
    } else {
        print!("{}", render_tree_text(&tree, 0, true, ""));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(svg: &str) -> LayerNode {
        let document = Document::parse(svg).unwrap();
        build_tree(&document.root, "svg", &LayerTable::new(Format::Latest).unwrap())
    }

    const SVG: &str = r#"<svg width="10" height="10">
        <g id="art"><g id="F.Cu;pad:1"><rect width="1" height="1"/></g></g>
        <circle id="F&amp;B.Keepout" r="2"/>
        <g id="notes" style="display:none"><text>hi</text></g>
    </svg>"#;

    #[test]
    fn layers_are_resolved() {
        let root = tree(SVG);
        assert_eq!(root.item_count, 3);
        let art = &root.children[0];
        assert_eq!(art.layer, None);
        assert_eq!(art.children[0].layer.as_deref(), Some("F.Cu"));
        assert_eq!(root.children[1].kind, "circle");
        assert_eq!(root.children[1].layer.as_deref(), Some("F&B.Keepout"));
        assert!(root.children[2].hidden);
    }

    #[test]
    fn test_render_tree_compact() {
        let output = render_tree_compact(&tree(SVG), 0);
        assert!(output.contains("svg (3)"));
        assert!(output.contains("    g \"F.Cu;pad:1\" (1) -> F.Cu"));
        assert!(output.contains("g \"notes\" (1) [hidden]"));
    }

    #[test]
    fn text_tree_uses_branch_lines() {
        let output = render_tree_text(&tree(SVG), 0, true, "");
        assert!(output.contains("├── g \"art\" (1)"));
        assert!(output.contains("└── g \"notes\" (1) [hidden]"));
    }

    #[test]
    fn json_skips_empty_fields() {
        let json = serde_json::to_string(&tree(SVG)).unwrap();
        assert!(json.contains("\"layer\":\"F.Cu\""));
        assert!(!json.contains("\"hidden\":false"));
    }
}

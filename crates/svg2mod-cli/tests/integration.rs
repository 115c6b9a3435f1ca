//! Integration tests for the svg2mod CLI.
//!
//! These tests run the actual binary against SVG files written to a
//! temporary directory and check the files it produces.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const LOGO: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg"
     xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape"
     width="20mm" height="10mm" viewBox="0 0 20 10">
  <g inkscape:label="F.SilkS" inkscape:groupmode="layer" id="layer1">
    <path d="M0,0 H10 V10 H0 Z M4,4 H6 V6 H4 Z"/>
  </g>
  <g inkscape:label="Edge.Cuts" id="layer2">
    <rect x="0" y="0" width="20" height="10" style="fill:none;stroke:#000000;stroke-width:0.1"/>
  </g>
  <g inkscape:label="Notes" id="layer3">
    <text x="1" y="1">not exported</text>
  </g>
</svg>
"#;

fn binary() -> &'static str {
    env!("CARGO_BIN_EXE_svg2mod")
}

fn write_svg(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("Failed to write test SVG");
    path
}

fn run(args: &[&str]) -> Output {
    Command::new(binary())
        .args(args)
        .output()
        .expect("Failed to execute command")
}

#[test]
fn convert_writes_kicad_mod_next_to_input() {
    let dir = tempfile::tempdir().unwrap();
    let svg = write_svg(dir.path(), "logo.svg", LOGO);

    let output = run(&["convert", svg.to_str().unwrap(), "--name", "logo"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let text = fs::read_to_string(dir.path().join("logo.kicad_mod")).expect("output file missing");
    assert!(text.starts_with("(module logo (layer F.Cu) (tedit "));
    assert!(text.contains("(descr \"Converted using: svg2mod convert "));
    assert_eq!(text.matches("(fp_poly").count(), 2, "silkscreen polygon plus edge outline");
    assert!(text.contains("(layer Edge.Cuts)"));
    assert!(text.contains("(fill none)"));
    assert!(!text.contains("not exported"));
}

#[test]
fn progress_goes_to_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let svg = write_svg(dir.path(), "logo.svg", LOGO);

    let output = run(&["convert", svg.to_str().unwrap()]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Parsing SVG..."));
    assert!(stderr.contains("Found SVG layer: F.SilkS"));
    assert!(stderr.contains("Writing module file:"));
}

#[test]
fn debug_names_skipped_layers() {
    let dir = tempfile::tempdir().unwrap();
    let svg = write_svg(dir.path(), "logo.svg", LOGO);

    let output = Command::new(binary())
        .args(["--debug", "convert", svg.to_str().unwrap(), "--stdout"])
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Skipping unmatched SVG layer: Notes"), "stderr: {}", stderr);
    assert!(!stderr.contains("Skipping unmatched SVG layer: F.SilkS"));
}

#[test]
fn stdout_flag_prints_instead_of_writing() {
    let dir = tempfile::tempdir().unwrap();
    let svg = write_svg(dir.path(), "logo.svg", LOGO);

    let output = run(&["convert", svg.to_str().unwrap(), "--format", "pretty", "--stdout"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("(fp_line"), "pretty writes outlines as lines");
    assert!(!dir.path().join("logo.kicad_mod").exists());
}

#[test]
fn legacy_update_keeps_other_modules() {
    let dir = tempfile::tempdir().unwrap();
    let svg = write_svg(dir.path(), "logo.svg", LOGO);
    let lib = dir.path().join("parts.mod");
    let lib_arg = lib.to_str().unwrap();

    let first = run(&["convert", svg.to_str().unwrap(), "--format", "legacy", "-o", lib_arg, "--name", "alpha"]);
    assert!(first.status.success(), "stderr: {}", String::from_utf8_lossy(&first.stderr));
    let before = fs::read_to_string(&lib).unwrap();

    let second = run(&["convert", svg.to_str().unwrap(), "--format", "legacy", "-o", lib_arg, "--name", "beta"]);
    assert!(second.status.success(), "stderr: {}", String::from_utf8_lossy(&second.stderr));
    let after = fs::read_to_string(&lib).unwrap();

    assert!(after.contains("$INDEX\nalpha\nalpha-rev\nbeta\nbeta-rev\n$EndINDEX\n"));
    let alpha_start = before.find("$MODULE alpha\n").unwrap();
    let alpha_end = before.find("$EndMODULE alpha-rev\n").unwrap();
    assert!(after.contains(&before[alpha_start..alpha_end]));
    assert!(after.ends_with("$EndLIBRARY"));
}

#[test]
fn pretty_with_decimal_units_fails() {
    let dir = tempfile::tempdir().unwrap();
    let svg = write_svg(dir.path(), "logo.svg", LOGO);

    let output = run(&["convert", svg.to_str().unwrap(), "--format", "pretty", "--units", "decimal"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("decimal units"));
}

#[test]
fn no_layers_fails_and_force_rescues() {
    let dir = tempfile::tempdir().unwrap();
    let svg = write_svg(
        dir.path(),
        "plain.svg",
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"><circle cx="5" cy="5" r="4"/></svg>"#,
    );

    let output = run(&["convert", svg.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--force"));

    let output = run(&["convert", svg.to_str().unwrap(), "--force", "F.Cu", "--stdout"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("(layer F.Cu)"));
}

#[test]
fn bad_path_data_names_the_item() {
    let dir = tempfile::tempdir().unwrap();
    let svg = write_svg(
        dir.path(),
        "bad.svg",
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"><path id="F.Cu" d="M0,0 X5,5"/></svg>"#,
    );

    let output = run(&["convert", svg.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("F.Cu"));
}

#[test]
fn layers_command_lists_matches() {
    let dir = tempfile::tempdir().unwrap();
    let svg = write_svg(dir.path(), "logo.svg", LOGO);

    let output = run(&["layers", svg.to_str().unwrap()]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("g \"F.SilkS\" (1) -> F.SilkS"));
    assert!(stdout.contains("g \"Notes\" (1)"));

    let output = run(&["layers", svg.to_str().unwrap(), "--json"]);
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(json["kind"], "svg");
    assert_eq!(json["children"][1]["layer"], "Edge.Cuts");
}

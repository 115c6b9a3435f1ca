//! Convert command - SVG in, footprint module out.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Local};
use clap::Args;
use log::info;

use svg2mod::{Document, ExportOptions, Footprint, FootprintInfo, Format, Legacy, LegacyUpdater, Pretty, UNFILTERED};

use super::{FormatArg, UnitsArg, command_line};

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// SVG file to convert
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub input: PathBuf,

    /// Output file; defaults to the input name with the format's extension
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Center the module on the origin
    #[arg(short, long)]
    pub center: bool,

    /// Write F.Cu and B.Cu shapes as custom pads
    #[arg(short = 'P', long)]
    pub convert_pads: bool,

    /// Leave out hidden groups and items
    #[arg(short = 'x', long)]
    pub exclude_hidden: bool,

    /// Put everything on this layer, whatever the group names say
    #[arg(long, value_name = "LAYER")]
    pub force: Option<String>,

    /// Resolution the drawing was made at
    #[arg(short, long, default_value_t = 96.0)]
    pub dpi: f64,

    /// Extra scale applied on top of the DPI conversion
    #[arg(short, long, default_value_t = 1.0)]
    pub factor: f64,

    /// Curve flattening precision in SVG units
    #[arg(short, long, default_value_t = 5.0)]
    pub precision: f64,

    #[arg(long, value_enum, default_value_t = FormatArg::Latest)]
    pub format: FormatArg,

    /// Module name
    #[arg(long, default_value = "svg2mod")]
    pub name: String,

    /// Module value
    #[arg(long, default_value = "G***")]
    pub value: String,

    #[arg(long, value_enum, default_value_t = UnitsArg::Mm)]
    pub units: UnitsArg,

    /// Simplify outlines with this tolerance (0 keeps every point)
    #[arg(long, default_value_t = 0.0)]
    pub simplify: f64,

    /// Print the result instead of writing a file
    #[arg(long)]
    pub stdout: bool,
}

/// `<output or input stem>` with the format's extension appended when missing.
pub fn output_path(input: &Path, output: Option<&Path>, format: Format) -> PathBuf {
    let base = output.map(Path::to_path_buf).unwrap_or_else(|| input.with_extension(""));
    let extension = format.extension();
    if base.to_string_lossy().ends_with(extension) {
        return base;
    }
    let mut name = base.into_os_string();
    name.push(extension);
    PathBuf::from(name)
}

fn file_time(path: &Path) -> Option<DateTime<Local>> {
    let metadata = fs::metadata(path).ok()?;
    let time = metadata.created().or_else(|_| metadata.modified()).ok()?;
    Some(DateTime::from(time))
}

pub fn execute(args: &ConvertArgs) -> anyhow::Result<()> {
    let content = fs::read_to_string(&args.input)
        .with_context(|| format!("Cannot read '{}'", args.input.display()))?;
    let document = Document::parse(&content)
        .with_context(|| format!("Failed to parse '{}'", args.input.display()))?;

    let format = Format::from(args.format);
    let output = output_path(&args.input, args.output.as_deref(), format);

    let mut options = ExportOptions {
        format,
        center: args.center,
        scale_factor: args.factor,
        precision: args.precision,
        units: args.units.into(),
        dpi: args.dpi,
        convert_pads: args.convert_pads,
        simplify: args.simplify,
        ignore_hidden: args.exclude_hidden,
        force_layer: args.force.clone(),
    };

    let info = FootprintInfo {
        module_name: args.name.clone(),
        module_value: args.value.clone(),
        created: file_time(&args.input).unwrap_or_else(Local::now),
        command_line: command_line(std::env::args()),
    };

    let mut updater = None;
    if format == Format::Legacy && !args.stdout && output.exists() {
        let existing = LegacyUpdater::from_file(&output)
            .with_context(|| format!("Cannot update '{}'", output.display()))?;
        options.units = existing.units();
        updater = Some(existing);
    }

    let footprint = Footprint::new(document, options, info)?;
    let text = match updater {
        Some(mut updater) => footprint.write(&mut updater)?,
        None if format == Format::Legacy => footprint.write(&mut Legacy)?,
        None => footprint.write(&mut Pretty)?,
    };

    if args.stdout {
        print!("{}", text);
    } else {
        info!(target: UNFILTERED, "Writing module file: {}", output.display());
        fs::write(&output, text).with_context(|| format!("Cannot write '{}'", output.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_defaults_to_input_stem() {
        let path = output_path(Path::new("art/logo.svg"), None, Format::Latest);
        assert_eq!(path, PathBuf::from("art/logo.kicad_mod"));
        let path = output_path(Path::new("logo.svg"), None, Format::Legacy);
        assert_eq!(path, PathBuf::from("logo.mod"));
    }

    #[test]
    fn extension_added_only_when_missing() {
        let path = output_path(Path::new("logo.svg"), Some(Path::new("out.kicad_mod")), Format::Pretty);
        assert_eq!(path, PathBuf::from("out.kicad_mod"));
        let path = output_path(Path::new("logo.svg"), Some(Path::new("out")), Format::Pretty);
        assert_eq!(path, PathBuf::from("out.kicad_mod"));
    }
}

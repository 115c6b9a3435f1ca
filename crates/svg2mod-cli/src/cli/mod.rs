//! CLI command implementations.
//!
//! - `convert` - Write a `.kicad_mod` or `.mod` file from an SVG
//! - `layers` - Show the group tree and the layer every group maps to

pub mod convert;
pub mod layers;

use clap::ValueEnum;
use svg2mod::{Format, Units};

/// `--format` values.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatArg {
    Legacy,
    Pretty,
    Latest,
}

impl From<FormatArg> for Format {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Legacy => Format::Legacy,
            FormatArg::Pretty => Format::Pretty,
            FormatArg::Latest => Format::Latest,
        }
    }
}

/// `--units` values.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitsArg {
    Mm,
    Decimal,
}

impl From<UnitsArg> for Units {
    fn from(arg: UnitsArg) -> Self {
        match arg {
            UnitsArg::Mm => Units::Mm,
            UnitsArg::Decimal => Units::Decimal,
        }
    }
}

/// Quote one argument the way a POSIX shell would need it.
pub fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "@%+=:,./_-".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r#"'"'"'"#))
    }
}

/// The invoking command line, with the program reduced to its file name.
pub fn command_line<I: IntoIterator<Item = String>>(args: I) -> String {
    args.into_iter()
        .enumerate()
        .map(|(i, arg)| {
            if i == 0 {
                let program = std::path::Path::new(&arg)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or(arg);
                shell_quote(&program)
            } else {
                shell_quote(&arg)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting() {
        assert_eq!(shell_quote("logo.svg"), "logo.svg");
        assert_eq!(shell_quote("my logo.svg"), "'my logo.svg'");
        assert_eq!(shell_quote("it's"), r#"'it'"'"'s'"#);
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn program_is_reduced_to_its_name() {
        let args = ["/usr/local/bin/svg2mod", "convert", "a b.svg"].map(String::from);
        assert_eq!(command_line(args), "svg2mod convert 'a b.svg'");
    }
}

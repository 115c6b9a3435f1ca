//! svg2mod - convert layered SVG drawings into KiCad footprints
//!
//! Usage:
//!   svg2mod convert <svg> [-o out] [--format latest]   Write a footprint file
//!   svg2mod layers <svg> [--json]                       Show which groups map to layers

use clap::{Parser, Subcommand};
use env_logger::Env;

mod cli;

use cli::convert::ConvertArgs;
use cli::layers::LayersArgs;

#[derive(Parser)]
#[command(name = "svg2mod")]
#[command(about = "Convert layered SVG drawings into KiCad footprint modules", long_about = None)]
#[command(version)]
struct Cli {
    /// Show per-item progress
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Show everything, including skipped geometry
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert an SVG file into a footprint module
    Convert(ConvertArgs),

    /// Print the group tree and the layer each group maps to
    Layers(LayersArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Progress messages on the unfiltered target always show; RUST_LOG wins.
    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    let env = Env::default().default_filter_or(format!("{},{}=info", level, svg2mod::UNFILTERED));
    env_logger::Builder::from_env(env).format_timestamp(None).init();

    match cli.command {
        Commands::Convert(args) => cli::convert::execute(&args),
        Commands::Layers(args) => cli::layers::execute(&args),
    }
}

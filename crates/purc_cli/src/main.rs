//! PurC CLI — a command-line front end for the HVML document parser.
//!
//! Provides `purc parse` for parsing an HVML document and reporting its
//! tree structure and any diagnostics logged while building it.

#![warn(missing_docs)]

mod parse;

use std::process;

use clap::{Parser, Subcommand, ValueEnum};

/// purc — an HVML document parser front end.
#[derive(Parser, Debug)]
#[command(name = "purc", version, about = "HVML document parser front end")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Control colored output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse an HVML document and report its structure and diagnostics.
    Parse(ParseArgs),
}

/// Arguments for the `purc parse` subcommand.
#[derive(Parser, Debug)]
pub struct ParseArgs {
    /// Path to the HVML document to parse.
    pub path: String,

    /// Output format for the result.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,

    /// Maximum eJSON/JSONEE nesting depth to allow while parsing.
    #[arg(long, default_value_t = 64)]
    pub max_ejson_depth: u32,
}

/// Result output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Controls whether colored output is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Detect from terminal capabilities.
    Auto,
    /// Always produce colored output.
    Always,
    /// Never produce colored output.
    Never,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to use colored output.
    pub color: bool,
}

fn main() {
    let cli = Cli::parse();

    let color = match cli.color {
        ColorChoice::Auto => atty_is_terminal(),
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    let global = GlobalArgs { quiet: cli.quiet, color };

    let result = match cli.command {
        Command::Parse(ref args) => parse::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Rough terminal detection — checks whether the `TERM` env var is set.
fn atty_is_terminal() -> bool {
    std::env::var("TERM").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_defaults() {
        let cli = Cli::parse_from(["purc", "parse", "doc.hvml"]);
        let Command::Parse(args) = cli.command;
        assert_eq!(args.path, "doc.hvml");
        assert_eq!(args.format, ReportFormat::Text);
        assert_eq!(args.max_ejson_depth, 64);
    }

    #[test]
    fn parse_json_format() {
        let cli = Cli::parse_from(["purc", "parse", "doc.hvml", "--format", "json"]);
        let Command::Parse(args) = cli.command;
        assert_eq!(args.format, ReportFormat::Json);
    }

    #[test]
    fn color_choice_defaults_to_auto() {
        let cli = Cli::parse_from(["purc", "parse", "doc.hvml"]);
        assert_eq!(cli.color, ColorChoice::Auto);
    }
}

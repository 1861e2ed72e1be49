//! `purc parse` — parses an HVML document and reports its tree and
//! diagnostics.
//!
//! The pipeline:
//!
//! 1. Load the file into a [`purc_source::SourceDb`] (used only to render
//!    diagnostic source snippets).
//! 2. Parse it with [`purc::Frontend::load_from_file`].
//! 3. Render the tree and diagnostics in the requested format.

use std::path::Path;

use purc_diagnostics::{Diagnostic, DiagnosticRenderer, Severity, TerminalRenderer};
use purc_vdom::{Document, NodeId, NodeKind};
use serde::Serialize;

use crate::{GlobalArgs, ParseArgs, ReportFormat};

/// Runs the `purc parse` command.
///
/// Returns exit code 0 if the document parsed without error-severity
/// diagnostics, 1 otherwise.
pub fn run(args: &ParseArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let path = Path::new(&args.path);

    let mut source_db = purc_source::SourceDb::new();
    source_db.load_file(path)?;

    let mut config = purc_config::ParserConfig::default();
    config.max_ejson_depth = args.max_ejson_depth;
    let frontend = purc::Frontend::new(config);
    let loaded = frontend.load_from_file(path)?;

    match args.format {
        ReportFormat::Text => {
            if !global.quiet {
                print_tree(&loaded.document, loaded.document.root(), 0);
            }
            let renderer = TerminalRenderer::new(global.color, 80);
            for diag in &loaded.diagnostics {
                eprintln!("{}", renderer.render(diag, &source_db));
            }
            if !global.quiet {
                let error_count = loaded.diagnostics.iter().filter(|d| d.severity.is_error()).count();
                let warning_count =
                    loaded.diagnostics.iter().filter(|d| d.severity == Severity::Warning).count();
                eprintln!("   Result: {error_count} error(s), {warning_count} warning(s)");
            }
        }
        ReportFormat::Json => {
            let summary = ParseSummary {
                node_count: loaded.document.len(),
                has_errors: loaded.has_errors(),
                diagnostics: &loaded.diagnostics,
            };
            println!("{}", serde_json::to_string_pretty(&summary).unwrap_or_else(|_| "{}".to_string()));
        }
    }

    Ok(if loaded.has_errors() { 1 } else { 0 })
}

/// A machine-readable summary of a parse, used for `--format json`.
#[derive(Serialize)]
struct ParseSummary<'a> {
    node_count: usize,
    has_errors: bool,
    diagnostics: &'a [Diagnostic],
}

/// Prints an indented dump of the document tree to stdout.
fn print_tree(doc: &Document, id: NodeId, depth: usize) {
    let indent = "  ".repeat(depth);
    match &doc.node(id).kind {
        NodeKind::Document => println!("{indent}#document"),
        NodeKind::Element { name, attributes, self_closing, foreign } => {
            let tag = purc_common::str_for(*name);
            let marker = if *foreign { "foreign " } else { "" };
            let closing = if *self_closing { ", self-closing" } else { "" };
            let plural = if attributes.len() == 1 { "" } else { "s" };
            println!("{indent}<{marker}{tag}> ({} attr{plural}{closing})", attributes.len());
        }
        NodeKind::Content { .. } => println!("{indent}#content"),
        NodeKind::Comment { text } => println!("{indent}<!-- {text} -->"),
    }
    for child in &doc.node(id).children {
        print_tree(doc, *child, depth + 1);
    }
}

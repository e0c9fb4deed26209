use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::Result;

use fg_graph::{CheckDiagnostic, Severity};
use fg_manifest::{TopologyManifest, build_graph};

use crate::tracing_init;

fn print_diag(diag: &CheckDiagnostic, color: bool) {
    let (prefix, code) = match diag.severity {
        Severity::Error => ("error", "\x1b[1;31m"), // bold red
        Severity::Warning => ("warning", "\x1b[1;38;5;208m"), // bold orange
    };
    let reset = "\x1b[0m";

    let location = match &diag.port {
        Some(port) => format!(": operator `{}` port `{port}`", diag.operator),
        None => format!(": operator `{}`", diag.operator),
    };

    if color {
        eprintln!("{code}{prefix}{reset}{location}: {}", diag.message);
    } else {
        eprintln!("{prefix}{location}: {}", diag.message);
    }
}

pub fn run(manifest_path: PathBuf, verbose: bool) -> Result<()> {
    let manifest = TopologyManifest::load(&manifest_path)?;
    let base_dir = manifest_path.parent().unwrap_or(Path::new("."));
    let _guard = tracing_init::init_tracing(&manifest.logging, base_dir)?;

    let graph = build_graph(&manifest)?;
    tracing::info!(
        operators = graph.len(),
        connections = graph.connection_count(),
        "graph built"
    );

    let report = graph
        .compile_checks(verbose)
        .map_err(|e| anyhow::anyhow!("compile checks failed to run: {e}"))?;

    let color = std::io::stderr().is_terminal();

    for diag in report.diagnostics() {
        print_diag(diag, color);
    }

    let ec = report.error_count();
    let wc = report.warning_count();
    if ec + wc == 0 {
        if color {
            eprintln!("\x1b[1;32mNo issues found.\x1b[0m");
        } else {
            eprintln!("No issues found.");
        }
    } else if color {
        let mut buf = String::new();
        buf.push_str("\n\x1b[1m");
        if ec > 0 {
            buf.push_str(&format!("\x1b[31m{ec} error(s)\x1b[0m\x1b[1m"));
        }
        if ec > 0 && wc > 0 {
            buf.push_str(", ");
        }
        if wc > 0 {
            buf.push_str(&format!("\x1b[38;5;208m{wc} warning(s)\x1b[0m"));
        }
        eprint!("{buf}");
        let _ = std::io::stderr().flush();
        eprintln!();
    } else {
        eprintln!("\n{ec} error(s), {wc} warning(s)");
    }

    if !report.passed() {
        process::exit(1);
    }

    Ok(())
}

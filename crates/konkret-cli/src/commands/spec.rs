//! Handler for `konkret spec`.

use std::path::Path;

use miette::{IntoDiagnostic, Result};

use konkret_core::compilers::CompilerRegistry;
use konkret_core::config::Preferences;
use konkret_core::package::Repository;
use konkret_core::spec::ArchSpec;
use konkret_resolver::Concretizer;
use konkret_util::errors::KonkretError;

pub struct SpecOptions<'a> {
    pub request: &'a str,
    pub repo: &'a Path,
    pub compilers: &'a Path,
    pub config: Option<&'a Path>,
    pub arch: &'a str,
    pub json: bool,
    pub report: bool,
}

pub fn exec(opts: SpecOptions<'_>) -> Result<()> {
    let repo = Repository::from_path(opts.repo).map_err(|e| with_path(opts.repo, e))?;
    let compilers =
        CompilerRegistry::from_path(opts.compilers).map_err(|e| with_path(opts.compilers, e))?;
    let prefs = match opts.config {
        Some(path) => Preferences::from_path(path).map_err(|e| with_path(path, e))?,
        None => Preferences::new(),
    };
    let arch: ArchSpec = opts.arch.parse()?;
    tracing::debug!("Concretizing '{}' for {arch}", opts.request);

    let concretizer = Concretizer::new(&repo, &compilers, &prefs, arch)?;
    let (graph, report) = concretizer.concretize_request(opts.request)?;

    if opts.json {
        let json = serde_json::to_string_pretty(&graph.to_nodes()).into_diagnostic()?;
        println!("{json}");
    } else {
        print!("{}", graph.tree());
    }
    if opts.report {
        eprintln!("{}", report.to_string().trim_end());
    }
    Ok(())
}

/// Name the file an I/O failure came from.
fn with_path(path: &Path, err: KonkretError) -> KonkretError {
    match err {
        KonkretError::Io(e) => KonkretError::Config {
            message: format!("Could not read {}: {e}", path.display()),
        },
        other => other,
    }
}

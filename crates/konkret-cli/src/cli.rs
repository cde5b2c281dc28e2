//! CLI argument definitions for Konkret.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "konkret",
    version,
    about = "Concretize abstract package specs into fully specified build DAGs",
    long_about = "Konkret takes an abstract spec request such as `mpileaks@2: %gcc ^mpich` \
                  and picks a version, architecture, compiler, variant values and compiler \
                  flags for every package in its dependency DAG."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Concretize a spec request and print the resulting DAG
    Spec {
        /// The request, e.g. "mpileaks@2.3 %gcc@9.1.0 +debug ^mpich"
        request: String,
        /// Package repository file
        #[arg(long, default_value = "repo.toml")]
        repo: PathBuf,
        /// Compiler registry file
        #[arg(long, default_value = "compilers.toml")]
        compilers: PathBuf,
        /// Preferences file (optional)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Default architecture as platform-os-target
        #[arg(long, env = "KONKRET_ARCH")]
        arch: String,
        /// Print the DAG as JSON instead of a tree
        #[arg(long)]
        json: bool,
        /// Also print the decisions made along the way
        #[arg(long)]
        report: bool,
    },
}

/// Parse command-line arguments.
pub fn parse() -> Cli {
    Cli::parse()
}

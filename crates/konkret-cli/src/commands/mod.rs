//! Command dispatch and handler modules.

mod spec;

use miette::Result;

use crate::cli::{Cli, Command};

/// Route a parsed CLI invocation to the appropriate command handler.
pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Spec {
            request,
            repo,
            compilers,
            config,
            arch,
            json,
            report,
        } => spec::exec(spec::SpecOptions {
            request: &request,
            repo: &repo,
            compilers: &compilers,
            config: config.as_deref(),
            arch: &arch,
            json,
            report,
        }),
    }
}

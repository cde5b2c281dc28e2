use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for all konkret operations.
///
/// Every concretization error is terminal: the session that raised it is
/// abandoned and no partially concrete graph is handed back.
#[derive(Debug, Error, Diagnostic)]
pub enum KonkretError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration file (repository, compilers, preferences) is malformed.
    #[error("Configuration error: {message}")]
    #[diagnostic(help("Check the TOML file for syntax errors and unknown keys"))]
    Config { message: String },

    /// A version string contains characters outside `[A-Za-z0-9_.-]`.
    #[error("Malformed version string '{version}': {reason}")]
    MalformedVersion { version: String, reason: String },

    /// A version range whose end sorts before its start.
    #[error("Invalid version range '{range}': end is lower than start")]
    InvalidRange { range: String },

    /// A request string could not be parsed.
    #[error("Invalid spec '{input}': {message}")]
    SpecParse { input: String, message: String },

    /// A name is neither a package nor a virtual provided by any package.
    #[error("Package '{name}' not found in the repository")]
    #[diagnostic(help("Add a [package.{name}] table to the repository file"))]
    UnknownPackage { name: String },

    /// A variant is set on a package that does not declare it.
    #[error("Package '{package}' has no variant '{variant}'")]
    UnknownVariant { package: String, variant: String },

    /// A `^dep` constraint names a package that is not in the DAG.
    #[error("'{package}' does not depend on '{dependency}'")]
    InvalidDependency { package: String, dependency: String },

    /// Two constraints on the same attribute cannot both hold.
    #[error("{package}: {kind} '{provided}' does not satisfy '{required}'")]
    Unsatisfiable {
        package: String,
        kind: String,
        provided: String,
        required: String,
    },

    /// The version constraint has no satisfying known version.
    #[error("There are no valid versions for {package} that match '{versions}'")]
    #[diagnostic(help("Relax the version constraint or declare a matching version"))]
    NoValidVersion { package: String, versions: String },

    /// A non-buildable package has no matching external installation.
    #[error(
        "The spec '{package}' is configured as not buildable, and no matching external installs were found"
    )]
    NoBuild { package: String },

    /// A virtual package has no registered providers.
    #[error("No providers found for virtual package '{virtual_name}'")]
    UnsatisfiableProvider { virtual_name: String },

    /// No registered compiler matches a compiler constraint.
    #[error("No compilers with spec {compiler} found{}", for_arch(.arch))]
    #[diagnostic(help("Register a matching compiler in the compiler registry"))]
    UnavailableCompilerVersion {
        compiler: String,
        arch: Option<(String, String)>,
    },

    /// The architecture has no registered compilers at all.
    #[error(
        "No compilers found for operating system {os} and target {target}.\nCompilers are defined for the following operating systems and targets:\n\t{available}"
    )]
    #[diagnostic(help(
        "If previous builds succeeded, the operating system may have been updated"
    ))]
    NoCompilersForArch {
        os: String,
        target: String,
        available: String,
    },

    /// The compiler registry is empty.
    #[error("No compilers are registered")]
    #[diagnostic(help("Add at least one [[compiler]] entry to the compiler registry"))]
    NoCompilers,

    /// A sweep made no progress but some attributes are still open.
    #[error("Concretization stalled with unresolved attributes: {unresolved}")]
    #[diagnostic(help("The constraints are contradictory; relax one of them"))]
    StalledFixpoint { unresolved: String },

    /// Catch-all for miscellaneous errors.
    #[error("{message}")]
    Generic { message: String },
}

fn for_arch(arch: &Option<(String, String)>) -> String {
    match arch {
        Some((os, target)) => format!(" for operating system {os} and target {target}"),
        None => String::new(),
    }
}

/// Result alias used by the library crates; the CLI converts into `miette::Result`.
pub type KonkretResult<T> = std::result::Result<T, KonkretError>;

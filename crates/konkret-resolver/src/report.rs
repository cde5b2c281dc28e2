//! A record of the decisions made while concretizing.

use std::fmt;

use serde::Serialize;

/// Every value the concretizer chose, in the order it chose them.
#[derive(Debug, Default, Serialize)]
pub struct ConcretizationReport {
    pub decisions: Vec<Decision>,
    /// Number of full passes over the DAG, including the final idle one.
    pub sweeps: usize,
}

/// One attribute fixed on one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub package: String,
    pub attribute: String,
    pub value: String,
}

impl ConcretizationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, package: impl Into<String>, attribute: &str, value: impl Into<String>) {
        self.decisions.push(Decision {
            package: package.into(),
            attribute: attribute.to_string(),
            value: value.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    /// Decisions made for one package.
    pub fn for_package<'a>(&'a self, package: &'a str) -> impl Iterator<Item = &'a Decision> {
        self.decisions.iter().filter(move |d| d.package == package)
    }
}

impl fmt::Display for ConcretizationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.decisions.is_empty() {
            return write!(f, "No decisions needed.");
        }
        writeln!(
            f,
            "Decisions ({}, {} sweeps):",
            self.decisions.len(),
            self.sweeps
        )?;
        for d in &self.decisions {
            writeln!(f, "  {d}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} = {}", self.package, self.attribute, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_report() {
        let report = ConcretizationReport::new();
        assert!(report.is_empty());
        assert_eq!(report.len(), 0);
        assert_eq!(report.to_string(), "No decisions needed.");
    }

    #[test]
    fn report_with_decisions() {
        let mut report = ConcretizationReport::new();
        report.add("zlib", "version", "1.2.11");
        report.add("mpi", "provider", "mpich@3.2");
        report.sweeps = 2;
        assert_eq!(report.len(), 2);
        assert_eq!(report.for_package("zlib").count(), 1);
        let s = report.to_string();
        assert!(s.starts_with("Decisions (2, 2 sweeps):"));
        assert!(s.contains("  zlib: version = 1.2.11"));
        assert!(s.contains("  mpi: provider = mpich@3.2"));
    }
}

//! Architecture triples: `platform-os-target`.

use std::fmt;
use std::str::FromStr;

use konkret_util::errors::{KonkretError, KonkretResult};

/// Names that stand for "whatever the host default is".
const PLACEHOLDERS: &[&str] = &[
    "default",
    "default_platform",
    "default_os",
    "default_target",
    "frontend",
    "backend",
    "fe",
    "be",
];

/// One field of an [`ArchSpec`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArchValue {
    /// A placeholder to be replaced by the system default.
    Default,
    Named(String),
}

impl ArchValue {
    pub fn parse(s: &str) -> Self {
        if PLACEHOLDERS.contains(&s) {
            ArchValue::Default
        } else {
            ArchValue::Named(s.to_string())
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            ArchValue::Default => None,
            ArchValue::Named(s) => Some(s),
        }
    }
}

impl fmt::Display for ArchValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchValue::Default => f.write_str("default"),
            ArchValue::Named(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchField {
    Platform,
    Os,
    Target,
}

impl ArchField {
    pub const ALL: [ArchField; 3] = [ArchField::Platform, ArchField::Os, ArchField::Target];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArchField::Platform => "platform",
            ArchField::Os => "os",
            ArchField::Target => "target",
        }
    }
}

/// A possibly partial architecture. Unset fields are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ArchSpec {
    pub platform: Option<ArchValue>,
    pub os: Option<ArchValue>,
    pub target: Option<ArchValue>,
}

impl ArchSpec {
    pub fn new(platform: &str, os: &str, target: &str) -> Self {
        Self {
            platform: Some(ArchValue::parse(platform)),
            os: Some(ArchValue::parse(os)),
            target: Some(ArchValue::parse(target)),
        }
    }

    pub fn get(&self, field: ArchField) -> Option<&ArchValue> {
        match field {
            ArchField::Platform => self.platform.as_ref(),
            ArchField::Os => self.os.as_ref(),
            ArchField::Target => self.target.as_ref(),
        }
    }

    pub fn set(&mut self, field: ArchField, value: Option<ArchValue>) {
        match field {
            ArchField::Platform => self.platform = value,
            ArchField::Os => self.os = value,
            ArchField::Target => self.target = value,
        }
    }

    /// The named value of a field, skipping unset fields and placeholders.
    pub fn named(&self, field: ArchField) -> Option<&str> {
        self.get(field).and_then(ArchValue::name)
    }

    pub fn is_unset(&self) -> bool {
        self.platform.is_none() && self.os.is_none() && self.target.is_none()
    }

    pub fn is_concrete(&self) -> bool {
        ArchField::ALL.iter().all(|f| self.named(*f).is_some())
    }

    /// Every field set on `other` is set to the same value here. In strict
    /// mode a field unset here fails the check.
    pub fn satisfies(&self, other: &ArchSpec, strict: bool) -> bool {
        ArchField::ALL.iter().all(|f| match (self.get(*f), other.get(*f)) {
            (_, None) => true,
            (None, Some(_)) => !strict,
            (Some(a), Some(b)) => a == b,
        })
    }

    /// Fill unset fields from `other`, failing on a field set differently
    /// on both sides. Returns whether anything changed.
    pub fn constrain(&mut self, other: &ArchSpec) -> KonkretResult<bool> {
        let mut changed = false;
        for field in ArchField::ALL {
            match (self.get(field).cloned(), other.get(field)) {
                (_, None) => {}
                (None, Some(v)) => {
                    self.set(field, Some(v.clone()));
                    changed = true;
                }
                (Some(a), Some(b)) if &a != b => {
                    return Err(KonkretError::Unsatisfiable {
                        package: String::new(),
                        kind: field.as_str().to_string(),
                        provided: a.to_string(),
                        required: b.to_string(),
                    });
                }
                _ => {}
            }
        }
        Ok(changed)
    }
}

impl fmt::Display for ArchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: &Option<ArchValue>| match v {
            Some(v) => v.to_string(),
            None => "None".to_string(),
        };
        write!(
            f,
            "{}-{}-{}",
            show(&self.platform),
            show(&self.os),
            show(&self.target)
        )
    }
}

impl FromStr for ArchSpec {
    type Err = KonkretError;

    /// Parses `platform-os-target`; `None` or an empty field leaves it unset.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('-').collect();
        if parts.len() != 3 {
            return Err(KonkretError::SpecParse {
                input: s.to_string(),
                message: "architecture must have the form platform-os-target".to_string(),
            });
        }
        let field = |p: &str| match p {
            "" | "None" => None,
            other => Some(ArchValue::parse(other)),
        };
        Ok(Self {
            platform: field(parts[0]),
            os: field(parts[1]),
            target: field(parts[2]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_triple() {
        let arch: ArchSpec = "linux-ubuntu22-x86_64".parse().unwrap();
        assert!(arch.is_concrete());
        assert_eq!(arch.named(ArchField::Os), Some("ubuntu22"));
        assert_eq!(arch.to_string(), "linux-ubuntu22-x86_64");
    }

    #[test]
    fn test_parse_partial_and_placeholders() {
        let arch: ArchSpec = "linux-None-fe".parse().unwrap();
        assert!(arch.os.is_none());
        assert_eq!(arch.target, Some(ArchValue::Default));
        assert!(!arch.is_concrete());
        assert_eq!(arch.to_string(), "linux-None-default");
    }

    #[test]
    fn test_parse_rejects_wrong_arity() {
        assert!("linux-x86_64".parse::<ArchSpec>().is_err());
    }

    #[test]
    fn test_constrain_fills_and_conflicts() {
        let mut arch: ArchSpec = "linux-None-None".parse().unwrap();
        let other: ArchSpec = "None-ubuntu22-x86_64".parse().unwrap();
        assert!(arch.constrain(&other).unwrap());
        assert!(arch.is_concrete());
        assert!(!arch.constrain(&other).unwrap());

        let clash: ArchSpec = "darwin-None-None".parse().unwrap();
        assert!(arch.constrain(&clash).is_err());
    }

    #[test]
    fn test_satisfies() {
        let full = ArchSpec::new("linux", "ubuntu22", "x86_64");
        let partial: ArchSpec = "linux-None-None".parse().unwrap();
        assert!(full.satisfies(&partial, false));
        assert!(partial.satisfies(&full, false));
        assert!(!partial.satisfies(&full, true));
    }
}

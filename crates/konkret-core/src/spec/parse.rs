//! The request grammar.
//!
//! ```text
//! request    := node ( '^' node )*
//! node       := word+
//! word       := name? sigil* | key '=' value
//! sigil      := '@' versions | '%' compiler ['@' versions] | '+' variant | '~' variant
//! ```
//!
//! `key` is one of `arch`, `platform`, `os`, `target`, a flag category
//! (`cflags`, ...) or a variant name. Values may be double quoted to carry
//! spaces, e.g. `cflags="-O2 -g"`.

use konkret_util::errors::{KonkretError, KonkretResult};

use super::{ArchField, ArchSpec, ArchValue, CompilerSpec, FlagKind, Spec, VariantValue};
use crate::version::VersionList;

/// A parsed request: the root node and the `^` constraints on its
/// dependencies.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecRequest {
    pub root: Spec,
    pub dependencies: Vec<Spec>,
}

pub fn parse_request(input: &str) -> KonkretResult<SpecRequest> {
    let err = |message: String| KonkretError::SpecParse {
        input: input.to_string(),
        message,
    };

    let mut nodes = Vec::new();
    for chunk in split_outside_quotes(input, '^').map_err(err)? {
        let words = words(&chunk);
        if words.is_empty() {
            return Err(err("empty spec".to_string()));
        }
        nodes.push(parse_node(&words).map_err(err)?);
    }

    let mut nodes = nodes.into_iter();
    let root = nodes.next().ok_or_else(|| err("empty spec".to_string()))?;
    let mut dependencies: Vec<Spec> = Vec::new();
    for dep in nodes {
        if dep.name == root.name || dependencies.iter().any(|d| d.name == dep.name) {
            return Err(err(format!("'{}' is constrained twice", dep.name)));
        }
        dependencies.push(dep);
    }
    Ok(SpecRequest { root, dependencies })
}

fn split_outside_quotes(input: &str, sep: char) -> Result<Vec<String>, String> {
    let mut chunks = vec![String::new()];
    let mut quoted = false;
    for c in input.chars() {
        match c {
            c if c == sep && !quoted => chunks.push(String::new()),
            c => {
                if c == '"' {
                    quoted = !quoted;
                }
                if let Some(chunk) = chunks.last_mut() {
                    chunk.push(c);
                }
            }
        }
    }
    if quoted {
        return Err("unterminated quote".to_string());
    }
    Ok(chunks)
}

fn words(chunk: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in chunk.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn is_name(s: &str) -> bool {
    !s.is_empty()
        && s.chars().next().is_some_and(|c| c.is_ascii_alphanumeric())
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn parse_node(words: &[String]) -> Result<Spec, String> {
    let mut spec: Option<Spec> = None;
    for word in words {
        match word.split_once('=') {
            Some((key, value)) if is_name(key) => {
                let spec = spec
                    .as_mut()
                    .ok_or_else(|| format!("'{word}' must follow a package name"))?;
                apply_key_value(spec, key, unquote(value))?;
            }
            _ => parse_sigils(word, &mut spec)?,
        }
    }
    spec.ok_or_else(|| "missing package name".to_string())
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

#[derive(Clone, Copy, PartialEq)]
enum VersionTarget {
    Package,
    Compiler,
}

fn parse_sigils(word: &str, spec: &mut Option<Spec>) -> Result<(), String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    for c in word.chars() {
        if matches!(c, '@' | '%' | '+' | '~') && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() {
        parts.push(current);
    }

    let mut target = VersionTarget::Package;
    for part in parts {
        let (sigil, body) = match part.chars().next() {
            Some(c @ ('@' | '%' | '+' | '~')) => (Some(c), &part[1..]),
            _ => (None, part.as_str()),
        };

        let Some(sigil) = sigil else {
            if spec.is_some() {
                return Err(format!("unexpected package name '{body}'"));
            }
            if !is_name(body) {
                return Err(format!("invalid package name '{body}'"));
            }
            *spec = Some(Spec::new(body));
            continue;
        };

        let node = spec
            .as_mut()
            .ok_or_else(|| format!("'{part}' must follow a package name"))?;
        if body.is_empty() {
            return Err(format!("'{sigil}' must be followed by a value"));
        }

        match sigil {
            '@' => {
                let versions: VersionList = body.parse().map_err(|e| format!("{e}"))?;
                match target {
                    VersionTarget::Package => {
                        if !node.versions.is_any() {
                            return Err(format!("duplicate version on '{}'", node.name));
                        }
                        node.versions = versions;
                    }
                    VersionTarget::Compiler => {
                        let compiler = node
                            .compiler
                            .as_mut()
                            .ok_or_else(|| "compiler version without compiler".to_string())?;
                        if !compiler.versions.is_any() {
                            return Err(format!("duplicate compiler version on '{}'", node.name));
                        }
                        compiler.versions = versions;
                    }
                }
            }
            '%' => {
                if node.compiler.is_some() {
                    return Err(format!("duplicate compiler on '{}'", node.name));
                }
                node.compiler = Some(body.parse::<CompilerSpec>().map_err(|e| format!("{e}"))?);
                target = VersionTarget::Compiler;
            }
            _ => {
                if !is_name(body) {
                    return Err(format!("invalid variant name '{body}'"));
                }
                set_variant(node, body, VariantValue::Bool(sigil == '+'))?;
                target = VersionTarget::Package;
            }
        }
    }
    Ok(())
}

fn set_variant(spec: &mut Spec, name: &str, value: VariantValue) -> Result<(), String> {
    if spec.variants.contains_key(name) {
        return Err(format!("variant '{name}' is set twice on '{}'", spec.name));
    }
    spec.variants.insert(name.to_string(), value);
    Ok(())
}

fn apply_key_value(spec: &mut Spec, key: &str, value: &str) -> Result<(), String> {
    let arch_field = match key {
        "platform" => Some(ArchField::Platform),
        "os" => Some(ArchField::Os),
        "target" => Some(ArchField::Target),
        _ => None,
    };

    if key == "arch" {
        if !spec.architecture.is_unset() {
            return Err(format!("duplicate architecture on '{}'", spec.name));
        }
        spec.architecture = value.parse::<ArchSpec>().map_err(|e| format!("{e}"))?;
    } else if let Some(field) = arch_field {
        if spec.architecture.get(field).is_some() {
            return Err(format!("duplicate {key} on '{}'", spec.name));
        }
        spec.architecture.set(field, Some(ArchValue::parse(value)));
    } else if let Ok(kind) = key.parse::<FlagKind>() {
        spec.compiler_flags.set_from_str(kind, value);
    } else {
        set_variant(spec, key, VariantValue::parse(value))?;
    }
    Ok(())
}

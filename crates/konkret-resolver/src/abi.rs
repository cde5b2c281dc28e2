//! ABI compatibility checks used to rank provider and external candidates.

use konkret_core::spec::Spec;

/// Decides whether a child spec can be linked into a parent.
pub trait AbiCompatibility {
    /// `loose` only requires matching compiler names; otherwise the versions
    /// must line up as well.
    fn compatible(&self, parent: &Spec, child: &Spec, loose: bool) -> bool;
}

/// Architecture and compiler based compatibility.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAbi;

impl DefaultAbi {
    /// Unset architectures are compatible with anything.
    pub fn architecture_compatible(&self, parent: &Spec, child: &Spec) -> bool {
        parent.architecture.is_unset()
            || child.architecture.is_unset()
            || parent.architecture == child.architecture
    }

    pub fn compiler_compatible(&self, parent: &Spec, child: &Spec, loose: bool) -> bool {
        let (Some(pc), Some(cc)) = (&parent.compiler, &child.compiler) else {
            return true;
        };
        if pc.name != cc.name {
            return false;
        }
        if loose {
            return true;
        }
        // Intel keeps its ABI across a major release.
        if pc.name == "intel" {
            return match (pc.concrete(), cc.concrete()) {
                (Some(p), Some(c)) => p.up_to(1) == c.up_to(1),
                _ => pc.versions.overlaps(&cc.versions),
            };
        }
        pc.versions.items().iter().any(|pv| {
            cc.versions
                .items()
                .iter()
                .any(|cv| pv.satisfies(cv))
        })
    }
}

impl AbiCompatibility for DefaultAbi {
    fn compatible(&self, parent: &Spec, child: &Spec, loose: bool) -> bool {
        self.architecture_compatible(parent, child) && self.compiler_compatible(parent, child, loose)
    }
}

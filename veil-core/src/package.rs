//! Package assembly - selects and orders hooks for one target kind
//!
//! Assembly is a stable filter over the registry: the registry order is kept,
//! excluded codenames and hooks not allowed for the target are dropped.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::hooks::{Hook, HookRegistry, ScriptHook, TargetKind};

/// Ordered hooks ready to run in one execution context
#[derive(Debug)]
pub struct Package {
    target: TargetKind,
    hooks: Vec<Box<dyn Hook>>,
}

impl Package {
    pub fn new(target: TargetKind, hooks: Vec<Box<dyn Hook>>) -> Self {
        Self { target, hooks }
    }

    pub fn target(&self) -> TargetKind {
        self.target
    }

    pub fn hooks(&self) -> &[Box<dyn Hook>] {
        &self.hooks
    }

    pub fn codenames(&self) -> Vec<&str> {
        self.hooks.iter().map(|h| h.codename()).collect()
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Serializable form, for shipping a package to another process
    pub fn manifest(&self) -> PackageManifest {
        PackageManifest {
            target: self.target,
            hooks: self
                .hooks
                .iter()
                .map(|h| ScriptHook::from_hook(h.as_ref()))
                .collect(),
        }
    }

    /// Rebuild a package from its manifest. Order is taken as given.
    pub fn from_manifest(manifest: PackageManifest) -> Self {
        let hooks = manifest
            .hooks
            .into_iter()
            .map(|h| Box::new(h) as Box<dyn Hook>)
            .collect();
        Self::new(manifest.target, hooks)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManifest {
    pub target: TargetKind,
    pub hooks: Vec<ScriptHook>,
}

/// Builds packages from a registry
#[derive(Debug, Clone, Copy)]
pub struct PackageAssembler<'r> {
    registry: &'r HookRegistry,
}

impl Default for PackageAssembler<'static> {
    fn default() -> Self {
        Self::new(HookRegistry::global())
    }
}

impl<'r> PackageAssembler<'r> {
    pub fn new(registry: &'r HookRegistry) -> Self {
        Self { registry }
    }

    pub fn pack(&self, target: TargetKind, excluded: &HashSet<String>) -> Package {
        let scope = target.scope();
        let mut hooks = Vec::new();

        for entry in self.registry.iter() {
            if excluded.contains(entry.codename()) {
                trace!(codename = entry.codename(), "Hook excluded");
                continue;
            }
            if !entry.allowed_targets().intersects(scope) {
                trace!(codename = entry.codename(), kind = %target, "Hook not allowed for target");
                continue;
            }
            hooks.push(entry.construct());
        }

        debug!(kind = %target, hooks = hooks.len(), excluded = excluded.len(), "Package assembled");
        Package::new(target, hooks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::{RegistryEntry, TargetScope};

    fn registry(hooks: &[(&'static str, i32, TargetScope)]) -> HookRegistry {
        let mut builder = HookRegistry::builder();
        for &(codename, priority, targets) in hooks {
            builder
                .register(RegistryEntry::from_constructor(move || {
                    Box::new(ScriptHook::new(codename, priority, targets, ""))
                }))
                .unwrap();
        }
        builder.build()
    }

    #[test]
    fn test_equal_priority_orders_by_codename() {
        let reg = registry(&[
            ("b", 5, TargetScope::ALL),
            ("a", 5, TargetScope::ALL),
        ]);
        let package = PackageAssembler::new(&reg).pack(TargetKind::Main, &HashSet::new());
        assert_eq!(package.codenames(), vec!["a", "b"]);
    }

    #[test]
    fn test_scope_filter_and_exclusions() {
        let reg = registry(&[
            ("main_only", 3, TargetScope::MAIN),
            ("workers", 2, TargetScope::WORKER),
            ("shared", 1, TargetScope::SHARED_WORKER),
            ("skipped", 0, TargetScope::ALL),
        ]);
        let excluded: HashSet<String> = ["skipped".to_string()].into_iter().collect();
        let assembler = PackageAssembler::new(&reg);

        assert_eq!(
            assembler.pack(TargetKind::Main, &excluded).codenames(),
            vec!["main_only"]
        );
        assert_eq!(
            assembler.pack(TargetKind::DedicatedWorker, &excluded).codenames(),
            vec!["workers"]
        );
        assert_eq!(
            assembler.pack(TargetKind::SharedWorker, &excluded).codenames(),
            vec!["workers", "shared"]
        );
    }

    #[test]
    fn test_manifest_rebuild_keeps_order_and_bodies() {
        let reg = registry(&[("x", 2, TargetScope::ALL), ("y", 1, TargetScope::ALL)]);
        let package = PackageAssembler::new(&reg).pack(TargetKind::Main, &HashSet::new());
        let manifest = package.manifest();

        let json = serde_json::to_string(&manifest).unwrap();
        let rebuilt = Package::from_manifest(serde_json::from_str(&json).unwrap());
        assert_eq!(rebuilt.codenames(), vec!["x", "y"]);
        assert_eq!(rebuilt.target(), TargetKind::Main);
        assert_eq!(rebuilt.manifest(), manifest);
    }
}

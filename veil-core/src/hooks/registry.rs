//! Hook registry - the start-up catalog of hook constructors
//!
//! Entries are registered through a builder, validated, then frozen into a
//! deterministic order: priority descending, codename ascending on ties. The
//! process-wide registry is built lazily from [`HookRegistry::register_all`].

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::builtin;
use super::{Hook, TargetScope};
use crate::error::RegistryError;

static CODENAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("codename pattern is valid"));

static GLOBAL: Lazy<HookRegistry> = Lazy::new(HookRegistry::register_all);

type Constructor = Arc<dyn Fn() -> Box<dyn Hook> + Send + Sync>;

/// Metadata plus a constructor for one hook variant
#[derive(Clone)]
pub struct RegistryEntry {
    codename: String,
    priority: i32,
    targets: TargetScope,
    constructor: Constructor,
}

impl RegistryEntry {
    /// Entry for a hook type, metadata read from a throwaway instance
    pub fn of<H: Hook + Default + 'static>() -> Self {
        Self::from_constructor(|| Box::new(H::default()))
    }

    pub fn from_constructor<F>(constructor: F) -> Self
    where
        F: Fn() -> Box<dyn Hook> + Send + Sync + 'static,
    {
        let probe = constructor();
        Self {
            codename: probe.codename().to_string(),
            priority: probe.priority(),
            targets: probe.allowed_targets(),
            constructor: Arc::new(constructor),
        }
    }

    pub fn codename(&self) -> &str {
        &self.codename
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn allowed_targets(&self) -> TargetScope {
        self.targets
    }

    /// A fresh hook instance
    pub fn construct(&self) -> Box<dyn Hook> {
        (self.constructor)()
    }
}

impl fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("codename", &self.codename)
            .field("priority", &self.priority)
            .field("targets", &self.targets)
            .finish_non_exhaustive()
    }
}

/// Frozen, ordered catalog of hooks
#[derive(Debug, Clone, Default)]
pub struct HookRegistry {
    entries: Vec<RegistryEntry>,
}

impl HookRegistry {
    /// The process-wide registry holding every built-in hook
    pub fn global() -> &'static HookRegistry {
        &GLOBAL
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Register every built-in hook exactly once
    pub fn register_all() -> HookRegistry {
        let mut builder = Self::builder();
        for entry in builtin::entries() {
            let codename = entry.codename().to_string();
            if let Err(e) = builder.register(entry) {
                // Built-ins are fixed at compile time; a clash is a programming error.
                tracing::error!(codename = %codename, error = %e, "Failed to register built-in hook");
            }
        }
        let registry = builder.build();
        debug!(hooks = registry.len(), "Hook registry initialized");
        registry
    }

    /// Entries in scheduling order
    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.iter()
    }

    pub fn get(&self, codename: &str) -> Option<&RegistryEntry> {
        self.entries.iter().find(|e| e.codename == codename)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Collects entries before the registry is frozen
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entries: Vec<RegistryEntry>,
    codenames: HashSet<String>,
}

impl RegistryBuilder {
    pub fn register(&mut self, entry: RegistryEntry) -> Result<&mut Self, RegistryError> {
        if entry.codename.is_empty() {
            return Err(RegistryError::EmptyCodename);
        }
        if !CODENAME_PATTERN.is_match(&entry.codename) {
            return Err(RegistryError::InvalidCodename(entry.codename));
        }
        if !self.codenames.insert(entry.codename.clone()) {
            return Err(RegistryError::DuplicateCodename(entry.codename));
        }
        self.entries.push(entry);
        Ok(self)
    }

    pub fn register_hook<H: Hook + Default + 'static>(&mut self) -> Result<&mut Self, RegistryError> {
        self.register(RegistryEntry::of::<H>())
    }

    pub fn build(mut self) -> HookRegistry {
        self.entries.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.codename.cmp(&b.codename))
        });
        HookRegistry {
            entries: self.entries,
        }
    }
}

//! Hooks - named patch units that rewrite one observable API surface
//!
//! A hook is a JavaScript function body plus the metadata the assembler needs
//! to schedule it: a codename, a priority and the set of execution-context
//! kinds it may run in.

use std::borrow::Cow;
use std::fmt;
use std::ops::{BitAnd, BitOr};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::profile::ProfileStore;

pub mod builtin;
pub mod registry;

pub use registry::{HookRegistry, RegistryBuilder, RegistryEntry};

/// Bitmask over execution-context kinds
///
/// `WORKER` is the union of the dedicated and shared worker bits, so a hook
/// allowed for workers also runs in shared workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetScope(u8);

impl TargetScope {
    pub const NONE: TargetScope = TargetScope(0);
    pub const MAIN: TargetScope = TargetScope(0b001);
    pub const DEDICATED_WORKER: TargetScope = TargetScope(0b010);
    pub const SHARED_WORKER: TargetScope = TargetScope(0b100);
    pub const WORKER: TargetScope =
        TargetScope(Self::DEDICATED_WORKER.0 | Self::SHARED_WORKER.0);
    pub const ALL: TargetScope = TargetScope(Self::MAIN.0 | Self::WORKER.0);

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Unknown bits are dropped
    pub const fn from_bits(bits: u8) -> Self {
        TargetScope(bits & Self::ALL.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn intersects(self, other: TargetScope) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn contains(self, other: TargetScope) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for TargetScope {
    type Output = TargetScope;

    fn bitor(self, rhs: Self) -> Self::Output {
        TargetScope(self.0 | rhs.0)
    }
}

impl BitAnd for TargetScope {
    type Output = TargetScope;

    fn bitand(self, rhs: Self) -> Self::Output {
        TargetScope(self.0 & rhs.0)
    }
}

impl fmt::Display for TargetScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let names: Vec<&str> = [
            (TargetScope::MAIN, "main"),
            (TargetScope::DEDICATED_WORKER, "worker"),
            (TargetScope::SHARED_WORKER, "shared_worker"),
        ]
        .iter()
        .filter(|(bit, _)| self.contains(*bit))
        .map(|(_, name)| *name)
        .collect();
        write!(f, "{}", names.join("|"))
    }
}

/// The concrete kind of context a package is assembled for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    #[default]
    Main,
    DedicatedWorker,
    SharedWorker,
}

impl TargetKind {
    pub const fn scope(self) -> TargetScope {
        match self {
            TargetKind::Main => TargetScope::MAIN,
            TargetKind::DedicatedWorker => TargetScope::DEDICATED_WORKER,
            TargetKind::SharedWorker => TargetScope::SHARED_WORKER,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TargetKind::Main => "main",
            TargetKind::DedicatedWorker => "dedicated_worker",
            TargetKind::SharedWorker => "shared_worker",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TargetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" | "page" | "window" => Ok(TargetKind::Main),
            "dedicated_worker" | "worker" => Ok(TargetKind::DedicatedWorker),
            "shared_worker" => Ok(TargetKind::SharedWorker),
            other => Err(format!(
                "unknown target '{other}' (expected main, dedicated_worker or shared_worker)"
            )),
        }
    }
}

/// One patch unit
///
/// `implementation` returns a function body, not a function. It is wrapped
/// as `(function () { <body> })` and called with a single argument object,
/// so bodies reach their inputs through `arguments[0]`.
pub trait Hook: Send + Sync {
    fn codename(&self) -> &str;

    fn priority(&self) -> i32;

    fn allowed_targets(&self) -> TargetScope;

    fn implementation(&self) -> Cow<'_, str>;

    /// Values this hook needs from the profile, passed as `arguments[0].data`
    fn data(&self, _profile: &ProfileStore) -> Option<Value> {
        None
    }
}

impl fmt::Debug for dyn Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("codename", &self.codename())
            .field("priority", &self.priority())
            .field("targets", &self.allowed_targets())
            .finish()
    }
}

/// A hook whose body is carried as data
///
/// Used for packages rebuilt from a manifest and for hooks defined by
/// embedders at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptHook {
    pub codename: String,
    pub priority: i32,
    pub targets: TargetScope,
    pub body: String,
}

impl ScriptHook {
    pub fn new(
        codename: impl Into<String>,
        priority: i32,
        targets: TargetScope,
        body: impl Into<String>,
    ) -> Self {
        Self {
            codename: codename.into(),
            priority,
            targets,
            body: body.into(),
        }
    }

    /// Snapshot any hook into its data form
    pub fn from_hook(hook: &dyn Hook) -> Self {
        Self::new(
            hook.codename(),
            hook.priority(),
            hook.allowed_targets(),
            hook.implementation().into_owned(),
        )
    }
}

impl Hook for ScriptHook {
    fn codename(&self) -> &str {
        &self.codename
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn allowed_targets(&self) -> TargetScope {
        self.targets
    }

    fn implementation(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.body)
    }
}

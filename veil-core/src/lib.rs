//! Veil Core - profile-driven fingerprint evasion engine
//!
//! Loads an identity profile, assembles the hooks allowed for an execution
//! context, and runs them inside an embedded JavaScript runtime with
//! per-hook failure isolation.
//!
//! ```no_run
//! use std::collections::HashSet;
//! use veil_core::{EngineConfig, ExecutionContext, PackageAssembler, ProfileManager, TargetKind};
//!
//! # fn main() -> anyhow::Result<()> {
//! let manager = ProfileManager::global();
//! manager.init(&EngineConfig::with_profile("profile.json"))?;
//!
//! let package = PackageAssembler::default().pack(TargetKind::Main, &HashSet::new());
//! let store = manager.store().expect("profile loaded");
//! let mut context = ExecutionContext::new(package, store)?;
//! let report = context.run();
//! assert!(report.is_clean());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod hooks;
pub mod manager;
pub mod package;
pub mod profile;
pub mod runtime;
pub mod trace;

pub use cache::ConcurrentCache;
pub use config::{ConfigOverrides, EngineConfig, RuntimeConfig};
pub use error::{ManagerError, ProfileError, RegistryError, RuntimeError};
pub use hooks::{Hook, HookRegistry, ScriptHook, TargetKind, TargetScope};
pub use manager::{ProfileClient, ProfileManager, ProfileRequest, ProfileResponse, ProfileService};
pub use package::{Package, PackageAssembler, PackageManifest};
pub use profile::{NodeId, NodeRef, ProfileStore, UserAgentMetadata};
pub use runtime::{ExecutionContext, HookOutcome, HookReport, RunReport};

// ExecutionContext holds a JavaScript realm and is pinned to its thread.
// Everything it is built from must still cross threads.
const _: fn() = || {
    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    assert_send::<ProfileStore>();
    assert_sync::<ProfileStore>();
    assert_send::<ProfileManager>();
    assert_sync::<ProfileManager>();
    assert_send::<Package>();
    assert_sync::<HookRegistry>();
    assert_send::<ConcurrentCache<String, String>>();
    assert_sync::<ConcurrentCache<String, String>>();
};

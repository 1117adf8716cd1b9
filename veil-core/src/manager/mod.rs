//! Profile manager - process-lifetime owner of the loaded profile
//!
//! Initialization happens at most once. Without a configured profile path the
//! manager is permanently disabled; a profile that fails to load also leaves
//! it disabled. Readers clone the published `Arc<ProfileStore>` and need no
//! further locking.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use once_cell::sync::Lazy;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::ConcurrentCache;
use crate::config::EngineConfig;
use crate::error::ManagerError;
use crate::profile::{ProfileStore, UserAgentMetadata};

pub mod service;

pub use service::{ProfileClient, ProfileRequest, ProfileResponse, ProfileService};

static GLOBAL: Lazy<Arc<ProfileManager>> = Lazy::new(|| Arc::new(ProfileManager::new()));

const USER_AGENT_METADATA: &str = "user_agent_metadata";

#[derive(Debug)]
struct InitState {
    initialized: bool,
    can_be_initialized: bool,
}

type Derived = Arc<dyn Any + Send + Sync>;

pub struct ProfileManager {
    state: Mutex<InitState>,
    store: RwLock<Option<Arc<ProfileStore>>>,
    loaded: AtomicBool,
    derived: ConcurrentCache<String, Derived>,
}

impl Default for ProfileManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProfileManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileManager")
            .field("loaded", &self.enabled())
            .field("derived_values", &self.derived.len())
            .finish_non_exhaustive()
    }
}

impl ProfileManager {
    /// An isolated manager. Most callers want [`global`](Self::global).
    pub fn new() -> Self {
        Self {
            state: Mutex::new(InitState {
                initialized: false,
                can_be_initialized: true,
            }),
            store: RwLock::new(None),
            loaded: AtomicBool::new(false),
            derived: ConcurrentCache::new(),
        }
    }

    /// The process-wide manager
    pub fn global() -> Arc<ProfileManager> {
        Arc::clone(&GLOBAL)
    }

    /// Load the configured profile. Runs at most once per manager.
    pub fn init(&self, config: &EngineConfig) -> Result<(), ManagerError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if !state.can_be_initialized {
            return Err(ManagerError::ConfigurationAbsent);
        }
        if state.initialized {
            return Err(ManagerError::AlreadyInitialized);
        }

        let Some(path) = config.profile_path() else {
            warn!("No profile configured, evasions disabled for this process");
            state.can_be_initialized = false;
            return Err(ManagerError::ConfigurationAbsent);
        };
        state.initialized = true;

        match ProfileStore::load(path) {
            Ok(store) => {
                info!(path = %path.display(), digest = %store.digest(), "Loaded profile");
                self.publish(store);
                Ok(())
            }
            Err(e) => {
                e.log_load_failure();
                Err(e.into())
            }
        }
    }

    fn publish(&self, store: ProfileStore) {
        let mut slot = self.store.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(Arc::new(store));
        self.derived.clear();
        self.loaded.store(true, Ordering::Release);
    }

    /// Whether a profile is loaded
    pub fn enabled(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    pub fn store(&self) -> Option<Arc<ProfileStore>> {
        self.store
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Original profile text, empty when nothing is loaded
    pub fn profile_string(&self) -> String {
        self.store()
            .map(|s| s.text().to_string())
            .unwrap_or_default()
    }

    /// Whole profile document, `null` when nothing is loaded
    pub fn profile_value(&self) -> Value {
        self.store().map(|s| s.to_value()).unwrap_or(Value::Null)
    }

    /// Replace the profile from text
    ///
    /// Intended for tests and tooling. Returns false, leaving the current
    /// profile in place, when the text does not parse. Derived values are
    /// dropped on success.
    pub fn set_profile_string(&self, text: &str) -> bool {
        let _state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match ProfileStore::parse(text) {
            Ok(store) => {
                debug!(digest = %store.digest(), "Profile replaced");
                self.publish(store);
                true
            }
            Err(e) => {
                warn!(error = %e, "Rejected replacement profile");
                false
            }
        }
    }

    /// Value computed once per loaded profile and shared across threads
    ///
    /// `compute` returning `None` is not memoized.
    pub fn derived<T, F>(&self, key: &str, compute: F) -> Option<T>
    where
        T: Any + Send + Sync + Clone,
        F: FnOnce(&ProfileStore) -> Option<T>,
    {
        let key = key.to_string();
        if let Some(hit) = self.derived.get(&key) {
            if let Some(value) = hit.downcast_ref::<T>() {
                return Some(value.clone());
            }
            warn!(key = %key, "Derived value cached under a different type, recomputing");
        }

        let store = self.store()?;
        let value = compute(&store)?;
        self.derived.set(key, Arc::new(value.clone()) as Derived);
        Some(value)
    }

    /// Typed client hints, memoized
    pub fn user_agent_metadata(&self) -> Option<UserAgentMetadata> {
        self.derived(USER_AGENT_METADATA, |store| {
            store
                .user_agent_metadata()
                .map_err(|e| debug!(error = %e, "No usable client hints"))
                .ok()
        })
    }

    pub fn derived_len(&self) -> usize {
        self.derived.len()
    }
}

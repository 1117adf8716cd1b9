//! Engine configuration
//!
//! Sources, lowest to highest precedence:
//! 1. `veil.yml` (platform config dir, or an explicit `--config` path)
//! 2. Environment (`VEIL_PROFILE`, `VEIL_EXCLUDE`, `VEIL_TARGET`)
//! 3. CLI overrides
//!
//! A configuration without a profile path is valid; it leaves the engine
//! disabled for the life of the process.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::hooks::TargetKind;

pub const PROFILE_ENV: &str = "VEIL_PROFILE";
pub const EXCLUDE_ENV: &str = "VEIL_EXCLUDE";
pub const TARGET_ENV: &str = "VEIL_TARGET";

pub const CONFIG_FILE_NAME: &str = "veil.yml";

/// Limits applied to the embedded JavaScript runtime
///
/// Both are unset by default, so a hook that never returns blocks the run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    pub loop_iteration_limit: Option<u64>,
    pub recursion_limit: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Profile document to load. Absent means disabled.
    pub profile: Option<PathBuf>,
    /// Execution-context kind packages are assembled for
    pub target: TargetKind,
    /// Codenames never packed
    pub exclude: Vec<String>,
    pub runtime: RuntimeConfig,
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_file: Option<PathBuf>,
    pub profile: Option<PathBuf>,
    pub target: Option<TargetKind>,
    pub exclude: Vec<String>,
}

impl EngineConfig {
    /// Config with only a profile path set
    pub fn with_profile(path: impl Into<PathBuf>) -> Self {
        Self {
            profile: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml_ng::from_str(content).context("Failed to parse engine configuration YAML")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config = Self::from_yaml_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        // Relative profile paths are relative to the config file
        if let (Some(profile), Some(dir)) = (config.profile.as_ref(), path.parent()) {
            if profile.is_relative() {
                config.profile = Some(dir.join(profile));
            }
        }
        debug!(path = %path.display(), "Loaded engine configuration");
        Ok(config)
    }

    /// Resolve the full configuration from file, environment and CLI
    pub fn resolve(overrides: &ConfigOverrides) -> Result<Self> {
        let mut config = match discover_config_file(overrides.config_file.clone())? {
            Some(path) => Self::load(&path)?,
            None => Self::default(),
        };
        config.apply_env_from(|key| std::env::var(key).ok())?;
        config.apply_overrides(overrides);
        trace!(?config, "Resolved engine configuration");
        Ok(config)
    }

    /// Apply environment variables through `lookup`
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(profile) = lookup(PROFILE_ENV).filter(|v| !v.trim().is_empty()) {
            debug!(env = PROFILE_ENV, "Profile path taken from environment");
            self.profile = Some(PathBuf::from(profile));
        }
        if let Some(exclude) = lookup(EXCLUDE_ENV) {
            self.exclude.extend(
                exclude
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            );
        }
        if let Some(target) = lookup(TARGET_ENV).filter(|v| !v.trim().is_empty()) {
            self.target = target
                .trim()
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))
                .with_context(|| format!("Invalid {TARGET_ENV}"))?;
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(profile) = &overrides.profile {
            self.profile = Some(profile.clone());
        }
        if let Some(target) = overrides.target {
            self.target = target;
        }
        self.exclude.extend(overrides.exclude.iter().cloned());
    }

    pub fn profile_path(&self) -> Option<&Path> {
        self.profile.as_deref()
    }

    pub fn excluded(&self) -> HashSet<String> {
        self.exclude.iter().cloned().collect()
    }
}

/// Locate the config file
///
/// Resolution order:
/// 1. CLI override (must exist)
/// 2. `veil.yml` in the platform config directory
/// 3. None (graceful absence)
pub fn discover_config_file(cli_override: Option<PathBuf>) -> Result<Option<PathBuf>> {
    if let Some(path) = cli_override {
        if !path.is_file() {
            return Err(anyhow::anyhow!(
                "Config file does not exist: {}",
                path.display()
            ));
        }
        debug!("Using --config override: {}", path.display());
        return Ok(Some(path));
    }

    let Some(dir) = platform_config_dir() else {
        debug!("No platform config directory available");
        return Ok(None);
    };
    let path = dir.join(CONFIG_FILE_NAME);
    if path.is_file() {
        info!("Found configuration at {:?}", path);
        Ok(Some(path))
    } else {
        debug!("No configuration found at {:?}", path);
        Ok(None)
    }
}

/// `~/.config/veil` on Linux, the platform equivalent elsewhere
pub fn platform_config_dir() -> Option<PathBuf> {
    use directories::ProjectDirs;

    if let Some(dirs) = ProjectDirs::from("", "", "veil") {
        return Some(dirs.config_dir().to_path_buf());
    }

    // Fallback when no home directory can be resolved through the platform API
    #[cfg(unix)]
    {
        if let Ok(home) = std::env::var("HOME") {
            return Some(PathBuf::from(home).join(".config").join("veil"));
        }
    }
    None
}

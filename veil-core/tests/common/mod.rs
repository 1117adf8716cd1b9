//! Test helper functions for integration tests
//!
//! Shared across test files using the tests/common/ pattern; not every test
//! binary uses every helper.
#![allow(dead_code)]

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use tempfile::TempDir;
use veil_core::ProfileStore;

/// Initialize logging for tests (only once per test run)
static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

pub fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Text of the full sample profile
pub fn sample_profile_text() -> String {
    std::fs::read_to_string(fixture_path("profile.json")).expect("sample profile fixture")
}

pub fn sample_profile() -> Arc<ProfileStore> {
    Arc::new(ProfileStore::load(fixture_path("profile.json")).expect("sample profile parses"))
}

/// Host globals (`navigator`, `WebGLRenderingContext`) the built-in hooks patch
pub fn navigator_shim() -> String {
    std::fs::read_to_string(fixture_path("navigator_shim.js")).expect("navigator shim fixture")
}

/// Write `contents` to `name` inside a fresh temp dir
pub fn write_temp_file(name: &str, contents: &str) -> Result<(TempDir, PathBuf)> {
    let dir = TempDir::new()?;
    let path = dir.path().join(name);
    std::fs::write(&path, contents)?;
    Ok((dir, path))
}

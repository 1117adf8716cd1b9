//! Configuration resolution: file, environment and command line

mod common;

use std::path::PathBuf;

use anyhow::Result;
use pretty_assertions::assert_eq;
use serial_test::serial;
use veil_core::config::{EXCLUDE_ENV, PROFILE_ENV, TARGET_ENV};
use veil_core::{ConfigOverrides, EngineConfig, TargetKind};

struct EnvGuard(&'static [&'static str]);

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for key in self.0 {
            std::env::remove_var(key);
        }
    }
}

fn clear_env() -> EnvGuard {
    let keys: &'static [&'static str] = &[PROFILE_ENV, EXCLUDE_ENV, TARGET_ENV];
    for key in keys {
        std::env::remove_var(key);
    }
    EnvGuard(keys)
}

#[test]
#[serial]
fn test_file_values_with_relative_profile() -> Result<()> {
    let _env = clear_env();
    let (dir, config_path) = common::write_temp_file(
        "veil.yml",
        "profile: profiles/mac.json\ntarget: shared_worker\nexclude: [webgl]\nruntime:\n  loop_iteration_limit: 1000\n",
    )?;

    let config = EngineConfig::resolve(&ConfigOverrides {
        config_file: Some(config_path),
        ..Default::default()
    })?;

    assert_eq!(
        config.profile_path(),
        Some(dir.path().join("profiles/mac.json").as_path())
    );
    assert_eq!(config.target, TargetKind::SharedWorker);
    assert!(config.excluded().contains("webgl"));
    assert_eq!(config.runtime.loop_iteration_limit, Some(1000));
    Ok(())
}

#[test]
#[serial]
fn test_environment_overrides_file() -> Result<()> {
    let _env = clear_env();
    let (_dir, config_path) =
        common::write_temp_file("veil.yml", "profile: /from/file.json\ntarget: main\n")?;
    std::env::set_var(PROFILE_ENV, "/from/env.json");
    std::env::set_var(TARGET_ENV, "worker");
    std::env::set_var(EXCLUDE_ENV, "webgl, navigator_hardware");

    let config = EngineConfig::resolve(&ConfigOverrides {
        config_file: Some(config_path),
        ..Default::default()
    })?;

    assert_eq!(config.profile, Some(PathBuf::from("/from/env.json")));
    assert_eq!(config.target, TargetKind::DedicatedWorker);
    assert_eq!(config.excluded().len(), 2);
    Ok(())
}

#[test]
#[serial]
fn test_command_line_wins() -> Result<()> {
    let _env = clear_env();
    let (_dir, config_path) = common::write_temp_file("veil.yml", "profile: /from/file.json\n")?;
    std::env::set_var(PROFILE_ENV, "/from/env.json");

    let config = EngineConfig::resolve(&ConfigOverrides {
        config_file: Some(config_path),
        profile: Some(PathBuf::from("/from/cli.json")),
        target: Some(TargetKind::SharedWorker),
        exclude: vec!["navigator_webdriver".into()],
    })?;

    assert_eq!(config.profile, Some(PathBuf::from("/from/cli.json")));
    assert_eq!(config.target, TargetKind::SharedWorker);
    assert!(config.excluded().contains("navigator_webdriver"));
    Ok(())
}

#[test]
#[serial]
fn test_bad_target_in_environment_fails() -> Result<()> {
    let _env = clear_env();
    let (_dir, config_path) = common::write_temp_file("veil.yml", "")?;
    std::env::set_var(TARGET_ENV, "service_worker");

    let result = EngineConfig::resolve(&ConfigOverrides {
        config_file: Some(config_path),
        ..Default::default()
    });
    assert!(result.is_err());
    Ok(())
}

#[test]
fn test_unknown_key_in_file_fails() -> Result<()> {
    let (_dir, path) = common::write_temp_file("veil.yml", "profil: typo.json\n")?;
    assert!(EngineConfig::load(&path).is_err());
    Ok(())
}

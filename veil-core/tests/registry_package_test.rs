//! Integration tests for registry ordering and package assembly

mod common;

use std::collections::HashSet;

use pretty_assertions::assert_eq;
use veil_core::hooks::RegistryEntry;
use veil_core::{HookRegistry, PackageAssembler, ScriptHook, TargetKind, TargetScope};

const TARGETS: [TargetKind; 3] = [
    TargetKind::Main,
    TargetKind::DedicatedWorker,
    TargetKind::SharedWorker,
];

fn script_entry(codename: &'static str, priority: i32, targets: TargetScope) -> RegistryEntry {
    RegistryEntry::from_constructor(move || Box::new(ScriptHook::new(codename, priority, targets, "")))
}

#[test]
fn test_global_packages_are_ordered() {
    common::init_test_logging();
    let assembler = PackageAssembler::default();

    for target in TARGETS {
        let package = assembler.pack(target, &HashSet::new());
        let hooks = package.hooks();
        for pair in hooks.windows(2) {
            assert!(pair[0].priority() >= pair[1].priority());
            if pair[0].priority() == pair[1].priority() {
                assert!(pair[0].codename() <= pair[1].codename());
            }
        }
    }
}

#[test]
fn test_global_packages_respect_scope() {
    let assembler = PackageAssembler::default();
    for target in TARGETS {
        for hook in assembler.pack(target, &HashSet::new()).hooks() {
            assert!(
                hook.allowed_targets().intersects(target.scope()),
                "{} packed for {}",
                hook.codename(),
                target
            );
        }
    }
}

#[test]
fn test_builtin_order_for_main() {
    let package = PackageAssembler::default().pack(TargetKind::Main, &HashSet::new());
    assert_eq!(
        package.codenames(),
        vec![
            "navigator_user_agent",
            "navigator_client_hints",
            "navigator_webdriver",
            "navigator_hardware",
            "webgl",
            "navigator_media_devices",
        ]
    );
}

#[test]
fn test_media_devices_only_in_main() {
    let assembler = PackageAssembler::default();
    for target in [TargetKind::DedicatedWorker, TargetKind::SharedWorker] {
        let package = assembler.pack(target, &HashSet::new());
        assert!(!package.codenames().contains(&"navigator_media_devices"));
        assert_eq!(package.len(), 5);
    }
}

#[test]
fn test_equal_priorities_tie_break_on_codename() {
    let mut builder = HookRegistry::builder();
    builder
        .register(script_entry("b", 5, TargetScope::MAIN))
        .unwrap()
        .register(script_entry("a", 5, TargetScope::MAIN))
        .unwrap();
    let registry = builder.build();

    let package = PackageAssembler::new(&registry).pack(TargetKind::Main, &HashSet::new());
    assert_eq!(package.codenames(), vec!["a", "b"]);
}

#[test]
fn test_exclusions_remove_only_named_hooks() {
    let excluded: HashSet<String> = ["webgl", "not_a_hook"].iter().map(|s| s.to_string()).collect();
    let package = PackageAssembler::default().pack(TargetKind::Main, &excluded);
    assert!(!package.codenames().contains(&"webgl"));
    assert_eq!(package.len(), HookRegistry::global().len() - 1);
}

#[test]
fn test_worker_scope_reaches_shared_workers() {
    let mut builder = HookRegistry::builder();
    builder
        .register(script_entry("worker_hook", 1, TargetScope::WORKER))
        .unwrap()
        .register(script_entry("dedicated_only", 0, TargetScope::DEDICATED_WORKER))
        .unwrap();
    let registry = builder.build();
    let assembler = PackageAssembler::new(&registry);

    assert_eq!(
        assembler.pack(TargetKind::SharedWorker, &HashSet::new()).codenames(),
        vec!["worker_hook"]
    );
    assert_eq!(
        assembler.pack(TargetKind::DedicatedWorker, &HashSet::new()).codenames(),
        vec!["worker_hook", "dedicated_only"]
    );
    assert!(assembler.pack(TargetKind::Main, &HashSet::new()).is_empty());
}

#[test]
fn test_packages_are_independent_instances() {
    let assembler = PackageAssembler::default();
    let first = assembler.pack(TargetKind::Main, &HashSet::new());
    let second = assembler.pack(TargetKind::Main, &HashSet::new());
    assert_eq!(first.codenames(), second.codenames());
    assert_eq!(first.manifest(), second.manifest());
}

use std::borrow::Cow;

use serde_json::Value;

use crate::hooks::{Hook, TargetScope};
use crate::profile::ProfileStore;

/// `navigator.mediaDevices.enumerateDevices()`
///
/// Only the window exposes `mediaDevices`, so this hook is main-scoped and
/// runs last.
#[derive(Debug, Default)]
pub struct NavigatorMediaDevices;

impl Hook for NavigatorMediaDevices {
    fn codename(&self) -> &str {
        "navigator_media_devices"
    }

    fn priority(&self) -> i32 {
        0
    }

    fn allowed_targets(&self) -> TargetScope {
        TargetScope::MAIN
    }

    fn implementation(&self) -> Cow<'_, str> {
        Cow::Borrowed(include_str!("js/navigator_media_devices.js"))
    }

    fn data(&self, profile: &ProfileStore) -> Option<Value> {
        let devices: Vec<Value> = profile
            .media_devices()?
            .elements()?
            .filter(|d| d.get("kind").and_then(|k| k.as_str()).is_some())
            .map(|d| d.to_value())
            .collect();
        Some(Value::Array(devices))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_devices_without_kind_are_dropped() {
        let p = ProfileStore::parse(
            json!({"mediaDevices": [
                {"deviceId": "a", "kind": "audioinput", "label": "", "groupId": "g"},
                {"deviceId": "b"}
            ]})
            .to_string(),
        )
        .unwrap();
        let data = NavigatorMediaDevices.data(&p).unwrap();
        assert_eq!(data.as_array().unwrap().len(), 1);
        assert_eq!(data[0]["kind"], "audioinput");
    }

    #[test]
    fn test_main_only() {
        assert_eq!(NavigatorMediaDevices.allowed_targets(), TargetScope::MAIN);
    }
}

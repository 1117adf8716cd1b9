//! Hooks over `navigator` properties

use std::borrow::Cow;

use serde_json::{Map, Value};
use tracing::debug;

use crate::hooks::{Hook, TargetScope};
use crate::profile::ProfileStore;

/// Copy string/number/bool fields of the profile's `navigator` section
fn navigator_fields(profile: &ProfileStore, fields: &[&str]) -> Map<String, Value> {
    let mut out = Map::new();
    for field in fields.iter().copied() {
        if let Some(node) = profile.find(&["navigator", field]) {
            let value = node.to_value();
            if !(value.is_null() || value.is_object() || value.is_array()) {
                out.insert(field.to_string(), value);
            }
        }
    }
    out
}

/// `navigator.userAgent`, `platform` and `appVersion`
#[derive(Debug, Default)]
pub struct NavigatorUserAgent;

impl Hook for NavigatorUserAgent {
    fn codename(&self) -> &str {
        "navigator_user_agent"
    }

    fn priority(&self) -> i32 {
        100
    }

    fn allowed_targets(&self) -> TargetScope {
        TargetScope::ALL
    }

    fn implementation(&self) -> Cow<'_, str> {
        Cow::Borrowed(include_str!("js/navigator_user_agent.js"))
    }

    fn data(&self, profile: &ProfileStore) -> Option<Value> {
        let user_agent = profile.user_agent()?;
        let mut fields = navigator_fields(profile, &["userAgent", "platform", "appVersion"]);

        // appVersion is the user agent minus its "Mozilla/" product token
        if !fields.contains_key("appVersion") {
            let app_version = user_agent.strip_prefix("Mozilla/").unwrap_or(user_agent);
            fields.insert("appVersion".into(), Value::String(app_version.to_string()));
        }
        Some(Value::Object(fields))
    }
}

/// `navigator.userAgentData` built from `highEntropyValues`
#[derive(Debug, Default)]
pub struct NavigatorClientHints;

impl Hook for NavigatorClientHints {
    fn codename(&self) -> &str {
        "navigator_client_hints"
    }

    fn priority(&self) -> i32 {
        90
    }

    fn allowed_targets(&self) -> TargetScope {
        TargetScope::ALL
    }

    fn implementation(&self) -> Cow<'_, str> {
        Cow::Borrowed(include_str!("js/navigator_client_hints.js"))
    }

    fn data(&self, profile: &ProfileStore) -> Option<Value> {
        if !profile.has_client_hints() {
            return None;
        }
        match profile.user_agent_metadata() {
            Ok(metadata) => serde_json::to_value(metadata).ok(),
            Err(e) => {
                debug!(error = %e, "Client hints present but unusable, skipping");
                None
            }
        }
    }
}

/// `navigator.webdriver`, false unless the profile says otherwise
#[derive(Debug, Default)]
pub struct NavigatorWebdriver;

impl Hook for NavigatorWebdriver {
    fn codename(&self) -> &str {
        "navigator_webdriver"
    }

    fn priority(&self) -> i32 {
        80
    }

    fn allowed_targets(&self) -> TargetScope {
        TargetScope::ALL
    }

    fn implementation(&self) -> Cow<'_, str> {
        Cow::Borrowed(include_str!("js/navigator_webdriver.js"))
    }

    fn data(&self, profile: &ProfileStore) -> Option<Value> {
        if !profile.contains(&["navigator"]) {
            return None;
        }
        let webdriver = profile
            .find(&["navigator", "webdriver"])
            .and_then(|n| n.as_bool())
            .unwrap_or(false);
        Some(serde_json::json!({ "webdriver": webdriver }))
    }
}

/// `navigator.hardwareConcurrency` and `deviceMemory`
#[derive(Debug, Default)]
pub struct NavigatorHardware;

impl Hook for NavigatorHardware {
    fn codename(&self) -> &str {
        "navigator_hardware"
    }

    fn priority(&self) -> i32 {
        50
    }

    fn allowed_targets(&self) -> TargetScope {
        TargetScope::ALL
    }

    fn implementation(&self) -> Cow<'_, str> {
        Cow::Borrowed(include_str!("js/navigator_hardware.js"))
    }

    fn data(&self, profile: &ProfileStore) -> Option<Value> {
        let fields = navigator_fields(profile, &["hardwareConcurrency", "deviceMemory"]);
        let fields: Map<String, Value> = fields.into_iter().filter(|(_, v)| v.is_number()).collect();
        if fields.is_empty() {
            None
        } else {
            Some(Value::Object(fields))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn profile(value: Value) -> ProfileStore {
        ProfileStore::parse(value.to_string()).unwrap()
    }

    #[test]
    fn test_user_agent_data_derives_app_version() {
        let p = profile(json!({"navigator": {"userAgent": "Mozilla/5.0 (X11)", "platform": "Linux x86_64"}}));
        let data = NavigatorUserAgent.data(&p).unwrap();
        assert_eq!(data["appVersion"], "5.0 (X11)");
        assert_eq!(data["platform"], "Linux x86_64");
    }

    #[test]
    fn test_user_agent_data_absent_without_user_agent() {
        let p = profile(json!({"navigator": {"platform": "Linux"}}));
        assert!(NavigatorUserAgent.data(&p).is_none());
    }

    #[test]
    fn test_webdriver_defaults_to_false() {
        let p = profile(json!({"navigator": {}}));
        assert_eq!(NavigatorWebdriver.data(&p), Some(json!({"webdriver": false})));
        assert!(NavigatorWebdriver.data(&profile(json!({}))).is_none());
    }

    #[test]
    fn test_hardware_keeps_numbers_only() {
        let p = profile(json!({"navigator": {"hardwareConcurrency": 8, "deviceMemory": "lots"}}));
        assert_eq!(NavigatorHardware.data(&p), Some(json!({"hardwareConcurrency": 8})));
    }

    #[test]
    fn test_client_hints_skip_invalid_section() {
        let p = profile(json!({"highEntropyValues": {"brands": []}}));
        assert!(NavigatorClientHints.data(&p).is_none());
    }
}

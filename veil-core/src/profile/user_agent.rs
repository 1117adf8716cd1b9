//! Typed client hints built from the profile's `highEntropyValues` section

use serde::{Deserialize, Serialize};

use super::arena::NodeRef;
use crate::error::ProfileError;

const SECTION: &str = "highEntropyValues";
const MOBILE_FORM_FACTOR: &str = "Mobile";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandVersion {
    pub brand: String,
    pub version: String,
}

/// What `navigator.userAgentData` reports, validated up front
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAgentMetadata {
    pub brands: Vec<BrandVersion>,
    pub full_version_list: Vec<BrandVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_version: Option<String>,
    pub platform: String,
    pub platform_version: String,
    pub architecture: String,
    pub bitness: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub mobile: bool,
    pub form_factors: Vec<String>,
    pub wow64: bool,
}

fn brand_list(
    hints: &NodeRef<'_>,
    field: &'static str,
) -> Result<Vec<BrandVersion>, ProfileError> {
    let invalid = |reason: &str| ProfileError::InvalidField {
        section: SECTION,
        field,
        reason: reason.to_string(),
    };

    let list = hints
        .get(field)
        .ok_or(ProfileError::MissingField {
            section: SECTION,
            field,
        })?;
    let elements = list.elements().ok_or_else(|| invalid("expected a list"))?;

    let mut out = Vec::new();
    for entry in elements {
        let brand = entry.get("brand").and_then(|n| n.as_str());
        let version = entry.get("version").and_then(|n| n.as_str());
        match (brand, version) {
            (Some(brand), Some(version)) => out.push(BrandVersion {
                brand: brand.to_string(),
                version: version.to_string(),
            }),
            _ => return Err(invalid("each entry needs string 'brand' and 'version'")),
        }
    }

    if out.is_empty() {
        return Err(invalid("list is empty"));
    }
    Ok(out)
}

fn required_string(hints: &NodeRef<'_>, field: &'static str) -> Result<String, ProfileError> {
    hints
        .get(field)
        .and_then(|n| n.as_str())
        .map(str::to_string)
        .ok_or(ProfileError::MissingField {
            section: SECTION,
            field,
        })
}

fn optional_string(hints: &NodeRef<'_>, field: &str) -> Option<String> {
    hints.get(field).and_then(|n| n.as_str()).map(str::to_string)
}

impl UserAgentMetadata {
    /// Build from the `highEntropyValues` node
    pub fn from_hints(hints: &NodeRef<'_>) -> Result<Self, ProfileError> {
        if hints.keys().is_none() {
            return Err(ProfileError::InvalidField {
                section: SECTION,
                field: SECTION,
                reason: format!("expected an object, found {}", hints.kind()),
            });
        }

        let brands = brand_list(hints, "brands")?;
        let full_version_list = brand_list(hints, "fullVersionList")?;
        let platform = required_string(hints, "platform")?;
        let platform_version = required_string(hints, "platformVersion")?;
        let architecture = required_string(hints, "architecture")?;
        let bitness = required_string(hints, "bitness")?;
        let mobile = hints
            .get("mobile")
            .and_then(|n| n.as_bool())
            .unwrap_or(false);

        let form_factors = if mobile {
            vec![MOBILE_FORM_FACTOR.to_string()]
        } else {
            Vec::new()
        };

        Ok(Self {
            brands,
            full_version_list,
            full_version: optional_string(hints, "uaFullVersion"),
            platform,
            platform_version,
            architecture,
            bitness,
            model: optional_string(hints, "model"),
            mobile,
            form_factors,
            wow64: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::arena::{Document, NodeId};
    use serde_json::json;

    fn hints() -> serde_json::Value {
        json!({
            "architecture": "arm",
            "bitness": "64",
            "brands": [
                {"brand": "Chromium", "version": "116"},
                {"brand": "Not)A;Brand", "version": "24"}
            ],
            "fullVersionList": [
                {"brand": "Chromium", "version": "116.0.5845.96"},
                {"brand": "Not)A;Brand", "version": "24.0.0.0"}
            ],
            "platform": "macOS",
            "platformVersion": "13.3.1"
        })
    }

    fn parse(value: serde_json::Value) -> Result<UserAgentMetadata, ProfileError> {
        let doc = Document::from_value(&value);
        UserAgentMetadata::from_hints(&doc.get(NodeId::ROOT))
    }

    #[test]
    fn test_minimal_hints_parse() {
        let meta = parse(hints()).unwrap();
        assert_eq!(meta.brands.len(), 2);
        assert_eq!(meta.platform, "macOS");
        assert!(!meta.mobile);
        assert!(meta.form_factors.is_empty());
        assert_eq!(meta.model, None);
        assert!(!meta.wow64);
    }

    #[test]
    fn test_mobile_sets_form_factor() {
        let mut value = hints();
        value["mobile"] = json!(true);
        value["model"] = json!("Pixel 8");
        let meta = parse(value).unwrap();
        assert_eq!(meta.form_factors, vec!["Mobile".to_string()]);
        assert_eq!(meta.model.as_deref(), Some("Pixel 8"));
    }

    #[test]
    fn test_empty_brands_rejected() {
        let mut value = hints();
        value["brands"] = json!([]);
        assert!(matches!(
            parse(value),
            Err(ProfileError::InvalidField { field: "brands", .. })
        ));
    }

    #[test]
    fn test_brand_entry_without_version_rejected() {
        let mut value = hints();
        value["fullVersionList"] = json!([{"brand": "Chromium"}]);
        assert!(matches!(
            parse(value),
            Err(ProfileError::InvalidField { field: "fullVersionList", .. })
        ));
    }

    #[test]
    fn test_missing_platform_version_rejected() {
        let mut value = hints();
        value.as_object_mut().unwrap().remove("platformVersion");
        assert!(matches!(
            parse(value),
            Err(ProfileError::MissingField { field: "platformVersion", .. })
        ));
    }
}

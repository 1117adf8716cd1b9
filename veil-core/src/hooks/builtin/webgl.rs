use std::borrow::Cow;

use serde_json::{Map, Value};

use crate::hooks::{Hook, TargetScope};
use crate::profile::ProfileStore;

/// WebGL `getParameter` for the unmasked vendor and renderer, plus optional
/// extra parameters and the supported extension list
#[derive(Debug, Default)]
pub struct Webgl;

impl Hook for Webgl {
    fn codename(&self) -> &str {
        "webgl"
    }

    fn priority(&self) -> i32 {
        1
    }

    fn allowed_targets(&self) -> TargetScope {
        TargetScope::ALL
    }

    fn implementation(&self) -> Cow<'_, str> {
        Cow::Borrowed(include_str!("js/webgl.js"))
    }

    fn data(&self, profile: &ProfileStore) -> Option<Value> {
        let webgl = profile.webgl()?;
        let mut out = Map::new();

        for field in ["vendor", "renderer"] {
            if let Some(value) = webgl.get(field).and_then(|n| n.as_str()) {
                out.insert(field.to_string(), Value::String(value.to_string()));
            }
        }
        if let Some(parameters) = webgl.get("parameters").filter(|n| n.keys().is_some()) {
            out.insert("parameters".into(), parameters.to_value());
        }
        if let Some(extensions) = webgl.get("supportedExtensions").filter(|n| n.elements().is_some()) {
            out.insert("supportedExtensions".into(), extensions.to_value());
        }

        if out.is_empty() {
            None
        } else {
            Some(Value::Object(out))
        }
    }
}

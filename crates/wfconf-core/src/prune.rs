//! Removal of disabled elements.
//!
//! Any object carrying `"disabled": true` is dropped from its parent.
//! Containers left empty are dropped in turn, so disabling every step of
//! a job removes the job's `steps` key entirely.

use serde_json::{Map, Value};

/// Field that marks an object as disabled.
pub const DISABLED_KEY: &str = "disabled";

/// Prune disabled objects and empty containers from `value`.
///
/// If nothing survives, the result is `Value::Null`.
pub fn prune_disabled(value: Value) -> Value {
    prune(value).unwrap_or(Value::Null)
}

fn prune(value: Value) -> Option<Value> {
    match value {
        Value::Object(map) => {
            if map.get(DISABLED_KEY) == Some(&Value::Bool(true)) {
                return None;
            }
            let kept: Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| prune(v).map(|v| (k, v)))
                .collect();
            (!kept.is_empty()).then_some(Value::Object(kept))
        }
        Value::Array(items) => {
            let kept: Vec<Value> = items.into_iter().filter_map(prune).collect();
            (!kept.is_empty()).then_some(Value::Array(kept))
        }
        scalar => Some(scalar),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn disabled_objects_are_removed() {
        let doc = json!({
            "steps": [
                {"name": "lint"},
                {"name": "deploy", "disabled": true},
                {"name": "test", "disabled": false}
            ]
        });
        assert_eq!(
            prune_disabled(doc),
            json!({"steps": [{"name": "lint"}, {"name": "test", "disabled": false}]})
        );
    }

    #[test]
    fn emptied_containers_are_removed() {
        let doc = json!({
            "build": {"steps": [{"disabled": true}]},
            "test": {"enabled": true}
        });
        assert_eq!(prune_disabled(doc), json!({"test": {"enabled": true}}));
    }

    #[test]
    fn already_empty_containers_are_removed() {
        assert_eq!(
            prune_disabled(json!({"a": {}, "b": [], "c": 1})),
            json!({"c": 1})
        );
    }

    #[test]
    fn disabled_root_becomes_null() {
        assert_eq!(prune_disabled(json!({"disabled": true, "x": 1})), Value::Null);
        assert_eq!(prune_disabled(json!([])), Value::Null);
    }

    #[test]
    fn scalars_and_nulls_survive() {
        let doc = json!({"a": null, "b": 0, "c": "", "d": false, "disabled": "yes"});
        assert_eq!(prune_disabled(doc.clone()), doc);
    }
}

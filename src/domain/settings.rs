//! The desktop engine's settings document.
//!
//! The engine serves its settings as a nested JSON document whose leaves may
//! be wrapped in metadata (`{"value": .., "locked": .., "min": .., "max": ..}`)
//! or shipped as an embedded JSON string next to a lock list
//! (`{"locks": [..], "json": ".."}`). Writes must submit the whole document
//! with every wrapper collapsed back to its plain value. The schema moves
//! between engine releases, so the tree is modelled structurally and never
//! against a fixed shape.

use std::collections::BTreeMap;

use serde_json::{Map, Number, Value};

use crate::error::SettingsError;

/// Keys whose string value is a comma-separated list of filesystem paths.
const PATH_LIST_KEYS: [&str; 2] = ["vm.fileSharing", "filesharingDirectories"];

/// One node of the settings document.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsNode {
    /// Any non-object JSON value.
    Scalar(Value),
    Object(BTreeMap<String, SettingsNode>),
    /// A value decorated with lock state and optional numeric bounds.
    Wrapped {
        value: Box<SettingsNode>,
        locked: bool,
        min: Option<f64>,
        max: Option<f64>,
    },
    /// A JSON document embedded as a string, next to its lock list.
    LockedJson { locks: Value, json: String },
}

impl SettingsNode {
    /// Build a tree from the document as read from the engine.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::from_map(map),
            other => SettingsNode::Scalar(other),
        }
    }

    fn from_map(mut map: Map<String, Value>) -> Self {
        let is_locked_json =
            map.len() == 2 && map.contains_key("locks") && matches!(map.get("json"), Some(Value::String(_)));
        if is_locked_json {
            let locks = map.remove("locks").unwrap_or(Value::Null);
            let json = match map.remove("json") {
                Some(Value::String(json)) => json,
                _ => String::new(),
            };
            return SettingsNode::LockedJson { locks, json };
        }

        let is_wrapped = map.contains_key("value")
            && matches!(map.get("locked"), Some(Value::Bool(_)))
            && map
                .keys()
                .all(|k| matches!(k.as_str(), "value" | "locked" | "min" | "max"));
        if is_wrapped {
            let locked = matches!(map.get("locked"), Some(Value::Bool(true)));
            let min = map.get("min").and_then(Value::as_f64);
            let max = map.get("max").and_then(Value::as_f64);
            let value = map.remove("value").unwrap_or(Value::Null);
            return SettingsNode::Wrapped {
                value: Box::new(Self::from_value(value)),
                locked,
                min,
                max,
            };
        }

        SettingsNode::Object(
            map.into_iter()
                .map(|(k, v)| (k, Self::from_value(v)))
                .collect(),
        )
    }

    /// Render the tree back in its read shape.
    pub fn to_value(&self) -> Value {
        match self {
            SettingsNode::Scalar(v) => v.clone(),
            SettingsNode::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect(),
            ),
            SettingsNode::Wrapped {
                value,
                locked,
                min,
                max,
            } => {
                let mut out = Map::new();
                out.insert("value".into(), value.to_value());
                out.insert("locked".into(), Value::Bool(*locked));
                if let Some(n) = min.and_then(Number::from_f64) {
                    out.insert("min".into(), Value::Number(n));
                }
                if let Some(n) = max.and_then(Number::from_f64) {
                    out.insert("max".into(), Value::Number(n));
                }
                Value::Object(out)
            }
            SettingsNode::LockedJson { locks, json } => {
                let mut out = Map::new();
                out.insert("locks".into(), locks.clone());
                out.insert("json".into(), Value::String(json.clone()));
                Value::Object(out)
            }
        }
    }

    /// Collapse every wrapper to its plain value, dropping nodes that
    /// collapse to nothing (nulls, empty objects, unparsable embedded JSON).
    pub fn for_write(&self) -> Option<Value> {
        match self {
            SettingsNode::Scalar(Value::Null) => None,
            SettingsNode::Scalar(v) => Some(v.clone()),
            SettingsNode::Wrapped { value, .. } => value.for_write(),
            SettingsNode::LockedJson { json, .. } => {
                match serde_json::from_str::<Value>(json) {
                    Ok(Value::Null) | Err(_) => None,
                    Ok(parsed) => Some(parsed),
                }
            }
            SettingsNode::Object(map) => {
                let collapsed: Map<String, Value> = map
                    .iter()
                    .filter_map(|(k, v)| v.for_write().map(|v| (k.clone(), v)))
                    .collect();
                if collapsed.is_empty() {
                    None
                } else {
                    Some(Value::Object(collapsed))
                }
            }
        }
    }

    /// The whole document in write shape.
    pub fn write_document(&self) -> Value {
        self.for_write()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }

    fn kind(&self) -> String {
        match self {
            SettingsNode::Scalar(Value::Null) => "null".into(),
            SettingsNode::Scalar(Value::Bool(b)) => format!("bool {b}"),
            SettingsNode::Scalar(Value::Number(n)) => format!("number {n}"),
            SettingsNode::Scalar(Value::String(s)) => format!("string {s:?}"),
            SettingsNode::Scalar(Value::Array(_)) => "array".into(),
            SettingsNode::Scalar(Value::Object(_)) | SettingsNode::Object(_) => "map".into(),
            SettingsNode::Wrapped { .. } => "wrapped value".into(),
            SettingsNode::LockedJson { .. } => "locked json".into(),
        }
    }

    /// Walk a dotted path through nested objects.
    ///
    /// An empty path returns the root object.
    pub fn lookup_map_at(&self, path: &str) -> Result<&BTreeMap<String, SettingsNode>, SettingsError> {
        let mut map = match self {
            SettingsNode::Object(map) => map,
            other => return Err(shape("<root>", "map", other.kind())),
        };
        let mut walked = String::new();
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            push_segment(&mut walked, segment);
            map = match map.get(segment) {
                Some(SettingsNode::Object(child)) => child,
                Some(other) => return Err(shape(&walked, "map", other.kind())),
                None => return Err(shape(&walked, "map", "nothing".into())),
            };
        }
        Ok(map)
    }

    fn lookup_map_at_mut(
        &mut self,
        path: &str,
    ) -> Result<&mut BTreeMap<String, SettingsNode>, SettingsError> {
        let mut map = match self {
            SettingsNode::Object(map) => map,
            other => return Err(shape("<root>", "map", other.kind())),
        };
        let mut walked = String::new();
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            push_segment(&mut walked, segment);
            map = match map.get_mut(segment) {
                Some(SettingsNode::Object(child)) => child,
                Some(other) => return Err(shape(&walked, "map", other.kind())),
                None => return Err(shape(&walked, "map", "nothing".into())),
            };
        }
        Ok(map)
    }

    /// The plain value at a dotted path, looking through a wrapper.
    pub fn value_at(&self, path: &str) -> Result<&Value, SettingsError> {
        let (parent, key) = split_path(path);
        let leaf = self
            .lookup_map_at(parent)?
            .get(key)
            .ok_or_else(|| shape(path, "value", "nothing".into()))?;
        let leaf = match leaf {
            SettingsNode::Wrapped { value, .. } => value.as_ref(),
            other => other,
        };
        match leaf {
            SettingsNode::Scalar(v) => Ok(v),
            other => Err(shape(path, "value", other.kind())),
        }
    }

    /// Whether a dotted path resolves to anything.
    pub fn contains(&self, path: &str) -> bool {
        let (parent, key) = split_path(path);
        self.lookup_map_at(parent)
            .map(|map| map.contains_key(key))
            .unwrap_or(false)
    }

    /// Set the leaf at `path` from its string form.
    ///
    /// The leaf's current type decides how `new_value` is parsed. Numbers are
    /// checked against the wrapper's bounds. Returns whether the document
    /// actually changed.
    pub fn apply_set(&mut self, path: &str, new_value: &str) -> Result<bool, SettingsError> {
        let (parent, key) = split_path(path);
        let leaf = self
            .lookup_map_at_mut(parent)?
            .get_mut(key)
            .ok_or_else(|| shape(path, "value", "nothing".into()))?;

        let (target, min, max) = match leaf {
            SettingsNode::Wrapped { value, min, max, .. } => (&mut **value, *min, *max),
            other => (other, None, None),
        };

        if PATH_LIST_KEYS.contains(&path) {
            return set_path_list(target, path, new_value);
        }

        match target {
            SettingsNode::Scalar(Value::Bool(current)) => {
                let parsed = match new_value {
                    "true" => true,
                    "false" => false,
                    other => {
                        return Err(SettingsError::InvalidValue {
                            path: path.to_string(),
                            reason: format!("expected true or false, got {other:?}"),
                        })
                    }
                };
                let changed = *current != parsed;
                *current = parsed;
                Ok(changed)
            }
            SettingsNode::Scalar(Value::Number(current)) => {
                let parsed: f64 = new_value.trim().parse().map_err(|_| SettingsError::InvalidValue {
                    path: path.to_string(),
                    reason: format!("expected a number, got {new_value:?}"),
                })?;
                let below = min.is_some_and(|min| parsed < min);
                let above = max.is_some_and(|max| parsed > max);
                if below || above {
                    return Err(SettingsError::OutOfRange {
                        path: path.to_string(),
                        value: parsed,
                        min: min.map_or_else(|| "-inf".to_string(), |v| v.to_string()),
                        max: max.map_or_else(|| "inf".to_string(), |v| v.to_string()),
                    });
                }
                if current.as_f64() == Some(parsed) {
                    return Ok(false);
                }
                let integral = parsed.fract() == 0.0 && (current.is_i64() || current.is_u64());
                let next = if integral {
                    Some(Number::from(parsed as i64))
                } else {
                    Number::from_f64(parsed)
                };
                *current = next.ok_or_else(|| SettingsError::InvalidValue {
                    path: path.to_string(),
                    reason: format!("{new_value:?} is not a finite number"),
                })?;
                Ok(true)
            }
            SettingsNode::Scalar(Value::String(current)) => {
                if current == new_value {
                    return Ok(false);
                }
                *current = new_value.to_string();
                Ok(true)
            }
            other => Err(shape(path, "bool, number or string", other.kind())),
        }
    }
}

impl From<Value> for SettingsNode {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

fn set_path_list(target: &mut SettingsNode, path: &str, new_value: &str) -> Result<bool, SettingsError> {
    let requested: Vec<&str> = new_value
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let SettingsNode::Scalar(current) = target else {
        return Err(shape(path, "path list", target.kind()));
    };
    let items: &[Value] = match &*current {
        Value::Array(items) => items,
        Value::Null => &[],
        other => return Err(shape(path, "path list", format!("{other}"))),
    };

    let existing: Vec<&str> = items
        .iter()
        .filter_map(|item| match item {
            Value::String(p) => Some(p.as_str()),
            Value::Object(entry) => entry.get("path").and_then(Value::as_str),
            _ => None,
        })
        .collect();
    if existing == requested {
        return Ok(false);
    }

    // Older engines store entries as {path, cached}; newer ones as bare strings.
    let as_objects = items.first().map_or(path == "vm.fileSharing", Value::is_object);
    let next = requested
        .iter()
        .map(|p| {
            if as_objects {
                serde_json::json!({ "path": p, "cached": false })
            } else {
                Value::String((*p).to_string())
            }
        })
        .collect();
    *current = Value::Array(next);
    Ok(true)
}

fn split_path(path: &str) -> (&str, &str) {
    path.rsplit_once('.').unwrap_or(("", path))
}

fn push_segment(walked: &mut String, segment: &str) {
    if !walked.is_empty() {
        walked.push('.');
    }
    walked.push_str(segment);
}

fn shape(path: &str, expected: &'static str, found: String) -> SettingsError {
    SettingsError::UnexpectedShape {
        path: path.to_string(),
        expected,
        found,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn legacy_tree() -> SettingsNode {
        SettingsNode::from_value(json!({
            "vm": {
                "kubernetes": {
                    "enabled": {"value": false, "locked": false},
                    "mode": {"value": "kubeadm", "locked": false}
                },
                "resources": {
                    "cpus": {"value": 2, "min": 1, "max": 8, "locked": false},
                    "memoryMiB": {"value": 4096, "min": 1024, "max": 16384, "locked": false}
                },
                "fileSharing": {"value": [{"path": "/Users", "cached": false}], "locked": false}
            },
            "proxy": {"locks": [], "json": "{\"http\":\"\"}"},
            "unused": null
        }))
    }

    #[test]
    fn wrapped_and_plain_booleans_write_the_same_body() {
        let mut wrapped = SettingsNode::from_value(json!({
            "vm": {"kubernetes": {"enabled": {"value": false, "locked": false}}}
        }));
        let mut plain = SettingsNode::from_value(json!({
            "vm": {"kubernetes": {"enabled": false}}
        }));

        assert!(wrapped.apply_set("vm.kubernetes.enabled", "true").unwrap());
        assert!(plain.apply_set("vm.kubernetes.enabled", "true").unwrap());

        assert_eq!(wrapped.write_document(), plain.write_document());
        assert_eq!(
            plain.write_document(),
            json!({"vm": {"kubernetes": {"enabled": true}}})
        );
    }

    #[test]
    fn setting_the_same_value_reports_no_change() {
        let mut tree = legacy_tree();
        assert!(!tree.apply_set("vm.resources.cpus", "2").unwrap());
        assert!(!tree.apply_set("vm.kubernetes.mode", "kubeadm").unwrap());
    }

    #[test]
    fn numbers_outside_bounds_are_rejected() {
        let mut tree = legacy_tree();
        let err = tree.apply_set("vm.resources.cpus", "12").unwrap_err();
        assert!(matches!(err, SettingsError::OutOfRange { .. }));
        assert_eq!(tree.value_at("vm.resources.cpus").unwrap(), &json!(2));
    }

    #[test]
    fn numbers_keep_integer_representation() {
        let mut tree = legacy_tree();
        assert!(tree.apply_set("vm.resources.cpus", "4").unwrap());
        assert_eq!(tree.value_at("vm.resources.cpus").unwrap(), &json!(4));
    }

    #[test]
    fn missing_path_error_names_the_full_path() {
        let tree = legacy_tree();
        let err = tree.lookup_map_at("vm.kubernetes.honk").unwrap_err();
        assert!(err.to_string().contains("vm.kubernetes.honk"), "{err}");
    }

    #[test]
    fn walking_through_a_leaf_names_the_leaf() {
        let tree = legacy_tree();
        let err = tree.lookup_map_at("vm.resources.cpus.value").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("vm.resources.cpus"), "{message}");
        assert!(message.contains("wrapped value"), "{message}");
    }

    #[test]
    fn path_lists_are_split_on_commas() {
        let mut tree = legacy_tree();
        assert!(tree.apply_set("vm.fileSharing", "/Users, /tmp").unwrap());
        assert_eq!(
            tree.value_at("vm.fileSharing").unwrap(),
            &json!([{"path": "/Users", "cached": false}, {"path": "/tmp", "cached": false}])
        );
        assert!(!tree.apply_set("vm.fileSharing", "/Users,/tmp").unwrap());
    }

    #[test]
    fn write_shape_collapses_wrappers_and_drops_empty_nodes() {
        let tree = legacy_tree();
        let doc = tree.write_document();
        assert_eq!(doc["vm"]["resources"]["cpus"], json!(2));
        assert_eq!(doc["proxy"], json!({"http": ""}));
        assert!(doc.get("unused").is_none());
    }

    #[test]
    fn read_shape_round_trips() {
        let tree = legacy_tree();
        assert_eq!(SettingsNode::from_value(tree.to_value()), tree);
    }

    #[test]
    fn rejects_non_boolean_input_for_boolean_leaf() {
        let mut tree = legacy_tree();
        let err = tree.apply_set("vm.kubernetes.enabled", "yes").unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue { .. }));
    }
}

//! JSON payload helpers: emptiness checks, documentation flattening and
//! cleanup of template placeholders before a payload is sent.

use serde::Serialize;
use serde_json::{Map, Value};

/// `null`, `""`, `{}` and `[]` carry no payload. Numbers and booleans
/// always do.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

pub fn is_blank_opt(value: Option<&Value>) -> bool {
    value.is_none_or(is_blank)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocEntry {
    pub name: String,
    pub doc: String,
}

impl DocEntry {
    fn new(name: impl Into<String>, doc: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: doc.into(),
        }
    }
}

/// Flattens a documentation object into dotted `name -> doc` rows.
///
/// Properties present in `data` come first, remaining documented properties
/// after. Both objects are looked at through their `properties` member (or
/// the first element of a `value` list).
pub fn flatten_documentation(data: Option<&Value>, doc: Option<&Value>) -> Vec<DocEntry> {
    let (Some(data), Some(doc)) = (data.filter(|d| !d.is_null()), doc.filter(|d| !d.is_null())) else {
        return vec![DocEntry::new("message", "No documentation available")];
    };
    let doc = properties_of(doc);
    let data = properties_of(data);

    let mut rows: Vec<(String, Value)> = Vec::new();
    for key in data.keys() {
        if let Some(entry) = doc.get(key) {
            rows.push((key.clone(), entry.clone()));
        }
    }
    for (key, entry) in &doc {
        if !data.contains_key(key) {
            rows.push((key.clone(), entry.clone()));
        }
    }

    rows.into_iter()
        .flat_map(|(name, doc)| match doc {
            Value::String(s) => vec![DocEntry::new(name, s)],
            other => flatten_value(&name, &other),
        })
        .collect()
}

fn properties_of(value: &Value) -> Map<String, Value> {
    if let Some(Value::Object(props)) = value.get("properties") {
        return props.clone();
    }
    value
        .get("value")
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .and_then(|first| first.get("properties"))
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn flatten_value(prefix: &str, value: &Value) -> Vec<DocEntry> {
    match value {
        Value::String(s) => vec![DocEntry::new(prefix, s.clone())],
        Value::Array(items) if !items.is_empty() => flatten_value(prefix, &items[0]),
        v if is_blank(v) => vec![DocEntry::new(prefix, "")],
        Value::Object(map) => map
            .iter()
            .flat_map(|(key, child)| {
                let name = format!("{prefix}.{key}");
                match child {
                    Value::String(s) => vec![DocEntry::new(name, s.clone())],
                    Value::Array(items) if !items.is_empty() => flatten_value(&name, &items[0]),
                    Value::Object(_) => flatten_value(&name, child),
                    other => vec![DocEntry::new(name, other.to_string())],
                }
            })
            .collect(),
        other => vec![DocEntry::new(prefix, other.to_string())],
    }
}

fn is_template_placeholder(value: &Value) -> bool {
    matches!(value, Value::String(s) if s.len() >= 2 && s.starts_with('(') && s.ends_with(')'))
}

/// Removes `(placeholder)` strings and the empty containers they leave
/// behind. An object that had `properties` keeps an empty `properties`.
pub fn clean_object(value: &mut Value) {
    let Value::Object(map) = value else {
        return;
    };
    let had_properties = map.contains_key("properties");
    clean_map(map);
    if had_properties && !map.contains_key("properties") {
        map.insert("properties".to_string(), Value::Object(Map::new()));
    }
}

fn clean_map(map: &mut Map<String, Value>) {
    let keys: Vec<String> = map.keys().cloned().collect();
    for key in keys {
        let remove = match map.get_mut(&key) {
            Some(v) if is_template_placeholder(v) => true,
            Some(Value::Array(items)) => {
                let had_elements = !items.is_empty();
                clean_array(items);
                had_elements && items.is_empty()
            }
            Some(Value::Object(child)) => {
                clean_map(child);
                child.is_empty()
            }
            _ => false,
        };
        if remove {
            map.remove(&key);
        }
    }
}

fn clean_array(items: &mut Vec<Value>) {
    items.retain_mut(|item| {
        if is_template_placeholder(item) {
            return false;
        }
        if let Value::Object(child) = item {
            clean_map(child);
            return !child.is_empty();
        }
        true
    });
}

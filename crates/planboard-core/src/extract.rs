//! Lenient field access over untrusted stage records.
//!
//! Stage data arrives as arbitrary JSON. Every accessor here treats a missing
//! key, a `null`, or a value of the wrong shape as absent instead of failing,
//! and accepts both `camelCase` and `snake_case` spellings of a key.

use serde_json::{Map, Value};

/// Look up `key`, falling back to its snake_case spelling.
pub fn field<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let map = value.as_object()?;
    map.get(key)
        .or_else(|| map.get(&snake_case(key)))
        .filter(|v| !v.is_null())
}

fn first<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| field(value, key))
}

/// Non-empty trimmed string. Numbers and booleans are stringified.
pub fn text(value: &Value, keys: &[&str]) -> Option<String> {
    first(value, keys).and_then(scalar_text)
}

fn scalar_text(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

pub fn flag(value: &Value, keys: &[&str]) -> Option<bool> {
    match first(value, keys)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" | "required" | "enabled" => Some(true),
            "false" | "no" | "n" | "0" | "optional" | "disabled" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_f64().map(|n| n != 0.0),
        _ => None,
    }
}

pub fn number(value: &Value, keys: &[&str]) -> Option<f64> {
    match first(value, keys)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s
            .trim()
            .trim_end_matches("px")
            .trim()
            .parse::<f64>()
            .ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

/// A list of strings. A lone string counts as a one-element list, and list
/// entries that are objects contribute their `name` (or `label`).
pub fn strings(value: &Value, keys: &[&str]) -> Vec<String> {
    match first(value, keys) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(_) => text(item, &["name", "label", "id"]),
                other => scalar_text(other),
            })
            .collect(),
        Some(other) => scalar_text(other).into_iter().collect(),
        None => Vec::new(),
    }
}

pub fn object<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    first(value, keys).filter(|v| v.is_object())
}

/// Object items of a collection together with their position in the original
/// array; non-object entries are skipped without shifting indices.
pub fn items<'a>(value: &'a Value, keys: &[&str]) -> Vec<(usize, &'a Value)> {
    match first(value, keys) {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.is_object())
            .collect(),
        _ => Vec::new(),
    }
}

/// Stable identity of a collection item: explicit `id`, else the slug of
/// its natural key, else its position.
pub fn source_key(item: &Value, natural_keys: &[&str], index: usize) -> String {
    if let Some(id) = text(item, &["id"]) {
        return id;
    }
    natural_keys
        .iter()
        .find_map(|key| text(item, &[key]))
        .map(|name| slug(&name))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("#{}", index))
}

/// Lowercase, ASCII alphanumerics joined by single dashes.
pub fn slug(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_dash = false;
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            out.push(ch.to_ascii_lowercase());
            pending_dash = false;
        } else {
            pending_dash = true;
        }
    }
    out
}

fn snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            out.push('_');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Make `value` an object (replacing anything else) and return its map.
pub fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just made an object"),
    }
}

/// Find the collection item whose identity (as computed by [`source_key`])
/// equals `source_id`. The collection is resolved under the same aliases,
/// in the same order, as [`items`] reads it.
pub fn find_item_mut<'a>(
    data: &'a mut Value,
    collections: &[&str],
    natural_keys: &[&str],
    source_id: &str,
) -> Option<&'a mut Map<String, Value>> {
    let map = data.as_object_mut()?;
    let key = collections.iter().find_map(|collection| {
        [collection.to_string(), snake_case(collection)]
            .into_iter()
            .find(|key| map.get(key).is_some_and(|v| !v.is_null()))
    })?;
    let items = map.get_mut(&key)?.as_array_mut()?;
    let position = items
        .iter()
        .enumerate()
        .position(|(index, item)| item.is_object() && source_key(item, natural_keys, index) == source_id)?;
    items.get_mut(position)?.as_object_mut()
}

/// Remove `key` in both of its spellings.
pub fn remove_field(map: &mut Map<String, Value>, key: &str) {
    map.remove(key);
    map.remove(&snake_case(key));
}

/// Overwrite the keys of `target` with the (non-null) keys of `patch`.
pub fn merge_into(target: &mut Map<String, Value>, patch: Value) {
    if let Value::Object(patch) = patch {
        for (key, value) in patch {
            target.insert(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_accepts_snake_case() {
        let v = json!({"app_name": "Foo", "tagline": null});
        assert_eq!(text(&v, &["appName"]).as_deref(), Some("Foo"));
        assert_eq!(text(&v, &["tagline"]), None);
    }

    #[test]
    fn text_ignores_blank_and_structured_values() {
        let v = json!({"a": "   ", "b": {"x": 1}, "c": 42});
        assert_eq!(text(&v, &["a"]), None);
        assert_eq!(text(&v, &["b"]), None);
        assert_eq!(text(&v, &["c"]).as_deref(), Some("42"));
    }

    #[test]
    fn strings_handles_mixed_shapes() {
        let v = json!({"list": ["a", {"name": "b"}, 3, null], "single": "only"});
        assert_eq!(strings(&v, &["list"]), vec!["a", "b", "3"]);
        assert_eq!(strings(&v, &["single"]), vec!["only"]);
        assert!(strings(&v, &["missing"]).is_empty());
    }

    #[test]
    fn items_keep_original_indices() {
        let v = json!({"personas": [{"name": "A"}, "junk", {"name": "C"}]});
        let indices: Vec<usize> = items(&v, &["personas"]).iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![0, 2]);
        assert!(items(&json!({"personas": "nope"}), &["personas"]).is_empty());
    }

    #[test]
    fn source_key_precedence() {
        assert_eq!(source_key(&json!({"id": "p1", "name": "A"}), &["name"], 0), "p1");
        assert_eq!(source_key(&json!({"id": 7}), &["name"], 0), "7");
        assert_eq!(source_key(&json!({"name": "Power User!"}), &["name"], 0), "power-user");
        assert_eq!(source_key(&json!({"role": "x"}), &["name"], 3), "#3");
    }

    #[test]
    fn number_and_flag_are_lenient() {
        let v = json!({"size": "16px", "mfa": "yes", "bad": "big"});
        assert_eq!(number(&v, &["size"]), Some(16.0));
        assert_eq!(number(&v, &["bad"]), None);
        assert_eq!(flag(&v, &["mfa"]), Some(true));
        assert_eq!(flag(&v, &["bad"]), None);
    }

    #[test]
    fn find_item_mut_matches_by_identity() {
        let mut data = json!({"personas": [{"id": "p1", "name": "A"}, {"name": "Bea"}]});
        let item = find_item_mut(&mut data, &["personas"], &["name"], "bea").unwrap();
        merge_into(item, json!({"name": "Bea 2"}));
        assert_eq!(data["personas"][1]["name"], "Bea 2");
        assert!(find_item_mut(&mut data, &["personas"], &["name"], "p9").is_none());
    }

    #[test]
    fn find_item_mut_follows_collection_aliases() {
        let mut data = json!({"user_personas": [{"name": "Ana"}], "pages": null});
        let item = find_item_mut(&mut data, &["personas", "userPersonas"], &["name"], "ana").unwrap();
        merge_into(item, json!({"name": "Ana B"}));
        assert_eq!(data["user_personas"][0]["name"], "Ana B");
        assert!(find_item_mut(&mut data, &["pages"], &["name"], "ana").is_none());
    }
}

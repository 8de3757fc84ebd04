//! # Configuration Value Operations
//!
//! Dotted-path lookup, nested insertion and deep merge over
//! `serde_json::Value` trees.
//!
//! Every provider in the base chain reduces its source to a JSON tree;
//! these helpers are the shared primitives for composing those trees
//! and for addressing individual settings inside them.

use serde_json::{Map, Value};

/// Look up a value by dot-separated path.
///
/// Returns `None` when any segment is missing or when a non-object is
/// reached before the path is exhausted.
pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;

    for part in path.split('.') {
        match current {
            Value::Object(map) => {
                current = map.get(part)?;
            }
            _ => return None,
        }
    }

    Some(current)
}

/// Insert a value at a dot-separated path, creating intermediate
/// objects as needed.
///
/// A non-object encountered along the path is replaced by an object;
/// the last writer wins for the whole subtree.
pub fn set_path(map: &mut Map<String, Value>, path: &[&str], value: Value) {
    if path.is_empty() {
        return;
    }

    if path.len() == 1 {
        map.insert(path[0].to_string(), value);
        return;
    }

    let key = path[0];
    let rest = &path[1..];

    match map.get_mut(key) {
        Some(Value::Object(nested)) => {
            set_path(nested, rest, value);
        }
        _ => {
            let mut nested = Map::new();
            set_path(&mut nested, rest, value);
            map.insert(key.to_string(), Value::Object(nested));
        }
    }
}

/// Deep-merge two trees, the second overriding the first.
///
/// Objects are merged key by key; any other pairing is resolved by
/// taking the overriding value wholesale.
pub fn merge(base: Value, overriding: Value) -> Value {
    match (base, overriding) {
        (Value::Object(mut base_map), Value::Object(over_map)) => {
            for (key, over_value) in over_map {
                match base_map.remove(&key) {
                    Some(base_value) => {
                        base_map.insert(key, merge(base_value, over_value));
                    }
                    None => {
                        base_map.insert(key, over_value);
                    }
                }
            }
            Value::Object(base_map)
        }
        (_, overriding) => overriding,
    }
}

/// Build the dotted path addressing `key` inside `section`.
///
/// An empty section addresses a root-level key.
pub fn join_path(section: &str, key: &str) -> String {
    if section.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", section, key)
    }
}

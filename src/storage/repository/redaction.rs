// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Projection of records into the cached mirror.
//!
//! The mirror keeps primitive fields and fields tagged as cached. Everything
//! else is removed from the value tree, so it comes back as `None` or the
//! serde default when the record is rebuilt.
//!
//! A required field that cannot be removed is blanked instead: strings become
//! empty, sequences empty, mappings keep their keys with blanked values. A
//! field that can be neither removed nor blanked (an enum, for example) stays
//! in the mirror as is.
//!
//! Keys missing from the schema are classified by their value: booleans and
//! numbers count as primitive.

use serde::de::DeserializeOwned;
use serde_yml::{Mapping, Value};

use crate::models::Schema;

fn is_retained(schema: &Schema, name: &str, value: &Value) -> bool {
    match schema.field(name) {
        Some(spec) => spec.is_retained_in_cache(),
        None => matches!(value, Value::Bool(_) | Value::Number(_)),
    }
}

/// Remove every field the mirror does not keep.
pub fn redact(value: &mut Value, schema: &Schema) {
    let Value::Mapping(mapping) = value else {
        return;
    };

    mapping.retain(|key, field_value| match key.as_str() {
        Some(name) => is_retained(schema, name, field_value),
        None => false,
    });
}

/// Build the cached form of a record from its value tree.
///
/// Fails only if the unredacted value itself does not rebuild.
pub fn redact_record<T: DeserializeOwned>(
    original: &Value,
    schema: &Schema,
) -> Result<T, serde_yml::Error> {
    let mut redacted = original.clone();
    redact(&mut redacted, schema);
    if let Ok(record) = serde_yml::from_value(redacted) {
        return Ok(record);
    }

    let Value::Mapping(fields) = original else {
        return serde_yml::from_value(original.clone());
    };

    let mut current = fields.clone();
    for (key, value) in fields {
        let Some(name) = key.as_str() else {
            continue;
        };
        if is_retained(schema, name, value) {
            continue;
        }

        let mut removed = current.clone();
        removed.remove(name);
        if rebuilds::<T>(&removed) {
            current = removed;
            continue;
        }

        if let Some(blank) = blank(value) {
            let mut blanked = current.clone();
            blanked.insert(key.clone(), blank);
            if rebuilds::<T>(&blanked) {
                current = blanked;
                continue;
            }
        }

        tracing::warn!(field = name, "Field cannot be cleared, keeping it in cache");
    }

    serde_yml::from_value(Value::Mapping(current))
}

fn rebuilds<T: DeserializeOwned>(mapping: &Mapping) -> bool {
    serde_yml::from_value::<T>(Value::Mapping(mapping.clone())).is_ok()
}

/// Empty value of the same shape, if there is one.
fn blank(value: &Value) -> Option<Value> {
    match value {
        Value::Null => Some(Value::Null),
        Value::Bool(_) => Some(Value::Bool(false)),
        Value::Number(_) => Some(Value::Number(0u64.into())),
        Value::String(_) => Some(Value::String(String::new())),
        Value::Sequence(_) => Some(Value::Sequence(Vec::new())),
        Value::Mapping(mapping) => mapping
            .iter()
            .map(|(k, v)| blank(v).map(|b| (k.clone(), b)))
            .collect::<Option<Mapping>>()
            .map(Value::Mapping),
        _ => None,
    }
}

/// Copy every field the mirror keeps from `source` into `target`.
///
/// Declared fields follow the source exactly: a key missing from the source
/// is removed from the target, a key missing from the target is added.
/// Undeclared primitive keys are copied only when the target already has
/// them. Other fields of `target` stay as they are.
pub fn merge_cached(target: &mut Value, source: &Value, schema: &Schema) {
    let (Value::Mapping(target), Value::Mapping(source)) = (target, source) else {
        tracing::warn!("Cannot merge cached fields of a non-mapping record");
        return;
    };

    for spec in schema.fields().iter().filter(|f| f.is_retained_in_cache()) {
        match source.get(spec.name()) {
            Some(value) => {
                target.insert(Value::String(spec.name().to_string()), value.clone());
            }
            None => {
                target.remove(spec.name());
            }
        }
    }

    for (key, value) in source {
        let Some(name) = key.as_str() else {
            continue;
        };
        if schema.field(name).is_some() || !is_retained(schema, name, value) {
            continue;
        }
        match target.get_mut(name) {
            Some(slot) => *slot = value.clone(),
            None => {
                tracing::warn!(
                    field = name,
                    "Cached field missing from mirror entry, skipping"
                );
            }
        }
    }
}

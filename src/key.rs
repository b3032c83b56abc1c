//! Cache key construction
//!
//! Keys have the form `domain:identifier[:params]` where `params` is the
//! canonical JSON encoding of the extra discriminators: object keys sorted
//! at every level, no whitespace.

use serde_json::{Map, Value};
use std::{collections::BTreeMap, fmt::Display};

use crate::{CacheDomain, CacheError};

/// Extra discriminators such as pagination or filters.
pub type KeyParams = BTreeMap<String, Value>;

/// Build the cache key for `identifier` in `domain`.
pub fn build_key(
    domain: CacheDomain,
    identifier: impl Display,
    params: Option<&KeyParams>,
) -> String {
    match params.filter(|p| !p.is_empty()) {
        Some(params) => format!("{}:{}:{}", domain, identifier, canonical_json(params)),
        None => format!("{}:{}", domain, identifier),
    }
}

/// Build a key from a domain given by name.
pub fn build_key_named(
    domain: &str,
    identifier: impl Display,
    params: Option<&KeyParams>,
) -> Result<String, CacheError> {
    Ok(build_key(domain.parse()?, identifier, params))
}

/// Prefix shared by every key of `domain`.
pub(crate) fn domain_prefix(domain: CacheDomain) -> String {
    format!("{}:", domain)
}

fn canonical_json(params: &KeyParams) -> String {
    let object: Map<String, Value> = params
        .iter()
        .map(|(k, v)| (k.clone(), canonicalize(v)))
        .collect();
    Value::Object(object).to_string()
}

// serde_json's `preserve_order` feature can be switched on by any crate in
// the build, so objects are re-inserted in sorted order explicitly.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), canonicalize(v)))
                .collect::<BTreeMap<_, _>>()
                .into_iter()
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

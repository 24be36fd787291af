//! Sensitive data redaction for trace logs

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::http::context::AUTHORIZATION;

static TOKEN_REGEX: OnceLock<Regex> = OnceLock::new();

fn token_regex() -> &'static Regex {
    TOKEN_REGEX.get_or_init(|| {
        Regex::new(r#"(?i)(token|bearer|password|secret)([=:\s]+)['"]?([^\s&'"]+)['"]?"#)
            .expect("Valid regex pattern")
    })
}

/// Redact credentials embedded in free text (paths, query strings)
pub fn redact_sensitive(input: &str) -> String {
    token_regex().replace_all(input, "$1$2***").to_string()
}

/// Copy of `headers` with the bearer credential masked
pub fn redact_headers(headers: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = if name == AUTHORIZATION {
                match value.split_once(' ') {
                    Some((scheme, _)) => format!("{scheme} ***"),
                    None => "***".to_string(),
                }
            } else {
                value.clone()
            };
            (name.clone(), value)
        })
        .collect()
}

/// Copy of query pairs with sensitive values masked
pub fn redact_query(query: &[(String, String)]) -> Vec<(String, String)> {
    query
        .iter()
        .map(|(key, value)| {
            let value = if is_sensitive_key(key) {
                "***".to_string()
            } else {
                redact_sensitive(value)
            };
            (key.clone(), value)
        })
        .collect()
}

/// Redact sensitive information from JSON values in place
pub fn redact_json_value(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if is_sensitive_key(key) {
                    *val = Value::String("***".to_string());
                } else {
                    redact_json_value(val);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_json_value),
        _ => {}
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_lowercase();
    ["password", "passwd", "token", "secret", "credential", "pin"]
        .iter()
        .any(|needle| key.contains(needle))
}

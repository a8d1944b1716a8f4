// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Secret redaction for audit events.
//!
//! Detected secrets are replaced with `[REDACTED:<rule-id>]`. The rules cover
//! what can reach an audit record in this system: PEM private keys, the
//! signature value of an HTTP `Authorization: Signature` header, and bearer
//! tokens.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

const MAX_DEPTH: usize = 128;

struct Rule {
	id: &'static str,
	regex: Regex,
	/// Capture group holding the secret; 0 redacts the whole match.
	secret_group: usize,
}

static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
	vec![
		Rule {
			id: "private-key",
			regex: Regex::new(
				r"(?s)-----BEGIN[A-Z ]*PRIVATE KEY-----.*?-----END[A-Z ]*PRIVATE KEY-----",
			)
			.unwrap(),
			secret_group: 0,
		},
		Rule {
			id: "http-signature",
			regex: Regex::new(r#"signature="([^"]+)""#).unwrap(),
			secret_group: 1,
		},
		Rule {
			id: "bearer-token",
			regex: Regex::new(r"(?i)bearer\s+([A-Za-z0-9\-._~+/]{8,}=*)").unwrap(),
			secret_group: 1,
		},
	]
});

struct SecretMatch {
	start: usize,
	end: usize,
	rule_id: &'static str,
}

fn find_matches(input: &str) -> Vec<SecretMatch> {
	let mut matches: Vec<SecretMatch> = Vec::new();

	for rule in RULES.iter() {
		for cap in rule.regex.captures_iter(input) {
			let Some(m) = cap.get(rule.secret_group) else {
				continue;
			};
			matches.push(SecretMatch {
				start: m.start(),
				end: m.end(),
				rule_id: rule.id,
			});
		}
	}

	matches.sort_by_key(|m| m.start);

	let mut deduped: Vec<SecretMatch> = Vec::new();
	for m in matches {
		if let Some(last) = deduped.last() {
			if m.start < last.end {
				continue;
			}
		}
		deduped.push(m);
	}

	deduped
}

/// Redacts secrets from a string value.
///
/// Borrowed when nothing was found.
pub fn redact_string(input: &str) -> Cow<'_, str> {
	let matches = find_matches(input);
	if matches.is_empty() {
		return Cow::Borrowed(input);
	}

	let mut result = String::with_capacity(input.len());
	let mut last_end = 0;
	for m in matches {
		result.push_str(&input[last_end..m.start]);
		result.push_str("[REDACTED:");
		result.push_str(m.rule_id);
		result.push(']');
		last_end = m.end;
	}
	result.push_str(&input[last_end..]);

	Cow::Owned(result)
}

/// Redacts secrets from a JSON value in-place, keys included.
///
/// Depth is limited to prevent stack overflow from maliciously nested JSON.
pub fn redact_json_value(value: &mut Value) {
	redact_json_value_with_depth(value, 0);
}

fn redact_json_value_with_depth(value: &mut Value, depth: usize) {
	if depth > MAX_DEPTH {
		return;
	}

	match value {
		Value::String(s) => {
			if let Cow::Owned(new_s) = redact_string(s) {
				*s = new_s;
			}
		}
		Value::Array(arr) => {
			for item in arr {
				redact_json_value_with_depth(item, depth + 1);
			}
		}
		Value::Object(obj) => {
			let keys_to_rename: Vec<(String, String)> = obj
				.keys()
				.filter_map(|key| match redact_string(key) {
					Cow::Owned(new_key) => Some((key.clone(), new_key)),
					Cow::Borrowed(_) => None,
				})
				.collect();

			for (old_key, new_key) in keys_to_rename {
				if let Some(val) = obj.remove(&old_key) {
					obj.insert(new_key, val);
				}
			}

			for (_, v) in obj.iter_mut() {
				redact_json_value_with_depth(v, depth + 1);
			}
		}
		_ => {}
	}
}

/// Redacts secrets from an optional string field in-place.
pub fn redact_optional_string(s: &mut Option<String>) {
	if let Some(ref mut val) = s {
		if let Cow::Owned(new_val) = redact_string(val) {
			*val = new_val;
		}
	}
}

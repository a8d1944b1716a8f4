// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Placeholder substitution over JSON request templates.
//!
//! A template body is a JSON tree whose string leaves may contain `${name}`
//! placeholders. [`substitute`] produces a new tree with every placeholder
//! whose name is present in the parameters replaced by the parameter value.
//! Placeholders without a matching parameter are left in place verbatim.
//!
//! ```
//! use nimbus_common_template::{substitute, Parameters};
//! use serde_json::json;
//!
//! let template = json!({"email": "${email}", "name": "${name}"});
//! let mut params = Parameters::new();
//! params.insert("email".into(), json!("a@b.com"));
//!
//! let out = substitute(&template, &params);
//! assert_eq!(out, json!({"email": "a@b.com", "name": "${name}"}));
//! ```
//!
//! The input tree is only ever borrowed, so a cached template can be
//! substituted by many requests at once.

use std::borrow::Cow;
use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use thiserror::Error;

static PLACEHOLDER: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").expect("placeholder pattern is valid"));

/// Caller-supplied parameter values, keyed by placeholder name.
pub type Parameters = serde_json::Map<String, Value>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
	#[error("template body must be a JSON object or array, got {0}")]
	InvalidBody(&'static str),
}

pub type Result<T> = std::result::Result<T, TemplateError>;

/// Substitutes placeholders in every string leaf of `template`.
///
/// Object keys, numbers, booleans and nulls are copied unchanged. String
/// parameters are inserted verbatim; any other parameter value is inserted as
/// its compact JSON text. Substitution is single pass: text inserted from a
/// parameter is not scanned for further placeholders.
pub fn substitute(template: &Value, params: &Parameters) -> Value {
	match template {
		Value::String(s) => Value::String(substitute_str(s, params).into_owned()),
		Value::Array(items) => Value::Array(items.iter().map(|v| substitute(v, params)).collect()),
		Value::Object(map) => Value::Object(
			map.iter()
				.map(|(k, v)| (k.clone(), substitute(v, params)))
				.collect(),
		),
		other => other.clone(),
	}
}

/// Substitutes placeholders in a single string.
pub fn substitute_str<'a>(input: &'a str, params: &Parameters) -> Cow<'a, str> {
	PLACEHOLDER.replace_all(input, |caps: &Captures<'_>| match params.get(&caps[1]) {
		Some(value) => render(value),
		None => caps[0].to_string(),
	})
}

fn render(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		other => other.to_string(),
	}
}

/// Returns the distinct placeholder names referenced anywhere in `template`.
pub fn placeholders(template: &Value) -> BTreeSet<String> {
	let mut names = BTreeSet::new();
	collect_placeholders(template, &mut names);
	names
}

fn collect_placeholders(value: &Value, names: &mut BTreeSet<String>) {
	match value {
		Value::String(s) => {
			for caps in PLACEHOLDER.captures_iter(s) {
				names.insert(caps[1].to_string());
			}
		}
		Value::Array(items) => items.iter().for_each(|v| collect_placeholders(v, names)),
		Value::Object(map) => map.values().for_each(|v| collect_placeholders(v, names)),
		_ => {}
	}
}

/// Checks that a body is usable as a stored template.
pub fn validate_body(body: &Value) -> Result<()> {
	match body {
		Value::Object(_) | Value::Array(_) => Ok(()),
		Value::Null => Err(TemplateError::InvalidBody("null")),
		Value::Bool(_) => Err(TemplateError::InvalidBody("boolean")),
		Value::Number(_) => Err(TemplateError::InvalidBody("number")),
		Value::String(_) => Err(TemplateError::InvalidBody("string")),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use serde_json::json;

	fn params(value: Value) -> Parameters {
		match value {
			Value::Object(map) => map,
			_ => panic!("params must be an object"),
		}
	}

	#[test]
	fn replaces_single_placeholder() {
		let template = json!({"email": "${email}"});
		let out = substitute(&template, &params(json!({"email": "a@b.com"})));
		assert_eq!(out, json!({"email": "a@b.com"}));
	}

	#[test]
	fn missing_parameter_is_left_verbatim() {
		let template = json!({"name": "user-${id}", "email": "${email}"});
		let out = substitute(&template, &params(json!({"id": "42"})));
		assert_eq!(out, json!({"name": "user-42", "email": "${email}"}));
	}

	#[test]
	fn replaces_every_occurrence_in_a_string() {
		let out = substitute_str("${a}-${b}-${a}", &params(json!({"a": "x", "b": "y"})));
		assert_eq!(out, "x-y-x");
	}

	#[test]
	fn non_string_parameters_render_as_compact_json() {
		let template = json!({"description": "n=${n} ok=${ok} tags=${tags} none=${none}"});
		let out = substitute(
			&template,
			&params(json!({"n": 3, "ok": true, "tags": {"k": "v"}, "none": null})),
		);
		assert_eq!(
			out,
			json!({"description": "n=3 ok=true tags={\"k\":\"v\"} none=null"})
		);
	}

	#[test]
	fn nested_structures_and_non_string_leaves_are_preserved() {
		let template = json!({
			"statements": ["Allow group ${group} to read all-resources", 7, null],
			"nested": {"flag": false, "count": 2, "who": "${user}"}
		});
		let out = substitute(&template, &params(json!({"group": "ops", "user": "ana"})));
		assert_eq!(
			out,
			json!({
				"statements": ["Allow group ops to read all-resources", 7, null],
				"nested": {"flag": false, "count": 2, "who": "ana"}
			})
		);
	}

	#[test]
	fn object_keys_are_not_substituted() {
		let template = json!({"${key}": "${key}"});
		let out = substitute(&template, &params(json!({"key": "v"})));
		assert_eq!(out, json!({"${key}": "v"}));
	}

	#[test]
	fn inserted_text_is_not_rescanned() {
		let out = substitute_str("${a}", &params(json!({"a": "${b}", "b": "no"})));
		assert_eq!(out, "${b}");
	}

	#[test]
	fn empty_braces_are_not_a_placeholder() {
		let out = substitute_str("${}", &params(json!({"": "x"})));
		assert_eq!(out, "${}");
	}

	#[test]
	fn placeholders_are_collected_from_all_string_leaves() {
		let template = json!({"a": "${x} ${y}", "b": ["${z}", 1], "c": {"d": "${x}"}});
		let names: Vec<_> = placeholders(&template).into_iter().collect();
		assert_eq!(names, vec!["x", "y", "z"]);
	}

	#[test]
	fn validate_body_accepts_containers_only() {
		assert!(validate_body(&json!({})).is_ok());
		assert!(validate_body(&json!([])).is_ok());
		assert_eq!(
			validate_body(&json!("text")),
			Err(TemplateError::InvalidBody("string"))
		);
		assert_eq!(validate_body(&json!(1)), Err(TemplateError::InvalidBody("number")));
	}

	fn arb_text() -> impl Strategy<Value = String> {
		"[a-z ]{0,4}(\\$\\{(k1|k2|k3|k4)\\})?[a-z ]{0,4}(\\$\\{(k1|k2|k3|k4)\\})?"
	}

	fn arb_template() -> impl Strategy<Value = Value> {
		let leaf = prop_oneof![
			Just(Value::Null),
			any::<bool>().prop_map(Value::Bool),
			any::<i64>().prop_map(|n| json!(n)),
			arb_text().prop_map(Value::String),
		];
		leaf.prop_recursive(4, 32, 4, |inner| {
			prop_oneof![
				prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
				prop::collection::btree_map("[a-z]{1,3}", inner, 0..4)
					.prop_map(|m| Value::Object(m.into_iter().collect())),
			]
		})
	}

	fn arb_params() -> impl Strategy<Value = Parameters> {
		prop::collection::btree_map("k[1-4]", "[a-z0-9@.]{0,6}", 0..4).prop_map(|m| {
			m.into_iter()
				.map(|(k, v)| (k, Value::String(v)))
				.collect()
		})
	}

	fn naive(s: &str, params: &Parameters) -> String {
		let mut out = s.to_string();
		for (key, value) in params {
			if let Value::String(v) = value {
				out = out.replace(&format!("${{{key}}}"), v);
			}
		}
		out
	}

	fn check_shape(template: &Value, out: &Value, params: &Parameters) -> bool {
		match (template, out) {
			(Value::String(t), Value::String(o)) => *o == naive(t, params),
			(Value::Array(t), Value::Array(o)) => {
				t.len() == o.len()
					&& t.iter().zip(o).all(|(t, o)| check_shape(t, o, params))
			}
			(Value::Object(t), Value::Object(o)) => {
				t.len() == o.len()
					&& t.iter().all(|(k, tv)| {
						o.get(k).map_or(false, |ov| check_shape(tv, ov, params))
					})
			}
			(t, o) => t == o,
		}
	}

	proptest! {
		#[test]
		fn substitution_preserves_structure_and_leaves(
			template in arb_template(),
			params in arb_params(),
		) {
			let out = substitute(&template, &params);
			prop_assert!(check_shape(&template, &out, &params));
		}

		#[test]
		fn empty_parameters_are_identity(template in arb_template()) {
			prop_assert_eq!(substitute(&template, &Parameters::new()), template);
		}

		#[test]
		fn absent_placeholders_survive(template in arb_template(), params in arb_params()) {
			let out = substitute(&template, &params);
			let expected: BTreeSet<String> = placeholders(&template)
				.into_iter()
				.filter(|name| !params.contains_key(name))
				.collect();
			prop_assert_eq!(placeholders(&out), expected);
		}

		#[test]
		fn template_is_never_mutated(
			template in arb_template(),
			first in arb_params(),
			second in arb_params(),
		) {
			let stored = template.clone();
			let a = substitute(&template, &first);
			let b = substitute(&template, &second);
			prop_assert_eq!(&template, &stored);
			prop_assert!(check_shape(&stored, &a, &first));
			prop_assert!(check_shape(&stored, &b, &second));
			prop_assert_eq!(substitute(&template, &first), a);
		}
	}
}

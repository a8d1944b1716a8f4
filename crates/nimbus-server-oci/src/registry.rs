// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Registry of supported identity request types.
//!
//! [`REGISTRY`] holds one [`RequestSpec`] per [`RequestType`]: wire name,
//! endpoint, method, required fields, extra checks and the wire transform.
//! Adding a type means adding its variant and its registry entry.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{OciError, Result};

/// Logical request data supplied by the caller.
pub type RequestData = Map<String, Value>;

static EMAIL: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

const API_VERSION: &str = "/20160918";

/// Supported request types. Variant order is the order of [`REGISTRY`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestType {
	CreateUser,
	UpdateUser,
	CreateGroup,
	AddUserToGroup,
	CreatePolicy,
}

impl RequestType {
	pub fn as_str(&self) -> &'static str {
		spec(*self).name
	}
}

impl fmt::Display for RequestType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for RequestType {
	type Err = OciError;

	fn from_str(s: &str) -> Result<Self> {
		REGISTRY
			.iter()
			.find(|spec| spec.name == s)
			.map(|spec| spec.request_type)
			.ok_or_else(|| OciError::UnsupportedRequestType(s.to_string()))
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
	Post,
	Put,
}

impl HttpMethod {
	pub fn as_str(&self) -> &'static str {
		match self {
			HttpMethod::Post => "POST",
			HttpMethod::Put => "PUT",
		}
	}
}

impl From<HttpMethod> for reqwest::Method {
	fn from(method: HttpMethod) -> Self {
		match method {
			HttpMethod::Post => reqwest::Method::POST,
			HttpMethod::Put => reqwest::Method::PUT,
		}
	}
}

/// Static description of one request type.
pub struct RequestSpec {
	pub request_type: RequestType,
	/// Wire name, e.g. `CREATE_USER`.
	pub name: &'static str,
	pub method: HttpMethod,
	pub required_fields: &'static [&'static str],
	endpoint: fn(&RequestData) -> String,
	check: fn(&RequestData) -> Result<()>,
	transform: fn(&RequestData, &str) -> Value,
}

impl fmt::Debug for RequestSpec {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RequestSpec")
			.field("name", &self.name)
			.field("method", &self.method)
			.field("required_fields", &self.required_fields)
			.finish()
	}
}

impl RequestSpec {
	fn validate(&self, data: &RequestData) -> Result<()> {
		let missing: Vec<&str> = self
			.required_fields
			.iter()
			.copied()
			.filter(|field| is_missing(field, data.get(*field)))
			.collect();

		if !missing.is_empty() {
			return Err(OciError::missing_fields(&missing));
		}

		(self.check)(data)
	}
}

/// One entry per [`RequestType`], in variant order.
pub static REGISTRY: [RequestSpec; 5] = [
	RequestSpec {
		request_type: RequestType::CreateUser,
		name: "CREATE_USER",
		method: HttpMethod::Post,
		required_fields: &["name", "description", "email"],
		endpoint: users_endpoint,
		check: check_user,
		transform: transform_create_user,
	},
	RequestSpec {
		request_type: RequestType::UpdateUser,
		name: "UPDATE_USER",
		method: HttpMethod::Put,
		required_fields: &["userId"],
		endpoint: user_endpoint,
		check: check_update_user,
		transform: transform_update_user,
	},
	RequestSpec {
		request_type: RequestType::CreateGroup,
		name: "CREATE_GROUP",
		method: HttpMethod::Post,
		required_fields: &["name", "description"],
		endpoint: groups_endpoint,
		check: check_tags,
		transform: transform_create_group,
	},
	RequestSpec {
		request_type: RequestType::AddUserToGroup,
		name: "ADD_USER_TO_GROUP",
		method: HttpMethod::Post,
		required_fields: &["userId", "groupId"],
		endpoint: memberships_endpoint,
		check: check_nothing,
		transform: transform_add_user_to_group,
	},
	RequestSpec {
		request_type: RequestType::CreatePolicy,
		name: "CREATE_POLICY",
		method: HttpMethod::Post,
		required_fields: &["name", "description", "statements"],
		endpoint: policies_endpoint,
		check: check_tags,
		transform: transform_create_policy,
	},
];

/// Looks up the registry entry for a request type.
pub fn spec(request_type: RequestType) -> &'static RequestSpec {
	&REGISTRY[request_type as usize]
}

/// A validated request, ready to be transformed and signed.
#[derive(Clone)]
pub struct ResolvedRequest {
	pub request_type: RequestType,
	pub method: HttpMethod,
	pub endpoint: String,
	pub required_fields: &'static [&'static str],
	data: RequestData,
	transform: fn(&RequestData, &str) -> Value,
}

impl fmt::Debug for ResolvedRequest {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ResolvedRequest")
			.field("request_type", &self.request_type)
			.field("method", &self.method)
			.field("endpoint", &self.endpoint)
			.finish_non_exhaustive()
	}
}

impl ResolvedRequest {
	/// Builds the provider payload, injecting the compartment identifier.
	///
	/// Only fields the provider expects are copied; anything else the caller
	/// sent is dropped.
	pub fn transform(&self, compartment_id: &str) -> Value {
		(self.transform)(&self.data, compartment_id)
	}

	/// The validated request data the payload is built from.
	pub fn data(&self) -> &RequestData {
		&self.data
	}
}

/// Validates `data` for `request_type` and resolves its wire semantics.
///
/// All missing required fields are reported together.
pub fn resolve(request_type: RequestType, data: &RequestData) -> Result<ResolvedRequest> {
	let spec = spec(request_type);
	spec.validate(data)?;

	Ok(ResolvedRequest {
		request_type,
		method: spec.method,
		endpoint: (spec.endpoint)(data),
		required_fields: spec.required_fields,
		data: data.clone(),
		transform: spec.transform,
	})
}

/// Like [`resolve`], for a request type given by name.
pub fn resolve_named(request_type: &str, data: &RequestData) -> Result<ResolvedRequest> {
	resolve(request_type.parse()?, data)
}

fn is_missing(field: &str, value: Option<&Value>) -> bool {
	match (field, value) {
		(_, None | Some(Value::Null)) => true,
		("statements", Some(Value::Array(items))) => {
			items.is_empty() || items.iter().any(|s| !s.is_string())
		}
		("statements", Some(_)) => true,
		(_, Some(Value::String(s))) => s.is_empty(),
		_ => false,
	}
}

/// Renders a scalar field for use in a URL path.
fn text(value: Option<&Value>) -> String {
	match value {
		Some(Value::String(s)) => s.clone(),
		Some(other) => other.to_string(),
		None => String::new(),
	}
}

fn field(data: &RequestData, name: &str) -> Value {
	data.get(name).cloned().unwrap_or(Value::Null)
}

fn freeform_tags(data: &RequestData) -> Value {
	match data.get("tags") {
		Some(Value::Object(tags)) => Value::Object(tags.clone()),
		_ => json!({}),
	}
}

fn users_endpoint(_: &RequestData) -> String {
	format!("{API_VERSION}/users")
}

fn user_endpoint(data: &RequestData) -> String {
	let user_id = text(data.get("userId"));
	format!("{API_VERSION}/users/{}", urlencoding::encode(&user_id))
}

fn groups_endpoint(_: &RequestData) -> String {
	format!("{API_VERSION}/groups")
}

fn memberships_endpoint(_: &RequestData) -> String {
	format!("{API_VERSION}/userGroupMemberships")
}

fn policies_endpoint(_: &RequestData) -> String {
	format!("{API_VERSION}/policies")
}

fn check_nothing(_: &RequestData) -> Result<()> {
	Ok(())
}

fn check_email(data: &RequestData) -> Result<()> {
	match data.get("email") {
		None | Some(Value::Null) => Ok(()),
		Some(Value::String(s)) if s.is_empty() || EMAIL.is_match(s) => Ok(()),
		Some(_) => Err(OciError::Validation("invalid email".to_string())),
	}
}

fn check_tags(data: &RequestData) -> Result<()> {
	match data.get("tags") {
		None | Some(Value::Null) | Some(Value::Object(_)) => Ok(()),
		Some(_) => Err(OciError::Validation("tags must be an object".to_string())),
	}
}

fn check_user(data: &RequestData) -> Result<()> {
	check_email(data)?;
	check_tags(data)
}

fn check_update_user(data: &RequestData) -> Result<()> {
	check_email(data)
}

fn transform_create_user(data: &RequestData, compartment_id: &str) -> Value {
	json!({
		"compartmentId": compartment_id,
		"name": field(data, "name"),
		"description": field(data, "description"),
		"email": field(data, "email"),
		"freeformTags": freeform_tags(data),
	})
}

fn transform_update_user(data: &RequestData, _: &str) -> Value {
	let mut out = Map::new();
	if let Some(description) = data.get("description").filter(|v| !v.is_null()) {
		out.insert("description".to_string(), description.clone());
	}
	if let Some(email) = data.get("email").filter(|v| !is_missing("email", Some(*v))) {
		out.insert("email".to_string(), email.clone());
	}
	Value::Object(out)
}

fn transform_create_group(data: &RequestData, compartment_id: &str) -> Value {
	json!({
		"compartmentId": compartment_id,
		"name": field(data, "name"),
		"description": field(data, "description"),
		"freeformTags": freeform_tags(data),
	})
}

fn transform_add_user_to_group(data: &RequestData, compartment_id: &str) -> Value {
	json!({
		"compartmentId": compartment_id,
		"userId": field(data, "userId"),
		"groupId": field(data, "groupId"),
	})
}

fn transform_create_policy(data: &RequestData, compartment_id: &str) -> Value {
	json!({
		"compartmentId": compartment_id,
		"name": field(data, "name"),
		"description": field(data, "description"),
		"statements": field(data, "statements"),
		"freeformTags": freeform_tags(data),
	})
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use nimbus_server_db::{ProvisioningRequest, RequestStatus, Template};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Input to [`ProvisioningService::submit`](crate::ProvisioningService::submit).
///
/// With a `template_id` the payload is the template body with `parameters`
/// substituted in. Without one, `parameters` is the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
	pub template_id: Option<Uuid>,
	pub request_type: String,
	#[serde(default = "empty_object")]
	pub parameters: Value,
}

fn empty_object() -> Value {
	Value::Object(Default::default())
}

/// Acknowledgement returned once the pending record is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitAck {
	pub request_id: Uuid,
}

/// A request as shown to its owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestView {
	pub id: Uuid,
	pub template_id: Option<Uuid>,
	pub request_type: String,
	pub owner_user_id: String,
	pub owner_company_id: String,
	pub status: RequestStatus,
	pub result: Option<Value>,
	pub attempts: u32,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl From<ProvisioningRequest> for RequestView {
	fn from(request: ProvisioningRequest) -> Self {
		Self {
			id: request.id,
			template_id: request.template_id,
			request_type: request.request_type,
			owner_user_id: request.owner_user_id,
			owner_company_id: request.owner_company_id,
			status: request.status,
			result: request.result,
			attempts: request.attempts,
			created_at: request.created_at,
			updated_at: request.updated_at,
		}
	}
}

/// Listing options; the visible scope comes from the actor's role.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListRequests {
	pub status: Option<RequestStatus>,
	#[serde(default)]
	pub limit: u32,
	#[serde(default)]
	pub offset: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestPage {
	pub items: Vec<RequestView>,
	pub total: i64,
	pub limit: u32,
	pub offset: u32,
}

/// Template without its body, for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSummary {
	pub id: Uuid,
	pub name: String,
	pub description: String,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl From<Template> for TemplateSummary {
	fn from(template: Template) -> Self {
		Self {
			id: template.id,
			name: template.name,
			description: template.description,
			created_at: template.created_at,
			updated_at: template.updated_at,
		}
	}
}

/// Create-or-replace input for a template. A missing `id` creates one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateInput {
	pub id: Option<Uuid>,
	pub name: String,
	#[serde(default)]
	pub description: String,
	pub body: Value,
	pub active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyInput {
	pub id: String,
	pub name: String,
	pub active: bool,
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The dispatch half of the lifecycle.
//!
//! A pipeline run owns exactly one dispatch attempt: it claims the pending
//! record, resolves the payload stored when the request entered `pending`,
//! signs and sends it, then writes the outcome back with a conditional update.
//! If the record left `pending` in the meantime the write matches nothing and
//! the outcome is discarded.
//!
//! A failed outcome write is retried, then replaced by a `persistence_error`
//! result. Rows a crashed run left claimed are failed by
//! [`ProvisioningService::recover_stale_dispatches`](crate::ProvisioningService::recover_stale_dispatches).

use std::sync::Arc;
use std::time::Duration;

use nimbus_common_template::substitute;
use nimbus_server_audit::{AuditEventType, AuditLogEntry, AuditService};
use nimbus_server_db::{ProvisioningRequest, RequestStatus, RequestStore, TemplateStore};
use nimbus_server_oci::{resolve_named, DispatchOutcome, OciClient, RequestData, ResolvedRequest};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::error::{ProvisioningError, Result};

const OUTCOME_WRITE_ATTEMPTS: u32 = 3;
const OUTCOME_WRITE_BACKOFF: Duration = Duration::from_millis(50);

/// Builds and validates the provider request for a submission.
///
/// Runs at submit time and on reprocess. The resolved data is stored as the
/// request payload; template edits after that do not reach the dispatch.
pub(crate) async fn prepare(
	templates: &dyn TemplateStore,
	request_type: &str,
	template_id: Option<Uuid>,
	parameters: &Value,
) -> Result<ResolvedRequest> {
	let params = parameters.as_object().ok_or_else(|| {
		ProvisioningError::Validation("parameters must be a JSON object".to_string())
	})?;

	let data: RequestData = match template_id {
		Some(id) => {
			let template = match templates.get_active_template(id).await? {
				Some(template) => template,
				None if templates.get_template(id).await?.is_some() => {
					return Err(ProvisioningError::TemplateInactive(id));
				}
				None => return Err(ProvisioningError::TemplateNotFound(id)),
			};

			match substitute(&template.body, params) {
				Value::Object(map) => map,
				_ => {
					return Err(ProvisioningError::Validation(format!(
						"template {id} does not produce a JSON object"
					)))
				}
			}
		}
		None => params.clone(),
	};

	Ok(resolve_named(request_type, &data)?)
}

/// Stored result for a successful dispatch.
fn success_result(status: u16, body: Value) -> Value {
	json!({ "status": status, "body": body })
}

/// Stored result for a failed attempt.
pub(crate) fn failure_result(err: &ProvisioningError) -> Value {
	let mut result = json!({
		"kind": err.kind(),
		"message": err.to_string(),
	});
	match err {
		ProvisioningError::Provider { status, body } => {
			result["status"] = json!(status);
			result["body"] = json!(body);
		}
		ProvisioningError::DispatchTimeout { timeout_ms } => {
			result["timeout_ms"] = json!(timeout_ms);
		}
		_ => {}
	}
	result
}

fn classify(outcome: DispatchOutcome) -> std::result::Result<Value, ProvisioningError> {
	match outcome {
		DispatchOutcome::Success { status, body } => Ok(success_result(status, body)),
		DispatchOutcome::ProviderError { status, body } => {
			Err(ProvisioningError::Provider { status, body })
		}
		DispatchOutcome::NetworkError { message } => Err(ProvisioningError::DispatchNetwork(message)),
		DispatchOutcome::Timeout { timeout_ms } => Err(ProvisioningError::DispatchTimeout { timeout_ms }),
	}
}

/// Resolves the payload stored on a pending request.
fn resolve_stored(request: &ProvisioningRequest) -> Result<ResolvedRequest> {
	let data = request.payload.as_object().ok_or_else(|| {
		ProvisioningError::Validation("stored payload is not a JSON object".to_string())
	})?;
	Ok(resolve_named(&request.request_type, data)?)
}

#[derive(Clone)]
pub(crate) struct Pipeline {
	pub(crate) requests: Arc<dyn RequestStore>,
	pub(crate) client: Arc<OciClient>,
	pub(crate) audit: Arc<AuditService>,
	pub(crate) dispatch_timeout: Duration,
}

impl Pipeline {
	/// Runs one dispatch attempt. Never returns an error: every failure ends
	/// up in the request record or the log.
	#[instrument(skip(self), fields(request_id = %id))]
	pub(crate) async fn run(&self, id: Uuid) {
		if let Err(e) = self.attempt(id).await {
			error!(error = %e, "Failed to record dispatch outcome");
		}
	}

	async fn attempt(&self, id: Uuid) -> Result<()> {
		if !self.requests.claim_dispatch(id).await? {
			debug!("Request is no longer pending or already claimed, skipping dispatch");
			return Ok(());
		}

		let Some(request) = self.requests.get_request(id).await? else {
			warn!("Claimed request disappeared");
			return Ok(());
		};

		let outcome = match resolve_stored(&request) {
			Ok(resolved) => self.send(&resolved).await,
			Err(e) => Err(e),
		};

		let (mut status, mut result, mut event) = match outcome {
			Ok(result) => (RequestStatus::Completed, result, AuditEventType::RequestCompleted),
			Err(e) => {
				warn!(error = %e, kind = e.kind(), "Dispatch failed");
				(RequestStatus::Error, failure_result(&e), AuditEventType::RequestFailed)
			}
		};

		let applied = match self.write_outcome(id, status, &result).await {
			Ok(applied) => applied,
			Err(e) => {
				error!(error = %e, outcome = %status, "Failed to record dispatch outcome, marking request as error");
				let mut fallback = failure_result(&e);
				fallback["outcome"] = result;
				status = RequestStatus::Error;
				result = fallback;
				event = AuditEventType::RequestFailed;
				self.write_outcome(id, status, &result).await?
			}
		};

		if !applied {
			info!(outcome = %status, "Request left pending during dispatch, outcome discarded");
			return Ok(());
		}

		info!(status = %status, "Dispatch outcome recorded");
		let logged = self.audit.log(
			AuditLogEntry::builder(event)
				.resource("provisioning_request", id.to_string())
				.action(format!("{} {}", request.request_type, status))
				.details(json!({
					"owner_user_id": request.owner_user_id,
					"owner_company_id": request.owner_company_id,
					"result": result,
				}))
				.build(),
		);
		if !logged {
			debug!("Audit event dropped");
		}

		Ok(())
	}

	/// Conditionally writes the outcome, retrying transient store failures.
	async fn write_outcome(&self, id: Uuid, status: RequestStatus, result: &Value) -> Result<bool> {
		let mut attempt = 1;
		loop {
			match self
				.requests
				.update_status_if(id, RequestStatus::Pending, status, Some(result))
				.await
			{
				Ok(applied) => return Ok(applied),
				Err(e) if attempt < OUTCOME_WRITE_ATTEMPTS => {
					warn!(error = %e, attempt, "Outcome write failed, retrying");
					tokio::time::sleep(OUTCOME_WRITE_BACKOFF * attempt).await;
					attempt += 1;
				}
				Err(e) => return Err(e.into()),
			}
		}
	}

	async fn send(&self, resolved: &ResolvedRequest) -> std::result::Result<Value, ProvisioningError> {
		match tokio::time::timeout(self.dispatch_timeout, self.client.send(resolved)).await {
			Ok(Ok(outcome)) => classify(outcome),
			Ok(Err(e)) => Err(e.into()),
			Err(_) => Err(ProvisioningError::DispatchTimeout {
				timeout_ms: self.dispatch_timeout.as_millis() as u64,
			}),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;
	use nimbus_server_db::testing::create_test_pool;
	use nimbus_server_db::{Template, TemplateRepository};

	async fn store_with(template: &Template) -> TemplateRepository {
		let repo = TemplateRepository::new(create_test_pool().await);
		repo.upsert_template(template).await.unwrap();
		repo
	}

	fn template(body: Value, active: bool) -> Template {
		let now = Utc::now();
		Template {
			id: Uuid::new_v4(),
			name: "user".to_string(),
			description: String::new(),
			body,
			active,
			created_at: now,
			updated_at: now,
		}
	}

	#[tokio::test]
	async fn substituted_template_feeds_the_registry() {
		let template = template(
			json!({"name": "${name}", "description": "${desc}", "email": "${email}"}),
			true,
		);
		let repo = store_with(&template).await;

		let resolved = prepare(
			&repo,
			"CREATE_USER",
			Some(template.id),
			&json!({"name": "ana", "desc": "ops", "email": "a@b.com"}),
		)
		.await
		.unwrap();

		let payload = resolved.transform("ocid1.compartment");
		assert_eq!(payload["email"], "a@b.com");
		assert_eq!(payload["compartmentId"], "ocid1.compartment");
	}

	#[tokio::test]
	async fn template_missing_required_fields_is_rejected() {
		let template = template(json!({"email": "${email}"}), true);
		let repo = store_with(&template).await;

		let err = prepare(&repo, "CREATE_USER", Some(template.id), &json!({"email": "a@b.com"}))
			.await
			.unwrap_err();
		let message = err.to_string();
		assert!(message.contains("name"));
		assert!(message.contains("description"));
	}

	#[tokio::test]
	async fn inactive_and_missing_templates_are_distinguished() {
		let inactive = template(json!({}), false);
		let repo = store_with(&inactive).await;

		let err = prepare(&repo, "CREATE_GROUP", Some(inactive.id), &json!({}))
			.await
			.unwrap_err();
		assert!(matches!(err, ProvisioningError::TemplateInactive(id) if id == inactive.id));

		let missing = Uuid::new_v4();
		let err = prepare(&repo, "CREATE_GROUP", Some(missing), &json!({}))
			.await
			.unwrap_err();
		assert!(matches!(err, ProvisioningError::TemplateNotFound(id) if id == missing));
	}

	#[tokio::test]
	async fn type_only_submission_uses_parameters_as_payload() {
		let repo = TemplateRepository::new(create_test_pool().await);
		let resolved = prepare(
			&repo,
			"ADD_USER_TO_GROUP",
			None,
			&json!({"userId": "u1", "groupId": "g1"}),
		)
		.await
		.unwrap();
		assert_eq!(resolved.endpoint, "/20160918/userGroupMemberships");

		let err = prepare(&repo, "ADD_USER_TO_GROUP", None, &json!(["not", "an", "object"]))
			.await
			.unwrap_err();
		assert!(matches!(err, ProvisioningError::Validation(_)));

		let err = prepare(&repo, "DELETE_USER", None, &json!({})).await.unwrap_err();
		assert!(matches!(err, ProvisioningError::UnsupportedRequestType(t) if t == "DELETE_USER"));
	}

	#[test]
	fn stored_payload_is_resolved_without_the_template() {
		let now = Utc::now();
		let mut request = ProvisioningRequest {
			id: Uuid::new_v4(),
			template_id: Some(Uuid::new_v4()),
			request_type: "CREATE_GROUP".to_string(),
			owner_user_id: "u1".to_string(),
			owner_company_id: "c1".to_string(),
			parameters: json!({"name": "ignored"}),
			payload: json!({"name": "ops", "description": "operators"}),
			status: RequestStatus::Pending,
			result: None,
			attempts: 1,
			dispatch_started_at: Some(now),
			created_at: now,
			updated_at: now,
		};

		let resolved = resolve_stored(&request).unwrap();
		assert_eq!(resolved.data()["name"], "ops");

		request.payload = json!("not an object");
		assert!(matches!(
			resolve_stored(&request),
			Err(ProvisioningError::Validation(_))
		));
	}

	#[test]
	fn provider_failure_result_keeps_status_and_body() {
		let result = failure_result(&ProvisioningError::Provider {
			status: 401,
			body: "{\"code\":\"NotAuthenticated\"}".to_string(),
		});
		assert_eq!(result["kind"], "provider_error");
		assert_eq!(result["status"], 401);
		assert!(result["body"].as_str().unwrap().contains("NotAuthenticated"));
	}

	#[test]
	fn classify_maps_every_outcome() {
		assert!(classify(DispatchOutcome::Success {
			status: 200,
			body: json!({"id": "x"})
		})
		.is_ok());
		assert!(matches!(
			classify(DispatchOutcome::NetworkError {
				message: "refused".to_string()
			}),
			Err(ProvisioningError::DispatchNetwork(_))
		));
		assert!(matches!(
			classify(DispatchOutcome::Timeout { timeout_ms: 5 }),
			Err(ProvisioningError::DispatchTimeout { timeout_ms: 5 })
		));
	}
}

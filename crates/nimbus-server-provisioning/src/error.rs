// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use nimbus_server_db::DbError;
use nimbus_server_oci::OciError;
use uuid::Uuid;

/// Errors that can occur while provisioning.
///
/// Everything up to persisting the pending record is returned to the caller.
/// Dispatch-phase variants are only ever stored in a request's result.
#[derive(Debug, thiserror::Error)]
pub enum ProvisioningError {
	#[error("validation error: {0}")]
	Validation(String),

	#[error("template not found: {0}")]
	TemplateNotFound(Uuid),

	#[error("template is inactive: {0}")]
	TemplateInactive(Uuid),

	#[error("not authorized: {0}")]
	Authorization(String),

	#[error("unsupported request type '{0}'")]
	UnsupportedRequestType(String),

	#[error("signing error: {0}")]
	Signing(String),

	#[error("dispatch timed out after {timeout_ms}ms")]
	DispatchTimeout { timeout_ms: u64 },

	#[error("network error: {0}")]
	DispatchNetwork(String),

	#[error("provider returned HTTP {status}")]
	Provider { status: u16, body: String },

	#[error("dispatch was interrupted before its outcome was recorded")]
	DispatchInterrupted,

	#[error("conflict: {0}")]
	Conflict(String),

	#[error("not found: {0}")]
	NotFound(String),

	#[error("configuration error: {0}")]
	Config(String),

	#[error("persistence error: {0}")]
	Persistence(#[source] DbError),
}

impl ProvisioningError {
	/// Stable machine-readable name, stored as `kind` in failure results.
	pub fn kind(&self) -> &'static str {
		match self {
			ProvisioningError::Validation(_) => "validation_error",
			ProvisioningError::TemplateNotFound(_) => "template_not_found",
			ProvisioningError::TemplateInactive(_) => "template_inactive",
			ProvisioningError::Authorization(_) => "authorization_error",
			ProvisioningError::UnsupportedRequestType(_) => "unsupported_request_type",
			ProvisioningError::Signing(_) => "signing_error",
			ProvisioningError::DispatchTimeout { .. } => "timeout",
			ProvisioningError::DispatchNetwork(_) => "network_error",
			ProvisioningError::Provider { .. } => "provider_error",
			ProvisioningError::DispatchInterrupted => "dispatch_interrupted",
			ProvisioningError::Conflict(_) => "conflict",
			ProvisioningError::NotFound(_) => "not_found",
			ProvisioningError::Config(_) => "configuration_error",
			ProvisioningError::Persistence(_) => "persistence_error",
		}
	}

	pub(crate) fn illegal_transition(
		action: &str,
		id: Uuid,
		status: nimbus_server_db::RequestStatus,
	) -> Self {
		ProvisioningError::Conflict(format!("cannot {action} request {id}: status is {status}"))
	}
}

impl From<DbError> for ProvisioningError {
	fn from(err: DbError) -> Self {
		match err {
			DbError::NotFound(what) => ProvisioningError::NotFound(what),
			DbError::Conflict(what) => ProvisioningError::Conflict(what),
			other => ProvisioningError::Persistence(other),
		}
	}
}

impl From<OciError> for ProvisioningError {
	fn from(err: OciError) -> Self {
		match err {
			OciError::Validation(msg) => ProvisioningError::Validation(msg),
			OciError::UnsupportedRequestType(ty) => ProvisioningError::UnsupportedRequestType(ty),
			OciError::Signing(msg) => ProvisioningError::Signing(msg),
			OciError::Config(msg) => ProvisioningError::Config(msg),
		}
	}
}

pub type Result<T> = std::result::Result<T, ProvisioningError>;

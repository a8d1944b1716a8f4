// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Error types for the OCI integration.

use thiserror::Error;

/// Errors raised before a request reaches the provider.
///
/// Once a request is on the wire, failures are reported as a
/// [`DispatchOutcome`](crate::DispatchOutcome) instead.
#[derive(Debug, Error)]
pub enum OciError {
	/// Caller data does not satisfy the request type's rules.
	#[error("{0}")]
	Validation(String),

	/// The request type is not in the registry.
	#[error("unsupported request type '{0}'")]
	UnsupportedRequestType(String),

	/// The private key could not be loaded or used.
	///
	/// The message never contains key material.
	#[error("signing error: {0}")]
	Signing(String),

	/// Invalid client configuration.
	#[error("configuration error: {0}")]
	Config(String),
}

impl OciError {
	pub fn missing_fields(fields: &[&str]) -> Self {
		Self::Validation(format!("missing required fields: {}", fields.join(", ")))
	}
}

pub type Result<T> = std::result::Result<T, OciError>;

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Outbound dispatch to the OCI identity API.
//!
//! [`HttpDispatcher`] performs exactly one HTTP call per request and
//! classifies the result. It never retries: a duplicate `CREATE_USER` would
//! create a duplicate user, so retries are always an explicit reprocess.
//! [`OciClient`] composes the registry output, the signer and a dispatcher.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, instrument, warn};
use url::Url;

use crate::config::OciClientConfig;
use crate::error::{OciError, Result};
use crate::registry::{HttpMethod, ResolvedRequest};
use crate::signer::{RequestSigner, SignedHeaders};

/// A fully signed request, ready to send.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
	pub method: HttpMethod,
	pub url: Url,
	pub headers: SignedHeaders,
	pub body: String,
}

/// Classified result of a single dispatch attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DispatchOutcome {
	/// 2xx response. Non-JSON bodies are kept as a string value.
	Success { status: u16, body: Value },
	/// A non-2xx response was received.
	ProviderError { status: u16, body: String },
	/// No response: connection, DNS or TLS failure.
	NetworkError { message: String },
	/// No response within the configured bound.
	Timeout { timeout_ms: u64 },
}

impl DispatchOutcome {
	pub fn is_success(&self) -> bool {
		matches!(self, DispatchOutcome::Success { .. })
	}
}

/// Sends a signed request to the provider.
#[async_trait]
pub trait Dispatcher: Send + Sync {
	async fn dispatch(&self, request: OutboundRequest) -> DispatchOutcome;
}

/// [`Dispatcher`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpDispatcher {
	http_client: Client,
	timeout: Duration,
}

impl HttpDispatcher {
	pub fn new(timeout: Duration) -> Result<Self> {
		let http_client = nimbus_common_http::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| OciError::Config(format!("failed to create HTTP client: {e}")))?;

		Ok(Self {
			http_client,
			timeout,
		})
	}

	pub fn timeout(&self) -> Duration {
		self.timeout
	}

	fn timeout_outcome(&self) -> DispatchOutcome {
		DispatchOutcome::Timeout {
			timeout_ms: self.timeout.as_millis() as u64,
		}
	}
}

#[async_trait]
impl Dispatcher for HttpDispatcher {
	#[instrument(skip(self, request), fields(method = request.method.as_str(), url = %request.url))]
	async fn dispatch(&self, request: OutboundRequest) -> DispatchOutcome {
		let mut builder = self
			.http_client
			.request(request.method.into(), request.url.clone());
		// reqwest derives host and content-length from the URL and body; both
		// match what was signed.
		for (name, value) in request.headers.pairs() {
			if matches!(name, "host" | "content-length") {
				continue;
			}
			builder = builder.header(name, value);
		}

		let response = match builder.body(request.body).send().await {
			Ok(response) => response,
			Err(e) if e.is_timeout() => {
				warn!("Provider request timed out");
				return self.timeout_outcome();
			}
			Err(e) => {
				error!(error = %e, "Network error calling provider");
				return DispatchOutcome::NetworkError {
					message: e.to_string(),
				};
			}
		};

		let status = response.status();
		let text = match response.text().await {
			Ok(text) => text,
			Err(e) if e.is_timeout() => {
				warn!(status = status.as_u16(), "Provider response body timed out");
				return self.timeout_outcome();
			}
			Err(e) => {
				error!(error = %e, "Failed to read provider response body");
				return DispatchOutcome::NetworkError {
					message: e.to_string(),
				};
			}
		};

		if !status.is_success() {
			warn!(status = status.as_u16(), "Provider returned an error");
			return DispatchOutcome::ProviderError {
				status: status.as_u16(),
				body: text,
			};
		}

		info!(status = status.as_u16(), "Provider request succeeded");
		let body = if text.is_empty() {
			Value::Null
		} else {
			serde_json::from_str(&text).unwrap_or(Value::String(text))
		};

		DispatchOutcome::Success {
			status: status.as_u16(),
			body,
		}
	}
}

/// Signs and dispatches resolved requests for one provider account.
pub struct OciClient {
	base_url: Url,
	compartment_id: String,
	signer: RequestSigner,
	dispatcher: Arc<dyn Dispatcher>,
}

impl std::fmt::Debug for OciClient {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("OciClient")
			.field("base_url", &self.base_url.as_str())
			.field("compartment_id", &self.compartment_id)
			.field("signer", &self.signer)
			.finish_non_exhaustive()
	}
}

impl OciClient {
	/// Builds a client with an [`HttpDispatcher`] using the configured timeout.
	pub fn from_config(config: &OciClientConfig) -> Result<Self> {
		let dispatcher = HttpDispatcher::new(config.timeout())?;
		Self::with_dispatcher(
			config.base_url().clone(),
			config.compartment_id(),
			RequestSigner::new(
				config.identity().clone(),
				config.private_key(),
				host_of(config.base_url())?,
			)?,
			Arc::new(dispatcher),
		)
	}

	/// Builds a client around an arbitrary dispatcher.
	///
	/// No scheme check is applied to `base_url`; [`OciClientConfig`] is where
	/// https is enforced.
	pub fn with_dispatcher(
		base_url: Url,
		compartment_id: impl Into<String>,
		signer: RequestSigner,
		dispatcher: Arc<dyn Dispatcher>,
	) -> Result<Self> {
		if base_url.cannot_be_a_base() {
			return Err(OciError::Config(format!("invalid base URL '{base_url}'")));
		}

		Ok(Self {
			base_url,
			compartment_id: compartment_id.into(),
			signer,
			dispatcher,
		})
	}

	pub fn compartment_id(&self) -> &str {
		&self.compartment_id
	}

	/// Full URL for an endpoint path such as `/20160918/users`.
	pub fn url_for(&self, endpoint: &str) -> Result<Url> {
		let joined = format!("{}{}", self.base_url.as_str().trim_end_matches('/'), endpoint);
		Url::parse(&joined).map_err(|e| OciError::Config(format!("invalid endpoint URL: {e}")))
	}

	/// Transforms, signs and sends one request.
	///
	/// `Err` means the request never left the process (signing or URL
	/// failure); everything after that is a [`DispatchOutcome`].
	#[instrument(skip(self, request), fields(request_type = %request.request_type, endpoint = %request.endpoint))]
	pub async fn send(&self, request: &ResolvedRequest) -> Result<DispatchOutcome> {
		let payload = request.transform(&self.compartment_id);
		let body = serde_json::to_string(&payload)
			.map_err(|e| OciError::Validation(format!("payload is not serializable: {e}")))?;

		let url = self.url_for(&request.endpoint)?;
		let headers = self
			.signer
			.sign(request.method, url.path(), &body, Utc::now())?;

		Ok(self
			.dispatcher
			.dispatch(OutboundRequest {
				method: request.method,
				url,
				headers,
				body,
			})
			.await)
	}
}

/// `host[:port]` as it appears in the Host header.
pub fn host_of(url: &Url) -> Result<String> {
	let host = url
		.host_str()
		.ok_or_else(|| OciError::Config(format!("base URL '{url}' has no host")))?;
	Ok(match url.port() {
		Some(port) => format!("{host}:{port}"),
		None => host.to_string(),
	})
}

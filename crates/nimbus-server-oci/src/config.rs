// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Configuration for the OCI identity client.

use std::time::Duration;

use nimbus_common_config::SecretString;
use url::Url;

use crate::error::{OciError, Result};
use crate::signer::OciIdentity;

pub const DEFAULT_REGION: &str = "sa-saopaulo-1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Identity endpoint for a region.
pub fn default_base_url(region: &str) -> String {
	format!("https://identity.{region}.oraclecloud.com")
}

/// Configuration for [`OciClient`](crate::OciClient).
///
/// The private key is held as a [`SecretString`] and never shows up in
/// Debug output.
#[derive(Clone)]
pub struct OciClientConfig {
	identity: OciIdentity,
	private_key: SecretString,
	compartment_id: String,
	region: String,
	base_url: Url,
	timeout: Duration,
}

impl std::fmt::Debug for OciClientConfig {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("OciClientConfig")
			.field("identity", &self.identity)
			.field("private_key", &self.private_key)
			.field("compartment_id", &self.compartment_id)
			.field("region", &self.region)
			.field("base_url", &self.base_url.as_str())
			.field("timeout", &self.timeout)
			.finish()
	}
}

impl OciClientConfig {
	/// Validate a provider base URL.
	///
	/// Requirements:
	/// - Must be a valid URL
	/// - Must use HTTPS
	/// - Must have a host
	pub fn validate_base_url(raw: &str) -> Result<Url> {
		let url = Url::parse(raw)
			.map_err(|e| OciError::Config(format!("invalid OCI base URL '{raw}': {e}")))?;

		if url.scheme() != "https" {
			return Err(OciError::Config(format!(
				"OCI base URL must use https, got '{}'",
				url.scheme()
			)));
		}

		if url.host_str().is_none() {
			return Err(OciError::Config(
				"OCI base URL must include a host".to_string(),
			));
		}

		Ok(url)
	}

	/// Create a configuration for the default region.
	pub fn new(
		identity: OciIdentity,
		private_key: SecretString,
		compartment_id: impl Into<String>,
	) -> Result<Self> {
		Ok(Self {
			identity,
			private_key,
			compartment_id: compartment_id.into(),
			region: DEFAULT_REGION.to_string(),
			base_url: Self::validate_base_url(&default_base_url(DEFAULT_REGION))?,
			timeout: DEFAULT_TIMEOUT,
		})
	}

	/// Set the region and point the base URL at its identity endpoint.
	pub fn with_region(mut self, region: impl Into<String>) -> Result<Self> {
		let region = region.into();
		self.base_url = Self::validate_base_url(&default_base_url(&region))?;
		self.region = region;
		Ok(self)
	}

	/// Override the base URL. Must be https.
	pub fn with_base_url(mut self, url: &str) -> Result<Self> {
		self.base_url = Self::validate_base_url(url)?;
		Ok(self)
	}

	pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
		if timeout.is_zero() {
			return Err(OciError::Config("OCI timeout must be greater than zero".to_string()));
		}
		self.timeout = timeout;
		Ok(self)
	}

	pub fn identity(&self) -> &OciIdentity {
		&self.identity
	}

	pub(crate) fn private_key(&self) -> &SecretString {
		&self.private_key
	}

	pub fn compartment_id(&self) -> &str {
		&self.compartment_id
	}

	pub fn region(&self) -> &str {
		&self.region
	}

	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	pub fn timeout(&self) -> Duration {
		self.timeout
	}
}

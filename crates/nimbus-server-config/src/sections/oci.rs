// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! OCI identity provider configuration section.

use crate::error::ConfigError;
use nimbus_common_config::SecretString;
use serde::{Deserialize, Serialize};

const DEFAULT_REGION: &str = "sa-saopaulo-1";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration layer for the OCI client (all fields optional for layering).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OciConfigLayer {
	/// Identity endpoint. Derived from `region` when unset.
	pub base_url: Option<String>,
	pub region: Option<String>,
	pub tenancy_id: Option<String>,
	pub user_id: Option<String>,
	/// Fingerprint of the API signing key.
	pub fingerprint: Option<String>,
	pub compartment_id: Option<String>,
	/// PEM-encoded RSA private key used to sign requests.
	#[serde(skip_serializing)]
	pub private_key: Option<SecretString>,
	pub timeout_secs: Option<u64>,
}

impl OciConfigLayer {
	/// Merge with another layer, preferring values from `other`.
	pub fn merge(&mut self, other: OciConfigLayer) {
		if other.base_url.is_some() {
			self.base_url = other.base_url;
		}
		if other.region.is_some() {
			self.region = other.region;
		}
		if other.tenancy_id.is_some() {
			self.tenancy_id = other.tenancy_id;
		}
		if other.user_id.is_some() {
			self.user_id = other.user_id;
		}
		if other.fingerprint.is_some() {
			self.fingerprint = other.fingerprint;
		}
		if other.compartment_id.is_some() {
			self.compartment_id = other.compartment_id;
		}
		if other.private_key.is_some() {
			self.private_key = other.private_key;
		}
		if other.timeout_secs.is_some() {
			self.timeout_secs = other.timeout_secs;
		}
	}

	/// True when any identity field is set.
	///
	/// Region, base URL and timeout alone do not count; they have defaults.
	pub fn has_any_field(&self) -> bool {
		self.tenancy_id.is_some()
			|| self.user_id.is_some()
			|| self.fingerprint.is_some()
			|| self.compartment_id.is_some()
			|| self.private_key.is_some()
	}

	/// Build the final config, returning `None` if the section is unused.
	///
	/// A partially configured identity is an error naming the first missing
	/// field.
	pub fn build(self) -> Result<Option<OciConfig>, ConfigError> {
		if !self.has_any_field() {
			return Ok(None);
		}

		let tenancy_id = required(self.tenancy_id, "tenancy_id")?;
		let user_id = required(self.user_id, "user_id")?;
		let fingerprint = required(self.fingerprint, "fingerprint")?;
		let compartment_id = required(self.compartment_id, "compartment_id")?;

		let private_key = self.private_key.ok_or_else(|| {
			ConfigError::Validation("OCI private_key is required when OCI is configured".to_string())
		})?;
		if private_key.expose().trim().is_empty() {
			return Err(ConfigError::Validation(
				"OCI private_key cannot be empty".to_string(),
			));
		}

		let timeout_secs = self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
		if timeout_secs == 0 {
			return Err(ConfigError::InvalidValue {
				key: "oci.timeout_secs".to_string(),
				message: "must be greater than zero".to_string(),
			});
		}

		let region = self.region.unwrap_or_else(|| DEFAULT_REGION.to_string());
		let base_url = self
			.base_url
			.unwrap_or_else(|| format!("https://identity.{region}.oraclecloud.com"));
		Self::validate_base_url(&base_url)?;

		Ok(Some(OciConfig {
			base_url,
			region,
			tenancy_id,
			user_id,
			fingerprint,
			compartment_id,
			private_key,
			timeout_secs,
		}))
	}

	fn validate_base_url(url: &str) -> Result<(), ConfigError> {
		if !url.starts_with("https://") {
			return Err(ConfigError::Validation(format!(
				"OCI base_url must use HTTPS, got: {url}"
			)));
		}
		Ok(())
	}
}

fn required(value: Option<String>, field: &str) -> Result<String, ConfigError> {
	value.filter(|v| !v.trim().is_empty()).ok_or_else(|| {
		ConfigError::Validation(format!("OCI {field} is required when OCI is configured"))
	})
}

/// Validated OCI configuration.
#[derive(Debug, Clone)]
pub struct OciConfig {
	base_url: String,
	region: String,
	tenancy_id: String,
	user_id: String,
	fingerprint: String,
	compartment_id: String,
	private_key: SecretString,
	timeout_secs: u64,
}

impl OciConfig {
	pub fn base_url(&self) -> &str {
		&self.base_url
	}

	pub fn region(&self) -> &str {
		&self.region
	}

	pub fn tenancy_id(&self) -> &str {
		&self.tenancy_id
	}

	pub fn user_id(&self) -> &str {
		&self.user_id
	}

	pub fn fingerprint(&self) -> &str {
		&self.fingerprint
	}

	pub fn compartment_id(&self) -> &str {
		&self.compartment_id
	}

	pub fn private_key(&self) -> &SecretString {
		&self.private_key
	}

	pub fn timeout_secs(&self) -> u64 {
		self.timeout_secs
	}
}

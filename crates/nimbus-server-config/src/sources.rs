// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;

use nimbus_common_config::load_secret_env;
use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	AuditConfigLayer, DatabaseConfigLayer, LoggingConfigLayer, OciConfigLayer, QueueOverflowPolicy,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file configuration source.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/nimbus/server.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: NIMBUS_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ServerConfigLayer {
			database: Some(load_database_from_env()),
			oci: Some(load_oci_from_env()?),
			logging: Some(load_logging_from_env()),
			audit: Some(load_audit_from_env()?),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_parse<T: std::str::FromStr>(name: &str, kind: &str) -> Result<Option<T>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid {kind} value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn load_database_from_env() -> DatabaseConfigLayer {
	DatabaseConfigLayer {
		url: env_var("NIMBUS_DATABASE_URL"),
	}
}

fn load_oci_from_env() -> Result<OciConfigLayer, ConfigError> {
	Ok(OciConfigLayer {
		base_url: env_var("NIMBUS_OCI_BASE_URL"),
		region: env_var("NIMBUS_OCI_REGION"),
		tenancy_id: env_var("NIMBUS_OCI_TENANCY_ID"),
		user_id: env_var("NIMBUS_OCI_USER_ID"),
		fingerprint: env_var("NIMBUS_OCI_FINGERPRINT"),
		compartment_id: env_var("NIMBUS_OCI_COMPARTMENT_ID"),
		private_key: load_secret_env("NIMBUS_OCI_PRIVATE_KEY")
			.map_err(|e| ConfigError::Secret(e.to_string()))?,
		timeout_secs: env_parse("NIMBUS_OCI_TIMEOUT_SECS", "u64")?,
	})
}

fn load_logging_from_env() -> LoggingConfigLayer {
	LoggingConfigLayer {
		level: env_var("NIMBUS_LOG_LEVEL"),
	}
}

fn load_audit_from_env() -> Result<AuditConfigLayer, ConfigError> {
	let queue_overflow_policy = match env_var("NIMBUS_AUDIT_QUEUE_OVERFLOW_POLICY") {
		Some(v) => Some(v.parse::<QueueOverflowPolicy>().map_err(|message| {
			ConfigError::InvalidValue {
				key: "NIMBUS_AUDIT_QUEUE_OVERFLOW_POLICY".to_string(),
				message,
			}
		})?),
		None => None,
	};

	Ok(AuditConfigLayer {
		enabled: env_bool("NIMBUS_AUDIT_ENABLED"),
		queue_capacity: env_parse("NIMBUS_AUDIT_QUEUE_CAPACITY", "usize")?,
		queue_overflow_policy,
		min_severity: env_var("NIMBUS_AUDIT_MIN_SEVERITY"),
		sqlite_sink: env_bool("NIMBUS_AUDIT_SQLITE_SINK"),
		tracing_sink: env_bool("NIMBUS_AUDIT_TRACING_SINK"),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn test_precedence_ordering() {
		assert!(Precedence::Environment > Precedence::ConfigFile);
		assert!(Precedence::ConfigFile > Precedence::Defaults);
	}

	#[test]
	fn test_defaults_source_returns_empty_layer() {
		let layer = DefaultsSource.load().unwrap();
		assert!(layer.database.is_none());
		assert!(layer.oci.is_none());
	}

	#[test]
	fn test_toml_source_missing_file_returns_empty() {
		let layer = TomlSource::new("/nonexistent/server.toml").load().unwrap();
		assert!(layer.database.is_none());
	}

	#[test]
	fn test_toml_source_reads_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[database]\nurl = \"sqlite:/tmp/nimbus-test.db\"").unwrap();

		let layer = TomlSource::new(file.path()).load().unwrap();
		assert_eq!(
			layer.database.unwrap().url.as_deref(),
			Some("sqlite:/tmp/nimbus-test.db")
		);
	}

	#[test]
	fn test_toml_source_reports_parse_errors() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[database\nurl = ").unwrap();

		let err = TomlSource::new(file.path()).load().unwrap_err();
		assert!(matches!(err, ConfigError::TomlParse { .. }));
	}

	#[test]
	fn test_env_parse_rejects_garbage() {
		std::env::set_var("NIMBUS_TEST_SOURCES_BAD_U64", "thirty");
		let result: Result<Option<u64>, _> = env_parse("NIMBUS_TEST_SOURCES_BAD_U64", "u64");
		std::env::remove_var("NIMBUS_TEST_SOURCES_BAD_U64");
		assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
	}
}

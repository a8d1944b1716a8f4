// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration management for the Nimbus provisioning server.
//!
//! Layers are merged in precedence order: built-in defaults, then the TOML
//! file, then `NIMBUS_*` environment variables.
//!
//! # Usage
//!
//! ```ignore
//! use nimbus_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("database at {}", config.database.url);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub database: DatabaseConfig,
	/// `None` when no OCI identity is configured.
	pub oci: Option<OciConfig>,
	pub logging: LoggingConfig,
	pub audit: AuditConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`NIMBUS_*`)
/// 2. Config file (`/etc/nimbus/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let database = layer.database.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();
	let audit = layer.audit.unwrap_or_default().finalize();
	let oci = match layer.oci {
		Some(oci) => oci.build()?,
		None => None,
	};

	info!(
		database = %database.url,
		oci_configured = oci.is_some(),
		oci_region = oci.as_ref().map(|o| o.region()),
		audit_enabled = audit.enabled,
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		database,
		oci,
		logging,
		audit,
	})
}

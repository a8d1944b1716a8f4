// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Logging configuration section.

use serde::{Deserialize, Serialize};

fn default_level() -> String {
	"info".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfigLayer {
	pub level: Option<String>,
}

impl LoggingConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.level.is_some() {
			self.level = other.level;
		}
	}

	pub fn finalize(self) -> LoggingConfig {
		LoggingConfig {
			level: self.level.unwrap_or_else(default_level),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
	/// An `EnvFilter` directive string.
	pub level: String,
}

impl Default for LoggingConfig {
	fn default() -> Self {
		Self {
			level: default_level(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_layer_finalize_defaults() {
		let config = LoggingConfigLayer::default().finalize();
		assert_eq!(config.level, "info");
		assert_eq!(config, LoggingConfig::default());
	}

	#[test]
	fn test_merge_overwrites() {
		let mut base = LoggingConfigLayer {
			level: Some("info".to_string()),
		};
		base.merge(LoggingConfigLayer {
			level: Some("nimbus_server_oci=debug".to_string()),
		});
		assert_eq!(base.level.as_deref(), Some("nimbus_server_oci=debug"));

		base.merge(LoggingConfigLayer::default());
		assert_eq!(base.level.as_deref(), Some("nimbus_server_oci=debug"));
	}

	#[test]
	fn test_deserialize_layer_empty() {
		let layer: LoggingConfigLayer = toml::from_str("").unwrap();
		assert!(layer.level.is_none());
	}
}

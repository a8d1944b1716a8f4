// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP client builder with consistent User-Agent header.

use reqwest::{Client, ClientBuilder};

/// Creates a new HTTP client builder with the standard Nimbus User-Agent.
///
/// # Example
/// ```ignore
/// let client = nimbus_common_http::builder()
///     .timeout(Duration::from_secs(30))
///     .build()?;
/// ```
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Creates a new HTTP client builder with a custom User-Agent header.
pub fn builder_with_user_agent(user_agent: impl Into<String>) -> ClientBuilder {
	Client::builder().user_agent(user_agent.into())
}

/// Returns the standard Nimbus User-Agent string.
///
/// Format: `nimbus/{os}-{arch}/{version}`
pub fn user_agent() -> String {
	format!(
		"nimbus/{}-{}/{}",
		std::env::consts::OS,
		std::env::consts::ARCH,
		env!("CARGO_PKG_VERSION")
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn user_agent_has_correct_format() {
		let ua = user_agent();
		let parts: Vec<&str> = ua.split('/').collect();
		assert_eq!(parts.len(), 3);
		assert_eq!(parts[0], "nimbus");
		assert!(parts[1].contains('-'));
		assert_eq!(parts[2], env!("CARGO_PKG_VERSION"));
	}

	#[test]
	fn default_builder_builds() {
		assert!(builder().build().is_ok());
	}

	#[test]
	fn builder_with_custom_user_agent() {
		let client = builder_with_user_agent("nimbus-test/1.0").build();
		assert!(client.is_ok());
	}
}

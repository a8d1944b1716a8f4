// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Build information for nimbus-server.

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct VersionInfo {
	pub name: &'static str,
	pub version: &'static str,
	pub platform: String,
}

pub fn version_info() -> VersionInfo {
	VersionInfo {
		name: env!("CARGO_PKG_NAME"),
		version: env!("CARGO_PKG_VERSION"),
		platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
	}
}

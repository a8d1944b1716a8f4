// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

use crate::error::AuditError;
use crate::event::{AuditLogEntry, AuditSeverity};

/// Service-wide severity gate applied before events reach any sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditFilterConfig {
	pub min_severity: AuditSeverity,
}

impl Default for AuditFilterConfig {
	fn default() -> Self {
		Self {
			min_severity: AuditSeverity::Info,
		}
	}
}

impl AuditFilterConfig {
	/// Filter that passes everything at or above `min_severity`.
	pub fn with_min_severity(min_severity: &str) -> Result<Self, AuditError> {
		let min_severity = min_severity.parse().map_err(AuditError::ConfigError)?;
		Ok(Self { min_severity })
	}

	pub fn allows(&self, event: &AuditLogEntry) -> bool {
		event.severity >= self.min_severity
	}
}

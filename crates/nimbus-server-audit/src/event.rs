// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core event types for audit logging.
//!
//! - [`AuditEventType`]: every auditable provisioning event
//! - [`AuditSeverity`]: RFC 5424-compatible severity levels
//! - [`AuditLogEntry`]: one audit record
//! - [`AuditLogBuilder`]: fluent construction of entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

/// Types of events that can be recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
	// Request lifecycle
	RequestSubmitted,
	RequestCompleted,
	RequestFailed,
	RequestReprocessed,
	RequestCancelled,

	// Access control
	AccessDenied,

	// Template administration
	TemplateCreated,
	TemplateUpdated,
	TemplateDeactivated,

	// Company administration
	CompanyUpdated,
}

impl fmt::Display for AuditEventType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			AuditEventType::RequestSubmitted => "request_submitted",
			AuditEventType::RequestCompleted => "request_completed",
			AuditEventType::RequestFailed => "request_failed",
			AuditEventType::RequestReprocessed => "request_reprocessed",
			AuditEventType::RequestCancelled => "request_cancelled",
			AuditEventType::AccessDenied => "access_denied",
			AuditEventType::TemplateCreated => "template_created",
			AuditEventType::TemplateUpdated => "template_updated",
			AuditEventType::TemplateDeactivated => "template_deactivated",
			AuditEventType::CompanyUpdated => "company_updated",
		};
		write!(f, "{s}")
	}
}

impl AuditEventType {
	/// Returns the default severity for this event type.
	///
	/// - `Info`: normal operations
	/// - `Notice`: operator-driven state changes
	/// - `Warning`: denied access
	/// - `Error`: provider calls that failed
	pub fn default_severity(&self) -> AuditSeverity {
		match self {
			AuditEventType::RequestSubmitted
			| AuditEventType::RequestCompleted
			| AuditEventType::TemplateCreated
			| AuditEventType::TemplateUpdated => AuditSeverity::Info,

			AuditEventType::RequestReprocessed
			| AuditEventType::RequestCancelled
			| AuditEventType::TemplateDeactivated
			| AuditEventType::CompanyUpdated => AuditSeverity::Notice,

			AuditEventType::AccessDenied => AuditSeverity::Warning,

			AuditEventType::RequestFailed => AuditSeverity::Error,
		}
	}
}

/// Severity levels for audit events, compatible with RFC 5424 syslog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
	Debug = 7,
	#[default]
	Info = 6,
	Notice = 5,
	Warning = 4,
	Error = 3,
	Critical = 2,
}

impl AuditSeverity {
	/// Returns the RFC 5424 numeric severity code.
	pub fn as_syslog_code(&self) -> u8 {
		*self as u8
	}
}

impl PartialOrd for AuditSeverity {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for AuditSeverity {
	fn cmp(&self, other: &Self) -> Ordering {
		// Lower numeric value = higher severity (Critical=2 > Debug=7)
		(*other as u8).cmp(&(*self as u8))
	}
}

impl fmt::Display for AuditSeverity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			AuditSeverity::Debug => "debug",
			AuditSeverity::Info => "info",
			AuditSeverity::Notice => "notice",
			AuditSeverity::Warning => "warning",
			AuditSeverity::Error => "error",
			AuditSeverity::Critical => "critical",
		};
		write!(f, "{s}")
	}
}

impl std::str::FromStr for AuditSeverity {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"debug" => Ok(AuditSeverity::Debug),
			"info" => Ok(AuditSeverity::Info),
			"notice" => Ok(AuditSeverity::Notice),
			"warning" | "warn" => Ok(AuditSeverity::Warning),
			"error" => Ok(AuditSeverity::Error),
			"critical" => Ok(AuditSeverity::Critical),
			other => Err(format!("unknown audit severity '{other}'")),
		}
	}
}

/// An entry in the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
	pub id: Uuid,
	pub timestamp: DateTime<Utc>,
	pub event_type: AuditEventType,
	pub severity: AuditSeverity,

	/// The user who performed the action, if known.
	pub actor_user_id: Option<String>,

	/// The type of resource affected (`request`, `template`, `company`).
	pub resource_type: Option<String>,
	pub resource_id: Option<String>,

	/// Human-readable description of the action.
	pub action: String,
	/// Event-specific details.
	pub details: serde_json::Value,
}

impl AuditLogEntry {
	/// Create a new audit log builder for the given event type.
	pub fn builder(event_type: AuditEventType) -> AuditLogBuilder {
		AuditLogBuilder::new(event_type)
	}
}

/// Builder for constructing audit log entries with a fluent API.
#[derive(Debug, Clone)]
pub struct AuditLogBuilder {
	event_type: AuditEventType,
	severity: Option<AuditSeverity>,
	actor_user_id: Option<String>,
	resource_type: Option<String>,
	resource_id: Option<String>,
	action: Option<String>,
	details: serde_json::Value,
}

impl AuditLogBuilder {
	pub fn new(event_type: AuditEventType) -> Self {
		Self {
			event_type,
			severity: None,
			actor_user_id: None,
			resource_type: None,
			resource_id: None,
			action: None,
			details: serde_json::Value::Null,
		}
	}

	/// Set the severity level. Defaults to the event type's default severity.
	pub fn severity(mut self, severity: AuditSeverity) -> Self {
		self.severity = Some(severity);
		self
	}

	pub fn actor(mut self, user_id: impl Into<String>) -> Self {
		self.actor_user_id = Some(user_id.into());
		self
	}

	pub fn resource(
		mut self,
		resource_type: impl Into<String>,
		resource_id: impl Into<String>,
	) -> Self {
		self.resource_type = Some(resource_type.into());
		self.resource_id = Some(resource_id.into());
		self
	}

	pub fn action(mut self, action: impl Into<String>) -> Self {
		self.action = Some(action.into());
		self
	}

	pub fn details(mut self, details: serde_json::Value) -> Self {
		self.details = details;
		self
	}

	pub fn build(self) -> AuditLogEntry {
		AuditLogEntry {
			id: Uuid::new_v4(),
			timestamp: Utc::now(),
			event_type: self.event_type,
			severity: self
				.severity
				.unwrap_or_else(|| self.event_type.default_severity()),
			actor_user_id: self.actor_user_id,
			resource_type: self.resource_type,
			resource_id: self.resource_id,
			action: self.action.unwrap_or_else(|| self.event_type.to_string()),
			details: self.details,
		}
	}
}

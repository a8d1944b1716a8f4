// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use tracing::Level;

use super::{AuditSink, AuditSinkError};
use crate::event::{AuditLogEntry, AuditSeverity};

/// Emits every event as a `tracing` record on the `nimbus_audit` target.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl TracingAuditSink {
	pub fn new() -> Self {
		Self
	}
}

pub fn severity_to_level(severity: AuditSeverity) -> Level {
	match severity {
		AuditSeverity::Debug => Level::DEBUG,
		AuditSeverity::Info | AuditSeverity::Notice => Level::INFO,
		AuditSeverity::Warning => Level::WARN,
		AuditSeverity::Error | AuditSeverity::Critical => Level::ERROR,
	}
}

macro_rules! emit_audit_event {
	($macro:ident, $event:expr) => {{
		let event = $event;
		let details = if event.details.is_null() {
			None
		} else {
			Some(event.details.to_string())
		};
		tracing::$macro!(
			target: "nimbus_audit",
			event_type = %event.event_type,
			severity = %event.severity,
			id = %event.id,
			timestamp = %event.timestamp.to_rfc3339(),
			action = %event.action,
			actor_user_id = event.actor_user_id.as_deref(),
			resource_type = event.resource_type.as_deref(),
			resource_id = event.resource_id.as_deref(),
			details,
			"audit event"
		);
	}};
}

#[async_trait]
impl AuditSink for TracingAuditSink {
	fn name(&self) -> &str {
		"tracing"
	}

	async fn publish(&self, event: Arc<AuditLogEntry>) -> Result<(), AuditSinkError> {
		match severity_to_level(event.severity) {
			Level::DEBUG => emit_audit_event!(debug, &*event),
			Level::INFO => emit_audit_event!(info, &*event),
			Level::WARN => emit_audit_event!(warn, &*event),
			Level::ERROR => emit_audit_event!(error, &*event),
			Level::TRACE => emit_audit_event!(trace, &*event),
		}

		Ok(())
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use chrono::SecondsFormat;
use sqlx::SqlitePool;

use crate::error::AuditSinkError;
use crate::event::AuditLogEntry;
use crate::sink::AuditSink;

/// Writes events to the `audit_logs` table.
pub struct SqliteAuditSink {
	pool: SqlitePool,
}

impl SqliteAuditSink {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}
}

#[async_trait]
impl AuditSink for SqliteAuditSink {
	fn name(&self) -> &str {
		"sqlite"
	}

	async fn publish(&self, event: Arc<AuditLogEntry>) -> Result<(), AuditSinkError> {
		let details_json = serde_json::to_string(&event.details)
			.map_err(|e| AuditSinkError::Permanent(format!("failed to serialize details: {e}")))?;

		let now = chrono::Utc::now();

		sqlx::query(
			r#"
			INSERT INTO audit_logs (
				id, timestamp, event_type, severity, actor_user_id,
				resource_type, resource_id, action, details, created_at
			) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(event.id.to_string())
		.bind(event.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true))
		.bind(event.event_type.to_string())
		.bind(event.severity.to_string())
		.bind(&event.actor_user_id)
		.bind(&event.resource_type)
		.bind(&event.resource_id)
		.bind(&event.action)
		.bind(&details_json)
		.bind(now.to_rfc3339_opts(SecondsFormat::Micros, true))
		.execute(&self.pool)
		.await
		.map_err(|e| {
			if is_transient_error(&e) {
				AuditSinkError::Transient(format!("database error: {e}"))
			} else {
				AuditSinkError::Permanent(format!("database error: {e}"))
			}
		})?;

		Ok(())
	}
}

fn is_transient_error(e: &sqlx::Error) -> bool {
	match e {
		sqlx::Error::Io(_) => true,
		sqlx::Error::PoolTimedOut => true,
		sqlx::Error::PoolClosed => true,
		sqlx::Error::Database(db_err) => {
			let msg = db_err.message().to_lowercase();
			msg.contains("busy") || msg.contains("locked") || msg.contains("timeout")
		}
		_ => false,
	}
}

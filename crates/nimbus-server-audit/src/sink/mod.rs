// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;

pub use crate::error::AuditSinkError;
use crate::event::AuditLogEntry;

#[async_trait]
pub trait AuditSink: Send + Sync {
	/// Unique name for this sink (used in logs).
	fn name(&self) -> &str;

	/// Publish an event that already passed the service filter and redaction.
	async fn publish(&self, event: Arc<AuditLogEntry>) -> Result<(), AuditSinkError>;
}

#[cfg(feature = "sink-sqlite")]
pub mod sqlite;

#[cfg(feature = "sink-tracing")]
pub mod tracing;

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit trail for provisioning activity.
//!
//! Events go through a bounded queue, are filtered and scrubbed of key
//! material and signatures, then fanned out to every configured sink.

pub mod error;
pub mod event;
pub mod filter;
pub mod pipeline;
pub mod redaction;
pub mod sink;

pub use error::{AuditError, AuditResult, AuditSinkError};
pub use event::{AuditEventType, AuditLogBuilder, AuditLogEntry, AuditSeverity};
pub use filter::AuditFilterConfig;
pub use pipeline::AuditService;
pub use sink::AuditSink;

pub use nimbus_server_config::{AuditConfig, QueueOverflowPolicy};

#[cfg(feature = "sink-sqlite")]
pub use sink::sqlite::SqliteAuditSink;

#[cfg(feature = "sink-tracing")]
pub use sink::tracing::TracingAuditSink;

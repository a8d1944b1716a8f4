// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, instrument, warn};

#[cfg(feature = "sink-sqlite")]
use crate::error::{AuditError, AuditResult};
use crate::event::AuditLogEntry;
use crate::filter::AuditFilterConfig;
use crate::redaction::{redact_json_value, redact_optional_string, redact_string};
use crate::sink::AuditSink;
use nimbus_server_config::QueueOverflowPolicy;

/// Redacts secrets from every free-text field of an audit event.
fn redact_audit_event(event: &mut AuditLogEntry) {
	redact_json_value(&mut event.details);

	if let std::borrow::Cow::Owned(redacted) = redact_string(&event.action) {
		event.action = redacted;
	}

	redact_optional_string(&mut event.resource_id);
}

/// Asynchronous audit queue with fan-out to sinks.
///
/// Logging never blocks the caller and never fails the caller's operation;
/// sink failures are logged and dropped.
pub struct AuditService {
	tx: mpsc::Sender<AuditLogEntry>,
	overflow_policy: QueueOverflowPolicy,
	tracker: TaskTracker,
	worker: JoinHandle<()>,
}

impl AuditService {
	pub fn new(
		global_filter: AuditFilterConfig,
		queue_capacity: usize,
		overflow_policy: QueueOverflowPolicy,
		sinks: Vec<Arc<dyn AuditSink>>,
	) -> Self {
		let (tx, rx) = mpsc::channel(queue_capacity.max(1));
		let tracker = TaskTracker::new();

		let worker = tokio::spawn(Self::background_task(
			rx,
			global_filter,
			sinks,
			tracker.clone(),
		));

		Self {
			tx,
			overflow_policy,
			tracker,
			worker,
		}
	}

	/// Builds the service and its sinks from resolved configuration.
	///
	/// A disabled audit config yields a service with no sinks, so callers can
	/// log unconditionally.
	#[cfg(feature = "sink-sqlite")]
	pub fn from_config(
		config: &nimbus_server_config::AuditConfig,
		pool: Option<sqlx::SqlitePool>,
	) -> AuditResult<Self> {
		let filter = AuditFilterConfig::with_min_severity(&config.min_severity)?;
		let mut sinks: Vec<Arc<dyn AuditSink>> = Vec::new();

		if config.enabled {
			if config.sqlite_sink {
				let pool = pool.ok_or_else(|| {
					AuditError::ConfigError("sqlite audit sink requires a database pool".to_string())
				})?;
				sinks.push(Arc::new(crate::sink::sqlite::SqliteAuditSink::new(pool)));
			}
			#[cfg(feature = "sink-tracing")]
			if config.tracing_sink {
				sinks.push(Arc::new(crate::sink::tracing::TracingAuditSink::new()));
			}
		}

		debug!(
			enabled = config.enabled,
			sinks = sinks.len(),
			capacity = config.queue_capacity,
			"audit service configured"
		);

		Ok(Self::new(
			filter,
			config.queue_capacity,
			config.queue_overflow_policy,
			sinks,
		))
	}

	async fn background_task(
		mut rx: mpsc::Receiver<AuditLogEntry>,
		global_filter: AuditFilterConfig,
		sinks: Vec<Arc<dyn AuditSink>>,
		tracker: TaskTracker,
	) {
		while let Some(mut entry) = rx.recv().await {
			if !global_filter.allows(&entry) {
				continue;
			}

			redact_audit_event(&mut entry);

			let event = Arc::new(entry);

			for sink in &sinks {
				let sink = Arc::clone(sink);
				let event = Arc::clone(&event);

				tracker.spawn(async move {
					if let Err(e) = sink.publish(event).await {
						warn!(sink = sink.name(), error = %e, "audit sink publish failed");
					}
				});
			}
		}
	}

	/// Log an audit event to the queue for processing.
	///
	/// Returns `true` if the event was queued, `false` if dropped.
	///
	/// - `Block`: sends from a spawned task, so the caller still never waits
	/// - `DropNewest`: drops the new event when the queue is full
	#[instrument(skip(self, entry), fields(event_type = %entry.event_type))]
	pub fn log(&self, entry: AuditLogEntry) -> bool {
		match self.overflow_policy {
			QueueOverflowPolicy::Block => {
				let tx = self.tx.clone();
				self.tracker.spawn(async move {
					if tx.send(entry).await.is_err() {
						debug!("audit worker stopped, event dropped");
					}
				});
				true
			}
			QueueOverflowPolicy::DropNewest => {
				let queued = self.tx.try_send(entry).is_ok();
				if !queued {
					debug!("audit queue full, event dropped");
				}
				queued
			}
		}
	}

	/// Stops accepting events and waits until every queued event has been
	/// handed to its sinks and every publish has finished.
	pub async fn shutdown(self) {
		let Self {
			tx,
			tracker,
			worker,
			..
		} = self;

		// The worker exits once every sender is gone, including the clones
		// held by pending `Block` sends.
		drop(tx);
		if let Err(e) = worker.await {
			warn!(error = %e, "audit worker terminated abnormally");
		}

		tracker.close();
		tracker.wait().await;
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit logging configuration section.

use serde::{Deserialize, Serialize};

const DEFAULT_QUEUE_CAPACITY: usize = 10000;

/// What the audit queue does with a new event when it is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueueOverflowPolicy {
	/// Discard the new event.
	#[default]
	DropNewest,
	/// Wait for capacity in a background task; nothing is discarded.
	Block,
}

impl std::str::FromStr for QueueOverflowPolicy {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"drop_newest" => Ok(QueueOverflowPolicy::DropNewest),
			"block" => Ok(QueueOverflowPolicy::Block),
			other => Err(format!("unknown queue overflow policy '{other}'")),
		}
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuditConfigLayer {
	pub enabled: Option<bool>,
	pub queue_capacity: Option<usize>,
	pub queue_overflow_policy: Option<QueueOverflowPolicy>,
	pub min_severity: Option<String>,
	pub sqlite_sink: Option<bool>,
	pub tracing_sink: Option<bool>,
}

impl AuditConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.enabled.is_some() {
			self.enabled = other.enabled;
		}
		if other.queue_capacity.is_some() {
			self.queue_capacity = other.queue_capacity;
		}
		if other.queue_overflow_policy.is_some() {
			self.queue_overflow_policy = other.queue_overflow_policy;
		}
		if other.min_severity.is_some() {
			self.min_severity = other.min_severity;
		}
		if other.sqlite_sink.is_some() {
			self.sqlite_sink = other.sqlite_sink;
		}
		if other.tracing_sink.is_some() {
			self.tracing_sink = other.tracing_sink;
		}
	}

	pub fn finalize(self) -> AuditConfig {
		AuditConfig {
			enabled: self.enabled.unwrap_or(true),
			queue_capacity: self
				.queue_capacity
				.filter(|c| *c > 0)
				.unwrap_or(DEFAULT_QUEUE_CAPACITY),
			queue_overflow_policy: self.queue_overflow_policy.unwrap_or_default(),
			min_severity: self.min_severity.unwrap_or_else(|| "info".to_string()),
			sqlite_sink: self.sqlite_sink.unwrap_or(true),
			tracing_sink: self.tracing_sink.unwrap_or(true),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditConfig {
	pub enabled: bool,
	pub queue_capacity: usize,
	pub queue_overflow_policy: QueueOverflowPolicy,
	pub min_severity: String,
	/// Persist events to the `audit_logs` table.
	pub sqlite_sink: bool,
	/// Emit events as `tracing` records.
	pub tracing_sink: bool,
}

impl Default for AuditConfig {
	fn default() -> Self {
		AuditConfigLayer::default().finalize()
	}
}

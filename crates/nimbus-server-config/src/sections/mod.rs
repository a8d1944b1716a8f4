// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections for nimbus-server.

pub mod audit;
pub mod database;
pub mod logging;
pub mod oci;

pub use audit::{AuditConfig, AuditConfigLayer, QueueOverflowPolicy};
pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use logging::{LoggingConfig, LoggingConfigLayer};
pub use oci::{OciConfig, OciConfigLayer};

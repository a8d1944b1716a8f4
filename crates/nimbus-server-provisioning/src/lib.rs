// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Provisioning request lifecycle for Nimbus.
//!
//! A request is stored as `pending`, dispatched once to the OCI identity API
//! on a background task, and finishes as `completed` or `error`. Failed
//! requests can be reprocessed; pending requests can be cancelled until their
//! dispatch starts. Every status change is a conditional update, so a late
//! dispatch result never overwrites a cancellation.

mod actor;
mod authz;
mod error;
mod pipeline;
mod service;
mod types;

pub use actor::{Actor, Role};
pub use authz::{AuthorizationOracle, RoleAuthorizer};
pub use error::{ProvisioningError, Result};
pub use service::ProvisioningService;
pub use types::{
	CompanyInput, ListRequests, RequestPage, RequestView, SubmitAck, SubmitRequest, TemplateInput,
	TemplateSummary,
};

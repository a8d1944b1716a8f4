// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite persistence for the Nimbus provisioning server.
//!
//! Each table has a `*Repository` over a [`sqlx::SqlitePool`] and a matching
//! `*Store` trait so services can be tested against substitutes.

pub mod company;
mod error;
pub mod migrations;
pub mod pool;
pub mod request;
pub mod template;
mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use company::{Company, CompanyRepository, CompanyStore};
pub use error::{DbError, Result};
pub use migrations::run_migrations;
pub use pool::create_pool;
pub use request::{
	ProvisioningRequest, RequestFilter, RequestRepository, RequestStatus, RequestStore,
	DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
pub use template::{Template, TemplateRepository, TemplateStore};

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization decisions for provisioning requests.

use std::sync::Arc;

use async_trait::async_trait;
use nimbus_server_db::{CompanyStore, ProvisioningRequest};

use crate::actor::{Actor, Role};
use crate::error::Result;

/// Answers the two questions the lifecycle needs before acting.
#[async_trait]
pub trait AuthorizationOracle: Send + Sync {
	/// Whether `actor` may read or act on `request`.
	fn is_owner_or_authorized(&self, actor: &Actor, request: &ProvisioningRequest) -> bool;

	/// Whether `company_id` may submit requests. Unknown companies are inactive.
	async fn is_company_active(&self, company_id: &str) -> Result<bool>;
}

/// Role-based rules backed by the company table.
///
/// - admins may act on any request
/// - managers may act on requests owned by their company
/// - everyone may act on their own requests
#[derive(Clone)]
pub struct RoleAuthorizer {
	companies: Arc<dyn CompanyStore>,
}

impl RoleAuthorizer {
	pub fn new(companies: Arc<dyn CompanyStore>) -> Self {
		Self { companies }
	}
}

#[async_trait]
impl AuthorizationOracle for RoleAuthorizer {
	fn is_owner_or_authorized(&self, actor: &Actor, request: &ProvisioningRequest) -> bool {
		match actor.role {
			Role::Admin => true,
			Role::Manager if request.owner_company_id == actor.company_id => true,
			_ => request.owner_user_id == actor.user_id,
		}
	}

	#[tracing::instrument(skip(self))]
	async fn is_company_active(&self, company_id: &str) -> Result<bool> {
		Ok(self
			.companies
			.get_company(company_id)
			.await?
			.is_some_and(|company| company.active))
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use nimbus_common_template::validate_body;
use nimbus_server_audit::{AuditEventType, AuditLogBuilder, AuditLogEntry, AuditService};
use nimbus_server_db::{
	Company, CompanyRepository, CompanyStore, DbError, ProvisioningRequest, RequestFilter,
	RequestRepository, RequestStatus, RequestStore, Template, TemplateRepository, TemplateStore,
};
use nimbus_server_oci::{OciClient, DEFAULT_TIMEOUT};
use serde_json::{json, Value};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::actor::{Actor, Role};
use crate::authz::{AuthorizationOracle, RoleAuthorizer};
use crate::error::{ProvisioningError, Result};
use crate::pipeline::{failure_result, prepare, Pipeline};
use crate::types::{
	CompanyInput, ListRequests, RequestPage, RequestView, SubmitAck, SubmitRequest, TemplateInput,
	TemplateSummary,
};

const REQUEST_RESOURCE: &str = "provisioning_request";
const TEMPLATE_RESOURCE: &str = "template";
const COMPANY_RESOURCE: &str = "company";

/// Entry point for submitting and managing provisioning requests.
///
/// Submission returns as soon as the pending record is stored; dispatch runs
/// on a task tracked by the service. Call [`drain`](Self::drain) before
/// shutting down to let in-flight dispatches finish.
#[derive(Clone)]
pub struct ProvisioningService {
	templates: Arc<dyn TemplateStore>,
	requests: Arc<dyn RequestStore>,
	companies: Arc<dyn CompanyStore>,
	authz: Arc<dyn AuthorizationOracle>,
	audit: Arc<AuditService>,
	client: Option<Arc<OciClient>>,
	dispatch_timeout: Duration,
	tracker: TaskTracker,
}

impl ProvisioningService {
	pub fn new(
		templates: Arc<dyn TemplateStore>,
		requests: Arc<dyn RequestStore>,
		companies: Arc<dyn CompanyStore>,
		authz: Arc<dyn AuthorizationOracle>,
		audit: Arc<AuditService>,
	) -> Self {
		Self {
			templates,
			requests,
			companies,
			authz,
			audit,
			client: None,
			dispatch_timeout: DEFAULT_TIMEOUT,
			tracker: TaskTracker::new(),
		}
	}

	/// SQLite-backed service with role-based authorization.
	pub fn from_pool(pool: sqlx::SqlitePool, audit: Arc<AuditService>) -> Self {
		let companies: Arc<dyn CompanyStore> = Arc::new(CompanyRepository::new(pool.clone()));
		Self::new(
			Arc::new(TemplateRepository::new(pool.clone())),
			Arc::new(RequestRepository::new(pool)),
			Arc::clone(&companies),
			Arc::new(RoleAuthorizer::new(Arc::clone(&companies))),
			audit,
		)
	}

	/// Enables dispatch. Without a client, submit and reprocess are refused.
	///
	/// `dispatch_timeout` bounds each provider call, including signing.
	pub fn with_client(mut self, client: Arc<OciClient>, dispatch_timeout: Duration) -> Self {
		self.client = Some(client);
		self.dispatch_timeout = dispatch_timeout;
		self
	}

	/// Waits for every in-flight dispatch to finish.
	pub async fn drain(&self) {
		self.tracker.close();
		self.tracker.wait().await;
		self.tracker.reopen();
	}

	fn pipeline(&self) -> Result<Pipeline> {
		let client = self.client.clone().ok_or_else(|| {
			ProvisioningError::Config("OCI identity is not configured".to_string())
		})?;

		Ok(Pipeline {
			requests: Arc::clone(&self.requests),
			client,
			audit: Arc::clone(&self.audit),
			dispatch_timeout: self.dispatch_timeout,
		})
	}

	fn spawn(&self, pipeline: Pipeline, id: Uuid) {
		self.tracker.spawn(async move { pipeline.run(id).await });
	}

	fn record(&self, entry: AuditLogBuilder) {
		if !self.audit.log(entry.build()) {
			debug!("Audit event dropped");
		}
	}

	fn deny(
		&self,
		actor: &Actor,
		resource_type: &str,
		resource_id: &str,
		action: &str,
	) -> ProvisioningError {
		warn!(
			user_id = %actor.user_id,
			role = %actor.role,
			resource_type,
			resource_id,
			action,
			"Access denied"
		);
		self.record(
			AuditLogEntry::builder(AuditEventType::AccessDenied)
				.actor(actor.user_id.clone())
				.resource(resource_type, resource_id)
				.action(action)
				.details(json!({ "company_id": actor.company_id, "role": actor.role })),
		);
		ProvisioningError::Authorization(format!(
			"user {} may not {action} {resource_type} {resource_id}",
			actor.user_id
		))
	}

	fn require_admin(
		&self,
		actor: &Actor,
		resource_type: &str,
		resource_id: &str,
		action: &str,
	) -> Result<()> {
		if actor.is_admin() {
			return Ok(());
		}
		Err(self.deny(actor, resource_type, resource_id, action))
	}

	async fn load_authorized(
		&self,
		id: Uuid,
		actor: &Actor,
		action: &str,
	) -> Result<ProvisioningRequest> {
		let request = self
			.requests
			.get_request(id)
			.await?
			.ok_or_else(|| ProvisioningError::NotFound(format!("request {id}")))?;

		if !self.authz.is_owner_or_authorized(actor, &request) {
			return Err(self.deny(actor, REQUEST_RESOURCE, &id.to_string(), action));
		}

		Ok(request)
	}

	async fn current_status(&self, id: Uuid) -> Result<RequestStatus> {
		self.requests
			.get_request(id)
			.await?
			.map(|request| request.status)
			.ok_or_else(|| ProvisioningError::NotFound(format!("request {id}")))
	}

	/// Validates a submission, stores it as pending and starts dispatch.
	///
	/// Every validation, authorization and template error is returned here,
	/// before any record exists. Dispatch failures are only visible through
	/// [`get_status`](Self::get_status).
	#[instrument(
		skip(self, submission, actor),
		fields(request_type = %submission.request_type, template_id = ?submission.template_id, user_id = %actor.user_id)
	)]
	pub async fn submit(&self, submission: SubmitRequest, actor: &Actor) -> Result<SubmitAck> {
		if !self.authz.is_company_active(&actor.company_id).await? {
			return Err(self.deny(
				actor,
				COMPANY_RESOURCE,
				&actor.company_id,
				"submit requests for",
			));
		}

		let pipeline = self.pipeline()?;
		let resolved = prepare(
			self.templates.as_ref(),
			&submission.request_type,
			submission.template_id,
			&submission.parameters,
		)
		.await?;

		let now = Utc::now();
		let request = ProvisioningRequest {
			id: Uuid::new_v4(),
			template_id: submission.template_id,
			request_type: resolved.request_type.as_str().to_string(),
			owner_user_id: actor.user_id.clone(),
			owner_company_id: actor.company_id.clone(),
			parameters: submission.parameters,
			payload: Value::Object(resolved.data().clone()),
			status: RequestStatus::Pending,
			result: None,
			attempts: 0,
			dispatch_started_at: None,
			created_at: now,
			updated_at: now,
		};
		self.requests.create_request(&request).await?;

		info!(request_id = %request.id, "Request submitted");
		self.record(
			AuditLogEntry::builder(AuditEventType::RequestSubmitted)
				.actor(actor.user_id.clone())
				.resource(REQUEST_RESOURCE, request.id.to_string())
				.action(format!("submit {}", request.request_type))
				.details(json!({
					"template_id": request.template_id,
					"company_id": request.owner_company_id,
				})),
		);

		self.spawn(pipeline, request.id);
		Ok(SubmitAck {
			request_id: request.id,
		})
	}

	#[instrument(skip(self, actor), fields(request_id = %id, user_id = %actor.user_id))]
	pub async fn get_status(&self, id: Uuid, actor: &Actor) -> Result<RequestView> {
		Ok(self.load_authorized(id, actor, "read").await?.into())
	}

	/// Moves a failed request back to pending and dispatches it again.
	///
	/// The payload is rebuilt from the current template and validated first;
	/// if that fails the request stays in `error` and the validation error is
	/// returned.
	#[instrument(skip(self, actor), fields(request_id = %id, user_id = %actor.user_id))]
	pub async fn reprocess(&self, id: Uuid, actor: &Actor) -> Result<()> {
		let request = self.load_authorized(id, actor, "reprocess").await?;
		if request.status != RequestStatus::Error {
			return Err(ProvisioningError::illegal_transition("reprocess", id, request.status));
		}

		let pipeline = self.pipeline()?;
		let resolved = prepare(
			self.templates.as_ref(),
			&request.request_type,
			request.template_id,
			&request.parameters,
		)
		.await?;

		let payload = Value::Object(resolved.data().clone());
		if !self.requests.requeue(id, &payload).await? {
			let current = self.current_status(id).await?;
			return Err(ProvisioningError::illegal_transition("reprocess", id, current));
		}

		info!(attempts = request.attempts, "Request reprocessed");
		self.record(
			AuditLogEntry::builder(AuditEventType::RequestReprocessed)
				.actor(actor.user_id.clone())
				.resource(REQUEST_RESOURCE, id.to_string())
				.action(format!("reprocess {}", request.request_type))
				.details(json!({ "previous_attempts": request.attempts })),
		);

		self.spawn(pipeline, id);
		Ok(())
	}

	/// Cancels a request that has not started dispatching.
	#[instrument(skip(self, actor), fields(request_id = %id, user_id = %actor.user_id))]
	pub async fn cancel(&self, id: Uuid, actor: &Actor) -> Result<()> {
		let request = self.load_authorized(id, actor, "cancel").await?;
		if request.status != RequestStatus::Pending {
			return Err(ProvisioningError::illegal_transition("cancel", id, request.status));
		}

		if !self.requests.cancel_if_undispatched(id).await? {
			let current = self.current_status(id).await?;
			if current == RequestStatus::Pending {
				return Err(ProvisioningError::Conflict(format!(
					"cannot cancel request {id}: dispatch already started"
				)));
			}
			return Err(ProvisioningError::illegal_transition("cancel", id, current));
		}

		info!("Request cancelled");
		self.record(
			AuditLogEntry::builder(AuditEventType::RequestCancelled)
				.actor(actor.user_id.clone())
				.resource(REQUEST_RESOURCE, id.to_string())
				.action(format!("cancel {}", request.request_type)),
		);
		Ok(())
	}

	/// Fails pending requests whose dispatch was claimed more than twice the
	/// dispatch timeout ago without recording an outcome.
	///
	/// Such rows are left behind when the process dies mid-dispatch. Once in
	/// `error` they can be reprocessed.
	#[instrument(skip(self))]
	pub async fn recover_stale_dispatches(&self) -> Result<Vec<Uuid>> {
		let grace = chrono::Duration::from_std(self.dispatch_timeout * 2)
			.map_err(|e| ProvisioningError::Config(format!("invalid dispatch timeout: {e}")))?;
		let result = failure_result(&ProvisioningError::DispatchInterrupted);
		let recovered = self
			.requests
			.fail_stale_dispatches(Utc::now() - grace, &result)
			.await?;

		for id in &recovered {
			warn!(request_id = %id, "Stale dispatch claim failed");
			self.record(
				AuditLogEntry::builder(AuditEventType::RequestFailed)
					.resource(REQUEST_RESOURCE, id.to_string())
					.action("recover interrupted dispatch")
					.details(json!({ "result": result })),
			);
		}
		Ok(recovered)
	}

	/// Lists requests visible to `actor`, newest first.
	#[instrument(skip(self, actor), fields(user_id = %actor.user_id, role = %actor.role))]
	pub async fn list_requests(&self, options: ListRequests, actor: &Actor) -> Result<RequestPage> {
		let mut filter = RequestFilter {
			status: options.status,
			limit: options.limit,
			offset: options.offset,
			..Default::default()
		};
		match actor.role {
			Role::Admin => {}
			Role::Manager => filter.owner_company_id = Some(actor.company_id.clone()),
			Role::Member => filter.owner_user_id = Some(actor.user_id.clone()),
		}

		let (items, total) = self.requests.list_requests(&filter).await?;
		Ok(RequestPage {
			items: items.into_iter().map(RequestView::from).collect(),
			total,
			limit: filter.effective_limit(),
			offset: filter.offset,
		})
	}

	#[instrument(skip(self))]
	pub async fn list_templates(&self) -> Result<Vec<TemplateSummary>> {
		Ok(self
			.templates
			.list_active_templates()
			.await?
			.into_iter()
			.map(TemplateSummary::from)
			.collect())
	}

	#[instrument(skip(self), fields(template_id = %id))]
	pub async fn get_template(&self, id: Uuid) -> Result<Template> {
		self.templates
			.get_template(id)
			.await?
			.ok_or(ProvisioningError::TemplateNotFound(id))
	}

	/// Creates or replaces a template. Admin only.
	#[instrument(skip(self, input, actor), fields(template_id = ?input.id, user_id = %actor.user_id))]
	pub async fn upsert_template(&self, input: TemplateInput, actor: &Actor) -> Result<Template> {
		let resource_id = input.id.map(|id| id.to_string()).unwrap_or_default();
		self.require_admin(actor, TEMPLATE_RESOURCE, &resource_id, "modify")?;

		if input.name.trim().is_empty() {
			return Err(ProvisioningError::Validation("template name is required".to_string()));
		}
		validate_body(&input.body).map_err(|e| ProvisioningError::Validation(e.to_string()))?;

		let existing = match input.id {
			Some(id) => self.templates.get_template(id).await?,
			None => None,
		};
		let id = input.id.unwrap_or_else(Uuid::new_v4);

		let active = input
			.active
			.unwrap_or_else(|| existing.as_ref().map_or(true, |t| t.active));
		if !active && self.requests.count_pending_for_template(id).await? > 0 {
			return Err(ProvisioningError::Conflict(format!(
				"template {id} has pending requests"
			)));
		}

		let now = Utc::now();
		let template = Template {
			id,
			name: input.name,
			description: input.description,
			body: input.body,
			active,
			created_at: existing.as_ref().map_or(now, |t| t.created_at),
			updated_at: now,
		};
		self.templates.upsert_template(&template).await?;

		let event = if existing.is_some() {
			AuditEventType::TemplateUpdated
		} else {
			AuditEventType::TemplateCreated
		};
		info!(template_id = %id, %event, "Template saved");
		self.record(
			AuditLogEntry::builder(event)
				.actor(actor.user_id.clone())
				.resource(TEMPLATE_RESOURCE, id.to_string())
				.action(format!("save template {}", template.name))
				.details(json!({ "active": template.active })),
		);

		Ok(template)
	}

	/// Soft-deletes a template. Admin only; refused while requests are pending.
	#[instrument(skip(self, actor), fields(template_id = %id, user_id = %actor.user_id))]
	pub async fn deactivate_template(&self, id: Uuid, actor: &Actor) -> Result<()> {
		self.require_admin(actor, TEMPLATE_RESOURCE, &id.to_string(), "deactivate")?;

		self.templates
			.deactivate_template(id)
			.await
			.map_err(|e| match e {
				DbError::NotFound(_) => ProvisioningError::TemplateNotFound(id),
				other => other.into(),
			})?;

		info!("Template deactivated");
		self.record(
			AuditLogEntry::builder(AuditEventType::TemplateDeactivated)
				.actor(actor.user_id.clone())
				.resource(TEMPLATE_RESOURCE, id.to_string())
				.action("deactivate template"),
		);
		Ok(())
	}

	/// Registers a company or changes its name and active flag. Admin only.
	#[instrument(skip(self, input, actor), fields(company_id = %input.id, active = input.active))]
	pub async fn put_company(&self, input: CompanyInput, actor: &Actor) -> Result<Company> {
		self.require_admin(actor, COMPANY_RESOURCE, &input.id, "modify")?;

		if input.id.trim().is_empty() || input.name.trim().is_empty() {
			return Err(ProvisioningError::Validation(
				"company id and name are required".to_string(),
			));
		}

		let now = Utc::now();
		let created_at = self
			.companies
			.get_company(&input.id)
			.await?
			.map_or(now, |c| c.created_at);
		let company = Company {
			id: input.id,
			name: input.name,
			active: input.active,
			created_at,
			updated_at: now,
		};
		self.companies.upsert_company(&company).await?;

		self.record(
			AuditLogEntry::builder(AuditEventType::CompanyUpdated)
				.actor(actor.user_id.clone())
				.resource(COMPANY_RESOURCE, company.id.clone())
				.action("put company")
				.details(json!({ "active": company.active })),
		);
		Ok(company)
	}
}

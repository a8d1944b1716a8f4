// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Provisioning requests and their lifecycle state.
//!
//! Every status change is a conditional `UPDATE ... WHERE status = ?`; the
//! returned `bool` says whether the row was in the expected state. Callers
//! use that to detect lost races instead of overwriting each other.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{DbError, Result};
use crate::types::{format_ts, parse_opt_ts, parse_ts, parse_uuid};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
	Pending,
	Completed,
	Error,
	Cancelled,
}

impl RequestStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			RequestStatus::Pending => "pending",
			RequestStatus::Completed => "completed",
			RequestStatus::Error => "error",
			RequestStatus::Cancelled => "cancelled",
		}
	}

	pub fn is_terminal(&self) -> bool {
		matches!(self, RequestStatus::Completed | RequestStatus::Cancelled)
	}
}

impl std::fmt::Display for RequestStatus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

impl std::str::FromStr for RequestStatus {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"pending" => Ok(RequestStatus::Pending),
			"completed" => Ok(RequestStatus::Completed),
			"error" => Ok(RequestStatus::Error),
			"cancelled" => Ok(RequestStatus::Cancelled),
			_ => Err(format!("unknown request status: {s}")),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisioningRequest {
	pub id: Uuid,
	pub template_id: Option<Uuid>,
	pub request_type: String,
	pub owner_user_id: String,
	pub owner_company_id: String,
	/// Caller parameters, always a JSON object.
	pub parameters: serde_json::Value,
	/// Request data fixed when the request entered `pending`: the substituted
	/// template body, or the parameters for type-only requests. Dispatch sends
	/// exactly this.
	pub payload: serde_json::Value,
	pub status: RequestStatus,
	/// Set only once the request has left `pending`.
	pub result: Option<serde_json::Value>,
	pub attempts: u32,
	pub dispatch_started_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFilter {
	pub owner_user_id: Option<String>,
	pub owner_company_id: Option<String>,
	pub status: Option<RequestStatus>,
	pub limit: u32,
	pub offset: u32,
}

impl RequestFilter {
	/// Page size clamped to `1..=MAX_PAGE_SIZE`; zero means the default.
	pub fn effective_limit(&self) -> u32 {
		match self.limit {
			0 => DEFAULT_PAGE_SIZE,
			n => n.min(MAX_PAGE_SIZE),
		}
	}
}

type RequestRow = (
	String,
	Option<String>,
	String,
	String,
	String,
	String,
	String,
	String,
	Option<String>,
	i64,
	Option<String>,
	String,
	String,
);

const SELECT_REQUEST: &str = r#"
	SELECT id, template_id, request_type, owner_user_id, owner_company_id, parameters, payload,
		status, result, attempts, dispatch_started_at, created_at, updated_at
	FROM requests
"#;

fn request_from_row(row: RequestRow) -> Result<ProvisioningRequest> {
	let (
		id,
		template_id,
		request_type,
		owner_user_id,
		owner_company_id,
		parameters,
		payload,
		status,
		result,
		attempts,
		dispatch_started_at,
		created_at,
		updated_at,
	) = row;

	Ok(ProvisioningRequest {
		id: parse_uuid(&id)?,
		template_id: template_id.as_deref().map(parse_uuid).transpose()?,
		request_type,
		owner_user_id,
		owner_company_id,
		parameters: serde_json::from_str(&parameters)?,
		payload: serde_json::from_str(&payload)?,
		status: status.parse().map_err(DbError::Internal)?,
		result: result.as_deref().map(serde_json::from_str).transpose()?,
		attempts: attempts.max(0) as u32,
		dispatch_started_at: parse_opt_ts(dispatch_started_at)?,
		created_at: parse_ts(&created_at)?,
		updated_at: parse_ts(&updated_at)?,
	})
}

#[derive(Clone)]
pub struct RequestRepository {
	pool: SqlitePool,
}

impl RequestRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, request), fields(request_id = %request.id, request_type = %request.request_type))]
	pub async fn create_request(&self, request: &ProvisioningRequest) -> Result<()> {
		let parameters = serde_json::to_string(&request.parameters)?;
		let payload = serde_json::to_string(&request.payload)?;
		let result = request
			.result
			.as_ref()
			.map(serde_json::to_string)
			.transpose()?;

		sqlx::query(
			r#"
			INSERT INTO requests (
				id, template_id, request_type, owner_user_id, owner_company_id, parameters, payload,
				status, result, attempts, dispatch_started_at, created_at, updated_at
			) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(request.id.to_string())
		.bind(request.template_id.map(|id| id.to_string()))
		.bind(&request.request_type)
		.bind(&request.owner_user_id)
		.bind(&request.owner_company_id)
		.bind(parameters)
		.bind(payload)
		.bind(request.status.as_str())
		.bind(result)
		.bind(request.attempts as i64)
		.bind(request.dispatch_started_at.map(format_ts))
		.bind(format_ts(request.created_at))
		.bind(format_ts(request.updated_at))
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	#[tracing::instrument(skip(self), fields(request_id = %id))]
	pub async fn get_request(&self, id: Uuid) -> Result<Option<ProvisioningRequest>> {
		let row = sqlx::query_as::<_, RequestRow>(&format!("{SELECT_REQUEST} WHERE id = ?"))
			.bind(id.to_string())
			.fetch_optional(&self.pool)
			.await?;

		row.map(request_from_row).transpose()
	}

	/// Moves `expected -> new`, storing `result`.
	///
	/// Returns `false` without touching the row when its status is not
	/// `expected`. Re-entering `pending` goes through [`requeue`](Self::requeue).
	#[tracing::instrument(skip(self, result), fields(request_id = %id, expected = %expected, new = %new))]
	pub async fn update_status_if(
		&self,
		id: Uuid,
		expected: RequestStatus,
		new: RequestStatus,
		result: Option<&serde_json::Value>,
	) -> Result<bool> {
		let result = result.map(serde_json::to_string).transpose()?;
		let outcome = sqlx::query(
			r#"
			UPDATE requests
			SET status = ?, result = ?, updated_at = ?
			WHERE id = ? AND status = ?
			"#,
		)
		.bind(new.as_str())
		.bind(result)
		.bind(format_ts(Utc::now()))
		.bind(id.to_string())
		.bind(expected.as_str())
		.execute(&self.pool)
		.await?;

		Ok(outcome.rows_affected() > 0)
	}

	/// Moves an `error` request back to `pending` with a freshly built
	/// payload, clearing the previous result and dispatch claim.
	///
	/// Returns `false` if the request is not in `error`.
	#[tracing::instrument(skip(self, payload), fields(request_id = %id))]
	pub async fn requeue(&self, id: Uuid, payload: &serde_json::Value) -> Result<bool> {
		let outcome = sqlx::query(
			r#"
			UPDATE requests
			SET status = 'pending', payload = ?, result = NULL, dispatch_started_at = NULL,
				updated_at = ?
			WHERE id = ? AND status = 'error'
			"#,
		)
		.bind(serde_json::to_string(payload)?)
		.bind(format_ts(Utc::now()))
		.bind(id.to_string())
		.execute(&self.pool)
		.await?;

		Ok(outcome.rows_affected() > 0)
	}

	/// Moves pending requests whose dispatch was claimed before
	/// `claimed_before` to `error` with `result`, returning their ids.
	///
	/// These are attempts that never recorded an outcome, e.g. after a crash.
	#[tracing::instrument(skip(self, result), fields(claimed_before = %claimed_before))]
	pub async fn fail_stale_dispatches(
		&self,
		claimed_before: DateTime<Utc>,
		result: &serde_json::Value,
	) -> Result<Vec<Uuid>> {
		let rows: Vec<(String,)> = sqlx::query_as(
			r#"
			UPDATE requests
			SET status = 'error', result = ?, updated_at = ?
			WHERE status = 'pending'
			AND dispatch_started_at IS NOT NULL
			AND dispatch_started_at < ?
			RETURNING id
			"#,
		)
		.bind(serde_json::to_string(result)?)
		.bind(format_ts(Utc::now()))
		.bind(format_ts(claimed_before))
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(|(id,)| parse_uuid(id)).collect()
	}

	/// Claims the single dispatch attempt for a pending request.
	///
	/// Returns `false` if the request is not pending or an attempt already
	/// holds the claim.
	#[tracing::instrument(skip(self), fields(request_id = %id))]
	pub async fn claim_dispatch(&self, id: Uuid) -> Result<bool> {
		let now = format_ts(Utc::now());
		let outcome = sqlx::query(
			r#"
			UPDATE requests
			SET dispatch_started_at = ?, attempts = attempts + 1, updated_at = ?
			WHERE id = ? AND status = 'pending' AND dispatch_started_at IS NULL
			"#,
		)
		.bind(&now)
		.bind(&now)
		.bind(id.to_string())
		.execute(&self.pool)
		.await?;

		Ok(outcome.rows_affected() > 0)
	}

	/// Cancels a request that is pending and not yet claimed for dispatch.
	#[tracing::instrument(skip(self), fields(request_id = %id))]
	pub async fn cancel_if_undispatched(&self, id: Uuid) -> Result<bool> {
		let outcome = sqlx::query(
			r#"
			UPDATE requests
			SET status = 'cancelled', updated_at = ?
			WHERE id = ? AND status = 'pending' AND dispatch_started_at IS NULL
			"#,
		)
		.bind(format_ts(Utc::now()))
		.bind(id.to_string())
		.execute(&self.pool)
		.await?;

		Ok(outcome.rows_affected() > 0)
	}

	/// Newest first. Returns the page and the total number of matches.
	#[tracing::instrument(skip(self, filter), fields(status = ?filter.status, limit = filter.limit, offset = filter.offset))]
	pub async fn list_requests(
		&self,
		filter: &RequestFilter,
	) -> Result<(Vec<ProvisioningRequest>, i64)> {
		const WHERE: &str = r#"
			WHERE (? IS NULL OR owner_user_id = ?)
			AND (? IS NULL OR owner_company_id = ?)
			AND (? IS NULL OR status = ?)
		"#;
		let status = filter.status.map(|s| s.as_str());

		let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM requests {WHERE}"))
			.bind(filter.owner_user_id.as_deref())
			.bind(filter.owner_user_id.as_deref())
			.bind(filter.owner_company_id.as_deref())
			.bind(filter.owner_company_id.as_deref())
			.bind(status)
			.bind(status)
			.fetch_one(&self.pool)
			.await?;

		let rows = sqlx::query_as::<_, RequestRow>(&format!(
			"{SELECT_REQUEST} {WHERE} ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?"
		))
		.bind(filter.owner_user_id.as_deref())
		.bind(filter.owner_user_id.as_deref())
		.bind(filter.owner_company_id.as_deref())
		.bind(filter.owner_company_id.as_deref())
		.bind(status)
		.bind(status)
		.bind(filter.effective_limit() as i64)
		.bind(filter.offset as i64)
		.fetch_all(&self.pool)
		.await?;

		let requests = rows
			.into_iter()
			.map(request_from_row)
			.collect::<Result<Vec<_>>>()?;

		Ok((requests, total))
	}

	#[tracing::instrument(skip(self), fields(template_id = %template_id))]
	pub async fn count_pending_for_template(&self, template_id: Uuid) -> Result<i64> {
		let (count,): (i64,) = sqlx::query_as(
			"SELECT COUNT(*) FROM requests WHERE template_id = ? AND status = 'pending'",
		)
		.bind(template_id.to_string())
		.fetch_one(&self.pool)
		.await?;

		Ok(count)
	}
}

#[async_trait]
pub trait RequestStore: Send + Sync {
	async fn create_request(&self, request: &ProvisioningRequest) -> Result<()>;
	async fn get_request(&self, id: Uuid) -> Result<Option<ProvisioningRequest>>;
	async fn update_status_if(
		&self,
		id: Uuid,
		expected: RequestStatus,
		new: RequestStatus,
		result: Option<&serde_json::Value>,
	) -> Result<bool>;
	async fn requeue(&self, id: Uuid, payload: &serde_json::Value) -> Result<bool>;
	async fn fail_stale_dispatches(
		&self,
		claimed_before: DateTime<Utc>,
		result: &serde_json::Value,
	) -> Result<Vec<Uuid>>;
	async fn claim_dispatch(&self, id: Uuid) -> Result<bool>;
	async fn cancel_if_undispatched(&self, id: Uuid) -> Result<bool>;
	async fn list_requests(&self, filter: &RequestFilter)
		-> Result<(Vec<ProvisioningRequest>, i64)>;
	async fn count_pending_for_template(&self, template_id: Uuid) -> Result<i64>;
}

#[async_trait]
impl RequestStore for RequestRepository {
	async fn create_request(&self, request: &ProvisioningRequest) -> Result<()> {
		self.create_request(request).await
	}

	async fn get_request(&self, id: Uuid) -> Result<Option<ProvisioningRequest>> {
		self.get_request(id).await
	}

	async fn update_status_if(
		&self,
		id: Uuid,
		expected: RequestStatus,
		new: RequestStatus,
		result: Option<&serde_json::Value>,
	) -> Result<bool> {
		self.update_status_if(id, expected, new, result).await
	}

	async fn requeue(&self, id: Uuid, payload: &serde_json::Value) -> Result<bool> {
		self.requeue(id, payload).await
	}

	async fn fail_stale_dispatches(
		&self,
		claimed_before: DateTime<Utc>,
		result: &serde_json::Value,
	) -> Result<Vec<Uuid>> {
		self.fail_stale_dispatches(claimed_before, result).await
	}

	async fn claim_dispatch(&self, id: Uuid) -> Result<bool> {
		self.claim_dispatch(id).await
	}

	async fn cancel_if_undispatched(&self, id: Uuid) -> Result<bool> {
		self.cancel_if_undispatched(id).await
	}

	async fn list_requests(
		&self,
		filter: &RequestFilter,
	) -> Result<(Vec<ProvisioningRequest>, i64)> {
		self.list_requests(filter).await
	}

	async fn count_pending_for_template(&self, template_id: Uuid) -> Result<i64> {
		self.count_pending_for_template(template_id).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_pool;
	use proptest::prelude::*;
	use serde_json::json;

	fn make_request(user: &str, company: &str) -> ProvisioningRequest {
		let now = Utc::now();
		ProvisioningRequest {
			id: Uuid::new_v4(),
			template_id: None,
			request_type: "CREATE_GROUP".to_string(),
			owner_user_id: user.to_string(),
			owner_company_id: company.to_string(),
			parameters: json!({"name": "ops", "description": "operators"}),
			payload: json!({"name": "ops", "description": "operators"}),
			status: RequestStatus::Pending,
			result: None,
			attempts: 0,
			dispatch_started_at: None,
			created_at: now,
			updated_at: now,
		}
	}

	#[test]
	fn status_round_trips_through_str() {
		for status in [
			RequestStatus::Pending,
			RequestStatus::Completed,
			RequestStatus::Error,
			RequestStatus::Cancelled,
		] {
			assert_eq!(status.as_str().parse::<RequestStatus>().unwrap(), status);
		}
		assert!("PENDING".parse::<RequestStatus>().is_err());
	}

	#[tokio::test]
	async fn create_and_get() {
		let repo = RequestRepository::new(create_test_pool().await);
		let request = make_request("u1", "c1");
		repo.create_request(&request).await.unwrap();

		let stored = repo.get_request(request.id).await.unwrap().unwrap();
		assert_eq!(stored.status, RequestStatus::Pending);
		assert_eq!(stored.parameters, request.parameters);
		assert_eq!(stored.payload, request.payload);
		assert!(stored.result.is_none());
		assert_eq!(stored.attempts, 0);

		assert!(repo.get_request(Uuid::new_v4()).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn conditional_update_only_applies_from_expected_state() {
		let repo = RequestRepository::new(create_test_pool().await);
		let request = make_request("u1", "c1");
		repo.create_request(&request).await.unwrap();

		let result = json!({"kind": "success", "status": 200, "body": {}});
		assert!(repo
			.update_status_if(
				request.id,
				RequestStatus::Pending,
				RequestStatus::Completed,
				Some(&result)
			)
			.await
			.unwrap());

		assert!(!repo
			.update_status_if(
				request.id,
				RequestStatus::Pending,
				RequestStatus::Error,
				Some(&json!({"kind": "timeout"}))
			)
			.await
			.unwrap());

		let stored = repo.get_request(request.id).await.unwrap().unwrap();
		assert_eq!(stored.status, RequestStatus::Completed);
		assert_eq!(stored.result, Some(result));
	}

	#[tokio::test]
	async fn claim_is_exclusive_and_counts_attempts() {
		let repo = RequestRepository::new(create_test_pool().await);
		let request = make_request("u1", "c1");
		repo.create_request(&request).await.unwrap();

		assert!(repo.claim_dispatch(request.id).await.unwrap());
		assert!(!repo.claim_dispatch(request.id).await.unwrap());

		let stored = repo.get_request(request.id).await.unwrap().unwrap();
		assert_eq!(stored.attempts, 1);
		assert!(stored.dispatch_started_at.is_some());
	}

	#[tokio::test]
	async fn requeue_replaces_payload_and_clears_result_and_claim() {
		let repo = RequestRepository::new(create_test_pool().await);
		let request = make_request("u1", "c1");
		repo.create_request(&request).await.unwrap();

		repo.claim_dispatch(request.id).await.unwrap();
		repo.update_status_if(
			request.id,
			RequestStatus::Pending,
			RequestStatus::Error,
			Some(&json!({"kind": "provider_error", "status": 401, "body": ""})),
		)
		.await
		.unwrap();

		let rebuilt = json!({"name": "ops", "description": "rebuilt"});
		assert!(repo.requeue(request.id, &rebuilt).await.unwrap());
		assert!(!repo.requeue(request.id, &rebuilt).await.unwrap());

		let stored = repo.get_request(request.id).await.unwrap().unwrap();
		assert_eq!(stored.status, RequestStatus::Pending);
		assert_eq!(stored.payload, rebuilt);
		assert!(stored.result.is_none());
		assert!(stored.dispatch_started_at.is_none());
		assert_eq!(stored.attempts, 1);

		assert!(repo.claim_dispatch(request.id).await.unwrap());
		let stored = repo.get_request(request.id).await.unwrap().unwrap();
		assert_eq!(stored.attempts, 2);
	}

	#[tokio::test]
	async fn stale_claims_are_failed_and_fresh_ones_kept() {
		let pool = create_test_pool().await;
		let repo = RequestRepository::new(pool.clone());

		let stale = make_request("u1", "c1");
		let fresh = make_request("u1", "c1");
		let unclaimed = make_request("u1", "c1");
		for request in [&stale, &fresh, &unclaimed] {
			repo.create_request(request).await.unwrap();
		}
		repo.claim_dispatch(stale.id).await.unwrap();
		repo.claim_dispatch(fresh.id).await.unwrap();
		sqlx::query("UPDATE requests SET dispatch_started_at = ? WHERE id = ?")
			.bind(format_ts(Utc::now() - chrono::Duration::minutes(10)))
			.bind(stale.id.to_string())
			.execute(&pool)
			.await
			.unwrap();

		let result = json!({"kind": "dispatch_interrupted"});
		let failed = repo
			.fail_stale_dispatches(Utc::now() - chrono::Duration::minutes(1), &result)
			.await
			.unwrap();
		assert_eq!(failed, vec![stale.id]);

		let stored = repo.get_request(stale.id).await.unwrap().unwrap();
		assert_eq!(stored.status, RequestStatus::Error);
		assert_eq!(stored.result, Some(result));
		for id in [fresh.id, unclaimed.id] {
			assert_eq!(
				repo.get_request(id).await.unwrap().unwrap().status,
				RequestStatus::Pending
			);
		}
	}

	#[tokio::test]
	async fn cancel_only_before_dispatch_claim() {
		let repo = RequestRepository::new(create_test_pool().await);

		let unclaimed = make_request("u1", "c1");
		repo.create_request(&unclaimed).await.unwrap();
		assert!(repo.cancel_if_undispatched(unclaimed.id).await.unwrap());
		assert_eq!(
			repo.get_request(unclaimed.id).await.unwrap().unwrap().status,
			RequestStatus::Cancelled
		);

		let claimed = make_request("u1", "c1");
		repo.create_request(&claimed).await.unwrap();
		repo.claim_dispatch(claimed.id).await.unwrap();
		assert!(!repo.cancel_if_undispatched(claimed.id).await.unwrap());
		assert_eq!(
			repo.get_request(claimed.id).await.unwrap().unwrap().status,
			RequestStatus::Pending
		);
	}

	#[tokio::test]
	async fn completion_after_cancel_is_rejected() {
		let repo = RequestRepository::new(create_test_pool().await);
		let request = make_request("u1", "c1");
		repo.create_request(&request).await.unwrap();
		repo.cancel_if_undispatched(request.id).await.unwrap();

		assert!(!repo
			.update_status_if(
				request.id,
				RequestStatus::Pending,
				RequestStatus::Completed,
				Some(&json!({}))
			)
			.await
			.unwrap());
		let stored = repo.get_request(request.id).await.unwrap().unwrap();
		assert_eq!(stored.status, RequestStatus::Cancelled);
		assert!(stored.result.is_none());
	}

	#[tokio::test]
	async fn list_filters_and_orders_newest_first() {
		let repo = RequestRepository::new(create_test_pool().await);
		let base = Utc::now();
		let mut ids = Vec::new();
		for i in 0..5 {
			let mut request = make_request(if i % 2 == 0 { "u1" } else { "u2" }, "c1");
			request.created_at = base + chrono::Duration::seconds(i);
			repo.create_request(&request).await.unwrap();
			ids.push(request.id);
		}
		let mut other = make_request("u3", "c2");
		other.status = RequestStatus::Error;
		repo.create_request(&other).await.unwrap();

		let (all, total) = repo.list_requests(&RequestFilter::default()).await.unwrap();
		assert_eq!(total, 6);
		assert_eq!(all.len(), 6);

		let (mine, total) = repo
			.list_requests(&RequestFilter {
				owner_user_id: Some("u1".to_string()),
				..Default::default()
			})
			.await
			.unwrap();
		assert_eq!(total, 3);
		let mine: Vec<_> = mine.into_iter().map(|r| r.id).collect();
		assert_eq!(mine, vec![ids[4], ids[2], ids[0]]);

		let (company, total) = repo
			.list_requests(&RequestFilter {
				owner_company_id: Some("c2".to_string()),
				status: Some(RequestStatus::Error),
				..Default::default()
			})
			.await
			.unwrap();
		assert_eq!(total, 1);
		assert_eq!(company[0].id, other.id);

		let (page, total) = repo
			.list_requests(&RequestFilter {
				owner_company_id: Some("c1".to_string()),
				limit: 2,
				offset: 2,
				..Default::default()
			})
			.await
			.unwrap();
		assert_eq!(total, 5);
		let page: Vec<_> = page.into_iter().map(|r| r.id).collect();
		assert_eq!(page, vec![ids[2], ids[1]]);
	}

	#[tokio::test]
	async fn counts_pending_requests_per_template() {
		let pool = create_test_pool().await;
		let template_id = Uuid::new_v4();
		let now = format_ts(Utc::now());
		sqlx::query(
			"INSERT INTO templates (id, name, description, body, active, created_at, updated_at) VALUES (?, 't', '', '{}', 1, ?, ?)",
		)
		.bind(template_id.to_string())
		.bind(&now)
		.bind(&now)
		.execute(&pool)
		.await
		.unwrap();

		let repo = RequestRepository::new(pool);
		for status in [RequestStatus::Pending, RequestStatus::Pending, RequestStatus::Completed] {
			let mut request = make_request("u1", "c1");
			request.template_id = Some(template_id);
			request.status = status;
			repo.create_request(&request).await.unwrap();
		}

		assert_eq!(repo.count_pending_for_template(template_id).await.unwrap(), 2);
		assert_eq!(
			repo.count_pending_for_template(Uuid::new_v4()).await.unwrap(),
			0
		);
	}

	proptest! {
		#[test]
		fn effective_limit_is_bounded(limit in any::<u32>()) {
			let filter = RequestFilter { limit, ..Default::default() };
			let effective = filter.effective_limit();
			prop_assert!((1..=MAX_PAGE_SIZE).contains(&effective));
			if limit == 0 {
				prop_assert_eq!(effective, DEFAULT_PAGE_SIZE);
			}
		}
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request templates.
//!
//! A template body is a JSON document with `${name}` placeholders. Templates
//! are never physically deleted; deactivation hides them from submission.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{DbError, Result};
use crate::types::{format_ts, parse_ts, parse_uuid};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
	pub id: Uuid,
	pub name: String,
	pub description: String,
	pub body: serde_json::Value,
	pub active: bool,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

type TemplateRow = (String, String, String, String, bool, String, String);

const SELECT_TEMPLATE: &str =
	"SELECT id, name, description, body, active, created_at, updated_at FROM templates";

fn template_from_row(row: TemplateRow) -> Result<Template> {
	let (id, name, description, body, active, created_at, updated_at) = row;
	Ok(Template {
		id: parse_uuid(&id)?,
		name,
		description,
		body: serde_json::from_str(&body)?,
		active,
		created_at: parse_ts(&created_at)?,
		updated_at: parse_ts(&updated_at)?,
	})
}

#[derive(Clone)]
pub struct TemplateRepository {
	pool: SqlitePool,
}

impl TemplateRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self), fields(template_id = %id))]
	pub async fn get_template(&self, id: Uuid) -> Result<Option<Template>> {
		let row = sqlx::query_as::<_, TemplateRow>(&format!("{SELECT_TEMPLATE} WHERE id = ?"))
			.bind(id.to_string())
			.fetch_optional(&self.pool)
			.await?;

		row.map(template_from_row).transpose()
	}

	/// Returns the template only while it is active.
	#[tracing::instrument(skip(self), fields(template_id = %id))]
	pub async fn get_active_template(&self, id: Uuid) -> Result<Option<Template>> {
		let row = sqlx::query_as::<_, TemplateRow>(&format!(
			"{SELECT_TEMPLATE} WHERE id = ? AND active = 1"
		))
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(template_from_row).transpose()
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_active_templates(&self) -> Result<Vec<Template>> {
		let rows = sqlx::query_as::<_, TemplateRow>(&format!(
			"{SELECT_TEMPLATE} WHERE active = 1 ORDER BY name, id"
		))
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(template_from_row).collect()
	}

	/// Inserts a template or replaces every field except `created_at`.
	#[tracing::instrument(skip(self, template), fields(template_id = %template.id))]
	pub async fn upsert_template(&self, template: &Template) -> Result<()> {
		let body = serde_json::to_string(&template.body)?;
		sqlx::query(
			r#"
			INSERT INTO templates (id, name, description, body, active, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?, ?, ?)
			ON CONFLICT(id) DO UPDATE SET
				name = excluded.name,
				description = excluded.description,
				body = excluded.body,
				active = excluded.active,
				updated_at = excluded.updated_at
			"#,
		)
		.bind(template.id.to_string())
		.bind(&template.name)
		.bind(&template.description)
		.bind(body)
		.bind(template.active)
		.bind(format_ts(template.created_at))
		.bind(format_ts(template.updated_at))
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	/// Soft-deletes a template.
	///
	/// The pending-request check and the update are a single statement, so a
	/// template cannot be deactivated underneath a request that is still
	/// waiting to be dispatched.
	///
	/// # Errors
	/// `NotFound` if no such template exists, `Conflict` if it has pending
	/// requests.
	#[tracing::instrument(skip(self), fields(template_id = %id))]
	pub async fn deactivate_template(&self, id: Uuid) -> Result<()> {
		let id_str = id.to_string();
		let result = sqlx::query(
			r#"
			UPDATE templates SET active = 0, updated_at = ?
			WHERE id = ?
			AND NOT EXISTS (
				SELECT 1 FROM requests WHERE template_id = ? AND status = 'pending'
			)
			"#,
		)
		.bind(format_ts(Utc::now()))
		.bind(&id_str)
		.bind(&id_str)
		.execute(&self.pool)
		.await?;

		if result.rows_affected() > 0 {
			return Ok(());
		}

		if self.get_template(id).await?.is_none() {
			return Err(DbError::NotFound(format!("template {id}")));
		}

		Err(DbError::Conflict(format!(
			"template {id} has pending requests"
		)))
	}
}

#[async_trait]
pub trait TemplateStore: Send + Sync {
	async fn get_template(&self, id: Uuid) -> Result<Option<Template>>;
	async fn get_active_template(&self, id: Uuid) -> Result<Option<Template>>;
	async fn list_active_templates(&self) -> Result<Vec<Template>>;
	async fn upsert_template(&self, template: &Template) -> Result<()>;
	async fn deactivate_template(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
impl TemplateStore for TemplateRepository {
	async fn get_template(&self, id: Uuid) -> Result<Option<Template>> {
		self.get_template(id).await
	}

	async fn get_active_template(&self, id: Uuid) -> Result<Option<Template>> {
		self.get_active_template(id).await
	}

	async fn list_active_templates(&self) -> Result<Vec<Template>> {
		self.list_active_templates().await
	}

	async fn upsert_template(&self, template: &Template) -> Result<()> {
		self.upsert_template(template).await
	}

	async fn deactivate_template(&self, id: Uuid) -> Result<()> {
		self.deactivate_template(id).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_pool;
	use serde_json::json;

	fn make_template(name: &str) -> Template {
		let now = Utc::now();
		Template {
			id: Uuid::new_v4(),
			name: name.to_string(),
			description: "Creates a user".to_string(),
			body: json!({"name": "${name}", "email": "${email}"}),
			active: true,
			created_at: now,
			updated_at: now,
		}
	}

	#[tokio::test]
	async fn upsert_and_get_round_trip() {
		let repo = TemplateRepository::new(create_test_pool().await);
		let template = make_template("new-user");
		repo.upsert_template(&template).await.unwrap();

		let stored = repo.get_template(template.id).await.unwrap().unwrap();
		assert_eq!(stored.name, "new-user");
		assert_eq!(stored.body, template.body);
		assert!(stored.active);
	}

	#[tokio::test]
	async fn upsert_updates_but_keeps_created_at() {
		let repo = TemplateRepository::new(create_test_pool().await);
		let template = make_template("new-user");
		repo.upsert_template(&template).await.unwrap();

		let updated = Template {
			name: "renamed".to_string(),
			created_at: template.created_at + chrono::Duration::days(1),
			..template.clone()
		};
		repo.upsert_template(&updated).await.unwrap();

		let stored = repo.get_template(template.id).await.unwrap().unwrap();
		assert_eq!(stored.name, "renamed");
		assert_eq!(format_ts(stored.created_at), format_ts(template.created_at));
	}

	#[tokio::test]
	async fn inactive_templates_are_hidden() {
		let repo = TemplateRepository::new(create_test_pool().await);
		let active = make_template("a");
		let inactive = Template {
			active: false,
			..make_template("b")
		};
		repo.upsert_template(&active).await.unwrap();
		repo.upsert_template(&inactive).await.unwrap();

		let listed = repo.list_active_templates().await.unwrap();
		assert_eq!(listed.len(), 1);
		assert_eq!(listed[0].id, active.id);

		assert!(repo.get_active_template(inactive.id).await.unwrap().is_none());
		assert!(repo.get_template(inactive.id).await.unwrap().is_some());
	}

	#[tokio::test]
	async fn deactivate_missing_template_is_not_found() {
		let repo = TemplateRepository::new(create_test_pool().await);
		let result = repo.deactivate_template(Uuid::new_v4()).await;
		assert!(matches!(result, Err(DbError::NotFound(_))));
	}

	#[tokio::test]
	async fn deactivate_is_refused_while_requests_are_pending() {
		let pool = create_test_pool().await;
		let repo = TemplateRepository::new(pool.clone());
		let template = make_template("t");
		repo.upsert_template(&template).await.unwrap();

		let now = format_ts(Utc::now());
		sqlx::query(
			"INSERT INTO requests (id, template_id, request_type, owner_user_id, owner_company_id, parameters, status, created_at, updated_at)
			 VALUES (?, ?, 'CREATE_USER', 'u1', 'c1', '{}', 'pending', ?, ?)",
		)
		.bind(Uuid::new_v4().to_string())
		.bind(template.id.to_string())
		.bind(&now)
		.bind(&now)
		.execute(&pool)
		.await
		.unwrap();

		let result = repo.deactivate_template(template.id).await;
		assert!(matches!(result, Err(DbError::Conflict(_))));
		assert!(repo.get_active_template(template.id).await.unwrap().is_some());

		sqlx::query("UPDATE requests SET status = 'completed'")
			.execute(&pool)
			.await
			.unwrap();
		repo.deactivate_template(template.id).await.unwrap();
		assert!(repo.get_active_template(template.id).await.unwrap().is_none());
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Companies that own provisioning requests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::Result;
use crate::types::{format_ts, parse_ts};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
	pub id: String,
	pub name: String,
	pub active: bool,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

type CompanyRow = (String, String, bool, String, String);

#[derive(Clone)]
pub struct CompanyRepository {
	pool: SqlitePool,
}

impl CompanyRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_company(&self, id: &str) -> Result<Option<Company>> {
		let row = sqlx::query_as::<_, CompanyRow>(
			"SELECT id, name, active, created_at, updated_at FROM companies WHERE id = ?",
		)
		.bind(id)
		.fetch_optional(&self.pool)
		.await?;

		row.map(|(id, name, active, created_at, updated_at)| {
			Ok(Company {
				id,
				name,
				active,
				created_at: parse_ts(&created_at)?,
				updated_at: parse_ts(&updated_at)?,
			})
		})
		.transpose()
	}

	#[tracing::instrument(skip(self, company), fields(company_id = %company.id, active = company.active))]
	pub async fn upsert_company(&self, company: &Company) -> Result<()> {
		sqlx::query(
			r#"
			INSERT INTO companies (id, name, active, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?)
			ON CONFLICT(id) DO UPDATE SET
				name = excluded.name,
				active = excluded.active,
				updated_at = excluded.updated_at
			"#,
		)
		.bind(&company.id)
		.bind(&company.name)
		.bind(company.active)
		.bind(format_ts(company.created_at))
		.bind(format_ts(company.updated_at))
		.execute(&self.pool)
		.await?;

		Ok(())
	}
}

#[async_trait]
pub trait CompanyStore: Send + Sync {
	async fn get_company(&self, id: &str) -> Result<Option<Company>>;
	async fn upsert_company(&self, company: &Company) -> Result<()>;
}

#[async_trait]
impl CompanyStore for CompanyRepository {
	async fn get_company(&self, id: &str) -> Result<Option<Company>> {
		self.get_company(id).await
	}

	async fn upsert_company(&self, company: &Company) -> Result<()> {
		self.upsert_company(company).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_pool;

	fn company(id: &str, active: bool) -> Company {
		let now = Utc::now();
		Company {
			id: id.to_string(),
			name: "Acme".to_string(),
			active,
			created_at: now,
			updated_at: now,
		}
	}

	#[tokio::test]
	async fn unknown_company_is_none() {
		let repo = CompanyRepository::new(create_test_pool().await);
		assert!(repo.get_company("missing").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn upsert_toggles_active_flag() {
		let repo = CompanyRepository::new(create_test_pool().await);
		repo.upsert_company(&company("c1", true)).await.unwrap();
		assert!(repo.get_company("c1").await.unwrap().unwrap().active);

		repo.upsert_company(&company("c1", false)).await.unwrap();
		let stored = repo.get_company("c1").await.unwrap().unwrap();
		assert!(!stored.active);
		assert_eq!(stored.name, "Acme");
	}
}

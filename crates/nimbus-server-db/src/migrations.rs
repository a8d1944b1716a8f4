// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Schema migrations.
//!
//! Every statement is `CREATE ... IF NOT EXISTS`, so running the full set
//! again is a no-op.

use sqlx::sqlite::SqlitePool;

use crate::error::Result;

const MIGRATIONS: [(&str, &str); 4] = [
	("001_templates", include_str!("../migrations/001_templates.sql")),
	("002_companies", include_str!("../migrations/002_companies.sql")),
	("003_requests", include_str!("../migrations/003_requests.sql")),
	("004_audit_logs", include_str!("../migrations/004_audit_logs.sql")),
];

/// Run all database migrations in order.
#[tracing::instrument(skip(pool))]
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
	for (name, sql) in MIGRATIONS {
		for stmt in statements(sql) {
			sqlx::query(stmt).execute(pool).await?;
		}
		tracing::debug!(migration = name, "migration applied");
	}
	Ok(())
}

fn statements(sql: &str) -> impl Iterator<Item = &str> {
	sql.split(';').map(str::trim).filter(|s| {
		s.lines()
			.any(|line| !line.trim().is_empty() && !line.trim_start().starts_with("--"))
	})
}

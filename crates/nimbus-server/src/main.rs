// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Nimbus server - operator entry point for OCI identity provisioning.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use nimbus_server_audit::AuditService;
use nimbus_server_provisioning::ProvisioningService;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod oci;
mod version;

use cli::{Args, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	if let Command::Version = args.command {
		return commands::print_json(&version::version_info());
	}

	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => nimbus_server_config::load_config_with_file(path),
		None => nimbus_server_config::load_config(),
	}
	.context("failed to load configuration")?;

	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| config.logging.level.clone().into()),
		)
		.with(
			args.json
				.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)),
		)
		.with(
			(!args.json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
		)
		.init();

	tracing::debug!(
		database = %config.database.url,
		oci = config.oci.is_some(),
		audit = config.audit.enabled,
		"configuration loaded"
	);

	let pool = nimbus_server_db::create_pool(&config.database.url)
		.await
		.context("failed to open database")?;
	nimbus_server_db::run_migrations(&pool)
		.await
		.context("failed to run migrations")?;

	if let Command::Migrate = args.command {
		return commands::print_json(&serde_json::json!({ "migrated": true }));
	}

	let audit = Arc::new(
		AuditService::from_config(&config.audit, Some(pool.clone()))
			.context("failed to configure audit")?,
	);

	let mut service = ProvisioningService::from_pool(pool, Arc::clone(&audit));
	match &config.oci {
		Some(oci_config) => {
			let (client, timeout) =
				oci::build_client(oci_config).context("failed to configure OCI client")?;
			service = service.with_client(client, timeout);
		}
		None => tracing::warn!("no [oci] section configured, dispatch is disabled"),
	}

	let recovered = service
		.recover_stale_dispatches()
		.await
		.context("failed to recover interrupted dispatches")?;
	if !recovered.is_empty() {
		tracing::warn!(count = recovered.len(), "interrupted dispatches moved to error");
	}

	let actor = args.actor.actor();
	let outcome = match args.command {
		Command::Template { command } => commands::template(&service, &actor, command).await,
		Command::Request { command } => commands::request(&service, &actor, command).await,
		Command::Company { command } => commands::company(&service, &actor, command).await,
		Command::Migrate | Command::Version => Ok(()),
	};

	// Pipelines spawned by this run finish before the process exits.
	service.drain().await;
	drop(service);

	match Arc::try_unwrap(audit) {
		Ok(audit) => audit.shutdown().await,
		Err(_) => tracing::warn!("audit service still shared at exit, pending events may be lost"),
	}

	outcome
}

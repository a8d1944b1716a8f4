// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Command-line surface.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use nimbus_server_db::RequestStatus;
use nimbus_server_provisioning::{Actor, Role};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Nimbus server - OCI identity provisioning.
#[derive(Parser, Debug)]
#[command(name = "nimbus-server", about = "Nimbus OCI identity provisioning", version)]
pub struct Args {
	/// Config file (defaults to /etc/nimbus/server.toml)
	#[arg(long, global = true, env = "NIMBUS_CONFIG")]
	pub config: Option<PathBuf>,

	/// Emit logs as JSON
	#[arg(long, global = true)]
	pub json: bool,

	#[command(flatten)]
	pub actor: ActorArgs,

	#[command(subcommand)]
	pub command: Command,
}

/// Identity the command acts as.
#[derive(ClapArgs, Debug, Clone)]
pub struct ActorArgs {
	#[arg(long, global = true, env = "NIMBUS_USER", default_value = "operator")]
	pub user: String,

	#[arg(long, global = true, env = "NIMBUS_COMPANY", default_value = "")]
	pub company: String,

	#[arg(long, global = true, value_enum, env = "NIMBUS_ROLE", default_value = "admin")]
	pub role: RoleArg,
}

impl ActorArgs {
	pub fn actor(&self) -> Actor {
		Actor::new(self.user.clone(), self.company.clone(), self.role.into())
	}
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum RoleArg {
	Admin,
	Manager,
	Member,
}

impl From<RoleArg> for Role {
	fn from(role: RoleArg) -> Self {
		match role {
			RoleArg::Admin => Role::Admin,
			RoleArg::Manager => Role::Manager,
			RoleArg::Member => Role::Member,
		}
	}
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum StatusArg {
	Pending,
	Completed,
	Error,
	Cancelled,
}

impl From<StatusArg> for RequestStatus {
	fn from(status: StatusArg) -> Self {
		match status {
			StatusArg::Pending => RequestStatus::Pending,
			StatusArg::Completed => RequestStatus::Completed,
			StatusArg::Error => RequestStatus::Error,
			StatusArg::Cancelled => RequestStatus::Cancelled,
		}
	}
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Apply database migrations
	Migrate,
	/// Show version and build information
	Version,
	/// Request template administration
	Template {
		#[command(subcommand)]
		command: TemplateCommand,
	},
	/// Provisioning requests
	Request {
		#[command(subcommand)]
		command: RequestCommand,
	},
	/// Company administration
	Company {
		#[command(subcommand)]
		command: CompanyCommand,
	},
}

#[derive(Subcommand, Debug)]
pub enum TemplateCommand {
	/// List active templates
	List,
	/// Show a template with its body
	Show { id: Uuid },
	/// Create or replace a template
	Put {
		/// Template to replace; a new id is generated when omitted
		#[arg(long)]
		id: Option<Uuid>,
		#[arg(long)]
		name: String,
		#[arg(long, default_value = "")]
		description: String,
		/// JSON file holding the template body
		#[arg(long, conflicts_with = "body")]
		body_file: Option<PathBuf>,
		/// Inline JSON template body
		#[arg(long)]
		body: Option<String>,
		#[arg(long)]
		active: Option<bool>,
	},
	/// Soft-delete a template
	Deactivate { id: Uuid },
}

#[derive(Subcommand, Debug)]
pub enum RequestCommand {
	/// Submit a provisioning request
	Submit {
		/// CREATE_USER, UPDATE_USER, CREATE_GROUP, ADD_USER_TO_GROUP or CREATE_POLICY
		#[arg(long = "type")]
		request_type: String,
		#[arg(long)]
		template: Option<Uuid>,
		/// Parameter (repeatable: --param KEY=VALUE)
		#[arg(long = "param", value_name = "KEY=VALUE")]
		params: Vec<String>,
		/// Parameters as a JSON object, merged under --param values
		#[arg(long)]
		params_json: Option<String>,
		/// Print the final status instead of the acknowledgement
		#[arg(long)]
		wait: bool,
	},
	/// Show a request
	Status { id: Uuid },
	/// List visible requests, newest first
	List {
		#[arg(long, value_enum)]
		status: Option<StatusArg>,
		#[arg(long, default_value = "10")]
		limit: u32,
		#[arg(long, default_value = "0")]
		offset: u32,
	},
	/// Retry a failed request
	Reprocess {
		id: Uuid,
		#[arg(long)]
		wait: bool,
	},
	/// Cancel a request that has not been dispatched
	Cancel { id: Uuid },
}

#[derive(Subcommand, Debug)]
pub enum CompanyCommand {
	/// Register a company or change its active flag
	Put {
		id: String,
		#[arg(long)]
		name: String,
		#[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
		active: bool,
	},
}

/// Builds the parameter object for a submission.
///
/// `KEY=VALUE` pairs are strings and override keys from `json`.
pub fn parse_params(pairs: &[String], json: Option<&str>) -> anyhow::Result<Value> {
	let mut params = match json {
		Some(raw) => match serde_json::from_str::<Value>(raw)? {
			Value::Object(map) => map,
			_ => anyhow::bail!("--params-json must be a JSON object"),
		},
		None => Map::new(),
	};

	for pair in pairs {
		let (key, value) = pair
			.split_once('=')
			.ok_or_else(|| anyhow::anyhow!("invalid --param '{pair}', expected KEY=VALUE"))?;
		if key.is_empty() {
			anyhow::bail!("invalid --param '{pair}', key is empty");
		}
		params.insert(key.to_string(), Value::String(value.to_string()));
	}

	Ok(Value::Object(params))
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Executes parsed commands against the provisioning service.

use std::path::Path;

use anyhow::Context;
use nimbus_server_provisioning::{
	Actor, CompanyInput, ListRequests, ProvisioningService, SubmitRequest, TemplateInput,
};
use serde::Serialize;
use serde_json::Value;

use crate::cli::{parse_params, CompanyCommand, RequestCommand, TemplateCommand};

/// Writes a value to stdout as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}

fn read_body(body: Option<String>, body_file: Option<&Path>) -> anyhow::Result<Value> {
	let raw = match (body, body_file) {
		(Some(inline), _) => inline,
		(None, Some(path)) => std::fs::read_to_string(path)
			.with_context(|| format!("failed to read template body from {}", path.display()))?,
		(None, None) => anyhow::bail!("one of --body or --body-file is required"),
	};
	serde_json::from_str(&raw).context("template body is not valid JSON")
}

pub async fn template(
	service: &ProvisioningService,
	actor: &Actor,
	command: TemplateCommand,
) -> anyhow::Result<()> {
	match command {
		TemplateCommand::List => print_json(&service.list_templates().await?),
		TemplateCommand::Show { id } => print_json(&service.get_template(id).await?),
		TemplateCommand::Put {
			id,
			name,
			description,
			body_file,
			body,
			active,
		} => {
			let body = read_body(body, body_file.as_deref())?;
			let template = service
				.upsert_template(
					TemplateInput {
						id,
						name,
						description,
						body,
						active,
					},
					actor,
				)
				.await?;
			print_json(&template)
		}
		TemplateCommand::Deactivate { id } => {
			service.deactivate_template(id, actor).await?;
			print_json(&serde_json::json!({ "id": id, "active": false }))
		}
	}
}

pub async fn request(
	service: &ProvisioningService,
	actor: &Actor,
	command: RequestCommand,
) -> anyhow::Result<()> {
	match command {
		RequestCommand::Submit {
			request_type,
			template,
			params,
			params_json,
			wait,
		} => {
			let parameters = parse_params(&params, params_json.as_deref())?;
			let ack = service
				.submit(
					SubmitRequest {
						template_id: template,
						request_type,
						parameters,
					},
					actor,
				)
				.await?;

			if wait {
				service.drain().await;
				print_json(&service.get_status(ack.request_id, actor).await?)
			} else {
				print_json(&ack)
			}
		}
		RequestCommand::Status { id } => print_json(&service.get_status(id, actor).await?),
		RequestCommand::List {
			status,
			limit,
			offset,
		} => {
			let page = service
				.list_requests(
					ListRequests {
						status: status.map(Into::into),
						limit,
						offset,
					},
					actor,
				)
				.await?;
			print_json(&page)
		}
		RequestCommand::Reprocess { id, wait } => {
			service.reprocess(id, actor).await?;
			if wait {
				service.drain().await;
			}
			print_json(&service.get_status(id, actor).await?)
		}
		RequestCommand::Cancel { id } => {
			service.cancel(id, actor).await?;
			print_json(&service.get_status(id, actor).await?)
		}
	}
}

pub async fn company(
	service: &ProvisioningService,
	actor: &Actor,
	command: CompanyCommand,
) -> anyhow::Result<()> {
	match command {
		CompanyCommand::Put { id, name, active } => {
			let company = service
				.put_company(CompanyInput { id, name, active }, actor)
				.await?;
			print_json(&company)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn inline_body_wins_over_file() {
		let body = read_body(Some(r#"{"a": 1}"#.to_string()), None).unwrap();
		assert_eq!(body["a"], 1);
	}

	#[test]
	fn body_is_read_from_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(file, r#"{{"email": "${{email}}"}}"#).unwrap();
		let body = read_body(None, Some(file.path())).unwrap();
		assert_eq!(body["email"], "${email}");
	}

	#[test]
	fn missing_or_invalid_body_is_an_error() {
		assert!(read_body(None, None).is_err());
		assert!(read_body(Some("{not json".to_string()), None).is_err());
	}
}

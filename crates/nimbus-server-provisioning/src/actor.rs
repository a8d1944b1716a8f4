// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;

use serde::{Deserialize, Serialize};

/// Role of the caller, as established by the authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	/// Sees and manages everything, including templates and companies.
	Admin,
	/// Manages requests belonging to their company.
	Manager,
	/// Manages only their own requests.
	Member,
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Role::Admin => write!(f, "admin"),
			Role::Manager => write!(f, "manager"),
			Role::Member => write!(f, "member"),
		}
	}
}

impl std::str::FromStr for Role {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"admin" => Ok(Role::Admin),
			"manager" => Ok(Role::Manager),
			"member" | "user" => Ok(Role::Member),
			other => Err(format!("unknown role '{other}'")),
		}
	}
}

/// The authenticated caller of a provisioning operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
	pub user_id: String,
	pub company_id: String,
	pub role: Role,
}

impl Actor {
	pub fn new(user_id: impl Into<String>, company_id: impl Into<String>, role: Role) -> Self {
		Self {
			user_id: user_id.into(),
			company_id: company_id.into(),
			role,
		}
	}

	pub fn is_admin(&self) -> bool {
		self.role == Role::Admin
	}
}

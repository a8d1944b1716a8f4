// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Common configuration primitives for Nimbus.
//!
//! - [`Secret<T>`]: re-exported from [`nimbus_common_secret`]
//! - [`load_secret_env`]: loads a secret from `VAR` or from the file named by
//!   `VAR_FILE`

pub mod env;

pub use nimbus_common_secret::{Secret, SecretString, REDACTED};

pub use env::{load_secret_env, require_secret_env, RequiredSecretError, SecretEnvError};

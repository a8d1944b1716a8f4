// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! OCI identity integration for Nimbus.
//!
//! - [`registry`]: request types, required fields, endpoints and payloads
//! - [`signer`]: the provider's HTTP signature scheme
//! - [`client`]: single-attempt dispatch and outcome classification

pub mod client;
pub mod config;
pub mod error;
pub mod registry;
pub mod signer;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::{host_of, DispatchOutcome, Dispatcher, HttpDispatcher, OciClient, OutboundRequest};
pub use config::{default_base_url, OciClientConfig, DEFAULT_REGION, DEFAULT_TIMEOUT};
pub use error::{OciError, Result};
pub use registry::{
	resolve, resolve_named, spec, HttpMethod, RequestData, RequestSpec, RequestType, ResolvedRequest,
	REGISTRY,
};
pub use signer::{OciIdentity, RequestSigner, SignedHeaders, SIGNED_HEADERS};

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP utilities for Nimbus.
//!
//! Every outbound client is built here so the User-Agent header stays
//! consistent across provider integrations. Nimbus never retries provider
//! calls automatically, so there is no retry helper.

mod client;

pub use client::{builder, builder_with_user_agent, user_agent};

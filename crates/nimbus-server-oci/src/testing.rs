// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Throwaway RSA keys for tests.

use once_cell::sync::Lazy;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};

static TEST_KEY: Lazy<(RsaPrivateKey, String)> = Lazy::new(|| {
	let key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
	let pem = key.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();
	(key, pem)
});

/// PKCS#8 PEM of a key generated once per test binary.
pub fn test_key_pem() -> &'static str {
	&TEST_KEY.1
}

pub fn test_public_key() -> RsaPublicKey {
	RsaPublicKey::from(&TEST_KEY.0)
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-process session token.

use std::fmt;

use portico_core::error::BridgeError;
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

/// Bytes drawn from the CSPRNG per half of the token.
const DRAW_BYTES: usize = 16;

/// Random secret shared between the host and its injected content client.
///
/// Never persisted. `Debug` is redacted; use [`SessionToken::fingerprint`]
/// when a token needs to appear in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// Generate a fresh token from two independent OS CSPRNG draws
    /// (64 lowercase hex characters).
    #[instrument]
    pub fn generate() -> Result<Self, BridgeError> {
        let rng = SystemRandom::new();
        let mut token = String::with_capacity(DRAW_BYTES * 4);
        for _ in 0..2 {
            let mut draw = [0u8; DRAW_BYTES];
            rng.fill(&mut draw)
                .map_err(|_| BridgeError::Token("system random source unavailable".into()))?;
            token.push_str(&hex::encode(draw));
        }
        let token = Self(token);
        debug!(fingerprint = %token.fingerprint(), "session token generated");
        Ok(token)
    }

    /// Wrap a known value. Intended for tests and for hosts that hand the
    /// token over from another process.
    pub fn from_string(value: impl Into<String>) -> Result<Self, BridgeError> {
        let value = value.into();
        if value.is_empty() {
            return Err(BridgeError::Token("token must not be empty".into()));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters of the token's SHA-256, safe to log.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        hex::encode(&digest[..6])
    }

    /// Plain equality against a presented token.
    pub fn matches(&self, presented: &str) -> bool {
        self.0 == presented
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionToken")
            .field(&format_args!("<{}>", self.fingerprint()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_token_shape() {
        let token = SessionToken::generate().expect("token");
        assert_eq!(token.as_str().len(), 64);
        assert!(token.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn tokens_differ_each_time() {
        let a = SessionToken::generate().expect("a");
        let b = SessionToken::generate().expect("b");
        assert_ne!(a, b, "two generations must produce different tokens");
    }

    #[test]
    fn debug_output_is_redacted() {
        let token = SessionToken::from_string("super-secret-value").expect("token");
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("super-secret-value"));
        assert!(rendered.contains(&token.fingerprint()));
    }

    #[test]
    fn fingerprint_is_stable() {
        // SHA-256("abc") starts with ba7816bf8f01.
        let token = SessionToken::from_string("abc").expect("token");
        assert_eq!(token.fingerprint(), "ba7816bf8f01");
    }

    #[test]
    fn empty_token_rejected() {
        assert!(SessionToken::from_string("").is_err());
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Inbound token check.
//
// To the sender a rejected message looks exactly like a message that was
// never a bridge message.  Internally the verdict is kept so operators can
// tell a spoofing attempt apart from stray traffic.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::token::SessionToken;

/// Outcome of checking a presented token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardVerdict {
    Accepted,
    /// The message carried no token at all.
    Missing,
    /// The message carried a token that is not this session's.
    Mismatch,
}

impl GuardVerdict {
    pub fn is_accepted(self) -> bool {
        self == GuardVerdict::Accepted
    }
}

impl fmt::Display for GuardVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GuardVerdict::Accepted => "accepted",
            GuardVerdict::Missing => "missing-token",
            GuardVerdict::Mismatch => "token-mismatch",
        })
    }
}

/// Validates inbound messages against the session token.
#[derive(Debug)]
pub struct TokenGuard {
    token: SessionToken,
    rejected: AtomicU64,
}

impl TokenGuard {
    pub fn new(token: SessionToken) -> Self {
        Self {
            token,
            rejected: AtomicU64::new(0),
        }
    }

    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    pub fn check(&self, presented: Option<&str>) -> GuardVerdict {
        let verdict = match presented {
            None => GuardVerdict::Missing,
            Some(value) if self.token.matches(value) => GuardVerdict::Accepted,
            Some(_) => GuardVerdict::Mismatch,
        };
        if !verdict.is_accepted() {
            self.rejected.fetch_add(1, Ordering::Relaxed);
        }
        verdict
    }

    /// Number of messages rejected since the guard was created.
    pub fn rejected_count(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> TokenGuard {
        TokenGuard::new(SessionToken::from_string("session-token").expect("token"))
    }

    #[test]
    fn matching_token_accepted() {
        let guard = guard();
        assert_eq!(guard.check(Some("session-token")), GuardVerdict::Accepted);
        assert_eq!(guard.rejected_count(), 0);
    }

    #[test]
    fn verdicts_distinguish_missing_from_wrong() {
        let guard = guard();
        assert_eq!(guard.check(None), GuardVerdict::Missing);
        assert_eq!(guard.check(Some("wrong")), GuardVerdict::Mismatch);
        assert_eq!(guard.check(Some("")), GuardVerdict::Mismatch);
        assert_eq!(guard.rejected_count(), 3);
    }
}

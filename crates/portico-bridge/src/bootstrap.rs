// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content-side client program.
//
// The program lives in `assets/bridge-client.js` with placeholders for the
// per-session values.  Each placeholder is replaced by a JSON literal, which
// is also a valid JS literal.

use portico_core::BridgeConfig;
use portico_core::envelope::{FROM_HOST_PREFIX, RESPONSE_ACTION, TO_HOST_PREFIX};
use portico_security::SessionToken;
use serde_json::Value;

const CLIENT_TEMPLATE: &str = include_str!("../assets/bridge-client.js");

const TOKEN_PLACEHOLDER: &str = "__PORTICO_TOKEN__";
const TO_HOST_PLACEHOLDER: &str = "__PORTICO_TO_HOST__";
const FROM_HOST_PLACEHOLDER: &str = "__PORTICO_FROM_HOST__";
const RESPONSE_PLACEHOLDER: &str = "__PORTICO_RESPONSE__";
const CALL_TIMEOUT_PLACEHOLDER: &str = "__PORTICO_CALL_TIMEOUT__";

fn js_string(value: &str) -> String {
    Value::String(value.to_owned()).to_string()
}

/// Render the client program for one session.
pub fn render(token: &SessionToken, config: &BridgeConfig) -> String {
    CLIENT_TEMPLATE
        .replace(TOKEN_PLACEHOLDER, &js_string(token.as_str()))
        .replace(TO_HOST_PLACEHOLDER, &js_string(TO_HOST_PREFIX))
        .replace(FROM_HOST_PLACEHOLDER, &js_string(FROM_HOST_PREFIX))
        .replace(RESPONSE_PLACEHOLDER, &js_string(RESPONSE_ACTION))
        .replace(CALL_TIMEOUT_PLACEHOLDER, &config.call_timeout_ms.to_string())
}

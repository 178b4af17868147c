// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Portico — Headless console host.
//
// Entry point. Loads settings, initialises logging, wires a bridge session
// with the built-in device actions, and then speaks the console protocol:
// programs for the page go to stdout (one JSON string per line), raw bridge
// messages from the page arrive on stdin (one per line).  Logs go to stderr.

mod services;

use std::process::ExitCode;
use std::sync::Arc;

use portico_bridge::{BridgeSession, ContentSurface};
use portico_core::ShellConfig;
use portico_platform::{default_platform, register_builtins};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

use services::{config, console, data_dir};

#[tokio::main]
async fn main() -> ExitCode {
    let config_path = data_dir::config_path();
    let loaded = config::load(&config_path);
    let settings = match &loaded {
        Ok(Some(settings)) => settings.clone(),
        _ => ShellConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_filter)),
        )
        .init();

    match loaded {
        Ok(Some(_)) => info!(path = %config_path.display(), "settings loaded"),
        Ok(None) => debug!(path = %config_path.display(), "no settings file, using defaults"),
        Err(e) => warn!(path = %config_path.display(), "settings unreadable, using defaults: {e}"),
    }

    info!(content_url = %settings.content_url, "Portico starting");

    let session = match BridgeSession::new(settings.bridge.clone()) {
        Ok(session) => session,
        Err(e) => {
            error!("failed to create bridge session: {e}");
            return ExitCode::FAILURE;
        }
    };

    register_builtins(&session, default_platform());

    let surface: Arc<dyn ContentSurface> = Arc::new(console::stdout_surface());
    if let Err(e) = surface.evaluate_script(&session.bootstrap_script()) {
        error!("failed to emit bootstrap program: {e}");
        return ExitCode::FAILURE;
    }
    session.attach_surface(Some(surface));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if !session.dispatch_inbound(line) {
                        debug!("ignored console line");
                    }
                }
                Ok(None) => {
                    debug!("stdin closed");
                    break;
                }
                Err(e) => {
                    error!("stdin read failed: {e}");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    let grace = settings.bridge.request_timeout();
    if tokio::time::timeout(grace, session.wait_idle()).await.is_err() {
        warn!(
            in_flight = session.handlers_in_flight(),
            "handlers still running at exit"
        );
    }
    session.shutdown();
    info!("Portico stopped");
    ExitCode::SUCCESS
}

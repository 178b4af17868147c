// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Line-oriented console surface.
//
// Each program the bridge wants evaluated is written as one JSON string
// literal per line, so programs containing newlines survive the trip.  A
// driver on the other end reads a line, `JSON.parse`s it and evaluates the
// result in its page.

use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use portico_bridge::ContentSurface;
use portico_core::error::Result;
use serde_json::Value;

/// Writes programs to any `Write` sink, one per line.
pub struct LineSurface<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> LineSurface<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The console host's surface: standard output.
pub fn stdout_surface() -> LineSurface<io::Stdout> {
    LineSurface::new(io::stdout())
}

/// Encode one program as a console line (without the newline).
pub fn encode_line(script: &str) -> String {
    Value::String(script.to_owned()).to_string()
}

impl<W: Write + Send> ContentSurface for LineSurface<W> {
    fn evaluate_script(&self, script: &str) -> Result<()> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(out, "{}", encode_line(script))?;
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_line_programs_stay_on_one_line() {
        let surface = LineSurface::new(Vec::new());
        surface
            .evaluate_script("// header\nwindow.x = 1;")
            .expect("write");
        surface.evaluate_script("true;").expect("write");

        let written = String::from_utf8(surface.into_inner()).expect("utf8");
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: String = serde_json::from_str(lines[0]).expect("json string");
        assert_eq!(first, "// header\nwindow.x = 1;");
    }
}

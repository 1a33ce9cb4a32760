// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide table tracking in-flight command latency, keyed by the
//! command id assigned when an operator's `BackendMessage` enters the
//! relay. A named singleton with explicit init, no implicit lifecycle
//! beyond process life.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

use crate::metrics::names::COMMAND_LATENCY_SECONDS;

static COMMAND_TIMES: OnceLock<Mutex<HashMap<String, Instant>>> = OnceLock::new();

fn table() -> &'static Mutex<HashMap<String, Instant>> {
    COMMAND_TIMES.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Records the start time for `command_id`. Call exactly once, at the
/// point the command is assigned its id on entry to the relay.
pub fn start(command_id: &str) {
    if let Ok(mut times) = table().lock() {
        times.insert(command_id.to_owned(), Instant::now());
    }
}

/// Clears and returns the elapsed time since `start` was called for
/// `command_id`, recording it as a histogram sample. Returns `None` if
/// the id was never started (already finished, or timing skipped).
pub fn finish(command_id: &str, recipient: &'static str) -> Option<Duration> {
    let elapsed = table().lock().ok()?.remove(command_id).map(|t| t.elapsed());
    if let Some(elapsed) = elapsed {
        metrics::histogram!(COMMAND_LATENCY_SECONDS, "recipient" => recipient)
            .record(elapsed.as_secs_f64());
    }
    elapsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_without_start_returns_none() {
        assert!(finish("never-started", "vehicle").is_none());
    }

    #[test]
    fn finish_after_start_returns_elapsed() {
        start("cmd-1");
        let elapsed = finish("cmd-1", "vehicle");
        assert!(elapsed.is_some());
    }

    #[test]
    fn finish_removes_entry_so_second_call_returns_none() {
        start("cmd-2");
        assert!(finish("cmd-2", "vehicle").is_some());
        assert!(finish("cmd-2", "vehicle").is_none());
    }
}

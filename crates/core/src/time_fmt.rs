// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Elapsed-time formatting for log prefixes.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current time as epoch milliseconds.
pub fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Format an elapsed duration, truncated to millisecond precision.
///
/// Renders the largest-unit form used in task log prefixes: `0s`, `750ms`,
/// `1.234s`, `1m0s`, `1h2m3.4s`. Trailing zeros in the fractional seconds
/// are trimmed (`1.230s` renders as `1.23s`).
pub fn format_elapsed(d: Duration) -> String {
    let total_ms = d.as_millis() as u64;
    if total_ms == 0 {
        return "0s".to_string();
    }
    if total_ms < 1000 {
        return format!("{total_ms}ms");
    }

    let secs = total_ms / 1000;
    let frac_ms = total_ms % 1000;
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    let sec_part = if frac_ms == 0 {
        format!("{secs}s")
    } else {
        let mut frac = format!("{frac_ms:03}");
        while frac.ends_with('0') {
            frac.pop();
        }
        format!("{secs}.{frac}s")
    };

    if hours > 0 {
        format!("{hours}h{mins}m{sec_part}")
    } else if mins > 0 {
        format!("{mins}m{sec_part}")
    } else {
        sec_part
    }
}

#[cfg(test)]
#[path = "time_fmt_tests.rs"]
mod tests;

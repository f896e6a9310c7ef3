// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timestamp formatting helpers.
//!
//! Event and manifest timestamps are UTC RFC 3339 with microsecond
//! precision so that string comparison agrees with chronological order.
//! Run directory names use the local clock (see `StorageManager`).

use chrono::{DateTime, SecondsFormat, Utc};

/// Current UTC time as an RFC 3339 string, e.g. `2025-01-15T14:30:22.123456+00:00`.
pub fn utc_now() -> String {
    format_utc(Utc::now())
}

/// Format a UTC instant as RFC 3339 with microsecond precision.
pub fn format_utc(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
#[path = "time_fmt_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fuzzy-interval next-run computation (spec §4.6.1).
//!
//! The jitter is derived deterministically from the scheduled run's seed
//! (plugin name + the run's base instant) rather than sampled from a PRNG
//! and persisted. Recomputing with the same `last_run_at` therefore always
//! yields the same `next_run_at`, which is what "sampled once per scheduled
//! run, not per tick" requires without needing a read-before-write.
//!
//! The spec leaves the jitter magnitude itself unspecified; this crate
//! defaults it to 10% of the interval (symmetric, spec §4.6.1), recorded as
//! an open-question decision in the workspace's DESIGN.md.

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Timelike, Utc};
use ductile_wire::PreferredWindow;

use crate::error::SchedulerError;

/// Default jitter magnitude as a fraction of the interval (open question,
/// see module docs).
pub const DEFAULT_JITTER_FRACTION: f64 = 0.10;

/// Resolve a named interval (spec §4.6.1) to its base duration. `monthly` is
/// approximated as 30 days; cron syntax is explicitly unsupported.
pub fn named_interval(name: &str) -> Result<Duration, SchedulerError> {
    match name {
        "5m" => Ok(Duration::minutes(5)),
        "15m" => Ok(Duration::minutes(15)),
        "30m" => Ok(Duration::minutes(30)),
        "hourly" => Ok(Duration::hours(1)),
        "2h" => Ok(Duration::hours(2)),
        "6h" => Ok(Duration::hours(6)),
        "daily" => Ok(Duration::days(1)),
        "weekly" => Ok(Duration::weeks(1)),
        "monthly" => Ok(Duration::days(30)),
        other => Err(SchedulerError::UnknownInterval(other.to_string())),
    }
}

/// Compute the next-run timestamp and the jitter applied to it (spec
/// §4.6.1). `base` is the plugin's last-successful-run timestamp, or service
/// start if it has never run.
pub fn compute_next_run(
    base: DateTime<Utc>,
    interval_name: &str,
    preferred_window: Option<&PreferredWindow>,
    jitter_seed: &str,
) -> Result<(DateTime<Utc>, i64), SchedulerError> {
    let interval = named_interval(interval_name)?;
    let magnitude_secs = (interval.num_seconds() as f64 * DEFAULT_JITTER_FRACTION) as i64;
    let jitter_secs = sample_jitter_secs(jitter_seed, magnitude_secs.max(1));
    let candidate = base + interval + Duration::seconds(jitter_secs);

    let next_run = match preferred_window {
        Some(window) => snap_to_preferred_window(candidate, window)?,
        None => candidate,
    };

    Ok((next_run, jitter_secs))
}

/// Deterministic pseudo-jitter in `[-magnitude/2, +magnitude/2]`, derived
/// from a FNV-1a hash of the seed so the same scheduled run always rolls the
/// same jitter without needing to persist it (spec §4.6.1).
fn sample_jitter_secs(seed: &str, magnitude_secs: i64) -> i64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in seed.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    let span = (magnitude_secs.max(1) as u64) + 1;
    (hash % span) as i64 - magnitude_secs / 2
}

fn snap_to_preferred_window(
    candidate: DateTime<Utc>,
    window: &PreferredWindow,
) -> Result<DateTime<Utc>, SchedulerError> {
    let start = parse_hhmm(&window.start)?;
    let end = parse_hhmm(&window.end)?;
    let candidate_time = candidate.time();

    let within_window = if start <= end {
        candidate_time >= start && candidate_time <= end
    } else {
        candidate_time >= start || candidate_time <= end
    };
    if within_window {
        return Ok(candidate);
    }

    let snap_date =
        if candidate_time < start { candidate.date_naive() } else { candidate.date_naive() + Duration::days(1) };
    let snapped_naive = snap_date.and_time(start);
    Ok(Utc.from_utc_datetime(&snapped_naive))
}

fn parse_hhmm(s: &str) -> Result<NaiveTime, SchedulerError> {
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|_| SchedulerError::MalformedWindow(s.to_string()))
}

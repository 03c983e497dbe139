//! Dispatch priority for screened requests.
//!
//! Priority starts from a neutral base, adds urgency, time pressure, and
//! volume components, subtracts a fraud penalty, and clamps to 1..=100.
//! Higher means dispatched sooner.

use crate::Urgency;
use chrono::{DateTime, Utc};

/// Neutral starting point before adjustments.
pub const PRIORITY_BASE: i16 = 50;
/// Floor of the final priority.
pub const PRIORITY_MIN: u8 = 1;
/// Ceiling of the final priority.
pub const PRIORITY_MAX: u8 = 100;

/// Combined priority for a request with the given fraud score, evaluated
/// at `now`.
pub fn compute_priority(
    urgency: Urgency,
    required_by: DateTime<Utc>,
    units_needed: u8,
    fraud_score: u8,
    now: DateTime<Utc>,
) -> u8 {
    let hours_left = required_by.signed_duration_since(now).num_seconds() as f64 / 3600.0;

    let score = PRIORITY_BASE
        + i16::from(urgency_points(urgency))
        + i16::from(time_pressure_points(hours_left))
        + i16::from(unit_points(units_needed))
        - i16::from(fraud_penalty(fraud_score));

    score.clamp(i16::from(PRIORITY_MIN), i16::from(PRIORITY_MAX)) as u8
}

fn urgency_points(urgency: Urgency) -> u8 {
    match urgency {
        Urgency::Critical => 40,
        Urgency::High => 30,
        Urgency::Medium => 20,
        Urgency::Low => 10,
    }
}

fn time_pressure_points(hours_left: f64) -> u8 {
    if hours_left <= 6.0 {
        20
    } else if hours_left <= 24.0 {
        15
    } else if hours_left <= 72.0 {
        10
    } else {
        5
    }
}

fn unit_points(units_needed: u8) -> u8 {
    (u16::from(units_needed) * 2).min(10) as u8
}

/// Priority deduction for an elevated fraud score. Thresholds are strict,
/// so a score of exactly 30, 50, or 70 stays in the lower band.
pub fn fraud_penalty(fraud_score: u8) -> u8 {
    if fraud_score > 70 {
        30
    } else if fraud_score > 50 {
        20
    } else if fraud_score > 30 {
        10
    } else {
        0
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Badge tiers derived from a member's authoritative pull-up count.
//!
//! Badges are never stored; they are recomputed from `(count, gender)`.

use crate::models::Gender;
use serde::{Deserialize, Serialize};

/// Badge tiers in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Badge {
    Recruit,
    Proven,
    Hardened,
    Operator,
    Elite,
}

const MALE_THRESHOLDS: [(Badge, u32); 5] = [
    (Badge::Recruit, 5),
    (Badge::Proven, 10),
    (Badge::Hardened, 15),
    (Badge::Operator, 20),
    (Badge::Elite, 25),
];

const FEMALE_THRESHOLDS: [(Badge, u32); 5] = [
    (Badge::Recruit, 1),
    (Badge::Proven, 3),
    (Badge::Hardened, 7),
    (Badge::Operator, 12),
    (Badge::Elite, 15),
];

/// Threshold table for a gender, sorted ascending. Unspecified and `Other`
/// use the male table.
pub fn thresholds(gender: Option<Gender>) -> &'static [(Badge, u32)] {
    match gender {
        Some(Gender::Female) => &FEMALE_THRESHOLDS,
        _ => &MALE_THRESHOLDS,
    }
}

/// Current badge and progress toward the next one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BadgeProgress {
    pub effective_count: u32,
    /// Highest badge whose threshold is met
    pub current: Option<Badge>,
    /// Lowest badge whose threshold is not yet met
    pub next: Option<Badge>,
    pub next_threshold: Option<u32>,
    /// Percent of the way from the current threshold to the next one
    pub progress_to_next: f64,
    /// Percent across the whole ladder; non-decreasing in the count
    pub progress: f64,
}

impl BadgeProgress {
    pub fn compute(effective_count: u32, gender: Option<Gender>) -> Self {
        let table = thresholds(gender);
        let met = table
            .iter()
            .take_while(|(_, threshold)| effective_count >= *threshold)
            .count();

        let current = met.checked_sub(1).map(|i| table[i].0);
        let next = table.get(met).copied();

        let floor = met.checked_sub(1).map(|i| table[i].1).unwrap_or(0);
        let progress_to_next = match next {
            Some((_, ceiling)) => {
                f64::from(effective_count - floor) / f64::from(ceiling - floor) * 100.0
            }
            None => 100.0,
        };

        // Each tier below the top owns an equal band of the overall scale.
        let band = 100.0 / table.len() as f64;
        let progress = match next {
            Some(_) => band * met as f64 + band * progress_to_next / 100.0,
            None => 100.0,
        };

        Self {
            effective_count,
            current,
            next: next.map(|(badge, _)| badge),
            next_threshold: next.map(|(_, threshold)| threshold),
            progress_to_next,
            progress,
        }
    }
}

// Copyright 2025 itscheems
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Weighted compatibility scoring for one (donor, recipient) pair
//!
//! The score has four components, each bounded by its weight:
//! - blood: the full weight once compatibility is confirmed
//! - urgency: a normalized factor in `[0, 1]` times the weight
//! - age: full weight within 10 years, half within 20, otherwise nothing
//! - waiting: one point per 30 days on the list, capped at the weight
//!
//! Components are kept unrounded for ranking. Only the displayed breakdown
//! and total are rounded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
	compatibility::is_compatible,
	types::{Donor, Recipient, ScoreBreakdown, Severity},
};

/// Age assumed when a donor or recipient has none recorded
pub const DEFAULT_AGE: u32 = 30;

/// Urgency factor used when neither PRA score nor severity is recorded
pub const DEFAULT_URGENCY_FACTOR: f64 = 0.5;

const FULL_AGE_WINDOW_YEARS: u32 = 10;
const HALF_AGE_WINDOW_YEARS: u32 = 20;
const DAYS_PER_WAITING_MONTH: i64 = 30;

/// Per-factor weights; the defaults sum to 100
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
	pub blood: f64,
	pub urgency: f64,
	pub age: f64,
	pub waiting: f64,
}

impl Default for ScoreWeights {
	fn default() -> Self {
		Self {
			blood: 40.0,
			urgency: 30.0,
			age: 20.0,
			waiting: 10.0,
		}
	}
}

impl ScoreWeights {
	pub fn total(&self) -> f64 {
		self.blood + self.urgency + self.age + self.waiting
	}

	/// Every weight must be finite and non-negative
	pub fn validate(&self) -> Result<(), String> {
		for (name, value) in [
			("blood", self.blood),
			("urgency", self.urgency),
			("age", self.age),
			("waiting", self.waiting),
		] {
			if !value.is_finite() || value < 0.0 {
				return Err(format!("weight {} must be a non-negative number, got {}", name, value));
			}
		}
		Ok(())
	}
}

/// Unrounded score components
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CompatibilityScore {
	pub blood: f64,
	pub urgency: f64,
	pub age: f64,
	pub waiting: f64,
}

impl CompatibilityScore {
	/// Sum of the unrounded components; this is what ranking sorts on
	pub fn raw_total(&self) -> f64 {
		self.blood + self.urgency + self.age + self.waiting
	}

	/// Displayed total
	pub fn total(&self) -> u32 {
		round_points(self.raw_total())
	}

	/// Displayed per-factor points
	pub fn breakdown(&self) -> ScoreBreakdown {
		ScoreBreakdown {
			blood: round_points(self.blood),
			urgency: round_points(self.urgency),
			age: round_points(self.age),
			waiting: round_points(self.waiting),
		}
	}

	/// Clinical share of the score (blood, urgency, age)
	pub fn medical(&self) -> f64 {
		self.blood + self.urgency + self.age
	}

	/// Non-clinical share of the score (time on the waiting list)
	pub fn non_medical(&self) -> f64 {
		self.waiting
	}
}

fn round_points(value: f64) -> u32 {
	value.round().max(0.0) as u32
}

/// Scoring engine
///
/// Pure and deterministic for a given `now`. Callers filter incompatible
/// pairs before scoring; scoring one is a programming error.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scorer {
	weights: ScoreWeights,
}

impl Scorer {
	pub fn new(weights: ScoreWeights) -> Self {
		Self { weights }
	}

	pub fn weights(&self) -> &ScoreWeights {
		&self.weights
	}

	pub fn score(&self, donor: &Donor, recipient: &Recipient, now: DateTime<Utc>) -> CompatibilityScore {
		debug_assert!(
			is_compatible(donor.blood_group, recipient.blood_group),
			"scored an incompatible pair: donor {} recipient {}",
			donor.blood_group,
			recipient.blood_group
		);

		CompatibilityScore {
			blood: self.weights.blood,
			urgency: urgency_factor(recipient) * self.weights.urgency,
			age: age_points(self.weights.age, donor.age, recipient.age),
			waiting: waiting_points(self.weights.waiting, recipient.waiting_since, now),
		}
	}
}

/// Normalized urgency in `[0, 1]`
///
/// A PRA score wins over categorical severity when both are present.
pub fn urgency_factor(recipient: &Recipient) -> f64 {
	if let Some(pra) = recipient.pra_score
		&& pra.is_finite()
	{
		return pra.clamp(0.0, 100.0) / 100.0;
	}

	match recipient.severity_level {
		Some(Severity::High) => 0.9,
		Some(Severity::Medium) => 0.5,
		Some(Severity::Low) => 0.2,
		None => DEFAULT_URGENCY_FACTOR,
	}
}

/// Age-proximity points for the given weight
pub fn age_points(weight: f64, donor_age: Option<u32>, recipient_age: Option<u32>) -> f64 {
	let donor_age = donor_age.unwrap_or(DEFAULT_AGE);
	let recipient_age = recipient_age.unwrap_or(DEFAULT_AGE);
	let diff = donor_age.abs_diff(recipient_age);

	if diff <= FULL_AGE_WINDOW_YEARS {
		weight
	} else if diff <= HALF_AGE_WINDOW_YEARS {
		weight * 0.5
	} else {
		0.0
	}
}

/// Whole 30-day months between `since` and `now`; a future date counts as zero
pub fn waiting_months(since: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
	let days = (now - since).num_days().max(0);
	days / DAYS_PER_WAITING_MONTH
}

/// Waiting-time points for the given weight
pub fn waiting_points(weight: f64, since: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
	match since {
		Some(since) => (waiting_months(since, now) as f64).min(weight),
		None => 0.0,
	}
}

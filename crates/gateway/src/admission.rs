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

//! Admission control for Gateway
//!
//! Runs after authentication and before the matching core:
//! - Rate limiting per authenticated principal (token subject)
//! - Presence and range checks on request ids

use std::{num::NonZeroU32, sync::Arc};

use dashmap::DashMap;
use governor::{Quota, RateLimiter};
use thiserror::Error;

use crate::auth::Principal;

/// Error types for admission control
#[derive(Debug, Error)]
pub enum AdmissionError {
	#[error("Invalid request: {0}")]
	InvalidRequest(String),
	#[error("Rate limit exceeded")]
	RateLimitExceeded,
	#[error("Invalid rate limit quota: {0}")]
	InvalidQuota(String),
}

type PrincipalRateLimiter = Arc<
	RateLimiter<
		governor::state::direct::NotKeyed,
		governor::state::InMemoryState,
		governor::clock::DefaultClock,
	>,
>;

/// Per-principal rate limiting
///
/// One token bucket per subject, created on first use. Coordinators sharing
/// an account share a bucket.
pub struct AdmissionController {
	rate_limiters: DashMap<String, PrincipalRateLimiter>,
	quota: Quota,
}

impl AdmissionController {
	pub fn new(requests_per_second: u32, burst: u32) -> Result<Self, AdmissionError> {
		let rps = NonZeroU32::new(requests_per_second)
			.ok_or_else(|| AdmissionError::InvalidQuota("requests per second must be > 0".to_string()))?;
		let burst = NonZeroU32::new(burst)
			.ok_or_else(|| AdmissionError::InvalidQuota("burst must be > 0".to_string()))?;
		Ok(Self {
			rate_limiters: DashMap::new(),
			quota: Quota::per_second(rps).allow_burst(burst),
		})
	}

	pub fn check_rate_limit(&self, principal: &Principal) -> Result<(), AdmissionError> {
		let limiter = self
			.rate_limiters
			.entry(principal.id().to_string())
			.or_insert_with(|| Arc::new(RateLimiter::direct(self.quota)))
			.clone();

		limiter
			.check()
			.map_err(|_| AdmissionError::RateLimitExceeded)
	}

	#[cfg(test)]
	pub fn tracked_principals(&self) -> usize {
		self.rate_limiters.len()
	}
}

/// Required id field: present and positive
pub fn require_id(field: &'static str, value: Option<u64>) -> Result<u64, AdmissionError> {
	match value {
		Some(0) => Err(AdmissionError::InvalidRequest(format!(
			"{field} must be a positive integer"
		))),
		Some(id) => Ok(id),
		None => Err(AdmissionError::InvalidRequest(format!("{field} is required"))),
	}
}

/// Optional id field: positive when present
pub fn optional_id(field: &'static str, value: Option<u64>) -> Result<Option<u64>, AdmissionError> {
	value.map(|id| require_id(field, Some(id))).transpose()
}

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

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::{
	compatibility::is_compatible,
	engine::MatchingError,
	scoring::Scorer,
	store::{NewAllocation, RecordStore, bounded},
	types::{AllocationCommand, AllocationOutcome, OrganStatus, RecipientStatus},
};

/// Allocation transaction
///
/// Re-validates the pair against current data, recomputes the score and
/// hands the three writes (match insert, organ ALLOCATED, recipient MATCHED)
/// to the store as one compare-and-swap unit. When two callers race for the
/// same organ the store lets exactly one through; the other gets `Conflict`.
pub struct Allocator {
	store: Arc<dyn RecordStore>,
	scorer: Scorer,
	store_timeout: Duration,
	score_tolerance: f64,
}

impl Allocator {
	pub fn new(
		store: Arc<dyn RecordStore>,
		scorer: Scorer,
		store_timeout: Duration,
		score_tolerance: f64,
	) -> Self {
		Self {
			store,
			scorer,
			store_timeout,
			score_tolerance,
		}
	}

	pub async fn allocate(
		&self,
		command: AllocationCommand,
		now: DateTime<Utc>,
	) -> Result<AllocationOutcome, MatchingError> {
		let organ_id = command
			.organ_id
			.ok_or_else(|| MatchingError::invalid_argument("organ_id is required"))?;
		let recipient_id = command
			.recipient_id
			.ok_or_else(|| MatchingError::invalid_argument("recipient_id is required"))?;
		if let Some(supplied) = command.final_score
			&& !supplied.is_finite()
		{
			return Err(MatchingError::invalid_argument(
				"final_score must be a finite number",
			));
		}

		let organ = bounded(self.store_timeout, self.store.get_organ(organ_id))
			.await?
			.ok_or_else(|| MatchingError::not_found("Organ", organ_id))?;
		match organ.status {
			OrganStatus::Available => {}
			OrganStatus::Allocated => return Err(MatchingError::already_allocated(organ_id)),
			status => return Err(MatchingError::organ_not_available(organ_id, status)),
		}
		if organ.is_logically_expired(now) {
			return Err(MatchingError::organ_expired(organ_id));
		}

		let recipient = bounded(self.store_timeout, self.store.get_recipient(recipient_id))
			.await?
			.ok_or_else(|| MatchingError::not_found("Recipient", recipient_id))?;
		if recipient.status != RecipientStatus::Waiting {
			return Err(MatchingError::recipient_not_waiting(
				recipient_id,
				recipient.status,
			));
		}
		if recipient.organ_needed != organ.organ_type {
			return Err(MatchingError::invalid_argument(format!(
				"recipient {} needs {}, organ {} is {}",
				recipient_id, recipient.organ_needed, organ_id, organ.organ_type
			)));
		}

		let donor = bounded(self.store_timeout, self.store.get_donor(organ.donor_id))
			.await?
			.ok_or_else(|| MatchingError::not_found("Donor", organ.donor_id))?;
		if !is_compatible(donor.blood_group, recipient.blood_group) {
			return Err(MatchingError::invalid_argument(format!(
				"donor blood group {} is incompatible with recipient blood group {}",
				donor.blood_group, recipient.blood_group
			)));
		}

		let score = self.scorer.score(&donor, &recipient, now);
		let final_score = f64::from(score.total());
		if let Some(supplied) = command.final_score
			&& (supplied - final_score).abs() > self.score_tolerance
		{
			warn!(
				target: "matching::allocation",
				organ_id,
				recipient_id,
				supplied,
				recomputed = final_score,
				"Rejected stale final score"
			);
			return Err(MatchingError::invalid_argument(format!(
				"final_score {supplied} differs from current score {final_score}"
			)));
		}

		let allocation = NewAllocation {
			organ_id,
			recipient_id,
			medical_score: score.medical(),
			non_medical_score: score.non_medical(),
			final_score,
			generated_at: now,
		};
		let match_record = match bounded(self.store_timeout, self.store.commit_allocation(allocation)).await {
			Ok(record) => record,
			Err(e) => {
				warn!(
					target: "matching::allocation",
					organ_id,
					recipient_id,
					error = %e,
					"Allocation commit failed"
				);
				return Err(e.into());
			}
		};

		info!(
			target: "matching::allocation",
			organ_id,
			recipient_id,
			match_id = match_record.id,
			final_score,
			"Organ allocated"
		);

		Ok(AllocationOutcome {
			match_record,
			score,
		})
	}
}

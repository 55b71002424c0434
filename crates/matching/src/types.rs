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

pub use lifeline_sdk::types::{
	BloodGroup, Donor, DonorId, HospitalId, MatchId, MatchRecord, MatchStatus, Organ,
	OrganCondition, OrganId, OrganStatus, OrganType, RankedCandidate, RankingStatus, Recipient,
	RecipientId, RecipientStatus, RunMatchingResponse, ScoreBreakdown, Severity, SystemStats,
};
use lifeline_sdk::types::AllocateRequest;

use crate::scoring::CompatibilityScore;

/// Recipient that survived the hard filters, with its score
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
	pub recipient: Recipient,
	pub score: CompatibilityScore,
}

impl ScoredCandidate {
	pub fn to_ranked(&self) -> RankedCandidate {
		RankedCandidate {
			recipient_id: self.recipient.id,
			recipient_name: self.recipient.name.clone(),
			blood_group: self.recipient.blood_group,
			total_score: self.score.total(),
			breakdown: self.score.breakdown(),
		}
	}
}

/// Ordered allocation candidates for one organ
///
/// An empty candidate list is a successful ranking; callers render it
/// through [`Ranking::status`] rather than treating it as an error.
#[derive(Debug, Clone)]
pub struct Ranking {
	pub organ: Organ,
	pub donor: Donor,
	pub candidates: Vec<ScoredCandidate>,
}

impl Ranking {
	pub fn status(&self) -> RankingStatus {
		if self.candidates.is_empty() {
			RankingStatus::NoCandidates
		} else {
			RankingStatus::Ranked
		}
	}

	pub fn is_empty(&self) -> bool {
		self.candidates.is_empty()
	}

	pub fn recipient_ids(&self) -> Vec<RecipientId> {
		self.candidates.iter().map(|c| c.recipient.id).collect()
	}

	pub fn into_response(self) -> RunMatchingResponse {
		let status = self.status();
		let matches: Vec<RankedCandidate> =
			self.candidates.iter().map(ScoredCandidate::to_ranked).collect();
		RunMatchingResponse {
			organ: self.organ,
			status,
			candidate_count: matches.len(),
			matches,
		}
	}
}

/// Allocation command received from the HTTP layer
///
/// Ids are optional here because a missing id is an argument error the
/// allocation transaction reports itself.
#[derive(Debug, Clone, Default)]
pub struct AllocationCommand {
	pub organ_id: Option<OrganId>,
	pub recipient_id: Option<RecipientId>,
	/// Score the caller saw when ranking
	pub final_score: Option<f64>,
}

impl AllocationCommand {
	pub fn new(organ_id: OrganId, recipient_id: RecipientId) -> Self {
		Self {
			organ_id: Some(organ_id),
			recipient_id: Some(recipient_id),
			final_score: None,
		}
	}

	pub fn with_final_score(mut self, final_score: f64) -> Self {
		self.final_score = Some(final_score);
		self
	}
}

impl From<AllocateRequest> for AllocationCommand {
	fn from(req: AllocateRequest) -> Self {
		Self {
			organ_id: req.organ_id,
			recipient_id: req.recipient_id,
			final_score: req.final_score,
		}
	}
}

/// Committed allocation
#[derive(Debug, Clone)]
pub struct AllocationOutcome {
	pub match_record: MatchRecord,
	pub score: CompatibilityScore,
}

/// Organs moved to EXPIRED by one sweep, ascending by id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpirySweep {
	pub expired_ids: Vec<OrganId>,
}

impl ExpirySweep {
	pub fn expired_count(&self) -> usize {
		self.expired_ids.len()
	}
}

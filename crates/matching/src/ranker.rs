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

use std::{cmp::Ordering, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::{
	compatibility::is_compatible,
	engine::MatchingError,
	scoring::Scorer,
	store::{RecipientFilter, RecordStore, bounded},
	types::{OrganId, OrganStatus, Ranking, RecipientStatus, ScoredCandidate},
};

/// Match ranker
///
/// Produces the ordered candidate list for one AVAILABLE organ:
/// 1. Load the organ and its donor
/// 2. Load WAITING recipients needing the organ's type
/// 3. Drop blood-incompatible recipients (hard filter)
/// 4. Score the survivors
/// 5. Sort by unrounded total descending, then recipient id ascending
///
/// Ranking is advisory. Nothing is written, so two concurrent rankings of the
/// same organ may return overlapping candidates.
pub struct Ranker {
	store: Arc<dyn RecordStore>,
	scorer: Scorer,
	store_timeout: Duration,
}

impl Ranker {
	pub fn new(store: Arc<dyn RecordStore>, scorer: Scorer, store_timeout: Duration) -> Self {
		Self {
			store,
			scorer,
			store_timeout,
		}
	}

	pub async fn rank(&self, organ_id: OrganId, now: DateTime<Utc>) -> Result<Ranking, MatchingError> {
		let organ = bounded(self.store_timeout, self.store.get_organ(organ_id))
			.await?
			.ok_or_else(|| MatchingError::not_found("Organ", organ_id))?;

		if organ.status != OrganStatus::Available {
			return Err(MatchingError::organ_not_available(organ_id, organ.status));
		}
		if organ.is_logically_expired(now) {
			return Err(MatchingError::organ_expired(organ_id));
		}

		let donor = bounded(self.store_timeout, self.store.get_donor(organ.donor_id))
			.await?
			.ok_or_else(|| MatchingError::not_found("Donor", organ.donor_id))?;

		let waiting = bounded(
			self.store_timeout,
			self.store
				.list_recipients(RecipientFilter::waiting_for(organ.organ_type)),
		)
		.await?;
		let considered = waiting.len();

		let mut candidates: Vec<ScoredCandidate> = waiting
			.into_iter()
			.filter(|r| r.status == RecipientStatus::Waiting && r.organ_needed == organ.organ_type)
			.filter(|r| is_compatible(donor.blood_group, r.blood_group))
			.map(|recipient| {
				let score = self.scorer.score(&donor, &recipient, now);
				ScoredCandidate { recipient, score }
			})
			.collect();
		sort_candidates(&mut candidates);

		debug!(
			target: "matching::ranker",
			organ_id,
			considered,
			compatible = candidates.len(),
			"Scored waiting recipients"
		);
		info!(
			target: "matching::ranker",
			organ_id,
			organ_type = %organ.organ_type,
			candidates = candidates.len(),
			"Ranked candidates"
		);

		Ok(Ranking {
			organ,
			donor,
			candidates,
		})
	}
}

/// Order candidates by unrounded total descending, ties by recipient id
pub fn sort_candidates(candidates: &mut [ScoredCandidate]) {
	candidates.sort_by(compare_candidates);
}

/// Comparator used by [`sort_candidates`], exposed for callers merging rankings
pub fn compare_candidates(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
	b.score
		.raw_total()
		.total_cmp(&a.score.raw_total())
		.then_with(|| a.recipient.id.cmp(&b.recipient.id))
}

#[cfg(test)]
mod tests {
	use chrono::Duration as ChronoDuration;

	use super::*;
	use crate::{
		scoring::CompatibilityScore,
		store::MemoryRecordStore,
		testing::{donor, organ, recipient},
		types::{BloodGroup, OrganType},
	};

	fn ranker(store: Arc<MemoryRecordStore>) -> Ranker {
		Ranker::new(store, Scorer::default(), Duration::from_secs(1))
	}

	fn scored(id: u64, urgency: f64) -> ScoredCandidate {
		let mut r = recipient("r", BloodGroup::OPos, OrganType::Kidney);
		r.id = id;
		ScoredCandidate {
			recipient: r,
			score: CompatibilityScore {
				blood: 40.0,
				urgency,
				age: 20.0,
				waiting: 0.0,
			},
		}
	}

	#[tokio::test]
	async fn test_hard_filter_drops_incompatible_recipients() {
		let store = Arc::new(MemoryRecordStore::new());
		let d = store.insert_donor(donor(BloodGroup::APos, Some(40))).await.unwrap();
		let o = store
			.insert_organ(organ(d.id, OrganType::Kidney, Utc::now()))
			.await
			.unwrap();

		// O+ cannot receive from A+ no matter how urgent
		let mut urgent = recipient("urgent", BloodGroup::OPos, OrganType::Kidney);
		urgent.pra_score = Some(100.0);
		urgent.waiting_since = Some(Utc::now() - ChronoDuration::days(3000));
		store.insert_recipient(urgent).await.unwrap();
		let ok = store
			.insert_recipient(recipient("ok", BloodGroup::AbPos, OrganType::Kidney))
			.await
			.unwrap();

		let ranking = ranker(store).rank(o.id, Utc::now()).await.unwrap();
		assert_eq!(ranking.recipient_ids(), vec![ok.id]);
	}

	#[tokio::test]
	async fn test_only_waiting_recipients_of_matching_type() {
		let store = Arc::new(MemoryRecordStore::new());
		let d = store.insert_donor(donor(BloodGroup::ONeg, Some(40))).await.unwrap();
		let o = store
			.insert_organ(organ(d.id, OrganType::Liver, Utc::now()))
			.await
			.unwrap();
		store
			.insert_recipient(recipient("kidney", BloodGroup::APos, OrganType::Kidney))
			.await
			.unwrap();
		let mut inactive = recipient("inactive", BloodGroup::APos, OrganType::Liver);
		inactive.status = RecipientStatus::Inactive;
		store.insert_recipient(inactive).await.unwrap();

		let ranking = ranker(store).rank(o.id, Utc::now()).await.unwrap();
		assert!(ranking.is_empty());
		assert_eq!(ranking.status(), crate::types::RankingStatus::NoCandidates);
	}

	#[tokio::test]
	async fn test_missing_and_unavailable_organs() {
		let store = Arc::new(MemoryRecordStore::new());
		let d = store.insert_donor(donor(BloodGroup::ONeg, Some(40))).await.unwrap();
		let mut expired = organ(d.id, OrganType::Heart, Utc::now());
		expired.status = OrganStatus::Expired;
		let expired = store.insert_organ(expired).await.unwrap();

		let stale = store
			.insert_organ(organ(d.id, OrganType::Heart, Utc::now() - ChronoDuration::hours(7)))
			.await
			.unwrap();

		let ranker = ranker(store);
		let err = ranker.rank(99, Utc::now()).await.unwrap_err();
		assert_eq!(err.kind(), crate::engine::ErrorKind::NotFound);

		let err = ranker.rank(expired.id, Utc::now()).await.unwrap_err();
		assert_eq!(err.kind(), crate::engine::ErrorKind::InvalidState);

		// Past its window but not yet swept
		let err = ranker.rank(stale.id, Utc::now()).await.unwrap_err();
		assert_eq!(err.kind(), crate::engine::ErrorKind::InvalidState);
	}

	#[test]
	fn test_sort_descending_with_id_tiebreak() {
		let mut candidates = vec![scored(3, 15.0), scored(1, 24.0), scored(2, 15.0), scored(4, 27.0)];
		sort_candidates(&mut candidates);
		let ids: Vec<u64> = candidates.iter().map(|c| c.recipient.id).collect();
		assert_eq!(ids, vec![4, 1, 2, 3]);
	}

	#[test]
	fn test_sort_uses_unrounded_total() {
		// 15.4 and 14.6 both display as 15 but must not swap
		let mut candidates = vec![scored(1, 14.6), scored(2, 15.4)];
		sort_candidates(&mut candidates);
		assert_eq!(candidates[0].recipient.id, 2);
		assert_eq!(candidates[0].score.total(), candidates[1].score.total());
		assert_eq!(
			compare_candidates(&candidates[0], &candidates[1]),
			Ordering::Less
		);
	}
}

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

mod error;

pub use error::{ErrorKind, MatchingError};

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};

use crate::{
	allocation::Allocator,
	expiry::ExpirySweeper,
	ranker::Ranker,
	scoring::{ScoreWeights, Scorer},
	store::RecordStore,
	types::{AllocationCommand, AllocationOutcome, ExpirySweep, OrganId, Ranking},
};

pub const DEFAULT_SCORE_TOLERANCE: f64 = 5.0;
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the matching engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
	pub weights: ScoreWeights,
	/// Largest accepted gap between a caller's `final_score` and the recomputed one
	pub score_tolerance: f64,
	/// Deadline applied to every individual store call
	pub store_timeout: Duration,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			weights: ScoreWeights::default(),
			score_tolerance: DEFAULT_SCORE_TOLERANCE,
			store_timeout: DEFAULT_STORE_TIMEOUT,
		}
	}
}

/// Matching and allocation core
///
/// Thin facade over the ranker, the allocation transaction and the expiry
/// sweep, all sharing one injected [`RecordStore`]. There are no background
/// tasks: each call is one request and one logical transaction, and
/// cancelling the returned future never leaves partial state behind.
pub struct MatchingEngine {
	store: Arc<dyn RecordStore>,
	scorer: Scorer,
	ranker: Ranker,
	allocator: Allocator,
	sweeper: ExpirySweeper,
}

impl MatchingEngine {
	pub fn new(store: Arc<dyn RecordStore>, config: EngineConfig) -> Self {
		let scorer = Scorer::new(config.weights);
		Self {
			ranker: Ranker::new(store.clone(), scorer, config.store_timeout),
			allocator: Allocator::new(
				store.clone(),
				scorer,
				config.store_timeout,
				config.score_tolerance,
			),
			sweeper: ExpirySweeper::new(store.clone(), config.store_timeout),
			scorer,
			store,
		}
	}

	pub fn store(&self) -> &Arc<dyn RecordStore> {
		&self.store
	}

	pub fn scorer(&self) -> &Scorer {
		&self.scorer
	}

	/// Rank WAITING recipients for an AVAILABLE organ
	pub async fn rank_candidates(&self, organ_id: OrganId) -> Result<Ranking, MatchingError> {
		self.rank_candidates_at(organ_id, Utc::now()).await
	}

	pub async fn rank_candidates_at(
		&self,
		organ_id: OrganId,
		now: DateTime<Utc>,
	) -> Result<Ranking, MatchingError> {
		self.ranker.rank(organ_id, now).await
	}

	/// Allocate an organ to a recipient
	pub async fn allocate(
		&self,
		command: AllocationCommand,
	) -> Result<AllocationOutcome, MatchingError> {
		self.allocate_at(command, Utc::now()).await
	}

	pub async fn allocate_at(
		&self,
		command: AllocationCommand,
		now: DateTime<Utc>,
	) -> Result<AllocationOutcome, MatchingError> {
		self.allocator.allocate(command, now).await
	}

	/// Expire every AVAILABLE organ past its viability window at `now`
	pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<ExpirySweep, MatchingError> {
		self.sweeper.sweep(now).await
	}
}

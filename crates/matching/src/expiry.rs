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
use tracing::{debug, info};

use crate::{
	engine::MatchingError,
	store::{RecordStore, bounded},
	types::ExpirySweep,
};

/// Expiry sweep
///
/// Moves every AVAILABLE organ whose viability window has passed to EXPIRED.
/// The store applies the update conditionally, so an organ allocated while
/// the sweep runs is never expired, and a second sweep with no intervening
/// changes finds nothing.
pub struct ExpirySweeper {
	store: Arc<dyn RecordStore>,
	store_timeout: Duration,
}

impl ExpirySweeper {
	pub fn new(store: Arc<dyn RecordStore>, store_timeout: Duration) -> Self {
		Self {
			store,
			store_timeout,
		}
	}

	pub async fn sweep(&self, now: DateTime<Utc>) -> Result<ExpirySweep, MatchingError> {
		let mut expired_ids = bounded(self.store_timeout, self.store.expire_organs(now)).await?;
		expired_ids.sort_unstable();

		if expired_ids.is_empty() {
			debug!(target: "matching::expiry", %now, "No organs expired");
		} else {
			info!(
				target: "matching::expiry",
				%now,
				expired = expired_ids.len(),
				ids = ?expired_ids,
				"Expired organs"
			);
		}

		Ok(ExpirySweep { expired_ids })
	}
}

#[cfg(test)]
mod tests {
	use chrono::Duration as ChronoDuration;

	use super::*;
	use crate::{
		store::MemoryRecordStore,
		testing::{donor, organ},
		types::{BloodGroup, OrganStatus, OrganType},
	};

	#[tokio::test]
	async fn test_heart_viability_window() {
		let t = Utc::now();
		let store = Arc::new(MemoryRecordStore::new());
		let d = store.insert_donor(donor(BloodGroup::ONeg, None)).await.unwrap();
		let heart = store.insert_organ(organ(d.id, OrganType::Heart, t)).await.unwrap();
		let sweeper = ExpirySweeper::new(store.clone(), Duration::from_secs(1));

		let early = sweeper.sweep(t + ChronoDuration::hours(5)).await.unwrap();
		assert_eq!(early.expired_count(), 0);

		let late = sweeper.sweep(t + ChronoDuration::hours(7)).await.unwrap();
		assert_eq!(late.expired_ids, vec![heart.id]);
		let heart = store.get_organ(heart.id).await.unwrap().unwrap();
		assert_eq!(heart.status, OrganStatus::Expired);

		let again = sweeper.sweep(t + ChronoDuration::hours(7)).await.unwrap();
		assert!(again.expired_ids.is_empty());
	}

	#[tokio::test]
	async fn test_expiry_boundary_is_exclusive() {
		let t = Utc::now();
		let store = Arc::new(MemoryRecordStore::new());
		let d = store.insert_donor(donor(BloodGroup::ONeg, None)).await.unwrap();
		let liver = store.insert_organ(organ(d.id, OrganType::Liver, t)).await.unwrap();
		let sweeper = ExpirySweeper::new(store, Duration::from_secs(1));

		let at_expiry = sweeper.sweep(liver.expiry_time).await.unwrap();
		assert_eq!(at_expiry.expired_count(), 0);
	}
}

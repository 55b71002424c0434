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

use std::{
	collections::BTreeMap,
	sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{NewAllocation, OrganFilter, RecipientFilter, RecordStore, StoreError};
use crate::types::{
	Donor, DonorId, MatchId, MatchRecord, MatchStatus, Organ, OrganCondition, OrganId,
	OrganStatus, Recipient, RecipientId, RecipientStatus, SystemStats,
};

/// Complete contents of a [`MemoryRecordStore`]
///
/// `revision` advances on every mutation, which lets the snapshotter skip
/// saving unchanged state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreTables {
	pub revision: u64,
	pub donors: BTreeMap<DonorId, Donor>,
	pub recipients: BTreeMap<RecipientId, Recipient>,
	pub organs: BTreeMap<OrganId, Organ>,
	pub matches: BTreeMap<MatchId, MatchRecord>,
	/// Highest id ever issued per table, so a deleted id is never reused
	#[serde(default)]
	pub issued: IssuedIds,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedIds {
	pub donors: u64,
	pub recipients: u64,
	pub organs: u64,
	pub matches: u64,
}

impl StoreTables {
	fn next_id<T>(table: &BTreeMap<u64, T>, issued: &mut u64) -> u64 {
		let last = table.keys().next_back().copied().unwrap_or(0);
		let id = last.max(*issued) + 1;
		*issued = id;
		id
	}

	fn touch(&mut self) {
		self.revision += 1;
	}
}

/// In-memory implementation of the Record Store
///
/// All tables sit behind one mutex and no critical section awaits, so each
/// trait call is atomic with respect to every other call. In particular a
/// caller cancelled mid-allocation either sees the whole commit or none of it.
///
/// Characteristics:
/// - No durability on its own; pair with the snapshotter for restarts
/// - Ids are assigned sequentially per table, starting at 1
/// - Listings come back in ascending id order
pub struct MemoryRecordStore {
	tables: Mutex<StoreTables>,
}

impl MemoryRecordStore {
	pub fn new() -> Self {
		Self::from_tables(StoreTables::default())
	}

	/// Rebuild a store from previously captured tables
	pub fn from_tables(tables: StoreTables) -> Self {
		Self {
			tables: Mutex::new(tables),
		}
	}

	/// Copy of the current tables
	pub fn tables(&self) -> Result<StoreTables, StoreError> {
		Ok(self.lock()?.clone())
	}

	pub fn revision(&self) -> Result<u64, StoreError> {
		Ok(self.lock()?.revision)
	}

	fn lock(&self) -> Result<MutexGuard<'_, StoreTables>, StoreError> {
		self.tables
			.lock()
			.map_err(|_| StoreError::Unavailable("record store lock poisoned".to_string()))
	}
}

impl Default for MemoryRecordStore {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
	async fn get_donor(&self, id: DonorId) -> Result<Option<Donor>, StoreError> {
		Ok(self.lock()?.donors.get(&id).cloned())
	}

	async fn list_donors(&self) -> Result<Vec<Donor>, StoreError> {
		Ok(self.lock()?.donors.values().cloned().collect())
	}

	async fn insert_donor(&self, mut donor: Donor) -> Result<Donor, StoreError> {
		let mut tables = self.lock()?;
		let tables = &mut *tables;
		donor.id = StoreTables::next_id(&tables.donors, &mut tables.issued.donors);
		tables.donors.insert(donor.id, donor.clone());
		tables.touch();
		Ok(donor)
	}

	async fn update_donor(&self, donor: Donor) -> Result<Donor, StoreError> {
		let mut tables = self.lock()?;
		let slot = tables
			.donors
			.get_mut(&donor.id)
			.ok_or_else(|| StoreError::not_found("Donor", donor.id))?;
		*slot = donor.clone();
		tables.touch();
		Ok(donor)
	}

	async fn delete_donor(&self, id: DonorId) -> Result<(), StoreError> {
		let mut tables = self.lock()?;
		if !tables.donors.contains_key(&id) {
			return Err(StoreError::not_found("Donor", id));
		}
		if let Some(organ) = tables.organs.values().find(|o| o.donor_id == id) {
			return Err(StoreError::Referenced {
				entity: "Donor",
				id,
				by: format!("organ {}", organ.id),
			});
		}
		tables.donors.remove(&id);
		tables.touch();
		Ok(())
	}

	async fn get_recipient(&self, id: RecipientId) -> Result<Option<Recipient>, StoreError> {
		Ok(self.lock()?.recipients.get(&id).cloned())
	}

	async fn list_recipients(&self, filter: RecipientFilter) -> Result<Vec<Recipient>, StoreError> {
		Ok(self
			.lock()?
			.recipients
			.values()
			.filter(|r| filter.matches(r))
			.cloned()
			.collect())
	}

	async fn insert_recipient(&self, mut recipient: Recipient) -> Result<Recipient, StoreError> {
		let mut tables = self.lock()?;
		let tables = &mut *tables;
		recipient.id = StoreTables::next_id(&tables.recipients, &mut tables.issued.recipients);
		tables.recipients.insert(recipient.id, recipient.clone());
		tables.touch();
		Ok(recipient)
	}

	async fn update_recipient(
		&self,
		recipient: Recipient,
		expected_status: RecipientStatus,
	) -> Result<Recipient, StoreError> {
		let mut tables = self.lock()?;
		let slot = tables
			.recipients
			.get_mut(&recipient.id)
			.ok_or_else(|| StoreError::not_found("Recipient", recipient.id))?;
		if slot.status != expected_status {
			return Err(StoreError::RecipientChanged {
				recipient_id: recipient.id,
				status: slot.status,
			});
		}
		*slot = recipient.clone();
		tables.touch();
		Ok(recipient)
	}

	async fn delete_recipient(&self, id: RecipientId) -> Result<(), StoreError> {
		let mut tables = self.lock()?;
		if !tables.recipients.contains_key(&id) {
			return Err(StoreError::not_found("Recipient", id));
		}
		if let Some(record) = tables.matches.values().find(|m| m.recipient_id == id) {
			return Err(StoreError::Referenced {
				entity: "Recipient",
				id,
				by: format!("{} match {}", record.status, record.id),
			});
		}
		tables.recipients.remove(&id);
		tables.touch();
		Ok(())
	}

	async fn get_organ(&self, id: OrganId) -> Result<Option<Organ>, StoreError> {
		Ok(self.lock()?.organs.get(&id).cloned())
	}

	async fn list_organs(&self, filter: OrganFilter) -> Result<Vec<Organ>, StoreError> {
		Ok(self
			.lock()?
			.organs
			.values()
			.filter(|o| filter.matches(o))
			.cloned()
			.collect())
	}

	async fn insert_organ(&self, mut organ: Organ) -> Result<Organ, StoreError> {
		let mut tables = self.lock()?;
		let tables = &mut *tables;
		organ.id = StoreTables::next_id(&tables.organs, &mut tables.issued.organs);
		tables.organs.insert(organ.id, organ.clone());
		tables.touch();
		Ok(organ)
	}

	async fn transition_organ(
		&self,
		id: OrganId,
		from: &[OrganStatus],
		to: OrganStatus,
	) -> Result<Organ, StoreError> {
		let mut tables = self.lock()?;
		let organ = tables
			.organs
			.get_mut(&id)
			.ok_or_else(|| StoreError::not_found("Organ", id))?;
		if !from.contains(&organ.status) {
			return Err(StoreError::OrganTransition {
				organ_id: id,
				from: organ.status,
				to,
			});
		}
		organ.status = to;
		let updated = organ.clone();
		tables.touch();
		Ok(updated)
	}

	async fn set_organ_condition(
		&self,
		id: OrganId,
		condition: OrganCondition,
	) -> Result<Organ, StoreError> {
		let mut tables = self.lock()?;
		let organ = tables
			.organs
			.get_mut(&id)
			.ok_or_else(|| StoreError::not_found("Organ", id))?;
		organ.condition = condition;
		let updated = organ.clone();
		tables.touch();
		Ok(updated)
	}

	async fn delete_organ(&self, id: OrganId) -> Result<(), StoreError> {
		let mut tables = self.lock()?;
		if !tables.organs.contains_key(&id) {
			return Err(StoreError::not_found("Organ", id));
		}
		if let Some(record) = tables.matches.values().find(|m| m.organ_id == id) {
			return Err(StoreError::Referenced {
				entity: "Organ",
				id,
				by: format!("{} match {}", record.status, record.id),
			});
		}
		tables.organs.remove(&id);
		tables.touch();
		Ok(())
	}

	async fn get_match(&self, id: MatchId) -> Result<Option<MatchRecord>, StoreError> {
		Ok(self.lock()?.matches.get(&id).cloned())
	}

	async fn list_matches(&self) -> Result<Vec<MatchRecord>, StoreError> {
		Ok(self.lock()?.matches.values().cloned().collect())
	}

	async fn insert_match(&self, mut record: MatchRecord) -> Result<MatchRecord, StoreError> {
		let mut tables = self.lock()?;
		let tables = &mut *tables;
		record.id = StoreTables::next_id(&tables.matches, &mut tables.issued.matches);
		tables.matches.insert(record.id, record.clone());
		tables.touch();
		Ok(record)
	}

	async fn commit_allocation(&self, allocation: NewAllocation) -> Result<MatchRecord, StoreError> {
		let mut tables = self.lock()?;
		let tables = &mut *tables;

		// Check both compare-and-swap conditions before writing anything
		let organ_status = tables
			.organs
			.get(&allocation.organ_id)
			.map(|o| o.status)
			.ok_or_else(|| StoreError::not_found("Organ", allocation.organ_id))?;
		if organ_status != OrganStatus::Available {
			return Err(StoreError::OrganUnavailable {
				organ_id: allocation.organ_id,
				status: organ_status,
			});
		}

		let recipient_status = tables
			.recipients
			.get(&allocation.recipient_id)
			.map(|r| r.status)
			.ok_or_else(|| StoreError::not_found("Recipient", allocation.recipient_id))?;
		if recipient_status != RecipientStatus::Waiting {
			return Err(StoreError::RecipientUnavailable {
				recipient_id: allocation.recipient_id,
				status: recipient_status,
			});
		}

		let record = MatchRecord {
			id: StoreTables::next_id(&tables.matches, &mut tables.issued.matches),
			organ_id: allocation.organ_id,
			recipient_id: allocation.recipient_id,
			medical_score: Some(allocation.medical_score),
			non_medical_score: Some(allocation.non_medical_score),
			final_score: Some(allocation.final_score),
			status: MatchStatus::Selected,
			generated_at: allocation.generated_at,
		};
		tables.matches.insert(record.id, record.clone());

		if let Some(organ) = tables.organs.get_mut(&allocation.organ_id) {
			organ.status = OrganStatus::Allocated;
			organ.allocated_to_match_id = Some(record.id);
		}
		if let Some(recipient) = tables.recipients.get_mut(&allocation.recipient_id) {
			recipient.status = RecipientStatus::Matched;
		}
		tables.touch();

		Ok(record)
	}

	async fn expire_organs(&self, now: DateTime<Utc>) -> Result<Vec<OrganId>, StoreError> {
		let mut tables = self.lock()?;
		let mut expired = Vec::new();

		for organ in tables.organs.values_mut() {
			if organ.status == OrganStatus::Available && organ.expiry_time < now {
				organ.status = OrganStatus::Expired;
				expired.push(organ.id);
			}
		}

		if !expired.is_empty() {
			tables.touch();
		}
		Ok(expired)
	}

	async fn stats(&self) -> Result<SystemStats, StoreError> {
		let tables = self.lock()?;
		Ok(SystemStats {
			donors: tables.donors.len(),
			recipients: tables.recipients.len(),
			organs: tables.organs.len(),
			matches: tables.matches.len(),
			selected_matches: tables
				.matches
				.values()
				.filter(|m| m.status == MatchStatus::Selected)
				.count(),
			available_organs: tables
				.organs
				.values()
				.filter(|o| o.status == OrganStatus::Available)
				.count(),
			waiting_recipients: tables
				.recipients
				.values()
				.filter(|r| r.status == RecipientStatus::Waiting)
				.count(),
		})
	}
}

#[cfg(test)]
mod tests {
	use chrono::Duration;

	use super::*;
	use crate::types::{BloodGroup, OrganCondition, OrganType};

	fn organ(organ_type: OrganType, retrieval: DateTime<Utc>) -> Organ {
		Organ {
			id: 0,
			donor_id: 1,
			hospital_id: None,
			organ_type,
			blood_group: BloodGroup::ONeg,
			condition: OrganCondition::Good,
			retrieval_time: retrieval,
			expiry_time: retrieval + organ_type.viability_window(),
			hla_code: None,
			status: OrganStatus::Available,
			allocated_to_match_id: None,
		}
	}

	fn recipient(name: &str) -> Recipient {
		Recipient {
			id: 0,
			name: name.to_string(),
			age: Some(40),
			gender: None,
			blood_group: BloodGroup::APos,
			organ_needed: OrganType::Kidney,
			hospital_id: None,
			severity_level: None,
			pra_score: None,
			hla_code: None,
			crossmatch_result: None,
			status: RecipientStatus::Waiting,
			waiting_since: None,
		}
	}

	fn allocation(organ_id: OrganId, recipient_id: RecipientId) -> NewAllocation {
		NewAllocation {
			organ_id,
			recipient_id,
			medical_score: 80.0,
			non_medical_score: 5.0,
			final_score: 85.0,
			generated_at: Utc::now(),
		}
	}

	#[tokio::test]
	async fn test_insert_assigns_sequential_ids() {
		let store = MemoryRecordStore::new();
		let a = store.insert_recipient(recipient("a")).await.unwrap();
		let b = store.insert_recipient(recipient("b")).await.unwrap();
		assert_eq!((a.id, b.id), (1, 2));
		assert_eq!(store.revision().unwrap(), 2);
	}

	#[tokio::test]
	async fn test_commit_allocation_applies_all_writes() {
		let store = MemoryRecordStore::new();
		let o = store.insert_organ(organ(OrganType::Kidney, Utc::now())).await.unwrap();
		let r = store.insert_recipient(recipient("a")).await.unwrap();

		let record = store.commit_allocation(allocation(o.id, r.id)).await.unwrap();
		assert_eq!(record.status, MatchStatus::Selected);

		let o = store.get_organ(o.id).await.unwrap().unwrap();
		assert_eq!(o.status, OrganStatus::Allocated);
		assert_eq!(o.allocated_to_match_id, Some(record.id));
		let r = store.get_recipient(r.id).await.unwrap().unwrap();
		assert_eq!(r.status, RecipientStatus::Matched);
	}

	#[tokio::test]
	async fn test_commit_allocation_is_all_or_nothing() {
		let store = MemoryRecordStore::new();
		let o = store.insert_organ(organ(OrganType::Kidney, Utc::now())).await.unwrap();
		let r1 = store.insert_recipient(recipient("a")).await.unwrap();
		let r2 = store.insert_recipient(recipient("b")).await.unwrap();

		store.commit_allocation(allocation(o.id, r1.id)).await.unwrap();
		let revision = store.revision().unwrap();

		let err = store.commit_allocation(allocation(o.id, r2.id)).await.unwrap_err();
		assert!(matches!(
			err,
			StoreError::OrganUnavailable {
				status: OrganStatus::Allocated,
				..
			}
		));

		// Second recipient untouched, no second match
		let r2 = store.get_recipient(r2.id).await.unwrap().unwrap();
		assert_eq!(r2.status, RecipientStatus::Waiting);
		assert_eq!(store.list_matches().await.unwrap().len(), 1);
		assert_eq!(store.revision().unwrap(), revision);
	}

	#[tokio::test]
	async fn test_commit_allocation_rejects_matched_recipient() {
		let store = MemoryRecordStore::new();
		let o1 = store.insert_organ(organ(OrganType::Kidney, Utc::now())).await.unwrap();
		let o2 = store.insert_organ(organ(OrganType::Kidney, Utc::now())).await.unwrap();
		let r = store.insert_recipient(recipient("a")).await.unwrap();

		store.commit_allocation(allocation(o1.id, r.id)).await.unwrap();
		let err = store.commit_allocation(allocation(o2.id, r.id)).await.unwrap_err();
		assert!(matches!(err, StoreError::RecipientUnavailable { .. }));

		let o2 = store.get_organ(o2.id).await.unwrap().unwrap();
		assert_eq!(o2.status, OrganStatus::Available);
	}

	#[tokio::test]
	async fn test_expire_organs_only_touches_available() {
		let store = MemoryRecordStore::new();
		let t = Utc::now() - Duration::hours(7);
		let heart = store.insert_organ(organ(OrganType::Heart, t)).await.unwrap();
		let kidney = store.insert_organ(organ(OrganType::Kidney, t)).await.unwrap();
		let mut allocated = organ(OrganType::Heart, t);
		allocated.status = OrganStatus::Allocated;
		store.insert_organ(allocated).await.unwrap();

		let expired = store.expire_organs(Utc::now()).await.unwrap();
		assert_eq!(expired, vec![heart.id]);

		let kidney = store.get_organ(kidney.id).await.unwrap().unwrap();
		assert_eq!(kidney.status, OrganStatus::Available);

		assert!(store.expire_organs(Utc::now()).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_filters_and_stats() {
		let store = MemoryRecordStore::new();
		store.insert_organ(organ(OrganType::Kidney, Utc::now())).await.unwrap();
		store.insert_organ(organ(OrganType::Heart, Utc::now())).await.unwrap();
		let mut liver_patient = recipient("b");
		liver_patient.organ_needed = OrganType::Liver;
		store.insert_recipient(recipient("a")).await.unwrap();
		store.insert_recipient(liver_patient).await.unwrap();

		let kidneys = store
			.list_organs(OrganFilter {
				organ_type: Some(OrganType::Kidney),
				..OrganFilter::default()
			})
			.await
			.unwrap();
		assert_eq!(kidneys.len(), 1);

		let waiting = store
			.list_recipients(RecipientFilter::waiting_for(OrganType::Liver))
			.await
			.unwrap();
		assert_eq!(waiting.len(), 1);
		assert_eq!(waiting[0].name, "b");

		let stats = store.stats().await.unwrap();
		assert_eq!(stats.organs, 2);
		assert_eq!(stats.available_organs, 2);
		assert_eq!(stats.waiting_recipients, 2);
		assert_eq!(stats.matches, 0);
	}

	#[tokio::test]
	async fn test_transition_organ_checks_current_status() {
		let store = MemoryRecordStore::new();
		let o = store.insert_organ(organ(OrganType::Kidney, Utc::now())).await.unwrap();
		let r = store.insert_recipient(recipient("a")).await.unwrap();
		let record = store.commit_allocation(allocation(o.id, r.id)).await.unwrap();
		let revision = store.revision().unwrap();

		let err = store
			.transition_organ(o.id, &[OrganStatus::Available], OrganStatus::Expired)
			.await
			.unwrap_err();
		assert!(matches!(err, StoreError::OrganTransition { from: OrganStatus::Allocated, .. }));
		assert_eq!(store.revision().unwrap(), revision);

		let organ = store.get_organ(o.id).await.unwrap().unwrap();
		assert_eq!(organ.status, OrganStatus::Allocated);
		assert_eq!(organ.allocated_to_match_id, Some(record.id));

		let done = store
			.transition_organ(
				o.id,
				&[OrganStatus::Available, OrganStatus::Allocated],
				OrganStatus::Transplanted,
			)
			.await
			.unwrap();
		assert_eq!(done.status, OrganStatus::Transplanted);
	}

	#[tokio::test]
	async fn test_update_recipient_is_conditional_on_status() {
		let store = MemoryRecordStore::new();
		let o = store.insert_organ(organ(OrganType::Kidney, Utc::now())).await.unwrap();
		let r = store.insert_recipient(recipient("a")).await.unwrap();

		// Read while WAITING, then an allocation lands before the write
		let mut stale = r.clone();
		stale.status = RecipientStatus::Inactive;
		store.commit_allocation(allocation(o.id, r.id)).await.unwrap();

		let err = store
			.update_recipient(stale, RecipientStatus::Waiting)
			.await
			.unwrap_err();
		assert!(matches!(
			err,
			StoreError::RecipientChanged { status: RecipientStatus::Matched, .. }
		));
		let current = store.get_recipient(r.id).await.unwrap().unwrap();
		assert_eq!(current.status, RecipientStatus::Matched);
	}

	#[tokio::test]
	async fn test_deletes_refuse_referenced_records() {
		let store = MemoryRecordStore::new();
		let d = store
			.insert_donor(Donor {
				id: 0,
				name: "d".to_string(),
				age: None,
				gender: None,
				blood_group: BloodGroup::ONeg,
				donor_type: None,
				consent: true,
				medical_notes: None,
				registered_at: Utc::now(),
			})
			.await
			.unwrap();
		let o = store.insert_organ(organ(OrganType::Kidney, Utc::now())).await.unwrap();
		let r = store.insert_recipient(recipient("a")).await.unwrap();
		store.commit_allocation(allocation(o.id, r.id)).await.unwrap();

		let err = store.delete_organ(o.id).await.unwrap_err();
		assert!(matches!(err, StoreError::Referenced { entity: "Organ", .. }));
		let err = store.delete_recipient(r.id).await.unwrap_err();
		assert!(matches!(err, StoreError::Referenced { entity: "Recipient", .. }));
		let err = store.delete_donor(d.id).await.unwrap_err();
		assert!(matches!(err, StoreError::Referenced { entity: "Donor", .. }));

		assert!(store.get_organ(o.id).await.unwrap().is_some());
		assert_eq!(store.list_matches().await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn test_deleted_ids_are_not_reissued() {
		let store = MemoryRecordStore::new();
		store.insert_recipient(recipient("a")).await.unwrap();
		let b = store.insert_recipient(recipient("b")).await.unwrap();
		store.delete_recipient(b.id).await.unwrap();
		assert!(store.get_recipient(b.id).await.unwrap().is_none());

		let c = store.insert_recipient(recipient("c")).await.unwrap();
		assert_eq!(c.id, 3);

		let err = store.delete_recipient(b.id).await.unwrap_err();
		assert!(matches!(err, StoreError::NotFound { .. }));
	}
}

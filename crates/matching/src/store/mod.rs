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

mod memory;

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use memory::{IssuedIds, MemoryRecordStore, StoreTables};

use crate::types::{
	Donor, DonorId, MatchId, MatchRecord, Organ, OrganCondition, OrganId, OrganStatus, OrganType,
	Recipient, RecipientId, RecipientStatus, SystemStats,
};

/// Error types for Record Store operations
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("{entity} {id} not found")]
	NotFound { entity: &'static str, id: u64 },
	#[error("Organ {organ_id} is {status}, not AVAILABLE")]
	OrganUnavailable {
		organ_id: OrganId,
		status: OrganStatus,
	},
	#[error("Recipient {recipient_id} is {status}, not WAITING")]
	RecipientUnavailable {
		recipient_id: RecipientId,
		status: RecipientStatus,
	},
	/// A conditional status change found a status it does not apply to
	#[error("Organ {organ_id} cannot move from {from} to {to}")]
	OrganTransition {
		organ_id: OrganId,
		from: OrganStatus,
		to: OrganStatus,
	},
	/// The recipient's status changed between read and write
	#[error("Recipient {recipient_id} changed to {status} concurrently")]
	RecipientChanged {
		recipient_id: RecipientId,
		status: RecipientStatus,
	},
	#[error("{entity} {id} is still referenced by {by}")]
	Referenced {
		entity: &'static str,
		id: u64,
		by: String,
	},
	#[error("Store unavailable: {0}")]
	Unavailable(String),
	#[error("Store call timed out after {0:?}")]
	Timeout(Duration),
}

impl StoreError {
	pub fn not_found(entity: &'static str, id: u64) -> Self {
		StoreError::NotFound { entity, id }
	}
}

/// Filter for organ listings; `None` fields match everything
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrganFilter {
	pub status: Option<OrganStatus>,
	pub organ_type: Option<OrganType>,
}

impl OrganFilter {
	pub fn matches(&self, organ: &Organ) -> bool {
		self.status.is_none_or(|s| organ.status == s)
			&& self.organ_type.is_none_or(|t| organ.organ_type == t)
	}
}

/// Filter for recipient listings; `None` fields match everything
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecipientFilter {
	pub status: Option<RecipientStatus>,
	pub organ_needed: Option<OrganType>,
}

impl RecipientFilter {
	/// WAITING recipients who need the given organ type
	pub fn waiting_for(organ_type: OrganType) -> Self {
		Self {
			status: Some(RecipientStatus::Waiting),
			organ_needed: Some(organ_type),
		}
	}

	pub fn matches(&self, recipient: &Recipient) -> bool {
		self.status.is_none_or(|s| recipient.status == s)
			&& self.organ_needed.is_none_or(|t| recipient.organ_needed == t)
	}
}

/// The three writes of an allocation, committed as one unit
#[derive(Debug, Clone, PartialEq)]
pub struct NewAllocation {
	pub organ_id: OrganId,
	pub recipient_id: RecipientId,
	pub medical_score: f64,
	pub non_medical_score: f64,
	pub final_score: f64,
	pub generated_at: DateTime<Utc>,
}

/// Record Store trait - the persistence boundary of the allocation core
///
/// The store owns donors, recipients, organs and matches. It is injected
/// into the ranker, the allocation transaction, the expiry sweep and the
/// registry as `Arc<dyn RecordStore>`.
///
/// Key semantic constraints:
/// - `insert_*` assign the id; the `id` field of the argument is ignored
/// - listings are ordered by ascending id
/// - `commit_allocation` is the only path that moves an organ to ALLOCATED,
///   and it either applies all three writes or none
/// - status changes outside allocation are conditional on the current status
/// - deletes never leave a match, organ or recipient dangling
/// - `expire_organs` only touches organs that are still AVAILABLE
///
/// This abstraction is implementation-agnostic: it can be backed by
/// in-memory structures or a relational database whose transactions
/// provide the same all-or-nothing guarantee.
#[async_trait]
pub trait RecordStore: Send + Sync {
	async fn get_donor(&self, id: DonorId) -> Result<Option<Donor>, StoreError>;

	async fn list_donors(&self) -> Result<Vec<Donor>, StoreError>;

	async fn insert_donor(&self, donor: Donor) -> Result<Donor, StoreError>;

	/// Replace an existing donor record
	async fn update_donor(&self, donor: Donor) -> Result<Donor, StoreError>;

	/// Refused with `Referenced` while any organ came from the donor
	async fn delete_donor(&self, id: DonorId) -> Result<(), StoreError>;

	async fn get_recipient(&self, id: RecipientId) -> Result<Option<Recipient>, StoreError>;

	async fn list_recipients(&self, filter: RecipientFilter) -> Result<Vec<Recipient>, StoreError>;

	async fn insert_recipient(&self, recipient: Recipient) -> Result<Recipient, StoreError>;

	/// Replace an existing recipient record, provided its status is still
	/// `expected_status`; otherwise `RecipientChanged` and nothing is written
	async fn update_recipient(
		&self,
		recipient: Recipient,
		expected_status: RecipientStatus,
	) -> Result<Recipient, StoreError>;

	/// Refused with `Referenced` while any match record points at the recipient
	async fn delete_recipient(&self, id: RecipientId) -> Result<(), StoreError>;

	async fn get_organ(&self, id: OrganId) -> Result<Option<Organ>, StoreError>;

	async fn list_organs(&self, filter: OrganFilter) -> Result<Vec<Organ>, StoreError>;

	async fn insert_organ(&self, organ: Organ) -> Result<Organ, StoreError>;

	/// Conditional status change: applies only while the organ's status is one
	/// of `from`, otherwise `OrganTransition` and nothing is written
	async fn transition_organ(
		&self,
		id: OrganId,
		from: &[OrganStatus],
		to: OrganStatus,
	) -> Result<Organ, StoreError>;

	async fn set_organ_condition(
		&self,
		id: OrganId,
		condition: OrganCondition,
	) -> Result<Organ, StoreError>;

	/// Refused with `Referenced` while any match record points at the organ
	async fn delete_organ(&self, id: OrganId) -> Result<(), StoreError>;

	async fn get_match(&self, id: MatchId) -> Result<Option<MatchRecord>, StoreError>;

	async fn list_matches(&self) -> Result<Vec<MatchRecord>, StoreError>;

	async fn insert_match(&self, record: MatchRecord) -> Result<MatchRecord, StoreError>;

	/// Atomically insert a SELECTED match, move the organ from AVAILABLE to
	/// ALLOCATED and the recipient from WAITING to MATCHED
	///
	/// Fails with `OrganUnavailable` / `RecipientUnavailable` when the
	/// compare-and-swap on either status loses, leaving every record as it was.
	async fn commit_allocation(&self, allocation: NewAllocation) -> Result<MatchRecord, StoreError>;

	/// Move every AVAILABLE organ with `expiry_time < now` to EXPIRED and
	/// return the affected ids in ascending order
	async fn expire_organs(&self, now: DateTime<Utc>) -> Result<Vec<OrganId>, StoreError>;

	async fn stats(&self) -> Result<SystemStats, StoreError>;
}

/// Run a store call under a deadline
///
/// Dropping the call on timeout is safe because every store mutation is a
/// single all-or-nothing unit.
pub async fn bounded<T, F>(timeout: Duration, call: F) -> Result<T, StoreError>
where
	F: Future<Output = Result<T, StoreError>>,
{
	match tokio::time::timeout(timeout, call).await {
		Ok(result) => result,
		Err(_) => Err(StoreError::Timeout(timeout)),
	}
}

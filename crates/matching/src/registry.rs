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
use lifeline_sdk::types::{
	RecordMatchRequest, RegisterDonorRequest, RegisterOrganRequest, RegisterRecipientRequest,
	UpdateDonorRequest, UpdateOrganRequest, UpdateRecipientRequest,
};
use tracing::info;

use crate::{
	engine::MatchingError,
	store::{OrganFilter, RecipientFilter, RecordStore, bounded},
	types::{
		Donor, DonorId, MatchId, MatchRecord, MatchStatus, Organ, OrganCondition, OrganId,
		OrganStatus, Recipient, RecipientId, RecipientStatus, SystemStats,
	},
};

/// Registration and lookup of donors, recipients, organs and matches
///
/// Everything here is plain record keeping. Status moves are limited to the
/// manual overrides of [`Registry::update_organ_status`] and
/// [`Registry::update_recipient`]; ALLOCATED and MATCHED are reserved for the
/// allocation transaction. Deletes are refused while another record refers
/// to the target.
pub struct Registry {
	store: Arc<dyn RecordStore>,
	store_timeout: Duration,
}

impl Registry {
	pub fn new(store: Arc<dyn RecordStore>, store_timeout: Duration) -> Self {
		Self {
			store,
			store_timeout,
		}
	}

	pub async fn register_donor(
		&self,
		req: RegisterDonorRequest,
		now: DateTime<Utc>,
	) -> Result<Donor, MatchingError> {
		let name = required_name(&req.name)?;
		let donor = Donor {
			id: 0,
			name,
			age: req.age,
			gender: req.gender,
			blood_group: req.blood_group,
			donor_type: req.donor_type,
			consent: req.consent,
			medical_notes: req.medical_notes,
			registered_at: now,
		};
		let donor = bounded(self.store_timeout, self.store.insert_donor(donor)).await?;
		info!(target: "registry", donor_id = donor.id, blood_group = %donor.blood_group, "Donor registered");
		Ok(donor)
	}

	pub async fn register_recipient(
		&self,
		req: RegisterRecipientRequest,
		now: DateTime<Utc>,
	) -> Result<Recipient, MatchingError> {
		let name = required_name(&req.name)?;
		validate_pra(req.pra_score)?;

		let recipient = Recipient {
			id: 0,
			name,
			age: req.age,
			gender: req.gender,
			blood_group: req.blood_group,
			organ_needed: req.organ_needed,
			hospital_id: req.hospital_id,
			severity_level: req.severity_level,
			pra_score: req.pra_score,
			hla_code: req.hla_code,
			crossmatch_result: req.crossmatch_result,
			status: RecipientStatus::Waiting,
			waiting_since: Some(req.waiting_since.unwrap_or(now)),
		};
		let recipient = bounded(self.store_timeout, self.store.insert_recipient(recipient)).await?;
		info!(
			target: "registry",
			recipient_id = recipient.id,
			organ_needed = %recipient.organ_needed,
			"Recipient registered"
		);
		Ok(recipient)
	}

	/// Register a retrieved organ; expiry follows from the organ type's viability window
	pub async fn register_organ(
		&self,
		req: RegisterOrganRequest,
		now: DateTime<Utc>,
	) -> Result<Organ, MatchingError> {
		let donor = self.get_donor(req.donor_id).await?;
		let retrieval_time = req.retrieval_time.unwrap_or(now);

		let organ = Organ {
			id: 0,
			donor_id: donor.id,
			hospital_id: req.hospital_id,
			organ_type: req.organ_type,
			blood_group: req.blood_group.unwrap_or(donor.blood_group),
			condition: req.condition.unwrap_or(OrganCondition::Good),
			retrieval_time,
			expiry_time: retrieval_time + req.organ_type.viability_window(),
			hla_code: req.hla_code,
			status: OrganStatus::Available,
			allocated_to_match_id: None,
		};
		let organ = bounded(self.store_timeout, self.store.insert_organ(organ)).await?;
		info!(
			target: "registry",
			organ_id = organ.id,
			organ_type = %organ.organ_type,
			expiry_time = %organ.expiry_time,
			"Organ registered"
		);
		Ok(organ)
	}

	/// Manual status override
	///
	/// EXPIRED applies to AVAILABLE organs only; an allocated organ keeps its
	/// match and recipient, so it can only go on to TRANSPLANTED. The store
	/// checks the current status in the same step as the write.
	pub async fn update_organ_status(
		&self,
		organ_id: OrganId,
		status: OrganStatus,
	) -> Result<Organ, MatchingError> {
		let from = override_sources(status)?;
		let organ = bounded(
			self.store_timeout,
			self.store.transition_organ(organ_id, from, status),
		)
		.await?;
		info!(target: "registry", organ_id, status = %status, "Organ status overridden");
		Ok(organ)
	}

	/// Status override and/or condition change in one request
	pub async fn update_organ(
		&self,
		organ_id: OrganId,
		req: UpdateOrganRequest,
	) -> Result<Organ, MatchingError> {
		if req.status.is_none() && req.condition.is_none() {
			return Err(MatchingError::invalid_argument("no fields to update"));
		}
		if let Some(status) = req.status {
			override_sources(status)?;
		}

		let mut organ = self.get_organ(organ_id).await?;
		if let Some(status) = req.status {
			organ = self.update_organ_status(organ_id, status).await?;
		}
		if let Some(condition) = req.condition {
			organ = bounded(
				self.store_timeout,
				self.store.set_organ_condition(organ_id, condition),
			)
			.await?;
			info!(target: "registry", organ_id, condition = %condition, "Organ condition updated");
		}
		Ok(organ)
	}

	/// Remove an organ that no match record refers to
	pub async fn delete_organ(&self, organ_id: OrganId) -> Result<(), MatchingError> {
		bounded(self.store_timeout, self.store.delete_organ(organ_id)).await?;
		info!(target: "registry", organ_id, "Organ deleted");
		Ok(())
	}

	pub async fn update_donor(
		&self,
		donor_id: DonorId,
		req: UpdateDonorRequest,
	) -> Result<Donor, MatchingError> {
		if req.is_empty() {
			return Err(MatchingError::invalid_argument("no fields to update"));
		}
		let mut donor = self.get_donor(donor_id).await?;
		if let Some(name) = &req.name {
			donor.name = required_name(name)?;
		}
		if req.age.is_some() {
			donor.age = req.age;
		}
		if req.gender.is_some() {
			donor.gender = req.gender;
		}
		if let Some(blood_group) = req.blood_group {
			donor.blood_group = blood_group;
		}
		if req.donor_type.is_some() {
			donor.donor_type = req.donor_type;
		}
		if let Some(consent) = req.consent {
			donor.consent = consent;
		}
		if req.medical_notes.is_some() {
			donor.medical_notes = req.medical_notes;
		}

		let donor = bounded(self.store_timeout, self.store.update_donor(donor)).await?;
		info!(target: "registry", donor_id, "Donor updated");
		Ok(donor)
	}

	/// Remove a donor none of whose organs are still on record
	pub async fn delete_donor(&self, donor_id: DonorId) -> Result<(), MatchingError> {
		bounded(self.store_timeout, self.store.delete_donor(donor_id)).await?;
		info!(target: "registry", donor_id, "Donor deleted");
		Ok(())
	}

	/// Administrative recipient update, including status
	///
	/// MATCHED is reserved for the allocation transaction. The write is
	/// conditional on the status read here, so an allocation committed in
	/// between is not overwritten.
	pub async fn update_recipient(
		&self,
		recipient_id: RecipientId,
		req: UpdateRecipientRequest,
	) -> Result<Recipient, MatchingError> {
		if req.is_empty() {
			return Err(MatchingError::invalid_argument("no fields to update"));
		}
		validate_pra(req.pra_score)?;

		let mut recipient = self.get_recipient(recipient_id).await?;
		let expected_status = recipient.status;
		if let Some(status) = req.status {
			if status == RecipientStatus::Matched && expected_status != RecipientStatus::Matched {
				return Err(MatchingError::invalid_argument(
					"recipients are only MATCHED through the allocation endpoint",
				));
			}
			// A SELECTED match still holds the organ for them
			if expected_status == RecipientStatus::Matched
				&& !matches!(status, RecipientStatus::Matched | RecipientStatus::Transplanted)
			{
				return Err(MatchingError::InvalidState(format!(
					"recipient {recipient_id} is MATCHED and can only move to TRANSPLANTED"
				)));
			}
			recipient.status = status;
		}
		if let Some(name) = &req.name {
			recipient.name = required_name(name)?;
		}
		if req.age.is_some() {
			recipient.age = req.age;
		}
		if req.gender.is_some() {
			recipient.gender = req.gender;
		}
		if let Some(blood_group) = req.blood_group {
			recipient.blood_group = blood_group;
		}
		if let Some(organ_needed) = req.organ_needed {
			recipient.organ_needed = organ_needed;
		}
		if req.hospital_id.is_some() {
			recipient.hospital_id = req.hospital_id;
		}
		if req.severity_level.is_some() {
			recipient.severity_level = req.severity_level;
		}
		if req.pra_score.is_some() {
			recipient.pra_score = req.pra_score;
		}
		if req.hla_code.is_some() {
			recipient.hla_code = req.hla_code;
		}
		if req.crossmatch_result.is_some() {
			recipient.crossmatch_result = req.crossmatch_result;
		}
		if req.waiting_since.is_some() {
			recipient.waiting_since = req.waiting_since;
		}

		let recipient = bounded(
			self.store_timeout,
			self.store.update_recipient(recipient, expected_status),
		)
		.await?;
		info!(
			target: "registry",
			recipient_id,
			status = %recipient.status,
			"Recipient updated"
		);
		Ok(recipient)
	}

	/// Remove a recipient no match record refers to
	pub async fn delete_recipient(&self, recipient_id: RecipientId) -> Result<(), MatchingError> {
		bounded(self.store_timeout, self.store.delete_recipient(recipient_id)).await?;
		info!(target: "registry", recipient_id, "Recipient deleted");
		Ok(())
	}

	/// Administrative PENDING match, outside the allocation transaction
	pub async fn record_match(
		&self,
		req: RecordMatchRequest,
		now: DateTime<Utc>,
	) -> Result<MatchRecord, MatchingError> {
		self.get_organ(req.organ_id).await?;
		self.get_recipient(req.recipient_id).await?;
		for (field, value) in [
			("medical_score", req.medical_score),
			("non_medical_score", req.non_medical_score),
			("final_score", req.final_score),
		] {
			if value.is_some_and(|v| !v.is_finite()) {
				return Err(MatchingError::invalid_argument(format!(
					"{field} must be a finite number"
				)));
			}
		}

		let record = MatchRecord {
			id: 0,
			organ_id: req.organ_id,
			recipient_id: req.recipient_id,
			medical_score: req.medical_score,
			non_medical_score: req.non_medical_score,
			final_score: req.final_score,
			status: MatchStatus::Pending,
			generated_at: now,
		};
		let record = bounded(self.store_timeout, self.store.insert_match(record)).await?;
		info!(target: "registry", match_id = record.id, "Pending match recorded");
		Ok(record)
	}

	pub async fn get_donor(&self, id: DonorId) -> Result<Donor, MatchingError> {
		bounded(self.store_timeout, self.store.get_donor(id))
			.await?
			.ok_or_else(|| MatchingError::not_found("Donor", id))
	}

	pub async fn get_recipient(&self, id: RecipientId) -> Result<Recipient, MatchingError> {
		bounded(self.store_timeout, self.store.get_recipient(id))
			.await?
			.ok_or_else(|| MatchingError::not_found("Recipient", id))
	}

	pub async fn get_organ(&self, id: OrganId) -> Result<Organ, MatchingError> {
		bounded(self.store_timeout, self.store.get_organ(id))
			.await?
			.ok_or_else(|| MatchingError::not_found("Organ", id))
	}

	pub async fn get_match(&self, id: MatchId) -> Result<MatchRecord, MatchingError> {
		bounded(self.store_timeout, self.store.get_match(id))
			.await?
			.ok_or_else(|| MatchingError::not_found("Match", id))
	}

	pub async fn list_donors(&self) -> Result<Vec<Donor>, MatchingError> {
		Ok(bounded(self.store_timeout, self.store.list_donors()).await?)
	}

	pub async fn list_recipients(
		&self,
		filter: RecipientFilter,
	) -> Result<Vec<Recipient>, MatchingError> {
		Ok(bounded(self.store_timeout, self.store.list_recipients(filter)).await?)
	}

	pub async fn list_organs(&self, filter: OrganFilter) -> Result<Vec<Organ>, MatchingError> {
		Ok(bounded(self.store_timeout, self.store.list_organs(filter)).await?)
	}

	pub async fn list_matches(&self) -> Result<Vec<MatchRecord>, MatchingError> {
		Ok(bounded(self.store_timeout, self.store.list_matches()).await?)
	}

	pub async fn summary(&self) -> Result<SystemStats, MatchingError> {
		Ok(bounded(self.store_timeout, self.store.stats()).await?)
	}
}

/// Statuses a manual override to `to` may start from
fn override_sources(to: OrganStatus) -> Result<&'static [OrganStatus], MatchingError> {
	match to {
		OrganStatus::Expired => Ok(&[OrganStatus::Available]),
		OrganStatus::Transplanted => Ok(&[OrganStatus::Available, OrganStatus::Allocated]),
		OrganStatus::Allocated => Err(MatchingError::invalid_argument(
			"organs are only ALLOCATED through the allocation endpoint",
		)),
		OrganStatus::Available => Err(MatchingError::invalid_argument(
			"organs cannot be returned to AVAILABLE",
		)),
	}
}

fn validate_pra(pra_score: Option<f64>) -> Result<(), MatchingError> {
	match pra_score {
		Some(pra) if !(pra.is_finite() && (0.0..=100.0).contains(&pra)) => Err(
			MatchingError::invalid_argument(format!("pra_score must be between 0 and 100, got {pra}")),
		),
		_ => Ok(()),
	}
}

fn required_name(name: &str) -> Result<String, MatchingError> {
	let trimmed = name.trim();
	if trimmed.is_empty() {
		return Err(MatchingError::invalid_argument("name is required"));
	}
	Ok(trimmed.to_string())
}

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

use std::{fmt, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub type DonorId = u64;
pub type OrganId = u64;
pub type RecipientId = u64;
pub type MatchId = u64;
pub type HospitalId = u64;

/// Error returned when a wire string does not name a known enumeration value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid {kind}: {value:?}")]
pub struct ParseEnumError {
	pub kind: &'static str,
	pub value: String,
}

/// Declares a closed enumeration that travels as an uppercase string.
///
/// Parsing trims and uppercases the input, so `" o- "` and `"O-"` are the
/// same blood group. Serialization always emits the canonical form.
macro_rules! wire_enum {
	(
		$(#[$meta:meta])*
		$name:ident, $kind:literal {
			$( $(#[$vmeta:meta])* $variant:ident => $wire:literal ),+ $(,)?
		}
	) => {
		$(#[$meta])*
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
		pub enum $name {
			$( $(#[$vmeta])* $variant, )+
		}

		impl $name {
			/// Every value, in declaration order
			pub const ALL: &'static [$name] = &[$($name::$variant),+];

			/// Canonical wire representation
			pub fn as_str(&self) -> &'static str {
				match self {
					$( $name::$variant => $wire, )+
				}
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str(self.as_str())
			}
		}

		impl FromStr for $name {
			type Err = ParseEnumError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				let normalized = s.trim().to_ascii_uppercase();
				match normalized.as_str() {
					$( $wire => Ok($name::$variant), )+
					_ => Err(ParseEnumError {
						kind: $kind,
						value: s.to_string(),
					}),
				}
			}
		}

		impl Serialize for $name {
			fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
				serializer.serialize_str(self.as_str())
			}
		}

		impl<'de> Deserialize<'de> for $name {
			fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
				let raw = String::deserialize(deserializer)?;
				raw.parse().map_err(serde::de::Error::custom)
			}
		}
	};
}

wire_enum! {
	/// ABO/Rh blood group
	BloodGroup, "blood group" {
		ONeg => "O-",
		OPos => "O+",
		ANeg => "A-",
		APos => "A+",
		BNeg => "B-",
		BPos => "B+",
		AbNeg => "AB-",
		AbPos => "AB+",
	}
}

wire_enum! {
	/// Type of a donated organ (and of the organ a recipient needs)
	OrganType, "organ type" {
		Heart => "HEART",
		Liver => "LIVER",
		Kidney => "KIDNEY",
		Lungs => "LUNGS",
		Pancreas => "PANCREAS",
	}
}

impl OrganType {
	/// Hours an organ of this type stays transplantable after retrieval
	pub fn viability_hours(&self) -> i64 {
		match self {
			OrganType::Heart => 6,
			OrganType::Lungs => 8,
			OrganType::Liver => 12,
			OrganType::Pancreas => 12,
			OrganType::Kidney => 24,
		}
	}

	pub fn viability_window(&self) -> Duration {
		Duration::hours(self.viability_hours())
	}
}

wire_enum! {
	/// Allocation lifecycle of an organ
	OrganStatus, "organ status" {
		Available => "AVAILABLE",
		Allocated => "ALLOCATED",
		Transplanted => "TRANSPLANTED",
		Expired => "EXPIRED",
	}
}

wire_enum! {
	/// Waiting-list status of a recipient
	RecipientStatus, "recipient status" {
		Waiting => "WAITING",
		Matched => "MATCHED",
		Transplanted => "TRANSPLANTED",
		Inactive => "INACTIVE",
	}
}

wire_enum! {
	MatchStatus, "match status" {
		Pending => "PENDING",
		Selected => "SELECTED",
	}
}

wire_enum! {
	/// Categorical urgency, used when no PRA score is recorded
	Severity, "severity" {
		Low => "LOW",
		Medium => "MEDIUM",
		High => "HIGH",
	}
}

wire_enum! {
	OrganCondition, "organ condition" {
		Good => "GOOD",
		Fair => "FAIR",
		Damaged => "DAMAGED",
	}
}

wire_enum! {
	/// Role carried by an authenticated caller
	Role, "role" {
		Admin => "ADMIN",
		HospitalCoordinator => "HOSPITAL_COORDINATOR",
		Doctor => "DOCTOR",
	}
}

wire_enum! {
	/// Outcome marker of a ranking run
	RankingStatus, "ranking status" {
		Ranked => "RANKED",
		/// No compatible waiting recipient exists; this is not a failure
		NoCandidates => "NO_CANDIDATES",
	}
}

/// Registered donor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Donor {
	pub id: DonorId,
	pub name: String,
	pub age: Option<u32>,
	pub gender: Option<String>,
	pub blood_group: BloodGroup,
	pub donor_type: Option<String>,
	pub consent: bool,
	pub medical_notes: Option<String>,
	pub registered_at: DateTime<Utc>,
}

/// Donated organ instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organ {
	pub id: OrganId,
	pub donor_id: DonorId,
	pub hospital_id: Option<HospitalId>,
	pub organ_type: OrganType,
	pub blood_group: BloodGroup,
	pub condition: OrganCondition,
	pub retrieval_time: DateTime<Utc>,
	/// Always `retrieval_time + organ_type.viability_window()`
	pub expiry_time: DateTime<Utc>,
	pub hla_code: Option<String>,
	pub status: OrganStatus,
	pub allocated_to_match_id: Option<MatchId>,
}

impl Organ {
	/// An AVAILABLE organ past its expiry is expired even before a sweep
	/// makes it durable.
	pub fn is_logically_expired(&self, now: DateTime<Utc>) -> bool {
		self.status == OrganStatus::Available && self.expiry_time < now
	}
}

/// Person on the waiting list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
	pub id: RecipientId,
	pub name: String,
	pub age: Option<u32>,
	pub gender: Option<String>,
	pub blood_group: BloodGroup,
	pub organ_needed: OrganType,
	pub hospital_id: Option<HospitalId>,
	pub severity_level: Option<Severity>,
	/// Panel-reactive antibody percentage (0-100)
	pub pra_score: Option<f64>,
	pub hla_code: Option<String>,
	pub crossmatch_result: Option<String>,
	pub status: RecipientStatus,
	pub waiting_since: Option<DateTime<Utc>>,
}

/// Allocation decision linking one organ to one recipient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
	pub id: MatchId,
	pub organ_id: OrganId,
	pub recipient_id: RecipientId,
	pub medical_score: Option<f64>,
	pub non_medical_score: Option<f64>,
	pub final_score: Option<f64>,
	pub status: MatchStatus,
	pub generated_at: DateTime<Utc>,
}

/// Displayed per-factor points of a compatibility score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
	pub blood: u32,
	pub urgency: u32,
	pub age: u32,
	pub waiting: u32,
}

/// One ranked allocation candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
	pub recipient_id: RecipientId,
	pub recipient_name: String,
	pub blood_group: BloodGroup,
	pub total_score: u32,
	pub breakdown: ScoreBreakdown,
}

/// Request to rank waiting recipients for an organ
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunMatchingRequest {
	pub organ_id: Option<OrganId>,
}

/// Ranked candidates for an organ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMatchingResponse {
	pub organ: Organ,
	pub status: RankingStatus,
	pub candidate_count: usize,
	pub matches: Vec<RankedCandidate>,
}

/// Request to commit a ranked candidate as the chosen match
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllocateRequest {
	pub organ_id: Option<OrganId>,
	pub recipient_id: Option<RecipientId>,
	/// Score the caller saw when ranking; checked against a fresh score
	pub final_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocateResponse {
	pub match_id: MatchId,
	pub final_score: u32,
	pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpirySweepResponse {
	pub expired_count: usize,
	pub expired_ids: Vec<OrganId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterDonorRequest {
	pub name: String,
	pub age: Option<u32>,
	pub gender: Option<String>,
	pub blood_group: BloodGroup,
	pub donor_type: Option<String>,
	#[serde(default)]
	pub consent: bool,
	pub medical_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRecipientRequest {
	pub name: String,
	pub age: Option<u32>,
	pub gender: Option<String>,
	pub blood_group: BloodGroup,
	pub organ_needed: OrganType,
	pub hospital_id: Option<HospitalId>,
	pub severity_level: Option<Severity>,
	pub pra_score: Option<f64>,
	pub hla_code: Option<String>,
	pub crossmatch_result: Option<String>,
	/// Defaults to the registration time
	pub waiting_since: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterOrganRequest {
	pub donor_id: DonorId,
	pub hospital_id: Option<HospitalId>,
	pub organ_type: OrganType,
	/// Defaults to the donor's blood group
	pub blood_group: Option<BloodGroup>,
	pub condition: Option<OrganCondition>,
	pub hla_code: Option<String>,
	/// Defaults to the registration time
	pub retrieval_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOrganStatusRequest {
	pub status: OrganStatus,
}

/// Partial donor update; absent fields are left as they are
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateDonorRequest {
	pub name: Option<String>,
	pub age: Option<u32>,
	pub gender: Option<String>,
	pub blood_group: Option<BloodGroup>,
	pub donor_type: Option<String>,
	pub consent: Option<bool>,
	pub medical_notes: Option<String>,
}

impl UpdateDonorRequest {
	pub fn is_empty(&self) -> bool {
		self.name.is_none()
			&& self.age.is_none()
			&& self.gender.is_none()
			&& self.blood_group.is_none()
			&& self.donor_type.is_none()
			&& self.consent.is_none()
			&& self.medical_notes.is_none()
	}
}

/// Partial recipient update; absent fields are left as they are
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateRecipientRequest {
	pub name: Option<String>,
	pub age: Option<u32>,
	pub gender: Option<String>,
	pub blood_group: Option<BloodGroup>,
	pub organ_needed: Option<OrganType>,
	pub hospital_id: Option<HospitalId>,
	pub severity_level: Option<Severity>,
	pub pra_score: Option<f64>,
	pub hla_code: Option<String>,
	pub crossmatch_result: Option<String>,
	pub status: Option<RecipientStatus>,
	pub waiting_since: Option<DateTime<Utc>>,
}

impl UpdateRecipientRequest {
	pub fn is_empty(&self) -> bool {
		self.name.is_none()
			&& self.age.is_none()
			&& self.gender.is_none()
			&& self.blood_group.is_none()
			&& self.organ_needed.is_none()
			&& self.hospital_id.is_none()
			&& self.severity_level.is_none()
			&& self.pra_score.is_none()
			&& self.hla_code.is_none()
			&& self.crossmatch_result.is_none()
			&& self.status.is_none()
			&& self.waiting_since.is_none()
	}
}

/// Organ status override and/or condition change
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateOrganRequest {
	pub status: Option<OrganStatus>,
	pub condition: Option<OrganCondition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedResponse {
	pub id: u64,
	pub message: String,
}

/// Administrative match record (created PENDING)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordMatchRequest {
	pub organ_id: OrganId,
	pub recipient_id: RecipientId,
	pub medical_score: Option<f64>,
	pub non_medical_score: Option<f64>,
	pub final_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedResponse {
	pub id: u64,
	pub message: String,
}

/// Record counts for the admin dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStats {
	pub donors: usize,
	pub recipients: usize,
	pub organs: usize,
	pub matches: usize,
	pub selected_matches: usize,
	pub available_organs: usize,
	pub waiting_recipients: usize,
}

/// Error body returned by the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	pub error: String,
	pub message: String,
}

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

//! Record builders shared by unit tests

use chrono::{DateTime, Utc};

use crate::types::{
	BloodGroup, Donor, DonorId, Organ, OrganCondition, OrganStatus, OrganType, Recipient,
	RecipientStatus, Severity,
};

pub fn donor(blood_group: BloodGroup, age: Option<u32>) -> Donor {
	Donor {
		id: 0,
		name: "donor".to_string(),
		age,
		gender: None,
		blood_group,
		donor_type: None,
		consent: true,
		medical_notes: None,
		registered_at: Utc::now(),
	}
}

pub fn organ(donor_id: DonorId, organ_type: OrganType, retrieval: DateTime<Utc>) -> Organ {
	Organ {
		id: 0,
		donor_id,
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

pub fn recipient(name: &str, blood_group: BloodGroup, organ_needed: OrganType) -> Recipient {
	Recipient {
		id: 0,
		name: name.to_string(),
		age: Some(40),
		gender: None,
		blood_group,
		organ_needed,
		hospital_id: None,
		severity_level: Some(Severity::Medium),
		pra_score: None,
		hla_code: None,
		crossmatch_result: None,
		status: RecipientStatus::Waiting,
		waiting_since: None,
	}
}

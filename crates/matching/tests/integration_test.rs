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

//! End-to-end behaviour of ranking, allocation and expiry over the
//! in-memory record store

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use lifeline_matching::{
	AllocationCommand, BloodGroup, EngineConfig, ErrorKind, MatchingEngine, MemoryRecordStore,
	OrganStatus, OrganType, RankingStatus, RecipientStatus, Registry, Severity,
};
use lifeline_sdk::types::{RegisterDonorRequest, RegisterOrganRequest, RegisterRecipientRequest};

struct Harness {
	engine: Arc<MatchingEngine>,
	registry: Registry,
}

fn harness() -> Harness {
	let store = Arc::new(MemoryRecordStore::new());
	Harness {
		engine: Arc::new(MatchingEngine::new(store.clone(), EngineConfig::default())),
		registry: Registry::new(store, Duration::from_secs(1)),
	}
}

async fn register_donor(h: &Harness, blood_group: BloodGroup, age: u32, now: DateTime<Utc>) -> u64 {
	h.registry
		.register_donor(
			RegisterDonorRequest {
				name: "donor".to_string(),
				age: Some(age),
				gender: None,
				blood_group,
				donor_type: None,
				consent: true,
				medical_notes: None,
			},
			now,
		)
		.await
		.unwrap()
		.id
}

async fn register_organ(h: &Harness, donor_id: u64, organ_type: OrganType, retrieval: DateTime<Utc>) -> u64 {
	h.registry
		.register_organ(
			RegisterOrganRequest {
				donor_id,
				hospital_id: None,
				organ_type,
				blood_group: None,
				condition: None,
				hla_code: None,
				retrieval_time: Some(retrieval),
			},
			retrieval,
		)
		.await
		.unwrap()
		.id
}

fn recipient_req(name: &str, blood_group: BloodGroup, age: u32) -> RegisterRecipientRequest {
	RegisterRecipientRequest {
		name: name.to_string(),
		age: Some(age),
		gender: None,
		blood_group,
		organ_needed: OrganType::Kidney,
		hospital_id: None,
		severity_level: None,
		pra_score: None,
		hla_code: None,
		crossmatch_result: None,
		waiting_since: None,
	}
}

#[tokio::test]
async fn test_kidney_ranking_scenario() {
	let h = harness();
	let now = Utc::now();
	let donor = register_donor(&h, BloodGroup::ONeg, 40, now).await;
	let organ = register_organ(&h, donor, OrganType::Kidney, now).await;

	let mut r1 = recipient_req("R1", BloodGroup::APos, 38);
	r1.pra_score = Some(80.0);
	r1.waiting_since = Some(now - ChronoDuration::days(185));
	let r1 = h.registry.register_recipient(r1, now).await.unwrap();

	let mut r2 = recipient_req("R2", BloodGroup::AbNeg, 70);
	r2.severity_level = Some(Severity::Low);
	r2.waiting_since = Some(now - ChronoDuration::days(35));
	let r2 = h.registry.register_recipient(r2, now).await.unwrap();

	let ranking = h.engine.rank_candidates_at(organ, now).await.unwrap();
	assert_eq!(ranking.status(), RankingStatus::Ranked);
	assert_eq!(ranking.recipient_ids(), vec![r1.id, r2.id]);

	let response = ranking.into_response();
	assert_eq!(response.candidate_count, 2);
	let first = &response.matches[0];
	assert_eq!(first.total_score, 90);
	assert_eq!(
		(first.breakdown.blood, first.breakdown.urgency, first.breakdown.age, first.breakdown.waiting),
		(40, 24, 20, 6)
	);
	let second = &response.matches[1];
	assert_eq!(second.total_score, 47);
	assert_eq!(
		(second.breakdown.blood, second.breakdown.urgency, second.breakdown.age, second.breakdown.waiting),
		(40, 6, 0, 1)
	);
}

#[tokio::test]
async fn test_incompatible_recipients_never_ranked() {
	let h = harness();
	let now = Utc::now();
	let donor = register_donor(&h, BloodGroup::BPos, 40, now).await;
	let organ = register_organ(&h, donor, OrganType::Kidney, now).await;

	for group in BloodGroup::ALL {
		let mut req = recipient_req(group.as_str(), *group, 40);
		req.pra_score = Some(100.0);
		req.waiting_since = Some(now - ChronoDuration::days(900));
		h.registry.register_recipient(req, now).await.unwrap();
	}

	let ranking = h.engine.rank_candidates_at(organ, now).await.unwrap();
	let groups: Vec<BloodGroup> = ranking
		.candidates
		.iter()
		.map(|c| c.recipient.blood_group)
		.collect();
	assert_eq!(groups, vec![BloodGroup::BPos, BloodGroup::AbPos]);
}

#[tokio::test]
async fn test_ranking_is_stable_across_calls() {
	let h = harness();
	let now = Utc::now();
	let donor = register_donor(&h, BloodGroup::ONeg, 40, now).await;
	let organ = register_organ(&h, donor, OrganType::Kidney, now).await;
	for i in 0..6 {
		h.registry
			.register_recipient(recipient_req(&format!("twin{i}"), BloodGroup::OPos, 40), now)
			.await
			.unwrap();
	}

	let first = h.engine.rank_candidates_at(organ, now).await.unwrap();
	let second = h.engine.rank_candidates_at(organ, now).await.unwrap();
	assert_eq!(first.recipient_ids(), second.recipient_ids());
	assert_eq!(first.recipient_ids(), vec![1, 2, 3, 4, 5, 6]);
}

#[tokio::test]
async fn test_no_candidates_is_not_an_error() {
	let h = harness();
	let now = Utc::now();
	let donor = register_donor(&h, BloodGroup::ONeg, 40, now).await;
	let organ = register_organ(&h, donor, OrganType::Pancreas, now).await;

	let ranking = h.engine.rank_candidates_at(organ, now).await.unwrap();
	assert_eq!(ranking.status(), RankingStatus::NoCandidates);
	assert_eq!(ranking.into_response().candidate_count, 0);
}

#[tokio::test]
async fn test_rank_after_allocation_fails_with_invalid_state() {
	let h = harness();
	let now = Utc::now();
	let donor = register_donor(&h, BloodGroup::ONeg, 40, now).await;
	let organ = register_organ(&h, donor, OrganType::Kidney, now).await;
	let r1 = h
		.registry
		.register_recipient(recipient_req("R1", BloodGroup::APos, 38), now)
		.await
		.unwrap();

	let outcome = h
		.engine
		.allocate_at(AllocationCommand::new(organ, r1.id), now)
		.await
		.unwrap();

	let organ_record = h.registry.get_organ(organ).await.unwrap();
	assert_eq!(organ_record.status, OrganStatus::Allocated);
	assert_eq!(organ_record.allocated_to_match_id, Some(outcome.match_record.id));
	let r1 = h.registry.get_recipient(r1.id).await.unwrap();
	assert_eq!(r1.status, RecipientStatus::Matched);

	let err = h.engine.rank_candidates_at(organ, now).await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_allocation_has_one_winner() {
	let h = harness();
	let now = Utc::now();
	let donor = register_donor(&h, BloodGroup::ONeg, 40, now).await;
	let organ = register_organ(&h, donor, OrganType::Kidney, now).await;

	let mut recipients = Vec::new();
	for i in 0..8 {
		let r = h
			.registry
			.register_recipient(recipient_req(&format!("r{i}"), BloodGroup::APos, 40), now)
			.await
			.unwrap();
		recipients.push(r.id);
	}

	let mut handles = Vec::new();
	for recipient_id in recipients {
		let engine = h.engine.clone();
		handles.push(tokio::spawn(async move {
			engine
				.allocate_at(AllocationCommand::new(organ, recipient_id), now)
				.await
		}));
	}

	let mut winners = 0;
	for handle in handles {
		match handle.await.unwrap() {
			Ok(_) => winners += 1,
			Err(e) => assert_eq!(e.kind(), ErrorKind::Conflict),
		}
	}
	assert_eq!(winners, 1);

	let matches = h.registry.list_matches().await.unwrap();
	assert_eq!(matches.len(), 1);
	let stats = h.registry.summary().await.unwrap();
	assert_eq!(stats.waiting_recipients, 7);
}

#[tokio::test]
async fn test_heart_expiry_sweep() {
	let h = harness();
	let t = Utc::now();
	let donor = register_donor(&h, BloodGroup::ONeg, 40, t).await;
	let heart = register_organ(&h, donor, OrganType::Heart, t).await;
	let kidney = register_organ(&h, donor, OrganType::Kidney, t).await;

	let early = h.engine.sweep_expired(t + ChronoDuration::hours(5)).await.unwrap();
	assert!(early.expired_ids.is_empty());

	let late = h.engine.sweep_expired(t + ChronoDuration::hours(7)).await.unwrap();
	assert_eq!(late.expired_ids, vec![heart]);
	assert_eq!(
		h.registry.get_organ(heart).await.unwrap().status,
		OrganStatus::Expired
	);
	assert_eq!(
		h.registry.get_organ(kidney).await.unwrap().status,
		OrganStatus::Available
	);

	let again = h.engine.sweep_expired(t + ChronoDuration::hours(7)).await.unwrap();
	assert_eq!(again.expired_count(), 0);
}

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

use chrono::{Duration as ChronoDuration, Utc};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use lifeline_matching::{
	BloodGroup, Donor, EngineConfig, MatchingEngine, MemoryRecordStore, Organ, OrganCondition,
	OrganStatus, OrganType, Recipient, RecipientStatus, RecordStore, Severity,
};
use tokio::runtime::Runtime;

const WAITING_LIST_SIZES: &[usize] = &[100, 1_000, 10_000];

/// Store with one O- kidney and a mixed waiting list
fn seeded_store(rt: &Runtime, waiting: usize) -> (Arc<MemoryRecordStore>, u64) {
	let store = Arc::new(MemoryRecordStore::new());
	let now = Utc::now();

	let organ_id = rt.block_on(async {
		let donor = store
			.insert_donor(Donor {
				id: 0,
				name: "bench donor".to_string(),
				age: Some(45),
				gender: None,
				blood_group: BloodGroup::ONeg,
				donor_type: None,
				consent: true,
				medical_notes: None,
				registered_at: now,
			})
			.await
			.unwrap();

		for i in 0..waiting {
			let organ_needed = if i % 4 == 0 { OrganType::Liver } else { OrganType::Kidney };
			store
				.insert_recipient(Recipient {
					id: 0,
					name: format!("recipient-{i}"),
					age: Some(18 + (i % 60) as u32),
					gender: None,
					blood_group: BloodGroup::ALL[i % BloodGroup::ALL.len()],
					organ_needed,
					hospital_id: None,
					severity_level: Some(Severity::ALL[i % Severity::ALL.len()]),
					pra_score: (i % 3 == 0).then_some((i % 100) as f64),
					hla_code: None,
					crossmatch_result: None,
					status: RecipientStatus::Waiting,
					waiting_since: Some(now - ChronoDuration::days((i % 400) as i64)),
				})
				.await
				.unwrap();
		}

		store
			.insert_organ(Organ {
				id: 0,
				donor_id: donor.id,
				hospital_id: None,
				organ_type: OrganType::Kidney,
				blood_group: BloodGroup::ONeg,
				condition: OrganCondition::Good,
				retrieval_time: now,
				expiry_time: now + OrganType::Kidney.viability_window(),
				hla_code: None,
				status: OrganStatus::Available,
				allocated_to_match_id: None,
			})
			.await
			.unwrap()
			.id
	});

	(store, organ_id)
}

fn bench_rank_candidates(c: &mut Criterion) {
	let rt = tokio::runtime::Builder::new_current_thread()
		.enable_time()
		.build()
		.unwrap();

	let mut group = c.benchmark_group("rank_candidates");
	group.measurement_time(Duration::from_secs(10));

	for &waiting in WAITING_LIST_SIZES {
		let (store, organ_id) = seeded_store(&rt, waiting);
		let engine = MatchingEngine::new(store, EngineConfig::default());

		group.bench_with_input(BenchmarkId::from_parameter(waiting), &organ_id, |b, &organ_id| {
			b.iter(|| {
				let ranking = rt.block_on(engine.rank_candidates(organ_id)).unwrap();
				std::hint::black_box(ranking.candidates.len())
			});
		});
	}

	group.finish();
}

criterion_group!(benches, bench_rank_candidates);
criterion_main!(benches);

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

//! Lifeline Matching Core
//!
//! Ranks waiting recipients for a retrieved organ and commits allocations.
//! Blood-group compatibility is a hard filter; survivors are scored on
//! urgency, age proximity and time on the waiting list.
//!
//! Architecture:
//! - Persistence behind the injected `RecordStore` trait
//! - Allocation as a single compare-and-swap unit: at most one winner per organ
//! - Every store call bounded by a deadline, safe to cancel
//! - Optional JSON snapshots of the in-memory store for restarts

pub mod allocation;
pub mod compatibility;
pub mod config;
pub mod engine;
pub mod expiry;
pub mod ranker;
pub mod registry;
pub mod scoring;
pub mod snapshot;
pub mod store;
#[cfg(test)]
mod testing;
pub mod types;

pub use compatibility::{is_compatible, is_compatible_str};
pub use crate::config::MatchingConfig;
pub use engine::{EngineConfig, ErrorKind, MatchingEngine, MatchingError};
pub use registry::Registry;
pub use scoring::{CompatibilityScore, ScoreWeights, Scorer};
pub use snapshot::{
	FileSnapshotStorage, MemorySnapshotStorage, SnapshotProvider, SnapshotStorage, Snapshotter,
	SnapshotterConfig, StoreSnapshot,
};
pub use store::{MemoryRecordStore, OrganFilter, RecipientFilter, RecordStore, StoreError};
pub use types::*;

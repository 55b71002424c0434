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

pub mod snapshotter;
mod storage;

use chrono::Utc;
use thiserror::Error;
use tracing::info;

use crate::store::MemoryRecordStore;
pub use snapshotter::{SnapshotProvider, Snapshotter, SnapshotterConfig};
pub use storage::{
	FileSnapshotStorage, MemorySnapshotStorage, SnapshotMetadata, SnapshotStorage, StoreSnapshot,
};

/// Error types for snapshot operations
#[derive(Debug, Error)]
pub enum SnapshotError {
	#[error("Failed to create snapshot: {0}")]
	CreationFailed(String),
	#[error("Failed to load snapshot: {0}")]
	LoadFailed(String),
	#[error("Snapshot corrupted: {0}")]
	Corrupted(String),
	#[error("No snapshot available")]
	NotFound,
	#[error("Snapshot I/O error: {0}")]
	Io(#[from] std::io::Error),
}

impl SnapshotProvider for MemoryRecordStore {
	fn current_revision(&self) -> Result<u64, SnapshotError> {
		self.revision()
			.map_err(|e| SnapshotError::CreationFailed(e.to_string()))
	}

	fn create_snapshot(&self) -> Result<StoreSnapshot, SnapshotError> {
		let tables = self
			.tables()
			.map_err(|e| SnapshotError::CreationFailed(e.to_string()))?;
		Ok(StoreSnapshot::capture(tables, Utc::now()))
	}
}

/// Rebuild the record store from the newest snapshot, if any
///
/// Returns `Ok(None)` on an empty storage so callers can start fresh.
pub fn restore_latest(
	storage: &dyn SnapshotStorage,
) -> Result<Option<MemoryRecordStore>, SnapshotError> {
	match storage.load_latest() {
		Ok(snapshot) => {
			info!(
				target: "snapshotter",
				revision = snapshot.metadata.revision,
				organs = snapshot.tables.organs.len(),
				recipients = snapshot.tables.recipients.len(),
				"Restored record store from snapshot"
			);
			Ok(Some(MemoryRecordStore::from_tables(snapshot.tables)))
		}
		Err(SnapshotError::NotFound) => Ok(None),
		Err(e) => Err(e),
	}
}


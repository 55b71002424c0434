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
	fs,
	path::{Path, PathBuf},
	sync::{Arc, Mutex, MutexGuard},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SnapshotError;
use crate::store::StoreTables;

const FILE_PREFIX: &str = "store-";
const FILE_SUFFIX: &str = ".json";

/// Metadata about a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
	pub created_at: DateTime<Utc>,
	/// Store revision captured by this snapshot
	pub revision: u64,
	pub organs: usize,
	pub recipients: usize,
	pub matches: usize,
}

/// Complete record store contents with metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
	pub metadata: SnapshotMetadata,
	pub tables: StoreTables,
}

impl StoreSnapshot {
	pub fn capture(tables: StoreTables, created_at: DateTime<Utc>) -> Self {
		Self {
			metadata: SnapshotMetadata {
				created_at,
				revision: tables.revision,
				organs: tables.organs.len(),
				recipients: tables.recipients.len(),
				matches: tables.matches.len(),
			},
			tables,
		}
	}

	pub fn revision(&self) -> u64 {
		self.metadata.revision
	}
}

/// Snapshot Storage trait - persistence layer for record store snapshots
///
/// Snapshots are keyed by store revision. Storage only needs to keep a
/// handful of recent ones; older revisions are removed through
/// [`SnapshotStorage::cleanup_before`].
///
/// Backing stores:
/// - In-memory (testing)
/// - Local filesystem (JSON)
pub trait SnapshotStorage: Send {
	fn save(&mut self, snapshot: &StoreSnapshot) -> Result<(), SnapshotError>;

	/// Load the snapshot with the highest revision
	fn load_latest(&self) -> Result<StoreSnapshot, SnapshotError>;

	/// Stored revisions, ascending
	fn list_revisions(&self) -> Result<Vec<u64>, SnapshotError>;

	/// Delete snapshots with a revision below `revision`
	fn cleanup_before(&mut self, revision: u64) -> Result<usize, SnapshotError>;
}

/// In-memory snapshot storage
///
/// Clones share the same snapshot list, which lets tests inspect what a
/// snapshotter thread has written.
#[derive(Clone, Default)]
pub struct MemorySnapshotStorage {
	snapshots: Arc<Mutex<Vec<StoreSnapshot>>>,
}

impl MemorySnapshotStorage {
	pub fn new() -> Self {
		Self::default()
	}

	fn lock(&self) -> Result<MutexGuard<'_, Vec<StoreSnapshot>>, SnapshotError> {
		self.snapshots
			.lock()
			.map_err(|_| SnapshotError::LoadFailed("snapshot list lock poisoned".to_string()))
	}
}

impl SnapshotStorage for MemorySnapshotStorage {
	fn save(&mut self, snapshot: &StoreSnapshot) -> Result<(), SnapshotError> {
		let mut snapshots = self.lock()?;
		snapshots.retain(|s| s.revision() != snapshot.revision());
		snapshots.push(snapshot.clone());
		snapshots.sort_by_key(StoreSnapshot::revision);
		Ok(())
	}

	fn load_latest(&self) -> Result<StoreSnapshot, SnapshotError> {
		self.lock()?.last().cloned().ok_or(SnapshotError::NotFound)
	}

	fn list_revisions(&self) -> Result<Vec<u64>, SnapshotError> {
		Ok(self.lock()?.iter().map(StoreSnapshot::revision).collect())
	}

	fn cleanup_before(&mut self, revision: u64) -> Result<usize, SnapshotError> {
		let mut snapshots = self.lock()?;
		let original_len = snapshots.len();
		snapshots.retain(|s| s.revision() >= revision);
		Ok(original_len - snapshots.len())
	}
}

/// Filesystem snapshot storage
///
/// One pretty-printed JSON file per revision, `store-{revision}.json`, with
/// the revision zero-padded so directory order is revision order. Files are
/// written to a temporary name and renamed into place, so a crash mid-write
/// never leaves a truncated snapshot behind.
pub struct FileSnapshotStorage {
	dir: PathBuf,
}

impl FileSnapshotStorage {
	pub fn new(dir: impl Into<PathBuf>) -> Result<Self, SnapshotError> {
		let dir = dir.into();
		fs::create_dir_all(&dir)?;
		Ok(Self { dir })
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	fn path_for(&self, revision: u64) -> PathBuf {
		self.dir.join(format!("{FILE_PREFIX}{revision:020}{FILE_SUFFIX}"))
	}

	fn parse_revision(file_name: &str) -> Option<u64> {
		file_name
			.strip_prefix(FILE_PREFIX)?
			.strip_suffix(FILE_SUFFIX)?
			.parse()
			.ok()
	}
}

impl SnapshotStorage for FileSnapshotStorage {
	fn save(&mut self, snapshot: &StoreSnapshot) -> Result<(), SnapshotError> {
		let data = serde_json::to_vec_pretty(snapshot)
			.map_err(|e| SnapshotError::CreationFailed(e.to_string()))?;

		let path = self.path_for(snapshot.revision());
		let tmp = path.with_extension("json.tmp");
		fs::write(&tmp, data)?;
		fs::rename(&tmp, &path)?;
		Ok(())
	}

	fn load_latest(&self) -> Result<StoreSnapshot, SnapshotError> {
		let revision = self
			.list_revisions()?
			.last()
			.copied()
			.ok_or(SnapshotError::NotFound)?;
		let path = self.path_for(revision);
		let data = fs::read(&path)
			.map_err(|e| SnapshotError::LoadFailed(format!("{}: {}", path.display(), e)))?;
		serde_json::from_slice(&data)
			.map_err(|e| SnapshotError::Corrupted(format!("{}: {}", path.display(), e)))
	}

	fn list_revisions(&self) -> Result<Vec<u64>, SnapshotError> {
		let mut revisions = Vec::new();
		for entry in fs::read_dir(&self.dir)? {
			let entry = entry?;
			if let Some(revision) = entry.file_name().to_str().and_then(Self::parse_revision) {
				revisions.push(revision);
			}
		}
		revisions.sort_unstable();
		Ok(revisions)
	}

	fn cleanup_before(&mut self, revision: u64) -> Result<usize, SnapshotError> {
		let mut deleted = 0;
		for old in self.list_revisions()?.into_iter().filter(|r| *r < revision) {
			fs::remove_file(self.path_for(old))?;
			deleted += 1;
		}
		Ok(deleted)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn snapshot_at(revision: u64) -> StoreSnapshot {
		let tables = StoreTables {
			revision,
			..StoreTables::default()
		};
		StoreSnapshot::capture(tables, Utc::now())
	}

	#[test]
	fn test_memory_save_and_load_latest() {
		let mut storage = MemorySnapshotStorage::new();
		assert!(matches!(storage.load_latest(), Err(SnapshotError::NotFound)));

		storage.save(&snapshot_at(200)).unwrap();
		storage.save(&snapshot_at(100)).unwrap();

		assert_eq!(storage.load_latest().unwrap().revision(), 200);
		assert_eq!(storage.list_revisions().unwrap(), vec![100, 200]);
	}

	#[test]
	fn test_memory_cleanup() {
		let mut storage = MemorySnapshotStorage::new();
		for revision in [100, 200, 300] {
			storage.save(&snapshot_at(revision)).unwrap();
		}

		assert_eq!(storage.cleanup_before(200).unwrap(), 1);
		assert_eq!(storage.list_revisions().unwrap(), vec![200, 300]);
	}

	#[test]
	fn test_file_storage_orders_by_revision() {
		let dir = tempfile::tempdir().unwrap();
		let mut storage = FileSnapshotStorage::new(dir.path()).unwrap();

		for revision in [9, 10, 100] {
			storage.save(&snapshot_at(revision)).unwrap();
		}
		// Stray files are ignored
		fs::write(dir.path().join("notes.txt"), b"hello").unwrap();

		assert_eq!(storage.list_revisions().unwrap(), vec![9, 10, 100]);
		assert_eq!(storage.load_latest().unwrap().revision(), 100);

		assert_eq!(storage.cleanup_before(100).unwrap(), 2);
		assert_eq!(storage.list_revisions().unwrap(), vec![100]);
	}

	#[test]
	fn test_file_storage_reports_corruption() {
		let dir = tempfile::tempdir().unwrap();
		let storage = FileSnapshotStorage::new(dir.path()).unwrap();
		fs::write(storage.path_for(3), b"{not json").unwrap();

		assert!(matches!(
			storage.load_latest(),
			Err(SnapshotError::Corrupted(_))
		));
	}
}

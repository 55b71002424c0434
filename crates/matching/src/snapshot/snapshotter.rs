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
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
	thread::{self, JoinHandle},
	time::{Duration, Instant},
};

use tracing::{debug, error, info, warn};

use super::{SnapshotError, SnapshotStorage, StoreSnapshot};

/// Configuration for the Snapshotter
#[derive(Debug, Clone)]
pub struct SnapshotterConfig {
	/// Interval between snapshot attempts
	pub interval: Duration,
	/// Keep at most this many recent snapshots
	pub max_snapshots_to_keep: usize,
}

impl Default for SnapshotterConfig {
	fn default() -> Self {
		Self {
			interval: Duration::from_secs(60),
			max_snapshots_to_keep: 10,
		}
	}
}

/// Snapshotter - periodically persists the record store
///
/// Runs on its own thread. Every interval it compares the store revision
/// with the last one saved and only captures a snapshot when something
/// changed. Shutdown wakes the thread immediately and takes one final
/// snapshot so a clean stop loses nothing.
///
/// The snapshotter never holds the store lock while writing to disk: the
/// provider hands back an owned copy of the tables.
pub struct Snapshotter {
	thread_handle: Option<JoinHandle<()>>,
	shutdown: Arc<AtomicBool>,
}

impl Snapshotter {
	pub fn start(
		mut storage: Box<dyn SnapshotStorage>,
		config: SnapshotterConfig,
		provider: Arc<dyn SnapshotProvider>,
	) -> Result<Self, SnapshotError> {
		let shutdown = Arc::new(AtomicBool::new(false));
		let shutdown_clone = shutdown.clone();

		// Whatever is already on disk does not need saving again
		let last_saved = storage.list_revisions()?.last().copied();

		let thread_handle = thread::Builder::new()
			.name("snapshotter".to_string())
			.spawn(move || {
				info!(target: "snapshotter", ?last_saved, "Snapshotter started");
				Self::run_snapshot_loop(
					storage.as_mut(),
					&config,
					provider.as_ref(),
					&shutdown_clone,
					last_saved,
				);
				info!(target: "snapshotter", "Snapshotter stopped");
			})?;

		Ok(Self {
			thread_handle: Some(thread_handle),
			shutdown,
		})
	}

	fn run_snapshot_loop(
		storage: &mut dyn SnapshotStorage,
		config: &SnapshotterConfig,
		provider: &dyn SnapshotProvider,
		shutdown: &AtomicBool,
		mut last_saved: Option<u64>,
	) {
		loop {
			thread::park_timeout(config.interval);
			let stopping = shutdown.load(Ordering::Relaxed);

			match Self::snapshot_if_changed(storage, config, provider, last_saved) {
				Ok(Some(revision)) => last_saved = Some(revision),
				Ok(None) => {}
				Err(e) => error!(target: "snapshotter", error = %e, "Snapshot attempt failed"),
			}

			if stopping {
				break;
			}
		}
	}

	fn snapshot_if_changed(
		storage: &mut dyn SnapshotStorage,
		config: &SnapshotterConfig,
		provider: &dyn SnapshotProvider,
		last_saved: Option<u64>,
	) -> Result<Option<u64>, SnapshotError> {
		let revision = provider.current_revision()?;
		if last_saved == Some(revision) {
			debug!(target: "snapshotter", revision, "Store unchanged, skipping snapshot");
			return Ok(None);
		}

		let start = Instant::now();
		let snapshot = provider.create_snapshot()?;
		let capture_duration = start.elapsed();
		storage.save(&snapshot)?;
		let total_duration = start.elapsed();

		info!(
			target: "snapshotter",
			revision = snapshot.revision(),
			organs = snapshot.metadata.organs,
			matches = snapshot.metadata.matches,
			capture_ms = capture_duration.as_millis(),
			total_ms = total_duration.as_millis(),
			"Snapshot saved"
		);

		Self::cleanup(storage, config);
		Ok(Some(snapshot.revision()))
	}

	fn cleanup(storage: &mut dyn SnapshotStorage, config: &SnapshotterConfig) {
		let revisions = match storage.list_revisions() {
			Ok(revisions) => revisions,
			Err(e) => {
				error!(target: "snapshotter", error = %e, "Failed to list snapshots");
				return;
			}
		};
		let keep = config.max_snapshots_to_keep.max(1);
		if revisions.len() <= keep {
			return;
		}

		let cutoff = revisions[revisions.len() - keep];
		match storage.cleanup_before(cutoff) {
			Ok(deleted) => {
				debug!(
					target: "snapshotter",
					deleted_count = deleted,
					retained_count = keep,
					cutoff_revision = cutoff,
					"Old snapshots cleaned up"
				);
			}
			Err(e) => {
				error!(
					target: "snapshotter",
					cutoff_revision = cutoff,
					error = %e,
					"Failed to cleanup old snapshots"
				);
			}
		}
	}

	fn stop(&mut self) {
		self.shutdown.store(true, Ordering::Relaxed);
		if let Some(handle) = self.thread_handle.take() {
			handle.thread().unpark();
			if let Err(e) = handle.join() {
				warn!(target: "snapshotter", error = ?e, "Snapshotter thread panicked");
			}
		}
	}

	/// Stop the thread after a final snapshot
	pub fn shutdown(mut self) {
		info!(target: "snapshotter", "Shutting down snapshotter");
		self.stop();
	}
}

impl Drop for Snapshotter {
	fn drop(&mut self) {
		self.stop();
	}
}

/// Source of snapshots for the snapshotter
pub trait SnapshotProvider: Send + Sync {
	/// Cheap change marker; equal revisions mean equal contents
	fn current_revision(&self) -> Result<u64, SnapshotError>;

	fn create_snapshot(&self) -> Result<StoreSnapshot, SnapshotError>;
}

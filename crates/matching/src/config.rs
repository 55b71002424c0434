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

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
	engine::{DEFAULT_SCORE_TOLERANCE, EngineConfig},
	scoring::ScoreWeights,
	snapshot::SnapshotterConfig,
};

const ENV_PREFIX: &str = "LIFELINE";

/// Matching core configuration
///
/// Loaded from an optional file plus `LIFELINE_*` environment variables.
/// Nested keys use a double underscore, e.g. `LIFELINE_WEIGHTS__URGENCY=35`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
	/// Score weights; clinical tuning belongs here, not in code
	pub weights: ScoreWeights,
	pub score_tolerance: f64,
	pub store_timeout_ms: u64,
	/// Snapshots are disabled when unset
	pub snapshot_dir: Option<PathBuf>,
	pub snapshot_interval_secs: u64,
	pub snapshot_retention: usize,
}

impl Default for MatchingConfig {
	fn default() -> Self {
		Self {
			weights: ScoreWeights::default(),
			score_tolerance: DEFAULT_SCORE_TOLERANCE,
			store_timeout_ms: 5_000,
			snapshot_dir: None,
			snapshot_interval_secs: 60,
			snapshot_retention: 10,
		}
	}
}

impl MatchingConfig {
	/// Load configuration from environment variables
	pub fn from_env() -> Result<Self, config::ConfigError> {
		let cfg = config::Config::builder()
			.add_source(Self::environment())
			.build()?;

		Self::finish(cfg.try_deserialize()?)
	}

	/// Load configuration from file, with environment overrides
	pub fn from_file(path: &str) -> Result<Self, config::ConfigError> {
		let cfg = config::Config::builder()
			.add_source(config::File::with_name(path))
			.add_source(Self::environment())
			.build()?;

		Self::finish(cfg.try_deserialize()?)
	}

	fn environment() -> config::Environment {
		config::Environment::with_prefix(ENV_PREFIX)
			.prefix_separator("_")
			.separator("__")
			.try_parsing(true)
	}

	fn finish(config: Self) -> Result<Self, config::ConfigError> {
		config.validate().map_err(config::ConfigError::Message)?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<(), String> {
		self.weights.validate()?;
		if !self.score_tolerance.is_finite() || self.score_tolerance < 0.0 {
			return Err(format!(
				"score_tolerance must be a non-negative number, got {}",
				self.score_tolerance
			));
		}
		if self.store_timeout_ms == 0 {
			return Err("store_timeout_ms must be positive".to_string());
		}
		if self.snapshot_dir.is_some() {
			if self.snapshot_interval_secs == 0 {
				return Err("snapshot_interval_secs must be positive".to_string());
			}
			if self.snapshot_retention == 0 {
				return Err("snapshot_retention must be at least 1".to_string());
			}
		}
		Ok(())
	}

	pub fn engine_config(&self) -> EngineConfig {
		EngineConfig {
			weights: self.weights,
			score_tolerance: self.score_tolerance,
			store_timeout: self.store_timeout(),
		}
	}

	pub fn store_timeout(&self) -> Duration {
		Duration::from_millis(self.store_timeout_ms)
	}

	pub fn snapshotter_config(&self) -> SnapshotterConfig {
		SnapshotterConfig {
			interval: Duration::from_secs(self.snapshot_interval_secs),
			max_snapshots_to_keep: self.snapshot_retention,
		}
	}
}

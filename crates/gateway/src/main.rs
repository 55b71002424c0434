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

//! Organ allocation gateway
//!
//! Serves the matching engine and the donor, recipient and organ registry
//! over HTTP. Every API route except `/health` needs an HS256 bearer token
//! whose `role` claim is one of ADMIN, HOSPITAL_COORDINATOR or DOCTOR;
//! allocation, status overrides and the admin routes are role-gated.
//!
//! Records live in an in-memory store, periodically snapshotted to disk
//! when `LIFELINE_SNAPSHOT_DIR` is set and restored from the newest
//! snapshot at startup.

mod admission;
mod auth;
mod config;
mod handlers;
mod logging;
mod middleware;
mod otel;
mod routes;
mod server;

use anyhow::{Context, Result};
use lifeline_matching::MatchingConfig;
use tracing::info;

use crate::{config::GatewayRuntimeConfig, logging::init_logging, server::GatewayServer};

#[actix_rt::main]
async fn main() -> Result<()> {
	let runtime = GatewayRuntimeConfig::from_env()?;
	init_logging(&runtime.telemetry)?;

	let matching = match &runtime.matching_config_path {
		Some(path) => MatchingConfig::from_file(path)
			.with_context(|| format!("Failed to load matching config from {}", path))?,
		None => MatchingConfig::from_env().context("Failed to load matching config")?,
	};

	info!(
		target: "server",
		addr = %runtime.bind_addr,
		weights = ?matching.weights,
		score_tolerance = matching.score_tolerance,
		"Starting Lifeline gateway"
	);

	let server = GatewayServer::new(runtime, matching).context("Failed to create gateway server")?;
	let result = server.serve().await;
	otel::shutdown_tracer();
	result
}

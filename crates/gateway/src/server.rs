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

use std::sync::Arc;

use actix_web::{App, HttpServer, ResponseError, error::InternalError, web};
use anyhow::{Context, Result};
use lifeline_matching::{
	FileSnapshotStorage, MatchingConfig, MatchingEngine, MemoryRecordStore, Registry, Snapshotter,
	snapshot::restore_latest,
};
use tracing::{info, warn};

use crate::{
	admission::AdmissionController,
	auth::{AuthProvider, JwtAuthProvider},
	config::GatewayRuntimeConfig,
	handlers::GatewayError,
	middleware::{CorsMiddleware, LoggingMiddleware},
	routes::configure_routes,
};

const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct GatewayState {
	pub engine: Arc<MatchingEngine>,
	pub registry: Arc<Registry>,
	pub auth_provider: Arc<dyn AuthProvider>,
	pub admission: Arc<AdmissionController>,
}

/// Reject a body, query or path that failed to extract, in the gateway error shape
fn reject<E>(err: E) -> actix_web::Error
where
	E: std::fmt::Debug + std::fmt::Display + 'static,
{
	let response = GatewayError::BadRequest(err.to_string()).error_response();
	InternalError::from_response(err, response).into()
}

pub fn json_config(limit: usize) -> web::JsonConfig {
	web::JsonConfig::default()
		.limit(limit)
		.error_handler(|err, _req| reject(err))
}

pub fn query_config() -> web::QueryConfig {
	web::QueryConfig::default().error_handler(|err, _req| reject(err))
}

pub fn path_config() -> web::PathConfig {
	web::PathConfig::default().error_handler(|err, _req| reject(err))
}

/// Gateway server
///
/// Owns the record store, its optional snapshotter and the HTTP listener.
pub struct GatewayServer {
	state: GatewayState,
	runtime: GatewayRuntimeConfig,
	snapshotter: Option<Snapshotter>,
}

impl GatewayServer {
	/// Build the store (restoring the newest snapshot when one exists) and the engine
	pub fn new(runtime: GatewayRuntimeConfig, matching: MatchingConfig) -> Result<Self> {
		let (store, snapshotter) = match &matching.snapshot_dir {
			Some(dir) => {
				let storage = FileSnapshotStorage::new(dir)
					.with_context(|| format!("Failed to open snapshot directory {}", dir.display()))?;
				let store = match restore_latest(&storage).context("Failed to restore snapshot")? {
					Some(store) => store,
					None => {
						info!(target: "server", dir = %dir.display(), "No snapshot found, starting empty");
						MemoryRecordStore::new()
					}
				};
				let store = Arc::new(store);
				let snapshotter = Snapshotter::start(
					Box::new(storage),
					matching.snapshotter_config(),
					store.clone(),
				)
				.context("Failed to start snapshotter")?;
				(store, Some(snapshotter))
			}
			None => {
				warn!(target: "server", "Snapshots disabled; records live in memory only");
				(Arc::new(MemoryRecordStore::new()), None)
			}
		};

		let engine = MatchingEngine::new(store.clone(), matching.engine_config());
		let registry = Registry::new(store, matching.store_timeout());
		let admission =
			AdmissionController::new(runtime.rate_limit_rps, runtime.rate_limit_burst)
				.context("Invalid rate limit configuration")?;

		Ok(Self {
			state: GatewayState {
				engine: Arc::new(engine),
				registry: Arc::new(registry),
				auth_provider: Arc::new(JwtAuthProvider::new(&runtime.jwt_secret)),
				admission: Arc::new(admission),
			},
			runtime,
			snapshotter,
		})
	}

	/// Serve until the process receives a shutdown signal
	pub async fn serve(self) -> Result<()> {
		let Self {
			state,
			runtime,
			snapshotter,
		} = self;

		let data = web::Data::new(state);
		let max_body_bytes = runtime.max_body_bytes;

		info!(
			target: "server",
			addr = %runtime.bind_addr,
			workers = runtime.workers,
			"Starting HTTP server"
		);

		let result = HttpServer::new(move || {
			App::new()
				.app_data(data.clone())
				.app_data(json_config(max_body_bytes))
				.app_data(query_config())
				.app_data(path_config())
				.wrap(LoggingMiddleware)
				.wrap(CorsMiddleware)
				.configure(configure_routes)
		})
		.workers(runtime.workers)
		.shutdown_timeout(SHUTDOWN_TIMEOUT_SECS)
		.bind(runtime.bind_addr)
		.with_context(|| format!("Failed to bind {}", runtime.bind_addr))?
		.run()
		.await
		.context("HTTP server failed");

		// Takes the final snapshot before returning
		if let Some(snapshotter) = snapshotter {
			snapshotter.shutdown();
		}
		info!(target: "server", "Gateway stopped");

		result
	}
}

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

//! Logging initialization for the gateway
//!
//! Environment variables:
//!
//! - `RUST_LOG`: filter (default `info`), e.g. `lifeline_gateway=debug,lifeline_matching=info`
//! - `LOG_DIR`: root directory for log files (default `{workspace_root}/logs`);
//!   files land in `{LOG_DIR}/gateway/`
//! - `LOG_TO_CONSOLE`: `true`, `1` or `yes` also writes to stderr with colors
//!
//! Files roll daily: `gateway.2026-01-03.log`, UTC RFC 3339 timestamps, no ANSI.
//! Spans are also handed to OpenTelemetry as configured by
//! [`TelemetryConfig`] (see [`crate::otel`]).

use std::{
	env,
	path::{Path, PathBuf},
	sync::OnceLock,
};

use anyhow::{Context, Result};
use tracing::info;
use tracing_appender::{
	non_blocking,
	rolling::{self, Rotation},
};
use tracing_subscriber::{
	EnvFilter, fmt, layer::SubscriberExt, registry::Registry, util::SubscriberInitExt,
};

use crate::config::{
	DEFAULT_LOG_LEVEL, DEFAULT_LOG_TO_CONSOLE, LOG_COMPONENT_NAME, TelemetryConfig,
};
use crate::otel;

// Flushes buffered lines on exit
static LOG_GUARD: OnceLock<non_blocking::WorkerGuard> = OnceLock::new();

/// Nearest ancestor of the working directory holding a workspace `Cargo.toml`
fn find_workspace_root() -> PathBuf {
	let start = env::var("CARGO_MANIFEST_DIR")
		.map(PathBuf::from)
		.or_else(|_| env::current_dir())
		.unwrap_or_else(|_| PathBuf::from("."));

	start
		.ancestors()
		.find(|dir| {
			std::fs::read_to_string(dir.join("Cargo.toml"))
				.map(|content| content.contains("[workspace]"))
				.unwrap_or(false)
		})
		.map(Path::to_path_buf)
		.unwrap_or(start)
}

fn log_root() -> PathBuf {
	env::var("LOG_DIR")
		.map(PathBuf::from)
		.unwrap_or_else(|_| find_workspace_root().join("logs"))
}

fn setup_file_logging(log_dir: &Path) -> Result<non_blocking::NonBlocking> {
	let file_appender = rolling::RollingFileAppender::builder()
		.rotation(Rotation::DAILY)
		.filename_prefix(LOG_COMPONENT_NAME.to_string())
		.filename_suffix("log")
		.build(log_dir)
		.with_context(|| {
			format!(
				"Failed to create rolling file appender in {}",
				log_dir.display()
			)
		})?;

	let (file_writer, guard) = non_blocking(file_appender);
	LOG_GUARD.set(guard).ok();

	Ok(file_writer)
}

/// Initialize file logging, optional console output and the OpenTelemetry layer
pub fn init_logging(telemetry: &TelemetryConfig) -> Result<()> {
	let log_level = env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());

	let log_dir = log_root().join(LOG_COMPONENT_NAME);
	std::fs::create_dir_all(&log_dir)
		.with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
	let file_writer = setup_file_logging(&log_dir)?;

	let log_to_console = env::var("LOG_TO_CONSOLE")
		.map(|v| v == "true" || v == "1" || v == "yes")
		.unwrap_or(DEFAULT_LOG_TO_CONSOLE);

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));
	let tracer = otel::init_tracer(telemetry).context("Failed to initialize OpenTelemetry")?;

	let file_layer = fmt::layer()
		.with_writer(file_writer)
		.with_timer(fmt::time::UtcTime::rfc_3339())
		.with_thread_ids(true)
		.with_target(true)
		.with_ansi(false);
	let console_layer = log_to_console.then(|| {
		fmt::layer()
			.with_writer(std::io::stderr)
			.with_timer(fmt::time::UtcTime::rfc_3339())
			.with_thread_ids(true)
			.with_target(true)
			.with_ansi(true)
	});

	Registry::default()
		.with(filter)
		.with(tracing_opentelemetry::layer().with_tracer(tracer))
		.with(file_layer)
		.with(console_layer)
		.try_init()
		.context("Failed to install tracing subscriber")?;

	info!(target: "server", "Log level: {}", log_level);
	info!(target: "server", "Log directory: {}", log_dir.display());
	if log_to_console {
		info!(target: "server", "Console output: enabled");
	}
	match &telemetry.otlp_endpoint {
		Some(endpoint) => info!(
			target: "server",
			endpoint = %endpoint,
			service = %telemetry.service_name,
			sample_ratio = telemetry.sample_ratio,
			"Exporting spans over OTLP"
		),
		None => info!(target: "server", "OTLP export disabled"),
	}

	Ok(())
}

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

use std::{env, net::SocketAddr, str::FromStr, time::Duration};

use anyhow::{Context, Result, bail};

// Logging configuration constants
/// Default log level (can be overridden by RUST_LOG environment variable)
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default log directory component name
pub const LOG_COMPONENT_NAME: &str = "gateway";

/// Default console output enabled (can be overridden by LOG_TO_CONSOLE environment variable)
pub const DEFAULT_LOG_TO_CONSOLE: bool = false;

// Server configuration constants
/// Default HTTP server bind address (can be overridden by GATEWAY_BIND_ADDR)
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Default maximum HTTP request body size in bytes (can be overridden by GATEWAY_MAX_BODY_BYTES)
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

// Admission configuration constants
/// Default requests-per-second limit per principal (can be overridden by GATEWAY_RATE_LIMIT_RPS)
pub const DEFAULT_RATE_LIMIT_RPS: u32 = 50;

/// Default burst capacity per principal (can be overridden by GATEWAY_RATE_LIMIT_BURST)
pub const DEFAULT_RATE_LIMIT_BURST: u32 = 100;

/// Optional matching config file (GATEWAY_MATCHING_CONFIG); env-only when unset
pub const MATCHING_CONFIG_ENV: &str = "GATEWAY_MATCHING_CONFIG";

// Telemetry configuration constants
/// Resource service name (can be overridden by OTEL_SERVICE_NAME)
pub const DEFAULT_SERVICE_NAME: &str = "lifeline-gateway";

/// Root span sampling ratio (can be overridden by OTEL_TRACES_SAMPLER_ARG)
pub const DEFAULT_SAMPLE_RATIO: f64 = 1.0;

/// OTLP export timeout in milliseconds (can be overridden by OTEL_EXPORTER_OTLP_TIMEOUT)
pub const DEFAULT_EXPORT_TIMEOUT_MS: u64 = 10_000;

/// OpenTelemetry export settings
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryConfig {
	/// OTLP gRPC endpoint; spans stay in-process when unset
	pub otlp_endpoint: Option<String>,
	pub service_name: String,
	/// Share of new root traces to sample, 0.0 to 1.0. Child spans follow
	/// their parent's decision.
	pub sample_ratio: f64,
	pub export_timeout: Duration,
}

impl Default for TelemetryConfig {
	fn default() -> Self {
		Self {
			otlp_endpoint: None,
			service_name: DEFAULT_SERVICE_NAME.to_string(),
			sample_ratio: DEFAULT_SAMPLE_RATIO,
			export_timeout: Duration::from_millis(DEFAULT_EXPORT_TIMEOUT_MS),
		}
	}
}

impl TelemetryConfig {
	pub fn from_env() -> Result<Self> {
		Self::from_lookup(|name| env::var(name).ok())
	}

	/// Build from any variable source; blank values count as unset
	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
		let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

		let sample_ratio: f64 = parse_or(
			"OTEL_TRACES_SAMPLER_ARG",
			lookup("OTEL_TRACES_SAMPLER_ARG"),
			DEFAULT_SAMPLE_RATIO,
		)?;
		if !(0.0..=1.0).contains(&sample_ratio) {
			bail!("OTEL_TRACES_SAMPLER_ARG must be between 0 and 1, got {}", sample_ratio);
		}
		let timeout_ms = parse_or(
			"OTEL_EXPORTER_OTLP_TIMEOUT",
			lookup("OTEL_EXPORTER_OTLP_TIMEOUT"),
			DEFAULT_EXPORT_TIMEOUT_MS,
		)?;

		Ok(Self {
			otlp_endpoint: lookup("OTEL_EXPORTER_OTLP_ENDPOINT").map(|e| e.trim().to_string()),
			service_name: lookup("OTEL_SERVICE_NAME")
				.unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string()),
			sample_ratio,
			export_timeout: Duration::from_millis(timeout_ms),
		})
	}
}

#[derive(Debug, Clone)]
pub struct GatewayRuntimeConfig {
	pub bind_addr: SocketAddr,
	pub workers: usize,
	pub max_body_bytes: usize,
	/// HS256 secret for bearer tokens (GATEWAY_JWT_SECRET, required)
	pub jwt_secret: String,
	pub rate_limit_rps: u32,
	pub rate_limit_burst: u32,
	pub matching_config_path: Option<String>,
	pub telemetry: TelemetryConfig,
}

impl GatewayRuntimeConfig {
	pub fn from_env() -> Result<Self> {
		dotenv::dotenv().ok();

		let bind_addr_str =
			env::var("GATEWAY_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
		let bind_addr = bind_addr_str
			.parse()
			.with_context(|| format!("Invalid bind address: {}", bind_addr_str))?;

		let workers = env::var("GATEWAY_WORKERS")
			.ok()
			.and_then(|w| w.parse().ok())
			.unwrap_or_else(num_cpus::get);

		let max_body_bytes = env_or("GATEWAY_MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES)?;

		let jwt_secret = env::var("GATEWAY_JWT_SECRET")
			.context("GATEWAY_JWT_SECRET must be set")?;
		if jwt_secret.trim().is_empty() {
			bail!("GATEWAY_JWT_SECRET must not be empty");
		}

		let rate_limit_rps = env_or("GATEWAY_RATE_LIMIT_RPS", DEFAULT_RATE_LIMIT_RPS)?;
		let rate_limit_burst = env_or("GATEWAY_RATE_LIMIT_BURST", DEFAULT_RATE_LIMIT_BURST)?;
		if rate_limit_rps == 0 || rate_limit_burst == 0 {
			bail!("GATEWAY_RATE_LIMIT_RPS and GATEWAY_RATE_LIMIT_BURST must be > 0");
		}

		Ok(Self {
			bind_addr,
			workers,
			max_body_bytes,
			jwt_secret,
			rate_limit_rps,
			rate_limit_burst,
			matching_config_path: env::var(MATCHING_CONFIG_ENV).ok(),
			telemetry: TelemetryConfig::from_env()?,
		})
	}
}

fn env_or<T>(name: &str, default: T) -> Result<T>
where
	T: FromStr,
	T::Err: std::error::Error + Send + Sync + 'static,
{
	parse_or(name, env::var(name).ok(), default)
}

/// Parse an optional variable; a present but unparsable value is an error
fn parse_or<T>(name: &str, raw: Option<String>, default: T) -> Result<T>
where
	T: FromStr,
	T::Err: std::error::Error + Send + Sync + 'static,
{
	match raw {
		Some(raw) => raw
			.trim()
			.parse()
			.with_context(|| format!("{} has an invalid value: {:?}", name, raw)),
		None => Ok(default),
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use super::*;

	fn telemetry(vars: &[(&str, &str)]) -> Result<TelemetryConfig> {
		let vars: HashMap<String, String> = vars
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		TelemetryConfig::from_lookup(|name| vars.get(name).cloned())
	}

	#[test]
	fn test_telemetry_defaults() {
		let config = telemetry(&[]).unwrap();
		assert_eq!(config, TelemetryConfig::default());
		assert_eq!(config.service_name, "lifeline-gateway");
		assert!(config.otlp_endpoint.is_none());
	}

	#[test]
	fn test_telemetry_overrides() {
		let config = telemetry(&[
			("OTEL_EXPORTER_OTLP_ENDPOINT", " http://collector:4317 "),
			("OTEL_SERVICE_NAME", "lifeline-gateway-eu"),
			("OTEL_TRACES_SAMPLER_ARG", "0.25"),
			("OTEL_EXPORTER_OTLP_TIMEOUT", "2500"),
		])
		.unwrap();
		assert_eq!(config.otlp_endpoint.as_deref(), Some("http://collector:4317"));
		assert_eq!(config.service_name, "lifeline-gateway-eu");
		assert_eq!(config.sample_ratio, 0.25);
		assert_eq!(config.export_timeout, Duration::from_millis(2500));

		let blank = telemetry(&[("OTEL_EXPORTER_OTLP_ENDPOINT", "  ")]).unwrap();
		assert!(blank.otlp_endpoint.is_none());
	}

	#[test]
	fn test_telemetry_rejects_bad_ratio() {
		assert!(telemetry(&[("OTEL_TRACES_SAMPLER_ARG", "1.5")]).is_err());
		assert!(telemetry(&[("OTEL_TRACES_SAMPLER_ARG", "half")]).is_err());
		assert!(telemetry(&[("OTEL_EXPORTER_OTLP_TIMEOUT", "-1")]).is_err());
	}
}

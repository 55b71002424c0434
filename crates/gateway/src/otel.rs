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

//! OpenTelemetry export for gateway spans
//!
//! Everything comes from [`TelemetryConfig`]: without an OTLP endpoint the
//! provider still assigns trace ids but exports nothing. Incoming W3C
//! `traceparent` headers are honoured through the global propagator.

use std::sync::OnceLock;

use anyhow::{Context, Result};
use opentelemetry::{global, trace::TracerProvider};
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::{
	propagation::TraceContextPropagator,
	resource::Resource,
	trace::{Sampler, SdkTracerProvider, Tracer},
};
use tracing::warn;

use crate::config::TelemetryConfig;

// Kept so batched spans can be flushed at shutdown
static PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// Build the tracer provider, register it globally and return the gateway tracer
pub fn init_tracer(config: &TelemetryConfig) -> Result<Tracer> {
	global::set_text_map_propagator(TraceContextPropagator::new());

	let builder = SdkTracerProvider::builder()
		.with_sampler(sampler(config.sample_ratio))
		.with_resource(
			Resource::builder()
				.with_service_name(config.service_name.clone())
				.build(),
		);

	let provider = match &config.otlp_endpoint {
		Some(endpoint) => {
			let exporter = SpanExporter::builder()
				.with_tonic()
				.with_endpoint(endpoint.clone())
				.with_timeout(config.export_timeout)
				.build()
				.with_context(|| format!("Failed to build OTLP exporter for {}", endpoint))?;
			builder.with_batch_exporter(exporter).build()
		}
		None => builder.build(),
	};

	let tracer = provider.tracer(config.service_name.clone());
	global::set_tracer_provider(provider.clone());
	PROVIDER.set(provider).ok();

	Ok(tracer)
}

/// Flush and stop the exporter; a no-op when no tracer was installed
pub fn shutdown_tracer() {
	if let Some(provider) = PROVIDER.get()
		&& let Err(e) = provider.shutdown()
	{
		warn!(target: "server", error = %e, "OpenTelemetry shutdown failed");
	}
}

/// Root spans are sampled at `ratio`; child spans follow their parent
fn sampler(ratio: f64) -> Sampler {
	let root = if ratio >= 1.0 {
		Sampler::AlwaysOn
	} else if ratio <= 0.0 {
		Sampler::AlwaysOff
	} else {
		Sampler::TraceIdRatioBased(ratio)
	};
	Sampler::ParentBased(Box::new(root))
}

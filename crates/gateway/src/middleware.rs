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

use std::future::{Ready, ready};
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use actix_web::{
	Error,
	dev::{Service, ServiceRequest, ServiceResponse, Transform},
	http::header::{
		ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
		HeaderName, HeaderValue,
	},
};
use tracing::{Instrument, info, warn};
use uuid::Uuid;

/// Correlation header; echoed back, or generated when the caller sent none
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// CORS middleware for actix-web
pub struct CorsMiddleware;

impl<S, B> Transform<S, ServiceRequest> for CorsMiddleware
where
	S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
	S::Future: 'static,
	B: 'static,
{
	type Response = ServiceResponse<B>;
	type Error = Error;
	type InitError = ();
	type Transform = CorsMiddlewareInner<S>;
	type Future = Ready<Result<Self::Transform, Self::InitError>>;

	fn new_transform(&self, service: S) -> Self::Future {
		ready(Ok(CorsMiddlewareInner {
			service: Rc::new(service),
		}))
	}
}

pub struct CorsMiddlewareInner<S> {
	service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for CorsMiddlewareInner<S>
where
	S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
	S::Future: 'static,
	B: 'static,
{
	type Response = ServiceResponse<B>;
	type Error = Error;
	type Future = Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>>>>;

	fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		self.service.poll_ready(cx)
	}

	fn call(&self, req: ServiceRequest) -> Self::Future {
		let service = self.service.clone();

		Box::pin(async move {
			let mut res = service.call(req).await?;

			// Add CORS headers
			use actix_web::http::header::HeaderValue;
			res.headers_mut().insert(
				actix_web::http::header::ACCESS_CONTROL_ALLOW_ORIGIN,
				HeaderValue::from_static("*"),
			);
			res.headers_mut().insert(
				actix_web::http::header::ACCESS_CONTROL_ALLOW_METHODS,
				HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
			);
			res.headers_mut().insert(
				actix_web::http::header::ACCESS_CONTROL_ALLOW_HEADERS,
				HeaderValue::from_static("Content-Type, Authorization"),
			);

			Ok(res)
		})
	}
}

/// Request logging middleware
///
/// Runs each request inside an `http_request` span carrying its request id.
pub struct LoggingMiddleware;

impl<S, B> Transform<S, ServiceRequest> for LoggingMiddleware
where
	S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
	S::Future: 'static,
	B: 'static,
{
	type Response = ServiceResponse<B>;
	type Error = Error;
	type InitError = ();
	type Transform = LoggingMiddlewareInner<S>;
	type Future = Ready<Result<Self::Transform, Self::InitError>>;

	fn new_transform(&self, service: S) -> Self::Future {
		ready(Ok(LoggingMiddlewareInner {
			service: Rc::new(service),
		}))
	}
}

pub struct LoggingMiddlewareInner<S> {
	service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for LoggingMiddlewareInner<S>
where
	S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
	S::Future: 'static,
	B: 'static,
{
	type Response = ServiceResponse<B>;
	type Error = Error;
	type Future = Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>>>>;

	fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		self.service.poll_ready(cx)
	}

	fn call(&self, req: ServiceRequest) -> Self::Future {
		let service = self.service.clone();
		let method = req.method().clone();
		let path = req.path().to_string();
		let request_id = req
			.headers()
			.get(REQUEST_ID_HEADER)
			.and_then(|v| v.to_str().ok())
			.filter(|v| !v.is_empty() && v.len() <= 128)
			.map(str::to_string)
			.unwrap_or_else(|| Uuid::new_v4().to_string());
		let span = tracing::info_span!(
			"http_request",
			method = %method,
			path = %path,
			request_id = %request_id
		);

		Box::pin(
			async move {
				let start = std::time::Instant::now();
				let res = service.call(req).await;
				let duration_ms = start.elapsed().as_millis();

				match res {
					Ok(mut response) => {
						let status = response.status();
						if status.is_server_error() {
							warn!(target: "server", status = status.as_u16(), duration_ms, "Request completed");
						} else {
							info!(target: "server", status = status.as_u16(), duration_ms, "Request completed");
						}
						if let Ok(value) = HeaderValue::from_str(&request_id) {
							response
								.headers_mut()
								.insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
						}
						Ok(response)
					}
					Err(e) => {
						tracing::error!(target: "server", error = %e, duration_ms, "Request failed");
						Err(e)
					}
				}
			}
			.instrument(span),
		)
	}
}

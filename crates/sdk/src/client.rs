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

use std::time::Duration;

use reqwest::{Client as ReqwestClient, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::types::{
	AllocateRequest, AllocateResponse, CreatedResponse, DeletedResponse, ErrorResponse,
	ExpirySweepResponse, MatchRecord, Organ, OrganId, Recipient, RecipientId,
	RegisterDonorRequest, RegisterOrganRequest, RegisterRecipientRequest, RunMatchingRequest,
	RunMatchingResponse, SystemStats, UpdateOrganRequest, UpdateRecipientRequest,
};

/// Error types for client operations
#[derive(Debug, Error)]
pub enum ClientError {
	#[error("Network error: {0}")]
	Network(String),
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Structured error returned by the gateway
	#[error("API error {status} {error}: {message}")]
	Api {
		status: u16,
		error: String,
		message: String,
	},
	#[error("Server error: {0}")]
	Server(String),
}

impl ClientError {
	/// True when the gateway refused an allocation because another caller won it
	pub fn is_conflict(&self) -> bool {
		matches!(self, ClientError::Api { error, .. } if error == "CONFLICT")
	}

	pub fn is_not_found(&self) -> bool {
		matches!(self, ClientError::Api { error, .. } if error == "NOT_FOUND")
	}
}

/// Client for interacting with the allocation gateway
///
/// This is an async client interface using reqwest for HTTP communication.
/// Every call carries the bearer token given to [`Client::with_token`].
pub struct Client {
	base_url: String,
	client: ReqwestClient,
	token: Option<String>,
}

impl Client {
	/// Create a new client with the given base URL
	pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
		Self::with_config(base_url, Duration::from_secs(30))
	}

	/// Create a new client with a custom request timeout
	pub fn with_config(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
		let client = ReqwestClient::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| ClientError::Network(format!("Failed to create HTTP client: {}", e)))?;

		Ok(Self {
			base_url: base_url.into(),
			client,
			token: None,
		})
	}

	/// Attach a bearer token to every request
	pub fn with_token(mut self, token: impl Into<String>) -> Self {
		self.token = Some(token.into());
		self
	}

	fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
		match &self.token {
			Some(token) => builder.bearer_auth(token),
			None => builder,
		}
	}

	async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
		let response = self
			.authorize(builder)
			.send()
			.await
			.map_err(|e| ClientError::Network(format!("Request failed: {}", e)))?;

		Self::decode(response).await
	}

	async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
		let status = response.status();
		if !status.is_success() {
			let body = response
				.text()
				.await
				.unwrap_or_else(|_| format!("HTTP {}", status));
			return Err(match serde_json::from_str::<ErrorResponse>(&body) {
				Ok(err) => ClientError::Api {
					status: status.as_u16(),
					error: err.error,
					message: err.message,
				},
				Err(_) => ClientError::Server(format!("{}: {}", status, body)),
			});
		}

		response
			.json()
			.await
			.map_err(|e| ClientError::Serialization(format!("Failed to parse response: {}", e)))
	}

	/// Rank waiting recipients for an organ
	pub async fn run_matching(&self, organ_id: OrganId) -> Result<RunMatchingResponse, ClientError> {
		let url = format!("{}/api/v1/matches/run", self.base_url);
		let body = RunMatchingRequest {
			organ_id: Some(organ_id),
		};
		self.send(self.client.post(&url).json(&body)).await
	}

	/// Commit a ranked candidate as the chosen match
	///
	/// Fails with a conflict (see [`ClientError::is_conflict`]) when another
	/// caller allocated the organ first.
	pub async fn allocate(&self, request: &AllocateRequest) -> Result<AllocateResponse, ClientError> {
		let url = format!("{}/api/v1/matches/allocate", self.base_url);
		self.send(self.client.post(&url).json(request)).await
	}

	/// Mark every AVAILABLE organ past its viability window as EXPIRED
	pub async fn check_expiry(&self) -> Result<ExpirySweepResponse, ClientError> {
		let url = format!("{}/api/v1/admin/check-expiry", self.base_url);
		self.send(self.client.post(&url)).await
	}

	pub async fn stats(&self) -> Result<SystemStats, ClientError> {
		let url = format!("{}/api/v1/admin/stats", self.base_url);
		self.send(self.client.get(&url)).await
	}

	pub async fn register_donor(
		&self,
		request: &RegisterDonorRequest,
	) -> Result<CreatedResponse, ClientError> {
		let url = format!("{}/api/v1/donors", self.base_url);
		self.send(self.client.post(&url).json(request)).await
	}

	pub async fn register_recipient(
		&self,
		request: &RegisterRecipientRequest,
	) -> Result<CreatedResponse, ClientError> {
		let url = format!("{}/api/v1/recipients", self.base_url);
		self.send(self.client.post(&url).json(request)).await
	}

	pub async fn register_organ(
		&self,
		request: &RegisterOrganRequest,
	) -> Result<CreatedResponse, ClientError> {
		let url = format!("{}/api/v1/organs", self.base_url);
		self.send(self.client.post(&url).json(request)).await
	}

	pub async fn get_organ(&self, organ_id: OrganId) -> Result<Organ, ClientError> {
		let url = format!("{}/api/v1/organs/{}", self.base_url, organ_id);
		self.send(self.client.get(&url)).await
	}

	/// Condition change and/or status override
	pub async fn update_organ(
		&self,
		organ_id: OrganId,
		request: &UpdateOrganRequest,
	) -> Result<Organ, ClientError> {
		let url = format!("{}/api/v1/organs/{}", self.base_url, organ_id);
		self.send(self.client.put(&url).json(request)).await
	}

	pub async fn update_recipient(
		&self,
		recipient_id: RecipientId,
		request: &UpdateRecipientRequest,
	) -> Result<Recipient, ClientError> {
		let url = format!("{}/api/v1/recipients/{}", self.base_url, recipient_id);
		self.send(self.client.put(&url).json(request)).await
	}

	pub async fn delete_organ(&self, organ_id: OrganId) -> Result<DeletedResponse, ClientError> {
		let url = format!("{}/api/v1/organs/{}", self.base_url, organ_id);
		self.send(self.client.delete(&url)).await
	}

	pub async fn list_matches(&self) -> Result<Vec<MatchRecord>, ClientError> {
		let url = format!("{}/api/v1/matches", self.base_url);
		self.send(self.client.get(&url)).await
	}

	/// Check gateway health
	pub async fn health_check(&self) -> Result<bool, ClientError> {
		let url = format!("{}/health", self.base_url);

		let response = self
			.client
			.get(&url)
			.send()
			.await
			.map_err(|e| ClientError::Network(format!("Request failed: {}", e)))?;

		Ok(response.status().is_success())
	}
}

/// Synchronous client wrapper
///
/// This wraps the async client and runs it in a tokio runtime.
/// For new code, prefer using the async Client directly.
pub struct SyncClient {
	client: Client,
	runtime: tokio::runtime::Runtime,
}

impl SyncClient {
	/// Create a new synchronous client
	pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
		let runtime = tokio::runtime::Runtime::new()
			.map_err(|e| anyhow::anyhow!("Failed to create tokio runtime: {}", e))?;
		Ok(Self {
			client: Client::new(base_url)?,
			runtime,
		})
	}

	pub fn with_token(mut self, token: impl Into<String>) -> Self {
		self.client = self.client.with_token(token);
		self
	}

	/// Rank candidates (synchronous)
	pub fn run_matching(&self, organ_id: OrganId) -> Result<RunMatchingResponse, ClientError> {
		self.runtime.block_on(self.client.run_matching(organ_id))
	}

	/// Allocate (synchronous)
	pub fn allocate(&self, request: &AllocateRequest) -> Result<AllocateResponse, ClientError> {
		self.runtime.block_on(self.client.allocate(request))
	}

	/// Run the expiry sweep (synchronous)
	pub fn check_expiry(&self) -> Result<ExpirySweepResponse, ClientError> {
		self.runtime.block_on(self.client.check_expiry())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_client_creation() {
		let client = Client::new("http://localhost:8080").unwrap();
		assert_eq!(client.base_url, "http://localhost:8080");
		assert!(client.token.is_none());

		let client = client.with_token("abc");
		assert_eq!(client.token.as_deref(), Some("abc"));
	}

	#[test]
	fn test_sync_client_creation() {
		let client = SyncClient::new("http://localhost:8080");
		assert!(client.is_ok());
	}

	#[test]
	fn test_conflict_classification() {
		let err = ClientError::Api {
			status: 409,
			error: "CONFLICT".to_string(),
			message: "organ 1 already allocated".to_string(),
		};
		assert!(err.is_conflict());
		assert!(!err.is_not_found());
	}
}

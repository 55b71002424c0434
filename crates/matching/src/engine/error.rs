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

use thiserror::Error;

use crate::{
	store::StoreError,
	types::{OrganId, OrganStatus, RecipientId, RecipientStatus},
};

/// Error categories surfaced to callers
///
/// Callers branch on the kind rather than on the concrete error so that a
/// lost allocation race ("someone else just took this organ") can be told
/// apart from a bad id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	InvalidArgument,
	NotFound,
	InvalidState,
	Conflict,
	StoreFailure,
}

impl ErrorKind {
	/// Stable code used in error bodies
	pub fn as_str(&self) -> &'static str {
		match self {
			ErrorKind::InvalidArgument => "INVALID_ARGUMENT",
			ErrorKind::NotFound => "NOT_FOUND",
			ErrorKind::InvalidState => "INVALID_STATE",
			ErrorKind::Conflict => "CONFLICT",
			ErrorKind::StoreFailure => "STORE_FAILURE",
		}
	}
}

/// Error types for ranking, allocation, expiry and registry operations
#[derive(Debug, Error)]
pub enum MatchingError {
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("{entity} {id} not found")]
	NotFound { entity: &'static str, id: u64 },
	#[error("Invalid state: {0}")]
	InvalidState(String),
	#[error("Conflict: {0}")]
	Conflict(String),
	#[error(transparent)]
	Store(#[from] StoreError),
}

impl MatchingError {
	pub fn invalid_argument(msg: impl Into<String>) -> Self {
		MatchingError::InvalidArgument(msg.into())
	}

	pub fn not_found(entity: &'static str, id: u64) -> Self {
		MatchingError::NotFound { entity, id }
	}

	pub fn organ_not_available(organ_id: OrganId, status: OrganStatus) -> Self {
		MatchingError::InvalidState(format!("organ {organ_id} is {status}, not AVAILABLE"))
	}

	pub fn organ_expired(organ_id: OrganId) -> Self {
		MatchingError::InvalidState(format!("organ {organ_id} is past its viability window"))
	}

	pub fn recipient_not_waiting(recipient_id: RecipientId, status: RecipientStatus) -> Self {
		MatchingError::InvalidState(format!(
			"recipient {recipient_id} is {status}, not WAITING"
		))
	}

	pub fn already_allocated(organ_id: OrganId) -> Self {
		MatchingError::Conflict(format!("organ {organ_id} has already been allocated"))
	}

	pub fn kind(&self) -> ErrorKind {
		match self {
			MatchingError::InvalidArgument(_) => ErrorKind::InvalidArgument,
			MatchingError::NotFound { .. } => ErrorKind::NotFound,
			MatchingError::InvalidState(_) => ErrorKind::InvalidState,
			MatchingError::Conflict(_) => ErrorKind::Conflict,
			MatchingError::Store(e) => match e {
				StoreError::NotFound { .. } => ErrorKind::NotFound,
				StoreError::OrganUnavailable { .. }
				| StoreError::RecipientUnavailable { .. }
				| StoreError::RecipientChanged { .. }
				| StoreError::Referenced { .. } => ErrorKind::Conflict,
				StoreError::OrganTransition { .. } => ErrorKind::InvalidState,
				StoreError::Unavailable(_) | StoreError::Timeout(_) => ErrorKind::StoreFailure,
			},
		}
	}

	/// Transient persistence failures; the core never retries these itself
	pub fn is_retryable(&self) -> bool {
		self.kind() == ErrorKind::StoreFailure
	}
}

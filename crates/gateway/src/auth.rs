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

//! Bearer-token authentication for Gateway
//!
//! Every `/api/v1` request carries `Authorization: Bearer <JWT>`. Tokens are
//! HS256-signed with claims `{sub, role, exp}`; issuing them is somebody
//! else's job, the gateway only verifies.
//!
//! - **Principal**: the authenticated subject and its role
//! - **AuthContext**: protocol-agnostic view of the request metadata
//! - **AuthProvider**: pluggable verification, `JwtAuthProvider` by default
//!
//! Authentication material lives in headers, never in the JSON body.

use actix_web::http::header::{AUTHORIZATION, HeaderMap};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use lifeline_sdk::types::Role;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const BEARER_PREFIX: &str = "Bearer ";

/// Error types for authentication operations
#[derive(Debug, Error)]
pub enum AuthError {
	#[error("Missing bearer token")]
	MissingToken,
	#[error("Malformed authorization header: {0}")]
	MalformedHeader(String),
	#[error("Invalid token: {0}")]
	InvalidToken(String),
	#[error("Role {role} may not {action}")]
	Forbidden { role: Role, action: &'static str },
}

impl AuthError {
	/// 403 rather than 401: the caller is known, just not allowed
	pub fn is_forbidden(&self) -> bool {
		matches!(self, AuthError::Forbidden { .. })
	}
}

/// Token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
	pub sub: String,
	pub role: Role,
	pub exp: usize,
}

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
	pub subject: String,
	pub role: Role,
}

impl Principal {
	/// Key used for per-principal rate limiting
	pub fn id(&self) -> &str {
		&self.subject
	}
}

/// Authentication context - protocol-agnostic container for auth materials
pub struct AuthContext<'a> {
	pub http_headers: Option<&'a HeaderMap>,
}

impl<'a> AuthContext<'a> {
	pub fn from_http(headers: &'a HeaderMap) -> Self {
		Self {
			http_headers: Some(headers),
		}
	}

	/// Raw token from `Authorization: Bearer <token>`
	pub fn bearer_token(&self) -> Result<&'a str, AuthError> {
		let header = self
			.http_headers
			.and_then(|h| h.get(AUTHORIZATION))
			.ok_or(AuthError::MissingToken)?;
		let value = header
			.to_str()
			.map_err(|e| AuthError::MalformedHeader(e.to_string()))?;
		let token = value
			.strip_prefix(BEARER_PREFIX)
			.ok_or_else(|| AuthError::MalformedHeader("expected Bearer scheme".to_string()))?
			.trim();
		if token.is_empty() {
			return Err(AuthError::MissingToken);
		}
		Ok(token)
	}
}

/// Authentication provider trait
///
/// Lets deployments swap in their own verification (an identity provider,
/// API keys) without touching the handlers.
pub trait AuthProvider: Send + Sync {
	fn authenticate(&self, ctx: &AuthContext) -> Result<Principal, AuthError>;
}

/// HS256 JWT verification with expiry checking
pub struct JwtAuthProvider {
	key: DecodingKey,
	validation: Validation,
}

impl JwtAuthProvider {
	pub fn new(secret: &str) -> Self {
		let mut validation = Validation::new(Algorithm::HS256);
		validation.set_required_spec_claims(&["exp", "sub"]);
		Self {
			key: DecodingKey::from_secret(secret.as_bytes()),
			validation,
		}
	}
}

impl AuthProvider for JwtAuthProvider {
	fn authenticate(&self, ctx: &AuthContext) -> Result<Principal, AuthError> {
		let token = ctx.bearer_token()?;
		let data = decode::<Claims>(token, &self.key, &self.validation)
			.map_err(|e| AuthError::InvalidToken(e.to_string()))?;
		if data.claims.sub.trim().is_empty() {
			return Err(AuthError::InvalidToken("empty subject".to_string()));
		}
		Ok(Principal {
			subject: data.claims.sub,
			role: data.claims.role,
		})
	}
}

/// Role gate for a single action
pub fn require_role(
	principal: &Principal,
	allowed: &[Role],
	action: &'static str,
) -> Result<(), AuthError> {
	if allowed.contains(&principal.role) {
		Ok(())
	} else {
		Err(AuthError::Forbidden {
			role: principal.role,
			action,
		})
	}
}

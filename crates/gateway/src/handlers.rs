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

use actix_web::{HttpRequest, HttpResponse, Responder, http::StatusCode, web};
use chrono::Utc;
use lifeline_matching::{
	AllocationCommand, ErrorKind, MatchingError, OrganFilter, RecipientFilter,
};
use lifeline_sdk::types::{
	AllocateRequest, AllocateResponse, CreatedResponse, ErrorResponse, ExpirySweepResponse,
	OrganStatus, OrganType, RecipientStatus, RecordMatchRequest, RegisterDonorRequest,
	DeletedResponse, RegisterOrganRequest, RegisterRecipientRequest, Role, RunMatchingRequest,
	UpdateDonorRequest, UpdateOrganRequest, UpdateOrganStatusRequest, UpdateRecipientRequest,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
	admission::{self, AdmissionError},
	auth::{self, AuthContext, AuthError, Principal},
	server::GatewayState,
};

const ALLOCATORS: &[Role] = &[Role::Admin, Role::HospitalCoordinator];
const ADMINS: &[Role] = &[Role::Admin];

/// Error types for gateway operations
#[derive(Debug, Error)]
pub enum GatewayError {
	#[error("Authentication error: {0}")]
	Auth(#[from] AuthError),
	#[error("Admission error: {0}")]
	Admission(#[from] AdmissionError),
	#[error(transparent)]
	Matching(#[from] MatchingError),
	/// Ranking asked for an organ that exists but is no longer AVAILABLE
	#[error("Organ not available: {0}")]
	NotRankable(String),
	#[error("Malformed request: {0}")]
	BadRequest(String),
}

impl GatewayError {
	fn code(&self) -> &'static str {
		match self {
			GatewayError::Auth(e) if e.is_forbidden() => "FORBIDDEN",
			GatewayError::Auth(_) => "UNAUTHORIZED",
			GatewayError::Admission(AdmissionError::RateLimitExceeded) => "RATE_LIMITED",
			GatewayError::Admission(AdmissionError::InvalidRequest(_)) => "INVALID_ARGUMENT",
			GatewayError::Admission(AdmissionError::InvalidQuota(_)) => "INTERNAL",
			GatewayError::Matching(e) => e.kind().as_str(),
			GatewayError::NotRankable(_) => ErrorKind::InvalidState.as_str(),
			GatewayError::BadRequest(_) => ErrorKind::InvalidArgument.as_str(),
		}
	}
}

impl actix_web::ResponseError for GatewayError {
	fn status_code(&self) -> StatusCode {
		match self {
			GatewayError::Auth(e) if e.is_forbidden() => StatusCode::FORBIDDEN,
			GatewayError::Auth(_) => StatusCode::UNAUTHORIZED,
			GatewayError::Admission(AdmissionError::RateLimitExceeded) => {
				StatusCode::TOO_MANY_REQUESTS
			}
			GatewayError::Admission(AdmissionError::InvalidRequest(_)) => StatusCode::BAD_REQUEST,
			GatewayError::Admission(AdmissionError::InvalidQuota(_)) => {
				StatusCode::INTERNAL_SERVER_ERROR
			}
			GatewayError::Matching(e) => match e.kind() {
				ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
				ErrorKind::NotFound => StatusCode::NOT_FOUND,
				ErrorKind::InvalidState | ErrorKind::Conflict => StatusCode::CONFLICT,
				ErrorKind::StoreFailure => StatusCode::SERVICE_UNAVAILABLE,
			},
			GatewayError::NotRankable(_) => StatusCode::NOT_FOUND,
			GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
		}
	}

	fn error_response(&self) -> HttpResponse {
		let status = self.status_code();
		if status.is_server_error() {
			warn!(target: "server", status = status.as_u16(), error = %self, "Request failed");
		}
		HttpResponse::build(status).json(ErrorResponse {
			error: self.code().to_string(),
			message: self.to_string(),
		})
	}
}

/// Authenticate, rate limit and, when `allowed` is given, check the role
fn authorize(
	state: &GatewayState,
	req: &HttpRequest,
	allowed: Option<&[Role]>,
	action: &'static str,
) -> Result<Principal, GatewayError> {
	let principal = state
		.auth_provider
		.authenticate(&AuthContext::from_http(req.headers()))?;
	state.admission.check_rate_limit(&principal)?;
	if let Some(allowed) = allowed {
		auth::require_role(&principal, allowed, action)?;
	}
	Ok(principal)
}

fn created(id: u64, message: &str) -> HttpResponse {
	HttpResponse::Created().json(CreatedResponse {
		id,
		message: message.to_string(),
	})
}

fn deleted(id: u64, message: &str) -> HttpResponse {
	HttpResponse::Ok().json(DeletedResponse {
		id,
		message: message.to_string(),
	})
}

/// Health check endpoint
pub async fn health() -> impl Responder {
	HttpResponse::Ok().json(serde_json::json!({
		"status": "ok",
		"service": "lifeline-gateway"
	}))
}

/// Rank WAITING recipients for an organ
///
/// A missing organ and an organ that is no longer AVAILABLE both answer 404;
/// the `error` field (`NOT_FOUND` vs `INVALID_STATE`) tells them apart.
pub async fn run_matching(
	state: web::Data<GatewayState>,
	req: HttpRequest,
	body: web::Json<RunMatchingRequest>,
) -> Result<HttpResponse, GatewayError> {
	let principal = authorize(&state, &req, None, "run matching")?;
	let organ_id = admission::require_id("organ_id", body.organ_id)?;

	let ranking = state
		.engine
		.rank_candidates(organ_id)
		.await
		.map_err(|e| match e.kind() {
			ErrorKind::InvalidState => GatewayError::NotRankable(e.to_string()),
			_ => GatewayError::Matching(e),
		})?;

	info!(
		target: "server",
		organ_id,
		subject = principal.id(),
		candidates = ranking.candidates.len(),
		"Matching run"
	);
	Ok(HttpResponse::Ok().json(ranking.into_response()))
}

/// Allocate an organ to a ranked recipient
pub async fn allocate(
	state: web::Data<GatewayState>,
	req: HttpRequest,
	body: web::Json<AllocateRequest>,
) -> Result<HttpResponse, GatewayError> {
	let principal = authorize(&state, &req, Some(ALLOCATORS), "allocate organs")?;
	let request = body.into_inner();
	admission::optional_id("organ_id", request.organ_id)?;
	admission::optional_id("recipient_id", request.recipient_id)?;

	let outcome = state
		.engine
		.allocate(AllocationCommand::from(request))
		.await?;

	info!(
		target: "server",
		match_id = outcome.match_record.id,
		organ_id = outcome.match_record.organ_id,
		recipient_id = outcome.match_record.recipient_id,
		subject = principal.id(),
		"Allocation committed"
	);
	Ok(HttpResponse::Created().json(AllocateResponse {
		match_id: outcome.match_record.id,
		final_score: outcome.score.total(),
		message: "Organ allocated successfully".to_string(),
	}))
}

pub async fn list_matches(
	state: web::Data<GatewayState>,
	req: HttpRequest,
) -> Result<HttpResponse, GatewayError> {
	authorize(&state, &req, None, "list matches")?;
	Ok(HttpResponse::Ok().json(state.registry.list_matches().await?))
}

pub async fn get_match(
	state: web::Data<GatewayState>,
	req: HttpRequest,
	path: web::Path<u64>,
) -> Result<HttpResponse, GatewayError> {
	authorize(&state, &req, None, "read matches")?;
	Ok(HttpResponse::Ok().json(state.registry.get_match(path.into_inner()).await?))
}

/// Administrative PENDING match record
pub async fn record_match(
	state: web::Data<GatewayState>,
	req: HttpRequest,
	body: web::Json<RecordMatchRequest>,
) -> Result<HttpResponse, GatewayError> {
	authorize(&state, &req, Some(ADMINS), "record matches")?;
	let record = state.registry.record_match(body.into_inner(), Utc::now()).await?;
	Ok(created(record.id, "Match recorded"))
}

/// Run the expiry sweep now
pub async fn check_expiry(
	state: web::Data<GatewayState>,
	req: HttpRequest,
) -> Result<HttpResponse, GatewayError> {
	authorize(&state, &req, Some(ADMINS), "sweep expired organs")?;
	let sweep = state.engine.sweep_expired(Utc::now()).await?;
	Ok(HttpResponse::Ok().json(ExpirySweepResponse {
		expired_count: sweep.expired_count(),
		expired_ids: sweep.expired_ids,
	}))
}

pub async fn stats(
	state: web::Data<GatewayState>,
	req: HttpRequest,
) -> Result<HttpResponse, GatewayError> {
	authorize(&state, &req, Some(ADMINS), "read system stats")?;
	Ok(HttpResponse::Ok().json(state.registry.summary().await?))
}

pub async fn list_donors(
	state: web::Data<GatewayState>,
	req: HttpRequest,
) -> Result<HttpResponse, GatewayError> {
	authorize(&state, &req, None, "list donors")?;
	Ok(HttpResponse::Ok().json(state.registry.list_donors().await?))
}

pub async fn get_donor(
	state: web::Data<GatewayState>,
	req: HttpRequest,
	path: web::Path<u64>,
) -> Result<HttpResponse, GatewayError> {
	authorize(&state, &req, None, "read donors")?;
	Ok(HttpResponse::Ok().json(state.registry.get_donor(path.into_inner()).await?))
}

pub async fn register_donor(
	state: web::Data<GatewayState>,
	req: HttpRequest,
	body: web::Json<RegisterDonorRequest>,
) -> Result<HttpResponse, GatewayError> {
	authorize(&state, &req, None, "register donors")?;
	let donor = state.registry.register_donor(body.into_inner(), Utc::now()).await?;
	Ok(created(donor.id, "Donor registered"))
}

pub async fn update_donor(
	state: web::Data<GatewayState>,
	req: HttpRequest,
	path: web::Path<u64>,
	body: web::Json<UpdateDonorRequest>,
) -> Result<HttpResponse, GatewayError> {
	let principal = authorize(&state, &req, Some(ADMINS), "update donors")?;
	let donor = state
		.registry
		.update_donor(path.into_inner(), body.into_inner())
		.await?;
	info!(target: "server", donor_id = donor.id, subject = principal.id(), "Donor updated");
	Ok(HttpResponse::Ok().json(donor))
}

pub async fn delete_donor(
	state: web::Data<GatewayState>,
	req: HttpRequest,
	path: web::Path<u64>,
) -> Result<HttpResponse, GatewayError> {
	let principal = authorize(&state, &req, Some(ADMINS), "delete donors")?;
	let donor_id = path.into_inner();
	state.registry.delete_donor(donor_id).await?;
	info!(target: "server", donor_id, subject = principal.id(), "Donor deleted");
	Ok(deleted(donor_id, "Donor deleted"))
}

#[derive(Debug, Default, Deserialize)]
pub struct RecipientQuery {
	pub status: Option<RecipientStatus>,
	pub organ_needed: Option<OrganType>,
}

pub async fn list_recipients(
	state: web::Data<GatewayState>,
	req: HttpRequest,
	query: web::Query<RecipientQuery>,
) -> Result<HttpResponse, GatewayError> {
	authorize(&state, &req, None, "list recipients")?;
	let filter = RecipientFilter {
		status: query.status,
		organ_needed: query.organ_needed,
	};
	Ok(HttpResponse::Ok().json(state.registry.list_recipients(filter).await?))
}

pub async fn get_recipient(
	state: web::Data<GatewayState>,
	req: HttpRequest,
	path: web::Path<u64>,
) -> Result<HttpResponse, GatewayError> {
	authorize(&state, &req, None, "read recipients")?;
	Ok(HttpResponse::Ok().json(state.registry.get_recipient(path.into_inner()).await?))
}

pub async fn register_recipient(
	state: web::Data<GatewayState>,
	req: HttpRequest,
	body: web::Json<RegisterRecipientRequest>,
) -> Result<HttpResponse, GatewayError> {
	authorize(&state, &req, None, "register recipients")?;
	let recipient = state
		.registry
		.register_recipient(body.into_inner(), Utc::now())
		.await?;
	Ok(created(recipient.id, "Recipient registered"))
}

/// Administrative edit, status included (never to MATCHED)
pub async fn update_recipient(
	state: web::Data<GatewayState>,
	req: HttpRequest,
	path: web::Path<u64>,
	body: web::Json<UpdateRecipientRequest>,
) -> Result<HttpResponse, GatewayError> {
	let principal = authorize(&state, &req, Some(ADMINS), "update recipients")?;
	let recipient = state
		.registry
		.update_recipient(path.into_inner(), body.into_inner())
		.await?;
	info!(
		target: "server",
		recipient_id = recipient.id,
		status = %recipient.status,
		subject = principal.id(),
		"Recipient updated"
	);
	Ok(HttpResponse::Ok().json(recipient))
}

pub async fn delete_recipient(
	state: web::Data<GatewayState>,
	req: HttpRequest,
	path: web::Path<u64>,
) -> Result<HttpResponse, GatewayError> {
	let principal = authorize(&state, &req, Some(ADMINS), "delete recipients")?;
	let recipient_id = path.into_inner();
	state.registry.delete_recipient(recipient_id).await?;
	info!(target: "server", recipient_id, subject = principal.id(), "Recipient deleted");
	Ok(deleted(recipient_id, "Recipient deleted"))
}

#[derive(Debug, Default, Deserialize)]
pub struct OrganQuery {
	pub status: Option<OrganStatus>,
	pub organ_type: Option<OrganType>,
}

pub async fn list_organs(
	state: web::Data<GatewayState>,
	req: HttpRequest,
	query: web::Query<OrganQuery>,
) -> Result<HttpResponse, GatewayError> {
	authorize(&state, &req, None, "list organs")?;
	let filter = OrganFilter {
		status: query.status,
		organ_type: query.organ_type,
	};
	Ok(HttpResponse::Ok().json(state.registry.list_organs(filter).await?))
}

pub async fn get_organ(
	state: web::Data<GatewayState>,
	req: HttpRequest,
	path: web::Path<u64>,
) -> Result<HttpResponse, GatewayError> {
	authorize(&state, &req, None, "read organs")?;
	Ok(HttpResponse::Ok().json(state.registry.get_organ(path.into_inner()).await?))
}

pub async fn register_organ(
	state: web::Data<GatewayState>,
	req: HttpRequest,
	body: web::Json<RegisterOrganRequest>,
) -> Result<HttpResponse, GatewayError> {
	authorize(&state, &req, Some(ALLOCATORS), "register organs")?;
	let request = body.into_inner();
	admission::require_id("donor_id", Some(request.donor_id))?;
	let organ = state.registry.register_organ(request, Utc::now()).await?;
	Ok(created(organ.id, "Organ added"))
}

/// Manual override to EXPIRED or TRANSPLANTED
pub async fn update_organ_status(
	state: web::Data<GatewayState>,
	req: HttpRequest,
	path: web::Path<u64>,
	body: web::Json<UpdateOrganStatusRequest>,
) -> Result<HttpResponse, GatewayError> {
	let principal = authorize(&state, &req, Some(ADMINS), "override organ status")?;
	let organ_id = path.into_inner();
	let organ = state
		.registry
		.update_organ_status(organ_id, body.status)
		.await?;
	info!(
		target: "server",
		organ_id,
		status = %organ.status,
		subject = principal.id(),
		"Organ status overridden"
	);
	Ok(HttpResponse::Ok().json(organ))
}

/// Condition change and/or status override
pub async fn update_organ(
	state: web::Data<GatewayState>,
	req: HttpRequest,
	path: web::Path<u64>,
	body: web::Json<UpdateOrganRequest>,
) -> Result<HttpResponse, GatewayError> {
	let principal = authorize(&state, &req, Some(ALLOCATORS), "update organs")?;
	let organ = state
		.registry
		.update_organ(path.into_inner(), body.into_inner())
		.await?;
	info!(
		target: "server",
		organ_id = organ.id,
		status = %organ.status,
		condition = %organ.condition,
		subject = principal.id(),
		"Organ updated"
	);
	Ok(HttpResponse::Ok().json(organ))
}

pub async fn delete_organ(
	state: web::Data<GatewayState>,
	req: HttpRequest,
	path: web::Path<u64>,
) -> Result<HttpResponse, GatewayError> {
	let principal = authorize(&state, &req, Some(ADMINS), "delete organs")?;
	let organ_id = path.into_inner();
	state.registry.delete_organ(organ_id).await?;
	info!(target: "server", organ_id, subject = principal.id(), "Organ deleted");
	Ok(deleted(organ_id, "Organ deleted"))
}

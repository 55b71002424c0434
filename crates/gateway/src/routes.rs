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

use actix_web::web;

use crate::handlers;

/// Configure API routes for the gateway
///
/// - `/api/v1/matches` - ranking, allocation and match records
/// - `/api/v1/admin` - expiry sweep and counts (ADMIN only)
/// - `/api/v1/donors`, `/recipients`, `/organs` - registry (PUT and DELETE are admin edits)
/// - `/health` - unauthenticated liveness
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
	cfg.service(
		web::scope("/api/v1")
			.service(
				web::scope("/matches")
					.route("", web::get().to(handlers::list_matches))
					.route("", web::post().to(handlers::record_match))
					.route("/run", web::post().to(handlers::run_matching))
					.route("/allocate", web::post().to(handlers::allocate))
					.route("/{match_id}", web::get().to(handlers::get_match)),
			)
			.service(
				web::scope("/admin")
					.route("/check-expiry", web::post().to(handlers::check_expiry))
					.route("/check-expiry", web::get().to(handlers::check_expiry))
					.route("/stats", web::get().to(handlers::stats)),
			)
			.route("/donors", web::get().to(handlers::list_donors))
			.route("/donors", web::post().to(handlers::register_donor))
			.route("/donors/{donor_id}", web::get().to(handlers::get_donor))
			.route("/donors/{donor_id}", web::put().to(handlers::update_donor))
			.route("/donors/{donor_id}", web::delete().to(handlers::delete_donor))
			.route("/recipients", web::get().to(handlers::list_recipients))
			.route("/recipients", web::post().to(handlers::register_recipient))
			.route("/recipients/{recipient_id}", web::get().to(handlers::get_recipient))
			.route("/recipients/{recipient_id}", web::put().to(handlers::update_recipient))
			.route(
				"/recipients/{recipient_id}",
				web::delete().to(handlers::delete_recipient),
			)
			.route("/organs", web::get().to(handlers::list_organs))
			.route("/organs", web::post().to(handlers::register_organ))
			.route("/organs/{organ_id}", web::get().to(handlers::get_organ))
			.route("/organs/{organ_id}", web::put().to(handlers::update_organ))
			.route("/organs/{organ_id}", web::delete().to(handlers::delete_organ))
			.route(
				"/organs/{organ_id}/status",
				web::put().to(handlers::update_organ_status),
			),
	)
	.route("/health", web::get().to(handlers::health));
}

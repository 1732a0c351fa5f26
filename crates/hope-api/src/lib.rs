pub mod analytics;
pub mod auth;
pub mod bridge;
pub mod campaigns;
pub mod checkout;
pub mod error;
pub mod extract;
pub mod fields;
pub mod leaves;
pub mod mailer;
pub mod middleware;
pub mod payments;
pub mod sanctuary;
pub mod state;
pub mod subscriptions;
pub mod webhooks;

#[cfg(test)]
pub(crate) mod test_support;

use axum::{
    Json, Router,
    middleware::from_fn_with_state,
    routing::{get, patch, post},
};
use serde_json::json;

use crate::middleware::{require_admin, require_auth};
use crate::state::AppState;

/// Every API route. Cross-cutting layers (CORS, tracing) are added by the server.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/api/auth/magic-link", post(auth::request_magic_link))
        .route("/api/auth/verify", post(auth::verify_magic_link))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/campaigns", get(campaigns::list_public))
        .route("/api/campaigns/{slug}", get(campaigns::get_public))
        .route("/api/campaigns/{slug}/leaves", post(leaves::create))
        .route("/api/bridge/{slug}", get(bridge::get_public))
        .route("/api/tiers", get(checkout::list_tiers))
        .route("/api/checkout", post(checkout::create))
        .route("/api/webhooks/stripe", post(webhooks::stripe));

    let protected_routes = Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/commitments", get(subscriptions::list))
        .route("/api/subscriptions/pause", post(subscriptions::pause))
        .route("/api/sanctuary/{campaign}", get(sanctuary::overview))
        .route("/api/sanctuary/{campaign}/claim", post(sanctuary::claim))
        .route(
            "/api/sanctuary/{campaign}/members",
            get(sanctuary::list_members).post(sanctuary::invite_member),
        )
        .route("/api/sanctuary/{campaign}/days/{day}", post(sanctuary::complete_day))
        .route(
            "/api/sanctuary/{campaign}/{resource}",
            get(sanctuary::list_records).post(sanctuary::create_record),
        )
        .route(
            "/api/sanctuary/{campaign}/{resource}/{item_id}",
            patch(sanctuary::update_record).delete(sanctuary::delete_record),
        )
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let admin_routes = Router::new()
        .route("/api/admin/campaigns", get(campaigns::admin_list).post(campaigns::create))
        .route(
            "/api/admin/campaigns/{id}",
            get(campaigns::admin_get).patch(campaigns::update).delete(campaigns::delete),
        )
        .route("/api/admin/leaves/{id}", patch(leaves::moderate).delete(leaves::delete))
        .route("/api/admin/bridge", get(bridge::list).post(bridge::create))
        .route("/api/admin/bridge/{id}/link", post(bridge::link))
        .route(
            "/api/admin/bridge/{id}/outreach",
            get(bridge::list_outreach).post(bridge::record_outreach),
        )
        .route_layer(from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "success": true, "status": "ok" }))
}

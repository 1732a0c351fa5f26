use axum::{
    Extension, Json,
    extract::State,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use tracing::{error, info};

use hope_types::api::{PauseSubscriptionRequest, present};
use hope_types::models::{Claims, CommitmentStatus};

use crate::analytics::AnalyticsEvent;
use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::state::{AppState, blocking};

/// GET /api/commitments — the caller's own commitments, matched by email.
pub async fn list(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let commitments = blocking(&state, move |db| db.list_commitments_for_email(&claims.email)).await?;
    Ok(Json(json!({ "success": true, "commitments": commitments })))
}

/// POST /api/subscriptions/pause
pub async fn pause(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    JsonBody(req): JsonBody<PauseSubscriptionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let commitment_id = present(&req.commitment_id)
        .ok_or(ApiError::BadRequest("Missing required fields"))?
        .to_string();
    if req.resume_at.is_some_and(|ts| ts <= Utc::now().timestamp()) {
        return Err(ApiError::BadRequest("Invalid resume date"));
    }

    let lookup_id = commitment_id.clone();
    let commitment = blocking(&state, move |db| db.get_commitment(&lookup_id))
        .await?
        .ok_or(ApiError::NotFound("Commitment not found"))?;

    let owns = commitment
        .email
        .as_deref()
        .is_some_and(|email| email.eq_ignore_ascii_case(&claims.email));
    if !owns && !claims.is_admin() {
        return Err(ApiError::FORBIDDEN);
    }

    let subscription_id = match (&commitment.status, &commitment.subscription_id) {
        (CommitmentStatus::Active, Some(id)) => id.clone(),
        _ => return Err(ApiError::BadRequest("Subscription not active")),
    };

    if let Err(e) = state.payments.pause_subscription(&subscription_id, req.resume_at).await {
        error!("Pausing subscription {} failed: {}", subscription_id, e);
        return Err(ApiError::Upstream("Failed to pause subscription"));
    }

    let paused = blocking(&state, move |db| db.set_commitment_status(&commitment_id, CommitmentStatus::Paused))
        .await?
        .ok_or(ApiError::NotFound("Commitment not found"))?;

    info!("Subscription {} paused by {}", subscription_id, claims.sub);
    state.analytics.capture(
        AnalyticsEvent::new("subscription_paused", claims.sub)
            .with("campaign_id", paused.campaign_id.clone())
            .with("commitment_id", paused.id.clone()),
    );
    Ok(Json(json!({ "success": true, "commitment": paused })))
}

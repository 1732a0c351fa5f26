use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{Value, json};
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::analytics::AnalyticsEvent;
use crate::error::ApiError;
use crate::state::{AppState, blocking};

/// Oldest signature timestamp accepted, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("malformed signature header")]
    Malformed,
    #[error("signature timestamp outside tolerance")]
    Expired,
    #[error("no matching signature")]
    Mismatch,
}

/// Verifies a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=...]`)
/// against the raw request body.
pub fn verify_signature(secret: &str, header: &str, payload: &[u8], now: i64) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(SignatureError::Expired);
    }

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Malformed)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    let matched = signatures
        .iter()
        .filter_map(|sig| hex::decode(sig).ok())
        .any(|sig| mac.clone().verify_slice(&sig).is_ok());
    if matched { Ok(()) } else { Err(SignatureError::Mismatch) }
}

#[derive(Debug, Deserialize)]
struct StripeEvent {
    #[serde(rename = "type")]
    kind: String,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: Value,
}

/// POST /api/webhooks/stripe
pub async fn stripe(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let Some(secret) = state.settings.stripe_webhook_secret.as_deref() else {
        error!("Stripe webhook received but no signing secret is configured");
        return Err(ApiError::Internal);
    };

    let header = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::BadRequest("Invalid signature"))?;
    if let Err(e) = verify_signature(secret, header, &body, Utc::now().timestamp()) {
        warn!("Rejected Stripe webhook: {}", e);
        return Err(ApiError::BadRequest("Invalid signature"));
    }

    let event: StripeEvent =
        serde_json::from_slice(&body).map_err(|_| ApiError::BadRequest("Invalid request body"))?;
    let object = event.data.object;

    match event.kind.as_str() {
        "checkout.session.completed" => {
            let session_id = object["id"].as_str().unwrap_or_default().to_string();
            let subscription_id = object["subscription"].as_str().map(str::to_string);
            let activated = blocking(&state, move |db| {
                db.activate_commitment(&session_id, subscription_id.as_deref())
            })
            .await?;

            match activated {
                Some(commitment) => {
                    info!("Commitment {} active", commitment.id);
                    state.analytics.capture(
                        AnalyticsEvent::new("commitment_activated", commitment.id.clone())
                            .with("campaign_id", commitment.campaign_id.clone())
                            .with("tier", commitment.tier.clone())
                            .with("amount_cents", commitment.amount_cents),
                    );
                }
                None => warn!("Checkout completed for unknown session {}", object["id"]),
            }
        }
        "customer.subscription.deleted" => {
            let subscription_id = object["id"].as_str().unwrap_or_default().to_string();
            let canceled = blocking(&state, move |db| db.cancel_subscription_commitments(&subscription_id)).await?;
            info!("Subscription {} canceled ({} commitments)", object["id"], canceled);
            if canceled > 0 {
                state.analytics.capture(
                    AnalyticsEvent::anonymous("subscription_canceled").with("subscription_id", object["id"].clone()),
                );
            }
        }
        other => debug!("Ignoring Stripe event {}", other),
    }

    Ok(Json(json!({ "success": true, "received": true })))
}

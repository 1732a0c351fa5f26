use axum::{Json, extract::State, response::IntoResponse};
use hope_db::models::NewCommitment;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use hope_types::api::{CheckoutRequest, present};
use hope_types::ident::CampaignRef;
use hope_types::models::CommitmentSource;

use crate::analytics::AnalyticsEvent;
use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::payments::CheckoutSessionRequest;
use crate::state::{AppState, blocking};

/// A monthly giving level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Tier {
    pub key: &'static str,
    pub label: &'static str,
    pub amount_cents: i64,
}

pub const TIERS: &[Tier] = &[
    Tier { key: "seed", label: "Seed", amount_cents: 1_000 },
    Tier { key: "sapling", label: "Sapling", amount_cents: 2_500 },
    Tier { key: "grove", label: "Grove", amount_cents: 5_000 },
    Tier { key: "forest", label: "Forest", amount_cents: 10_000 },
];

pub fn find_tier(key: &str) -> Option<&'static Tier> {
    TIERS.iter().find(|t| t.key == key)
}

/// GET /api/tiers
pub async fn list_tiers() -> impl IntoResponse {
    Json(json!({ "success": true, "tiers": TIERS }))
}

/// POST /api/checkout — starts a monthly subscription for a campaign.
///
/// A pending commitment is written first so the webhook can find it by
/// session id; it is discarded again if the provider call fails.
pub async fn create(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CheckoutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(campaign_ref), Some(tier_key)) = (present(&req.campaign_id), present(&req.monthly_tier)) else {
        return Err(ApiError::BadRequest("Missing required fields"));
    };
    let tier = find_tier(tier_key).ok_or(ApiError::BadRequest("Invalid tier"))?;

    let email = match present(&req.email) {
        Some(email) if email.contains('@') => Some(email.to_lowercase()),
        Some(_) => return Err(ApiError::BadRequest("Invalid email")),
        None => None,
    };
    let supporter_name = present(&req.supporter_name).map(str::to_string);
    let bridge_slug = present(&req.bridge_slug).map(str::to_string);
    let campaign_ref = campaign_ref.to_string();

    let commitment_id = Uuid::new_v4().to_string();
    let (campaign, commitment) = {
        let commitment_id = commitment_id.clone();
        let email = email.clone();
        blocking(&state, move |db| {
            let Some(campaign) = db.get_campaign(CampaignRef::parse(&campaign_ref))? else {
                return Ok(Err(ApiError::NotFound("Campaign not found")));
            };
            let source = match &bridge_slug {
                Some(slug) if db.get_bridge_by_slug(slug)?.is_some() => CommitmentSource::Bridge,
                _ => CommitmentSource::Direct,
            };
            let commitment = db.insert_commitment(&NewCommitment {
                id: &commitment_id,
                campaign_id: &campaign.id,
                email: email.as_deref(),
                supporter_name: supporter_name.as_deref(),
                tier: tier.key,
                amount_cents: tier.amount_cents,
                source,
            })?;
            Ok(Ok((campaign, commitment)))
        })
        .await??
    };

    let session_request = CheckoutSessionRequest {
        commitment_id: commitment.id.clone(),
        campaign_id: campaign.id.clone(),
        campaign_name: campaign.patient_name.clone(),
        tier: tier.key,
        tier_label: tier.label,
        amount_cents: tier.amount_cents,
        customer_email: email,
        success_url: state.settings.public_link(&format!("/c/{}?checkout=success", campaign.slug)),
        cancel_url: state.settings.public_link(&format!("/c/{}?checkout=cancelled", campaign.slug)),
    };

    let session = match state.payments.create_checkout_session(&session_request).await {
        Ok(session) => session,
        Err(e) => {
            error!("Checkout session for commitment {} failed: {}", commitment.id, e);
            blocking(&state, move |db| db.delete_pending_commitment(&commitment_id)).await?;
            return Err(ApiError::Upstream("Failed to create checkout session"));
        }
    };

    let session_id = session.id.clone();
    blocking(&state, move |db| db.attach_checkout_session(&commitment_id, &session_id)).await?;

    info!("Checkout {} started for {} ({})", session.id, campaign.slug, tier.key);
    state.analytics.capture(
        AnalyticsEvent::new("checkout_started", commitment.id.clone())
            .with("campaign_id", campaign.id)
            .with("tier", tier.key)
            .with("source", commitment.source.as_str()),
    );

    Ok(Json(json!({
        "success": true,
        "url": session.url,
        "session_id": session.id,
        "commitment_id": commitment.id,
    })))
}

//! Bridge campaigns: GoFundMe fundraisers we reach out to and, once the
//! organizer agrees, link to a Tree of Hope campaign.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use hope_db::models::{NewBridge, NewOutreach};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use hope_types::api::{CreateBridgeRequest, CreateOutreachRequest, LinkBridgeRequest, present};
use hope_types::ident::{is_valid_slug, slugify};
use hope_types::models::Claims;

use crate::analytics::AnalyticsEvent;
use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::state::{AppState, blocking};

const GOFUNDME_HOST: &str = "gofundme.com";

/// True for http(s) URLs on gofundme.com or one of its subdomains.
pub fn is_gofundme_url(url: &str) -> bool {
    let Some(rest) = url.strip_prefix("https://").or_else(|| url.strip_prefix("http://")) else {
        return false;
    };
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if authority.contains('@') {
        return false;
    }
    let host = authority.split(':').next().unwrap_or_default().to_ascii_lowercase();
    host == GOFUNDME_HOST || host.ends_with(".gofundme.com")
}

/// POST /api/admin/bridge
pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    JsonBody(req): JsonBody<CreateBridgeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(gofundme_url), Some(patient_name)) = (present(&req.gofundme_url), present(&req.patient_name)) else {
        return Err(ApiError::BadRequest("Missing required fields"));
    };
    if !is_gofundme_url(gofundme_url) {
        return Err(ApiError::BadRequest("Invalid GoFundMe URL"));
    }

    let slug = present(&req.slug).map_or_else(|| slugify(patient_name), str::to_string);
    if !is_valid_slug(&slug) {
        return Err(ApiError::BadRequest("Invalid slug"));
    }

    let gofundme_url = gofundme_url.to_string();
    let patient_name = patient_name.to_string();
    let organizer_name = present(&req.organizer_name).map(str::to_string);
    let bridge = blocking(&state, move |db| {
        db.create_bridge(&NewBridge {
            id: &Uuid::new_v4().to_string(),
            slug: &slug,
            gofundme_url: &gofundme_url,
            patient_name: &patient_name,
            organizer_name: organizer_name.as_deref(),
        })
    })
    .await?
    .ok_or(ApiError::Conflict("Slug already in use"))?;

    info!("Bridge {} created by {}", bridge.slug, claims.sub);
    state
        .analytics
        .capture(AnalyticsEvent::new("bridge_created", claims.sub).with("bridge_id", bridge.id.clone()));

    Ok((StatusCode::CREATED, Json(json!({ "success": true, "bridge": bridge }))))
}

/// GET /api/admin/bridge
pub async fn list(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let bridges = blocking(&state, |db| db.list_bridges()).await?;
    Ok(Json(json!({ "success": true, "bridges": bridges })))
}

/// POST /api/admin/bridge/{id}/link
pub async fn link(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<LinkBridgeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let campaign_id = present(&req.campaign_id)
        .ok_or(ApiError::BadRequest("Missing required fields"))?
        .to_string();

    let bridge = blocking(&state, move |db| {
        if db.get_campaign_by_id(&campaign_id)?.is_none() {
            return Ok(Err(ApiError::NotFound("Campaign not found")));
        }
        Ok(db.link_bridge(&id, &campaign_id)?.ok_or(ApiError::NotFound("Bridge not found")))
    })
    .await??;

    info!("Bridge {} linked by {}", bridge.slug, claims.sub);
    state.analytics.capture(
        AnalyticsEvent::new("bridge_linked", claims.sub)
            .with("bridge_id", bridge.id.clone())
            .with("campaign_id", bridge.campaign_id.clone()),
    );
    Ok(Json(json!({ "success": true, "bridge": bridge })))
}

/// GET /api/admin/bridge/{id}/outreach
pub async fn list_outreach(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let outreach = blocking(&state, move |db| {
        if db.get_bridge_by_id(&id)?.is_none() {
            return Ok(None);
        }
        db.list_outreach(&id).map(Some)
    })
    .await?
    .ok_or(ApiError::NotFound("Bridge not found"))?;

    Ok(Json(json!({ "success": true, "outreach": outreach })))
}

/// POST /api/admin/bridge/{id}/outreach
pub async fn record_outreach(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<CreateOutreachRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let channel = present(&req.channel)
        .ok_or(ApiError::BadRequest("Missing required fields"))?
        .to_string();
    let message = present(&req.message).map(str::to_string);
    let outcome = present(&req.outcome).map(str::to_string);
    let created_by = claims.sub.clone();

    let outreach = blocking(&state, move |db| {
        if db.get_bridge_by_id(&id)?.is_none() {
            return Ok(None);
        }
        db.insert_outreach(&NewOutreach {
            id: &Uuid::new_v4().to_string(),
            bridge_campaign_id: &id,
            channel: &channel,
            message: message.as_deref(),
            outcome: outcome.as_deref(),
            created_by: &created_by,
        })
        .map(Some)
    })
    .await?
    .ok_or(ApiError::NotFound("Bridge not found"))?;

    state.analytics.capture(
        AnalyticsEvent::new("bridge_outreach_recorded", claims.sub)
            .with("bridge_id", outreach.bridge_campaign_id.clone())
            .with("channel", outreach.channel.clone()),
    );
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "outreach": outreach }))))
}

/// GET /api/bridge/{slug} — landing page data for a bridge campaign.
///
/// Outreach history and organizer details stay admin-only.
pub async fn get_public(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let (bridge, campaign) = blocking(&state, move |db| {
        let Some(bridge) = db.get_bridge_by_slug(&slug)? else {
            return Ok(None);
        };
        let campaign = match &bridge.campaign_id {
            Some(id) => db.get_campaign_by_id(id)?,
            None => None,
        };
        Ok(Some((bridge, campaign)))
    })
    .await?
    .ok_or(ApiError::NotFound("Bridge not found"))?;

    Ok(Json(json!({
        "success": true,
        "bridge": {
            "slug": bridge.slug,
            "patient_name": bridge.patient_name,
            "gofundme_url": bridge.gofundme_url,
            "status": bridge.status,
        },
        "campaign": campaign.map(|c| c.into_public()),
    })))
}

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use hope_db::Value;
use hope_db::models::NewCampaign;
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue, json};
use tracing::info;
use uuid::Uuid;

use hope_types::api::{CreateCampaignRequest, present};
use hope_types::ident::{is_valid_slug, slugify};
use hope_types::models::{CampaignStatus, Claims};
use hope_types::sanctuary::FieldSpec;

use crate::analytics::AnalyticsEvent;
use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::fields::update_values;
use crate::state::{AppState, blocking};

/// Columns an admin may change after creation.
const UPDATABLE_FIELDS: &[FieldSpec] = &[
    FieldSpec::required_text("patient_name"),
    FieldSpec::text("title"),
    FieldSpec::text("story"),
    FieldSpec::required_text("status"),
    FieldSpec::integer("monthly_goal_cents"),
    FieldSpec::text("patient_email"),
];

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

// ── Public ──────────────────────────────────────────────────────────────

/// GET /api/campaigns — active campaigns, newest first.
pub async fn list_public(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let campaigns = blocking(&state, |db| db.list_campaigns(Some(CampaignStatus::Active))).await?;
    let campaigns: Vec<_> = campaigns.into_iter().map(|c| c.into_public()).collect();
    Ok(Json(json!({ "success": true, "campaigns": campaigns })))
}

/// GET /api/campaigns/{slug} — a campaign with its public leaves.
pub async fn get_public(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response, ApiError> {
    let found = blocking(&state, move |db| {
        let Some(campaign) = db.get_campaign_by_slug(&slug)? else {
            return Ok(None);
        };
        let leaves = db.list_leaves(&campaign.id, true)?;
        Ok(Some((campaign, leaves)))
    })
    .await?;

    let response = match found {
        Some((campaign, leaves)) => Json(json!({
            "success": true,
            "campaign": campaign.into_public(),
            "leaves": leaves,
        }))
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "success": false,
                "error": "Campaign not found",
                "campaign": null,
                "leaves": [],
            })),
        )
            .into_response(),
    };
    Ok(response)
}

// ── Admin ───────────────────────────────────────────────────────────────

/// GET /api/admin/campaigns?status=
pub async fn admin_list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let status = match present(&query.status) {
        Some(s) => Some(s.parse::<CampaignStatus>().map_err(|_| ApiError::BadRequest("Invalid status"))?),
        None => None,
    };
    let campaigns = blocking(&state, move |db| db.list_campaigns(status)).await?;
    Ok(Json(json!({ "success": true, "campaigns": campaigns })))
}

/// GET /api/admin/campaigns/{id} — includes hidden leaves for moderation.
pub async fn admin_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let (campaign, leaves) = blocking(&state, move |db| {
        let Some(campaign) = db.get_campaign_by_id(&id)? else {
            return Ok(None);
        };
        let leaves = db.list_leaves(&campaign.id, false)?;
        Ok(Some((campaign, leaves)))
    })
    .await?
    .ok_or(ApiError::NotFound("Campaign not found"))?;

    Ok(Json(json!({ "success": true, "campaign": campaign, "leaves": leaves })))
}

/// POST /api/admin/campaigns
pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    JsonBody(req): JsonBody<CreateCampaignRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let patient_name = present(&req.patient_name)
        .ok_or(ApiError::BadRequest("Missing required fields"))?
        .to_string();

    let slug = present(&req.slug).map_or_else(|| slugify(&patient_name), str::to_string);
    if !is_valid_slug(&slug) {
        return Err(ApiError::BadRequest("Invalid slug"));
    }

    let status = match present(&req.status) {
        Some(s) => s.parse::<CampaignStatus>().map_err(|_| ApiError::BadRequest("Invalid status"))?,
        None => CampaignStatus::default(),
    };
    if req.monthly_goal_cents.is_some_and(|goal| goal < 0) {
        return Err(ApiError::BadRequest("Invalid monthly goal"));
    }
    let patient_email = match present(&req.patient_email) {
        Some(email) if email.contains('@') => Some(email.to_lowercase()),
        Some(_) => return Err(ApiError::BadRequest("Invalid email")),
        None => None,
    };

    let title = present(&req.title).map(str::to_string);
    let story = present(&req.story).map(str::to_string);
    let monthly_goal_cents = req.monthly_goal_cents;
    let campaign = blocking(&state, move |db| {
        db.create_campaign(&NewCampaign {
            id: &Uuid::new_v4().to_string(),
            slug: &slug,
            patient_name: &patient_name,
            title: title.as_deref(),
            story: story.as_deref(),
            status,
            monthly_goal_cents,
            patient_email: patient_email.as_deref(),
        })
    })
    .await?
    .ok_or(ApiError::Conflict("Slug already in use"))?;

    info!("Campaign {} created by {}", campaign.slug, claims.sub);
    state.analytics.capture(
        AnalyticsEvent::new("campaign_created", claims.sub)
            .with("campaign_id", campaign.id.clone())
            .with("status", campaign.status.as_str()),
    );

    Ok((StatusCode::CREATED, Json(json!({ "success": true, "campaign": campaign }))))
}

/// PATCH /api/admin/campaigns/{id}
pub async fn update(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<Map<String, JsonValue>>,
) -> Result<impl IntoResponse, ApiError> {
    let changes = update_values(UPDATABLE_FIELDS, &body)?
        .into_iter()
        .map(|(column, value)| Ok((column, normalize_change(column, value)?)))
        .collect::<Result<Vec<_>, ApiError>>()?;
    if changes.is_empty() {
        return Err(ApiError::BadRequest("No valid fields to update"));
    }

    let campaign = blocking(&state, move |db| db.update_campaign(&id, &changes))
        .await?
        .ok_or(ApiError::NotFound("Campaign not found"))?;

    state.analytics.capture(
        AnalyticsEvent::new("campaign_updated", claims.sub)
            .with("campaign_id", campaign.id.clone())
            .with("status", campaign.status.as_str()),
    );
    Ok(Json(json!({ "success": true, "campaign": campaign })))
}

/// DELETE /api/admin/campaigns/{id}
pub async fn delete(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let campaign_id = id.clone();
    if !blocking(&state, move |db| db.delete_campaign(&id)).await? {
        return Err(ApiError::NotFound("Campaign not found"));
    }

    info!("Campaign {} deleted by {}", campaign_id, claims.sub);
    Ok(Json(json!({ "success": true })))
}

/// Column-specific checks on top of the generic type conversion.
fn normalize_change(column: &str, value: Value) -> Result<Value, ApiError> {
    match (column, value) {
        ("status", Value::Text(s)) => {
            let status = s.parse::<CampaignStatus>().map_err(|_| ApiError::BadRequest("Invalid status"))?;
            Ok(Value::Text(status.as_str().to_string()))
        }
        ("monthly_goal_cents", Value::Integer(goal)) if goal < 0 => Err(ApiError::BadRequest("Invalid monthly goal")),
        ("patient_email", Value::Text(email)) if !email.contains('@') => Err(ApiError::BadRequest("Invalid email")),
        ("patient_email", Value::Text(email)) => Ok(Value::Text(email.to_lowercase())),
        (_, value) => Ok(value),
    }
}

//! Sanctuary routes. Every route here runs behind `require_auth`.
//!
//! Access rule: the caller must be a member of the campaign's Sanctuary
//! (patient or invited caregiver) or an admin. Writes are refused once the
//! 30-day period is over; reads stay available.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use hope_db::models::ClaimOutcome;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue, json};
use tracing::info;

use hope_types::api::{CompleteDayRequest, InviteMemberRequest, present};
use hope_types::ident::CampaignRef;
use hope_types::models::{Campaign, Claims, MemberRole, Membership, SanctuaryDay};
use hope_types::sanctuary::{SANCTUARY_DAYS, SanctuaryProgress, SanctuaryResource};

use crate::analytics::AnalyticsEvent;
use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::fields::{create_values, update_values};
use crate::state::{AppState, blocking};

const PERIOD_ENDED: ApiError = ApiError::Forbidden("Sanctuary period has ended");

#[derive(Serialize)]
struct Overview {
    #[serde(flatten)]
    progress: SanctuaryProgress,
    completed_days: Vec<SanctuaryDay>,
}

/// A campaign the caller may enter, with their membership (none for admins
/// who are not members).
struct Access {
    campaign: Campaign,
    membership: Option<Membership>,
    progress: SanctuaryProgress,
}

impl Access {
    fn ensure_writable(&self) -> Result<(), ApiError> {
        if self.progress.active { Ok(()) } else { Err(PERIOD_ENDED) }
    }

    fn is_patient(&self) -> bool {
        self.membership.as_ref().is_some_and(|m| m.role == MemberRole::Patient)
    }
}

fn progress_of(campaign: &Campaign) -> SanctuaryProgress {
    let today = Utc::now().date_naive();
    SanctuaryProgress::on(campaign.sanctuary_start_date.unwrap_or(today), today)
}

async fn enter(state: &AppState, claims: &Claims, reference: String) -> Result<Access, ApiError> {
    let user_id = claims.sub.clone();
    let (campaign, membership) = blocking(state, move |db| {
        let Some(campaign) = db.get_campaign(CampaignRef::parse(&reference))? else {
            return Ok(None);
        };
        let membership = db.get_membership(&campaign.id, &user_id)?;
        Ok(Some((campaign, membership)))
    })
    .await?
    .ok_or(ApiError::NotFound("Campaign not found"))?;

    if membership.is_none() && !claims.is_admin() {
        return Err(ApiError::FORBIDDEN);
    }
    if !campaign.sanctuary_claimed {
        return Err(ApiError::Forbidden("Sanctuary not claimed"));
    }

    let progress = progress_of(&campaign);
    Ok(Access { campaign, membership, progress })
}

fn parse_resource(resource: &str) -> Result<SanctuaryResource, ApiError> {
    resource.parse().map_err(|_| ApiError::NotFound("Not found"))
}

/// POST /api/sanctuary/{campaign}/claim
///
/// Only the patient named on the campaign (matched by email, ignoring case)
/// or an admin may claim. The period starts today.
pub async fn claim(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(reference): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let campaign = blocking(&state, move |db| db.get_campaign(CampaignRef::parse(&reference)))
        .await?
        .ok_or(ApiError::NotFound("Campaign not found"))?;

    if campaign.sanctuary_claimed {
        return Err(ApiError::Conflict("Sanctuary already claimed"));
    }
    let is_patient = campaign
        .patient_email
        .as_deref()
        .is_some_and(|email| email.eq_ignore_ascii_case(&claims.email));
    if !is_patient && !claims.is_admin() {
        return Err(ApiError::FORBIDDEN);
    }

    let campaign_id = campaign.id.clone();
    let user_id = claims.sub.clone();
    let today = Utc::now().date_naive();
    let claimed = match blocking(&state, move |db| db.claim_sanctuary(&campaign_id, &user_id, today)).await? {
        ClaimOutcome::Claimed(campaign) => campaign,
        ClaimOutcome::AlreadyClaimed => return Err(ApiError::Conflict("Sanctuary already claimed")),
        ClaimOutcome::CampaignMissing => return Err(ApiError::NotFound("Campaign not found")),
    };

    info!("Sanctuary for {} claimed by {}", claimed.slug, claims.sub);
    state
        .analytics
        .capture(AnalyticsEvent::new("sanctuary_claimed", claims.sub).with("campaign_id", claimed.id.clone()));

    let progress = progress_of(&claimed);
    Ok(Json(json!({ "success": true, "campaign": claimed, "sanctuary": progress })))
}

/// GET /api/sanctuary/{campaign}
pub async fn overview(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(reference): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let access = enter(&state, &claims, reference).await?;
    let campaign_id = access.campaign.id.clone();
    let completed_days = blocking(&state, move |db| db.list_sanctuary_days(&campaign_id)).await?;

    Ok(Json(json!({
        "success": true,
        "campaign": access.campaign,
        "membership": access.membership,
        "sanctuary": Overview { progress: access.progress, completed_days },
    })))
}

/// POST /api/sanctuary/{campaign}/days/{day}
pub async fn complete_day(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((reference, day)): Path<(String, String)>,
    JsonBody(req): JsonBody<CompleteDayRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let access = enter(&state, &claims, reference).await?;
    access.ensure_writable()?;

    let day: u32 = day.parse().map_err(|_| ApiError::BadRequest("Invalid day"))?;
    if day == 0 || day > SANCTUARY_DAYS || day > access.progress.day {
        return Err(ApiError::BadRequest("Invalid day"));
    }

    let campaign_id = access.campaign.id.clone();
    let reflection = present(&req.reflection).map(str::to_string);
    let completed = blocking(&state, move |db| {
        db.complete_sanctuary_day(&campaign_id, day, reflection.as_deref())
    })
    .await?;

    state.analytics.capture(
        AnalyticsEvent::new("sanctuary_day_completed", claims.sub)
            .with("campaign_id", access.campaign.id)
            .with("day", day),
    );
    Ok(Json(json!({ "success": true, "day": completed })))
}

/// GET /api/sanctuary/{campaign}/members
pub async fn list_members(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(reference): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let access = enter(&state, &claims, reference).await?;
    let campaign_id = access.campaign.id;
    let members = blocking(&state, move |db| db.list_memberships(&campaign_id)).await?;
    Ok(Json(json!({ "success": true, "members": members })))
}

/// POST /api/sanctuary/{campaign}/members — the patient invites a caregiver.
pub async fn invite_member(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(reference): Path<String>,
    JsonBody(req): JsonBody<InviteMemberRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let access = enter(&state, &claims, reference).await?;
    if !access.is_patient() && !claims.is_admin() {
        return Err(ApiError::FORBIDDEN);
    }
    access.ensure_writable()?;

    let email = present(&req.email)
        .filter(|e| e.contains('@'))
        .ok_or(ApiError::BadRequest("Email is required"))?
        .to_lowercase();

    let campaign_id = access.campaign.id.clone();
    let member = blocking(&state, move |db| {
        let user = db.find_or_create_user(&email, false)?;
        db.add_membership(&campaign_id, &user.id, MemberRole::Caregiver)
    })
    .await?;

    info!("{} invited to sanctuary {}", member.user_id, access.campaign.slug);
    state.analytics.capture(
        AnalyticsEvent::new("sanctuary_member_invited", claims.sub).with("campaign_id", access.campaign.id),
    );
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "member": member }))))
}

// ── Records ─────────────────────────────────────────────────────────────

/// GET /api/sanctuary/{campaign}/{resource}
pub async fn list_records(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((reference, resource)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let resource = parse_resource(&resource)?;
    let access = enter(&state, &claims, reference).await?;

    let campaign_id = access.campaign.id;
    let records = blocking(&state, move |db| db.list_records(resource, &campaign_id)).await?;

    let mut body = Map::new();
    body.insert("success".into(), JsonValue::Bool(true));
    body.insert(resource.list_key().into(), JsonValue::Array(records.into_iter().map(JsonValue::Object).collect()));
    Ok(Json(JsonValue::Object(body)))
}

/// POST /api/sanctuary/{campaign}/{resource}
pub async fn create_record(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((reference, resource)): Path<(String, String)>,
    JsonBody(body): JsonBody<Map<String, JsonValue>>,
) -> Result<impl IntoResponse, ApiError> {
    let resource = parse_resource(&resource)?;
    let access = enter(&state, &claims, reference).await?;
    access.ensure_writable()?;
    let values = create_values(resource.fields(), &body)?;

    let campaign_id = access.campaign.id.clone();
    let author_id = claims.sub.clone();
    let record = blocking(&state, move |db| db.insert_record(resource, &campaign_id, &author_id, &values)).await?;

    state.analytics.capture(
        AnalyticsEvent::new("sanctuary_record_created", claims.sub)
            .with("campaign_id", access.campaign.id)
            .with("resource", resource.path()),
    );
    Ok((StatusCode::CREATED, Json(item_body(resource, record))))
}

/// PATCH /api/sanctuary/{campaign}/{resource}/{item_id}
pub async fn update_record(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((reference, resource, item_id)): Path<(String, String, String)>,
    JsonBody(body): JsonBody<Map<String, JsonValue>>,
) -> Result<impl IntoResponse, ApiError> {
    let resource = parse_resource(&resource)?;
    let access = enter(&state, &claims, reference).await?;
    access.ensure_writable()?;

    let changes = update_values(resource.fields(), &body)?;
    if changes.is_empty() {
        return Err(ApiError::BadRequest("No valid fields to update"));
    }

    let campaign_id = access.campaign.id;
    let record = blocking(&state, move |db| db.update_record(resource, &campaign_id, &item_id, &changes))
        .await?
        .ok_or(ApiError::NotFound("Not found"))?;

    Ok(Json(item_body(resource, record)))
}

/// DELETE /api/sanctuary/{campaign}/{resource}/{item_id}
pub async fn delete_record(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((reference, resource, item_id)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let resource = parse_resource(&resource)?;
    let access = enter(&state, &claims, reference).await?;
    access.ensure_writable()?;

    let campaign_id = access.campaign.id;
    if !blocking(&state, move |db| db.delete_record(resource, &campaign_id, &item_id)).await? {
        return Err(ApiError::NotFound("Not found"));
    }
    Ok(Json(json!({ "success": true })))
}

fn item_body(resource: SanctuaryResource, record: Map<String, JsonValue>) -> JsonValue {
    let mut body = Map::new();
    body.insert("success".into(), JsonValue::Bool(true));
    body.insert(resource.item_key().into(), JsonValue::Object(record));
    JsonValue::Object(body)
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use chrono::{Duration, Utc};
    use serde_json::json;

    use hope_db::Value;
    use hope_types::models::{Campaign, CampaignStatus};

    use crate::test_support::TestApp;

    const PATIENT: &str = "jane@example.com";

    async fn claimed(app: &TestApp) -> (Campaign, String) {
        let campaign = app.campaign("jane", CampaignStatus::Active).await;
        let token = app.member_token(PATIENT);
        let (status, _) = app
            .send(Method::POST, "/api/sanctuary/jane/claim", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        (campaign, token)
    }

    #[tokio::test]
    async fn only_the_patient_may_claim_once() {
        let app = TestApp::new();
        app.campaign("jane", CampaignStatus::Active).await;

        let stranger = app.member_token("sam@example.com");
        let (status, _) = app
            .send(Method::POST, "/api/sanctuary/jane/claim", Some(&stranger), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let patient = app.member_token("JANE@example.com");
        let (status, body) = app
            .send(Method::POST, "/api/sanctuary/jane/claim", Some(&patient), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["campaign"]["sanctuary_claimed"], true);
        assert_eq!(body["sanctuary"]["day"], 1);

        let (status, body) = app
            .send(Method::POST, "/api/sanctuary/jane/claim", Some(&patient), None)
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Sanctuary already claimed");
    }

    #[tokio::test]
    async fn overview_requires_membership() {
        let app = TestApp::new();
        let (campaign, token) = claimed(&app).await;

        let (status, body) = app.send(Method::GET, "/api/sanctuary/jane", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["membership"]["role"], "patient");
        assert_eq!(body["sanctuary"]["total_days"], 30);
        assert_eq!(body["sanctuary"]["active"], true);
        assert!(body["sanctuary"]["prompt"].is_string());
        assert_eq!(body["sanctuary"]["completed_days"], json!([]));

        let by_id = format!("/api/sanctuary/{}", campaign.id);
        let (status, _) = app.send(Method::GET, &by_id, Some(&app.admin_token()), None).await;
        assert_eq!(status, StatusCode::OK);

        let stranger = app.member_token("sam@example.com");
        let (status, _) = app.send(Method::GET, "/api/sanctuary/jane", Some(&stranger), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app.send(Method::GET, "/api/sanctuary/jane", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invited_caregiver_can_read_and_write() {
        let app = TestApp::new();
        let (_, patient) = claimed(&app).await;

        let (status, body) = app
            .send(
                Method::POST,
                "/api/sanctuary/jane/members",
                Some(&patient),
                Some(json!({ "email": "Carer@Example.com" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["member"]["role"], "caregiver");
        assert_eq!(body["member"]["email"], "carer@example.com");

        let carer = app.member_token("carer@example.com");
        let (status, _) = app
            .send(
                Method::POST,
                "/api/sanctuary/jane/tasks",
                Some(&carer),
                Some(json!({ "title": "Pick up prescription" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = app
            .send(
                Method::POST,
                "/api/sanctuary/jane/members",
                Some(&carer),
                Some(json!({ "email": "another@example.com" })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, body) = app.send(Method::GET, "/api/sanctuary/jane/members", Some(&patient), None).await;
        assert_eq!(body["members"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn records_follow_their_field_lists() {
        let app = TestApp::new();
        let (_, token) = claimed(&app).await;

        let (status, body) = app
            .send(
                Method::POST,
                "/api/sanctuary/jane/medications",
                Some(&token),
                Some(json!({ "name": "Ondansetron", "dosage": "4mg", "author_id": "forged" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let medication = &body["medication"];
        assert_eq!(medication["name"], "Ondansetron");
        assert_eq!(medication["active"], true);
        assert_ne!(medication["author_id"], "forged");
        let item = format!("/api/sanctuary/jane/medications/{}", medication["id"].as_str().unwrap());

        let (status, body) = app
            .send(Method::PATCH, &item, Some(&token), Some(json!({ "active": false })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["medication"]["active"], false);

        let (status, body) = app
            .send(Method::PATCH, &item, Some(&token), Some(json!({ "active": "no" })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid field value");

        let (_, body) = app.send(Method::GET, "/api/sanctuary/jane/medications", Some(&token), None).await;
        assert_eq!(body["medications"].as_array().unwrap().len(), 1);

        let (status, _) = app.send(Method::DELETE, &item, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = app.send(Method::DELETE, &item, Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not found");
    }

    #[tokio::test]
    async fn null_flag_is_a_bad_request() {
        let app = TestApp::new();
        let (_, token) = claimed(&app).await;
        let (status, body) = app
            .send(
                Method::POST,
                "/api/sanctuary/jane/tasks",
                Some(&token),
                Some(json!({ "title": "x", "completed": null })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid field value");
    }

    #[tokio::test]
    async fn missing_required_record_field_is_rejected() {
        let app = TestApp::new();
        let (_, token) = claimed(&app).await;
        let (status, body) = app
            .send(Method::POST, "/api/sanctuary/jane/journal", Some(&token), Some(json!({ "mood": "ok" })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required fields");
    }

    #[tokio::test]
    async fn unknown_resource_is_not_found() {
        let app = TestApp::new();
        let (_, token) = claimed(&app).await;
        let (status, body) = app.send(Method::GET, "/api/sanctuary/jane/diary", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not found");
    }

    #[tokio::test]
    async fn guided_days_up_to_today_can_be_completed() {
        let app = TestApp::new();
        let (_, token) = claimed(&app).await;

        let (status, body) = app
            .send(
                Method::POST,
                "/api/sanctuary/jane/days/1",
                Some(&token),
                Some(json!({ "reflection": "A quiet day" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["day"]["day_number"], 1);

        for day in ["2", "0", "x"] {
            let (status, body) = app
                .send(Method::POST, &format!("/api/sanctuary/jane/days/{}", day), Some(&token), Some(json!({})))
                .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "day {}", day);
            assert_eq!(body["error"], "Invalid day");
        }

        let (_, body) = app.send(Method::GET, "/api/sanctuary/jane", Some(&token), None).await;
        assert_eq!(body["sanctuary"]["completed_days"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn writes_stop_after_thirty_days() {
        let app = TestApp::new();
        let (campaign, token) = claimed(&app).await;
        let started = (Utc::now() - Duration::days(31)).date_naive();
        app.state
            .db
            .update_campaign(&campaign.id, &[("sanctuary_start_date", Value::Text(started.to_string()))])
            .unwrap();

        let (status, body) = app
            .send(Method::POST, "/api/sanctuary/jane/journal", Some(&token), Some(json!({ "body": "late" })))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Sanctuary period has ended");

        let (status, body) = app.send(Method::GET, "/api/sanctuary/jane/journal", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["entries"], json!([]));

        let (_, body) = app.send(Method::GET, "/api/sanctuary/jane", Some(&token), None).await;
        assert_eq!(body["sanctuary"]["active"], false);
        assert_eq!(body["sanctuary"]["prompt"], json!(null));
    }
}

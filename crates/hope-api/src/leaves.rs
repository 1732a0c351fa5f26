use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use hope_db::models::NewLeaf;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use hope_types::api::{CreateLeafRequest, UpdateLeafRequest, present};
use hope_types::models::Claims;

use crate::analytics::AnalyticsEvent;
use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::state::{AppState, blocking};

const MAX_AUTHOR_NAME_CHARS: usize = 80;
const MAX_MESSAGE_CHARS: usize = 500;

/// POST /api/campaigns/{slug}/leaves — anyone may leave a message of support.
pub async fn create(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    JsonBody(req): JsonBody<CreateLeafRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(author_name), Some(message)) = (present(&req.author_name), present(&req.message)) else {
        return Err(ApiError::BadRequest("Missing required fields"));
    };
    if author_name.chars().count() > MAX_AUTHOR_NAME_CHARS || message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::BadRequest("Message too long"));
    }

    let author_name = author_name.to_string();
    let message = message.to_string();
    let is_public = req.is_public.unwrap_or(true);
    let leaf = blocking(&state, move |db| {
        let Some(campaign) = db.get_campaign_by_slug(&slug)? else {
            return Ok(None);
        };
        db.insert_leaf(
            &campaign.id,
            &NewLeaf {
                id: &Uuid::new_v4().to_string(),
                author_name: &author_name,
                message: &message,
                is_public,
            },
        )
    })
    .await?
    .ok_or(ApiError::NotFound("Campaign not found"))?;

    state.analytics.capture(
        AnalyticsEvent::anonymous("leaf_created")
            .with("campaign_id", leaf.campaign_id.clone())
            .with("is_public", leaf.is_public),
    );

    Ok((StatusCode::CREATED, Json(json!({ "success": true, "leaf": leaf }))))
}

/// PATCH /api/admin/leaves/{id} — show or hide a leaf.
pub async fn moderate(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateLeafRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let is_public = req.is_public.ok_or(ApiError::BadRequest("Missing required fields"))?;

    let leaf = blocking(&state, move |db| db.set_leaf_visibility(&id, is_public))
        .await?
        .ok_or(ApiError::NotFound("Leaf not found"))?;

    info!("Leaf {} set public={} by {}", leaf.id, is_public, claims.sub);
    Ok(Json(json!({ "success": true, "leaf": leaf })))
}

/// DELETE /api/admin/leaves/{id}
pub async fn delete(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let leaf_id = id.clone();
    if !blocking(&state, move |db| db.delete_leaf(&id)).await? {
        return Err(ApiError::NotFound("Leaf not found"));
    }

    info!("Leaf {} deleted by {}", leaf_id, claims.sub);
    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::{Value, json};

    use hope_types::models::CampaignStatus;
    use hope_types::placement::leaf_position;

    use crate::test_support::TestApp;

    async fn add_leaf(app: &TestApp, slug: &str, body: Value) -> (StatusCode, Value) {
        app.send(Method::POST, &format!("/api/campaigns/{}/leaves", slug), None, Some(body))
            .await
    }

    #[tokio::test]
    async fn leaves_grow_along_the_spiral() {
        let app = TestApp::new();
        app.campaign("jane", CampaignStatus::Active).await;

        for i in 0..3u64 {
            let (status, body) = add_leaf(
                &app,
                "jane",
                json!({ "author_name": format!("Friend {}", i), "message": "With you" }),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
            let expected = leaf_position(i);
            assert_eq!(body["leaf"]["position_x"], expected.x);
            assert_eq!(body["leaf"]["position_y"], expected.y);
        }

        let (_, page) = app.send(Method::GET, "/api/campaigns/jane", None, None).await;
        assert_eq!(page["campaign"]["leaf_count"], 3);
        assert_eq!(page["leaves"].as_array().unwrap().len(), 3);
        assert_eq!(app.analytics.names().iter().filter(|n| **n == "leaf_created").count(), 3);
    }

    #[tokio::test]
    async fn leaf_needs_author_and_message() {
        let app = TestApp::new();
        app.campaign("jane", CampaignStatus::Active).await;

        let (status, body) = add_leaf(&app, "jane", json!({ "author_name": "Sam" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required fields");

        let (status, _) = add_leaf(&app, "jane", json!({ "author_name": "Sam", "message": "x".repeat(501) })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn leaf_on_unknown_campaign_is_not_found() {
        let app = TestApp::new();
        let (status, body) = add_leaf(&app, "nobody", json!({ "author_name": "Sam", "message": "hi" })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Campaign not found");
    }

    #[tokio::test]
    async fn malformed_json_gets_the_envelope() {
        let app = TestApp::new();
        let request = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/api/campaigns/jane/leaves")
            .header("content-type", "application/json")
            .body(axum::body::Body::from("{not json"))
            .unwrap();
        let response = app.call(request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            TestApp::json(response).await,
            json!({ "success": false, "error": "Invalid request body" })
        );
    }

    #[tokio::test]
    async fn moderation_hides_and_deletes_leaves() {
        let app = TestApp::new();
        let campaign = app.campaign("jane", CampaignStatus::Active).await;
        let (_, created) = add_leaf(&app, "jane", json!({ "author_name": "Sam", "message": "hi" })).await;
        let leaf_uri = format!("/api/admin/leaves/{}", created["leaf"]["id"].as_str().unwrap());
        let admin = app.admin_token();

        let (status, body) = app
            .send(Method::PATCH, &leaf_uri, Some(&admin), Some(json!({ "is_public": false })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["leaf"]["is_public"], false);

        let (_, page) = app.send(Method::GET, "/api/campaigns/jane", None, None).await;
        assert!(page["leaves"].as_array().unwrap().is_empty());
        let (_, detail) = app
            .send(Method::GET, &format!("/api/admin/campaigns/{}", campaign.id), Some(&admin), None)
            .await;
        assert_eq!(detail["leaves"].as_array().unwrap().len(), 1);

        let (status, _) = app.send(Method::DELETE, &leaf_uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = app.send(Method::DELETE, &leaf_uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Leaf not found");
    }

    #[tokio::test]
    async fn deleted_leaf_does_not_free_a_live_position() {
        let app = TestApp::new();
        app.campaign("jane", CampaignStatus::Active).await;
        let mut ids = Vec::new();
        for i in 0..3 {
            let (_, body) = add_leaf(&app, "jane", json!({ "author_name": format!("Friend {}", i), "message": "hi" })).await;
            ids.push(body["leaf"]["id"].as_str().unwrap().to_string());
        }

        let (status, _) = app
            .send(Method::DELETE, &format!("/api/admin/leaves/{}", ids[0]), Some(&app.admin_token()), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        add_leaf(&app, "jane", json!({ "author_name": "Late", "message": "hi" })).await;

        let (_, page) = app.send(Method::GET, "/api/campaigns/jane", None, None).await;
        let leaves = page["leaves"].as_array().unwrap();
        let mut positions: Vec<_> = leaves
            .iter()
            .map(|l| (l["position_x"].as_i64().unwrap(), l["position_y"].as_i64().unwrap()))
            .collect();
        positions.sort();
        positions.dedup();
        assert_eq!(leaves.len(), 3);
        assert_eq!(positions.len(), 3);
        assert_eq!(page["campaign"]["leaf_count"], 3);
    }
}

use axum::{
    Extension, Json,
    extract::State,
    response::IntoResponse,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{error, info};

use hope_types::api::{MagicLinkRequest, VerifyRequest, present};
use hope_types::models::{Claims, User};

use crate::analytics::AnalyticsEvent;
use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::middleware::SESSION_COOKIE;
use crate::state::{AppState, blocking};

/// POST /api/auth/magic-link
///
/// Succeeds whenever the address is well formed; delivery failures are only
/// logged.
pub async fn request_magic_link(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<MagicLinkRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = present(&req.email)
        .filter(|e| e.contains('@'))
        .ok_or(ApiError::BadRequest("Email is required"))?
        .to_lowercase();

    let token = generate_link_token();
    let token_hash = hash_link_token(&token);
    let expires_at = (Utc::now() + Duration::minutes(state.settings.magic_link_ttl_minutes)).timestamp();

    let stored_email = email.clone();
    blocking(&state, move |db| db.insert_magic_link(&token_hash, &stored_email, expires_at)).await?;

    let link = magic_link_url(&state.settings.public_url, &token, present(&req.redirect_to));
    if let Err(e) = state.mailer.send_magic_link(&email, &link).await {
        error!("Failed to send magic link: {}", e);
    }

    state.analytics.capture(AnalyticsEvent::anonymous("magic_link_requested"));
    Ok(Json(json!({ "success": true })))
}

/// POST /api/auth/verify — exchanges a magic-link token for a session.
pub async fn verify_magic_link(
    State(state): State<AppState>,
    jar: CookieJar,
    JsonBody(req): JsonBody<VerifyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let token = present(&req.token).ok_or(ApiError::BadRequest("Token is required"))?;
    let token_hash = hash_link_token(token);
    let now = Utc::now().timestamp();

    let email = blocking(&state, move |db| db.consume_magic_link(&token_hash, now))
        .await?
        .ok_or(ApiError::Unauthorized("Invalid or expired link"))?;

    let admin = state.settings.is_admin_email(&email);
    let user = blocking(&state, move |db| db.find_or_create_user(&email, admin)).await?;

    let session = create_token(&state.settings.jwt_secret, &user, state.settings.session_ttl_days).map_err(|e| {
        error!("Failed to sign session token: {}", e);
        ApiError::Internal
    })?;

    let cookie = Cookie::build((SESSION_COOKIE, session.clone()))
        .http_only(true)
        .secure(state.settings.secure_cookies)
        .same_site(SameSite::Lax)
        .path("/");

    info!("User {} signed in", user.id);
    state
        .analytics
        .capture(AnalyticsEvent::new("user_signed_in", user.id.clone()).with("role", user.role.as_str()));

    Ok((jar.add(cookie), Json(json!({ "success": true, "user": user, "token": session }))))
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user = blocking(&state, move |db| db.get_user_by_id(&claims.sub))
        .await?
        .ok_or(ApiError::UNAUTHORIZED)?;

    Ok(Json(json!({ "success": true, "user": user })))
}

/// POST /api/auth/logout
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Json(json!({ "success": true })))
}

pub fn create_token(secret: &str, user: &User, ttl_days: i64) -> anyhow::Result<String> {
    let claims = Claims::issued_for(user, Utc::now() + Duration::days(ttl_days));

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// 32 random bytes, URL-safe base64 without padding.
fn generate_link_token() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Only the SHA-256 of a link token is stored.
pub(crate) fn hash_link_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn magic_link_url(public_url: &str, token: &str, redirect_to: Option<&str>) -> String {
    let mut url = format!("{}/auth/verify?token={}", public_url.trim_end_matches('/'), token);
    if let Some(path) = redirect_to.filter(|p| is_local_path(p)) {
        url.push_str("&redirect_to=");
        url.push_str(path);
    }
    url
}

/// Same-site absolute paths built from characters that need no escaping.
fn is_local_path(path: &str) -> bool {
    path.starts_with('/')
        && !path.starts_with("//")
        && path.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_'))
}

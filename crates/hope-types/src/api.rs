//! Request bodies accepted by the HTTP surface.
//!
//! Required fields are still `Option` here: presence is checked by the
//! handlers so that a missing field produces the standard error envelope
//! instead of a deserialization failure.

use serde::Deserialize;

// -- Auth --

#[derive(Debug, Default, Deserialize)]
pub struct MagicLinkRequest {
    pub email: Option<String>,
    pub redirect_to: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VerifyRequest {
    pub token: Option<String>,
}

// -- Campaigns --

#[derive(Debug, Default, Deserialize)]
pub struct CreateCampaignRequest {
    pub patient_name: Option<String>,
    pub slug: Option<String>,
    pub title: Option<String>,
    pub story: Option<String>,
    pub status: Option<String>,
    pub monthly_goal_cents: Option<i64>,
    pub patient_email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateLeafRequest {
    pub author_name: Option<String>,
    pub message: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateLeafRequest {
    pub is_public: Option<bool>,
}

// -- Bridge --

#[derive(Debug, Default, Deserialize)]
pub struct CreateBridgeRequest {
    pub gofundme_url: Option<String>,
    pub patient_name: Option<String>,
    pub organizer_name: Option<String>,
    pub slug: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LinkBridgeRequest {
    pub campaign_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateOutreachRequest {
    pub channel: Option<String>,
    pub message: Option<String>,
    pub outcome: Option<String>,
}

// -- Billing --

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutRequest {
    /// Canonical id or slug.
    pub campaign_id: Option<String>,
    pub monthly_tier: Option<String>,
    pub email: Option<String>,
    pub supporter_name: Option<String>,
    pub bridge_slug: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PauseSubscriptionRequest {
    pub commitment_id: Option<String>,
    /// Unix timestamp at which billing resumes.
    pub resume_at: Option<i64>,
}

// -- Sanctuary --

#[derive(Debug, Default, Deserialize)]
pub struct InviteMemberRequest {
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteDayRequest {
    pub reflection: Option<String>,
}

/// Returns the trimmed value when it is present and not blank.
pub fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

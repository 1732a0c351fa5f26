//! Insert/update payloads accepted by the query layer.
//! Read results are the shared `hope_types::models` records.

use hope_types::models::{Campaign, CampaignStatus, CommitmentSource};

pub struct NewCampaign<'a> {
    pub id: &'a str,
    pub slug: &'a str,
    pub patient_name: &'a str,
    pub title: Option<&'a str>,
    pub story: Option<&'a str>,
    pub status: CampaignStatus,
    pub monthly_goal_cents: Option<i64>,
    pub patient_email: Option<&'a str>,
}

pub struct NewLeaf<'a> {
    pub id: &'a str,
    pub author_name: &'a str,
    pub message: &'a str,
    pub is_public: bool,
}

pub struct NewBridge<'a> {
    pub id: &'a str,
    pub slug: &'a str,
    pub gofundme_url: &'a str,
    pub patient_name: &'a str,
    pub organizer_name: Option<&'a str>,
}

pub struct NewOutreach<'a> {
    pub id: &'a str,
    pub bridge_campaign_id: &'a str,
    pub channel: &'a str,
    pub message: Option<&'a str>,
    pub outcome: Option<&'a str>,
    pub created_by: &'a str,
}

pub struct NewCommitment<'a> {
    pub id: &'a str,
    pub campaign_id: &'a str,
    pub email: Option<&'a str>,
    pub supporter_name: Option<&'a str>,
    pub tier: &'a str,
    pub amount_cents: i64,
    pub source: CommitmentSource,
}

/// Result of trying to claim a campaign's Sanctuary.
#[derive(Debug)]
pub enum ClaimOutcome {
    Claimed(Campaign),
    AlreadyClaimed,
    CampaignMissing,
}

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned when a stored or submitted value does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a lowercase text enum that round-trips through the database and JSON.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($text => Ok($name::$variant),)+
                    _ => Err(UnknownVariant { kind: $kind, value: value.to_string() }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(
    /// Account role. Admins may call the `/api/admin` surface.
    Role, "role" {
        Member => "member",
        Admin => "admin",
    }
);

text_enum!(
    /// Campaign lifecycle. New campaigns start as drafts.
    CampaignStatus, "campaign status" {
        Draft => "draft",
        Active => "active",
        Paused => "paused",
        Funded => "funded",
        Closed => "closed",
    }
);

text_enum!(BridgeStatus, "bridge status" {
    Prospect => "prospect",
    Contacted => "contacted",
    Linked => "linked",
    Declined => "declined",
});

text_enum!(CommitmentStatus, "commitment status" {
    Pending => "pending",
    Active => "active",
    Paused => "paused",
    Canceled => "canceled",
});

text_enum!(CommitmentSource, "commitment source" {
    Direct => "direct",
    Bridge => "bridge",
});

text_enum!(
    /// Relationship between a user and a campaign's Sanctuary.
    MemberRole, "member role" {
        Patient => "patient",
        Caregiver => "caregiver",
    }
);

impl Default for CampaignStatus {
    fn default() -> Self {
        Self::Draft
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub slug: String,
    pub patient_name: String,
    pub title: Option<String>,
    pub story: Option<String>,
    pub status: CampaignStatus,
    pub monthly_goal_cents: Option<i64>,
    pub leaf_count: i64,
    pub supporter_count: i64,
    /// Address allowed to claim the Sanctuary. Never shown on public pages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_email: Option<String>,
    pub sanctuary_claimed: bool,
    pub sanctuary_claimed_by: Option<String>,
    pub sanctuary_start_date: Option<NaiveDate>,
    pub created_at: String,
}

impl Campaign {
    /// Strips fields that only admins and the claimant should see.
    pub fn into_public(mut self) -> Self {
        self.patient_email = None;
        self.sanctuary_claimed_by = None;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leaf {
    pub id: String,
    pub campaign_id: String,
    pub author_name: String,
    pub message: String,
    pub is_public: bool,
    pub position_x: i64,
    pub position_y: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeCampaign {
    pub id: String,
    pub slug: String,
    pub gofundme_url: String,
    pub patient_name: String,
    pub organizer_name: Option<String>,
    pub campaign_id: Option<String>,
    pub status: BridgeStatus,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeOutreach {
    pub id: String,
    pub bridge_campaign_id: String,
    pub channel: String,
    pub message: Option<String>,
    pub outcome: Option<String>,
    pub created_by: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commitment {
    pub id: String,
    pub campaign_id: String,
    pub email: Option<String>,
    pub supporter_name: Option<String>,
    pub tier: String,
    pub amount_cents: i64,
    pub status: CommitmentStatus,
    pub source: CommitmentSource,
    pub checkout_session_id: Option<String>,
    pub subscription_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    pub id: String,
    pub campaign_id: String,
    pub user_id: String,
    pub email: String,
    pub role: MemberRole,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SanctuaryDay {
    pub campaign_id: String,
    pub day_number: u32,
    pub reflection: Option<String>,
    pub completed_at: String,
}

// -- JWT Claims --

/// Session token claims, issued after a magic link is verified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub exp: usize,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn issued_for(user: &User, expires_at: DateTime<Utc>) -> Self {
        Self {
            sub: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
            exp: expires_at.timestamp().max(0) as usize,
        }
    }
}

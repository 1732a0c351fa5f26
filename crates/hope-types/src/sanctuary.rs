//! The Sanctuary: a 30-day private area attached to a claimed campaign.
//!
//! Each record collection is described by a [`SanctuaryResource`], which fixes
//! the table, the JSON keys used in responses and the allow-listed fields a
//! client may set. Handlers and queries are generic over this catalogue.

use std::str::FromStr;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::UnknownVariant;

pub const SANCTUARY_DAYS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    /// Value stored when a create request leaves the field out.
    pub default: Option<DefaultValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultValue {
    Bool(bool),
}

impl FieldSpec {
    pub const fn text(name: &'static str) -> Self {
        Self { name, kind: FieldKind::Text, required: false, default: None }
    }

    pub const fn required_text(name: &'static str) -> Self {
        Self { name, kind: FieldKind::Text, required: true, default: None }
    }

    pub const fn flag(name: &'static str, default: bool) -> Self {
        Self { name, kind: FieldKind::Bool, required: false, default: Some(DefaultValue::Bool(default)) }
    }

    pub const fn integer(name: &'static str) -> Self {
        Self { name, kind: FieldKind::Integer, required: false, default: None }
    }
}

const JOURNAL_FIELDS: &[FieldSpec] = &[FieldSpec::text("title"), FieldSpec::required_text("body"), FieldSpec::text("mood")];

const TASK_FIELDS: &[FieldSpec] = &[
    FieldSpec::required_text("title"),
    FieldSpec::text("notes"),
    FieldSpec::text("due_date"),
    FieldSpec::flag("completed", false),
];

const MEDICATION_FIELDS: &[FieldSpec] = &[
    FieldSpec::required_text("name"),
    FieldSpec::text("dosage"),
    FieldSpec::text("frequency"),
    FieldSpec::text("notes"),
    FieldSpec::flag("active", true),
];

const APPOINTMENT_FIELDS: &[FieldSpec] = &[
    FieldSpec::required_text("title"),
    FieldSpec::text("provider"),
    FieldSpec::text("location"),
    FieldSpec::required_text("scheduled_at"),
    FieldSpec::text("notes"),
];

const SYMPTOM_FIELDS: &[FieldSpec] = &[
    FieldSpec::required_text("symptom"),
    FieldSpec::integer("severity"),
    FieldSpec::text("notes"),
    FieldSpec::text("logged_at"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SanctuaryResource {
    Journal,
    Tasks,
    Medications,
    Appointments,
    Symptoms,
}

impl SanctuaryResource {
    pub const ALL: &'static [SanctuaryResource] = &[
        Self::Journal,
        Self::Tasks,
        Self::Medications,
        Self::Appointments,
        Self::Symptoms,
    ];

    /// URL path segment.
    pub fn path(self) -> &'static str {
        match self {
            Self::Journal => "journal",
            Self::Tasks => "tasks",
            Self::Medications => "medications",
            Self::Appointments => "appointments",
            Self::Symptoms => "symptoms",
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            Self::Journal => "journal_entries",
            Self::Tasks => "tasks",
            Self::Medications => "medications",
            Self::Appointments => "appointments",
            Self::Symptoms => "symptom_logs",
        }
    }

    /// Response key for a single record.
    pub fn item_key(self) -> &'static str {
        match self {
            Self::Journal => "entry",
            Self::Tasks => "task",
            Self::Medications => "medication",
            Self::Appointments => "appointment",
            Self::Symptoms => "symptom_log",
        }
    }

    /// Response key for a collection.
    pub fn list_key(self) -> &'static str {
        match self {
            Self::Journal => "entries",
            Self::Tasks => "tasks",
            Self::Medications => "medications",
            Self::Appointments => "appointments",
            Self::Symptoms => "symptom_logs",
        }
    }

    /// Client-settable fields, in column order.
    pub fn fields(self) -> &'static [FieldSpec] {
        match self {
            Self::Journal => JOURNAL_FIELDS,
            Self::Tasks => TASK_FIELDS,
            Self::Medications => MEDICATION_FIELDS,
            Self::Appointments => APPOINTMENT_FIELDS,
            Self::Symptoms => SYMPTOM_FIELDS,
        }
    }

    pub fn field(self, name: &str) -> Option<&'static FieldSpec> {
        self.fields().iter().find(|f| f.name == name)
    }

    /// Column used to order list results, newest first.
    pub fn order_column(self) -> &'static str {
        match self {
            Self::Appointments => "scheduled_at",
            Self::Symptoms => "COALESCE(logged_at, created_at)",
            _ => "created_at",
        }
    }
}

impl FromStr for SanctuaryResource {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.path() == value)
            .ok_or_else(|| UnknownVariant { kind: "sanctuary resource", value: value.to_string() })
    }
}

/// Where a claimed Sanctuary stands on a given date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SanctuaryProgress {
    /// 1-based day, may exceed [`SANCTUARY_DAYS`] once the period is over.
    pub day: u32,
    pub total_days: u32,
    pub days_remaining: u32,
    pub active: bool,
    /// Guided prompt for today, absent once the period is over.
    pub prompt: Option<&'static str>,
}

impl SanctuaryProgress {
    pub fn on(start: NaiveDate, today: NaiveDate) -> Self {
        let elapsed = (today - start).num_days().max(0);
        let day = u32::try_from(elapsed).unwrap_or(u32::MAX).saturating_add(1);
        let active = day <= SANCTUARY_DAYS;
        Self {
            day,
            total_days: SANCTUARY_DAYS,
            days_remaining: SANCTUARY_DAYS.saturating_sub(day),
            active,
            prompt: if active { daily_prompt(day) } else { None },
        }
    }
}

const DAILY_PROMPTS: [&str; SANCTUARY_DAYS as usize] = [
    "Write down one thing you want the people around you to know today.",
    "Name three people who have shown up for you this week.",
    "What does a good hour look like for you right now?",
    "List the questions you want to bring to your next appointment.",
    "Describe a place where you feel calm.",
    "What is one task you can hand to someone else?",
    "Write a short note of thanks to someone who supported you.",
    "How did your body feel this morning? Note anything new.",
    "What is something small you are looking forward to?",
    "Which routines are helping, and which ones feel heavy?",
    "Record a memory that still makes you laugh.",
    "What would you like your supporters to stop asking you?",
    "Write about a moment this week when you felt strong.",
    "Check your medication list. Is anything unclear?",
    "Who could you call just to talk about something ordinary?",
    "Describe how you have been sleeping.",
    "What kind of help feels easiest to accept?",
    "Write one sentence for yourself to read on a hard day.",
    "Which symptoms have changed since the first week?",
    "Plan one thing for tomorrow that is only for you.",
    "What do you want to remember about today?",
    "Write about a song, book or show keeping you company.",
    "List the appointments coming up and who is going with you.",
    "What has surprised you about this month?",
    "Write a message you would like to share on your campaign page.",
    "How are the people caring for you doing? Ask one of them.",
    "What boundaries would make the next weeks easier?",
    "Note something you learned about your care this month.",
    "Write about what hope looks like for you today.",
    "Look back over your journal. What would you tell yourself on day one?",
];

/// Guided prompt for a 1-based Sanctuary day.
pub fn daily_prompt(day: u32) -> Option<&'static str> {
    day.checked_sub(1)
        .and_then(|idx| DAILY_PROMPTS.get(idx as usize))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn resource_paths_round_trip() {
        for resource in SanctuaryResource::ALL {
            assert_eq!(resource.path().parse::<SanctuaryResource>(), Ok(*resource));
        }
        assert!("diary".parse::<SanctuaryResource>().is_err());
    }

    #[test]
    fn every_resource_has_a_required_field() {
        for resource in SanctuaryResource::ALL {
            assert!(resource.fields().iter().any(|f| f.required), "{resource:?}");
        }
    }

    #[test]
    fn progress_on_start_date_is_day_one() {
        let start = date(2026, 3, 1);
        let progress = SanctuaryProgress::on(start, start);
        assert_eq!(progress.day, 1);
        assert_eq!(progress.days_remaining, 29);
        assert!(progress.active);
        assert_eq!(progress.prompt, daily_prompt(1));
    }

    #[test]
    fn progress_ends_after_thirty_days() {
        let start = date(2026, 3, 1);
        let last = SanctuaryProgress::on(start, date(2026, 3, 30));
        assert_eq!(last.day, 30);
        assert!(last.active);
        assert_eq!(last.days_remaining, 0);

        let over = SanctuaryProgress::on(start, date(2026, 3, 31));
        assert_eq!(over.day, 31);
        assert!(!over.active);
        assert!(over.prompt.is_none());
    }

    #[test]
    fn clock_skew_before_start_counts_as_day_one() {
        let progress = SanctuaryProgress::on(date(2026, 3, 2), date(2026, 3, 1));
        assert_eq!(progress.day, 1);
    }

    #[test]
    fn prompts_cover_every_day() {
        assert!(daily_prompt(0).is_none());
        assert!((1..=SANCTUARY_DAYS).all(|d| daily_prompt(d).is_some()));
        assert!(daily_prompt(SANCTUARY_DAYS + 1).is_none());
    }
}

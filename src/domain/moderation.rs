use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warning {
    pub id: i64,
    pub listing_id: Option<i64>,
    pub user_id: String,
    pub severity: Severity,
    pub reason: String,
    pub comment: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Mild,
    Severe,
}

impl Severity {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "mild" => Some(Self::Mild),
            "severe" => Some(Self::Severe),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Mild => "mild",
            Self::Severe => "severe",
        }
    }

    /// Explicit severity wins; otherwise a suspension is severe and a plain warning mild.
    pub fn effective(explicit: Option<Self>, suspended: bool) -> Self {
        match explicit {
            Some(severity) => severity,
            None if suspended => Self::Severe,
            None => Self::Mild,
        }
    }
}

/// What a moderation action did, as recorded in the event ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationKind {
    Warning,
    Suspension,
}

impl ModerationKind {
    pub fn from_suspended(suspended: bool) -> Self {
        if suspended {
            Self::Suspension
        } else {
            Self::Warning
        }
    }

    pub fn event_description(&self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Suspension => "suspension",
        }
    }
}

/// Shared data structures for the selfie wall
///
/// These structs represent the data model that flows between
/// the catalog, the change feed and the rotation engine.
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::display::DisplayConfig;
use crate::error::Error;

/// Unique catalog ID of a selfie
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SelfieId(pub i64);

impl fmt::Display for SelfieId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique catalog ID of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub i64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Moderation status of a selfie. Only `Approved` may reach the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelfieStatus {
    Pending,
    Approved,
    Rejected,
}

impl SelfieStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelfieStatus::Pending => "pending",
            SelfieStatus::Approved => "approved",
            SelfieStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for SelfieStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelfieStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SelfieStatus::Pending),
            "approved" => Ok(SelfieStatus::Approved),
            "rejected" => Ok(SelfieStatus::Rejected),
            other => Err(Error::InvalidStatus(other.to_string())),
        }
    }
}

impl ToSql for SelfieStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for SelfieStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: Error| FromSqlError::Other(Box::new(e)))
    }
}

/// One photo as seen by the display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfieRecord {
    pub id: SelfieId,
    /// Path or URL of the displayable image (None while the upload is still resolving)
    pub image_ref: Option<String>,
    pub display_name: Option<String>,
    pub message: Option<String>,
    pub status: SelfieStatus,
    /// Monotonic arrival sequence, used for "newest first" ordering
    pub arrival_order: u64,
}

impl SelfieRecord {
    /// Whether this record may be placed in the eligible pool.
    /// A record without an image is approved-but-not-renderable and waits
    /// for an update that supplies one.
    pub fn is_eligible(&self) -> bool {
        self.status == SelfieStatus::Approved && self.image_ref.is_some()
    }
}

/// A selfie row together with its catalog bookkeeping
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSelfie {
    pub record: SelfieRecord,
    pub event_id: EventId,
    /// Bumped on every write, used by the polling feed to detect updates
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub file_size_bytes: Option<i64>,
}

/// A live event with its own wall
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: EventId,
    /// URL-safe short name (e.g., "summer-party")
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    /// When enabled, new selfies start as pending and need approval
    pub moderation_enabled: bool,
    pub display_config: DisplayConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an event
#[derive(Debug, Clone, Default)]
pub struct NewEvent {
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub moderation_enabled: bool,
    pub display_config: DisplayConfig,
}

/// Input for adding a selfie produced by the upload pipeline
#[derive(Debug, Clone, Default)]
pub struct NewSelfie {
    pub image_ref: Option<String>,
    pub display_name: Option<String>,
    pub message: Option<String>,
    pub file_size_bytes: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: SelfieStatus, image_ref: Option<&str>) -> SelfieRecord {
        SelfieRecord {
            id: SelfieId(1),
            image_ref: image_ref.map(str::to_string),
            display_name: None,
            message: None,
            status,
            arrival_order: 1,
        }
    }

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [SelfieStatus::Pending, SelfieStatus::Approved, SelfieStatus::Rejected] {
            assert_eq!(status.as_str().parse::<SelfieStatus>().unwrap(), status);
        }
        assert!(matches!(
            "archived".parse::<SelfieStatus>(),
            Err(Error::InvalidStatus(s)) if s == "archived"
        ));
    }

    #[test]
    fn test_only_approved_with_image_is_eligible() {
        assert!(record(SelfieStatus::Approved, Some("a.jpg")).is_eligible());
        assert!(!record(SelfieStatus::Approved, None).is_eligible());
        assert!(!record(SelfieStatus::Pending, Some("a.jpg")).is_eligible());
        assert!(!record(SelfieStatus::Rejected, Some("a.jpg")).is_eligible());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&SelfieStatus::Approved).unwrap();
        assert_eq!(json, "\"approved\"");
    }
}

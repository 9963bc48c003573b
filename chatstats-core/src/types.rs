//! Core domain types for chatstats
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Event** | One timestamped record attributed to an entity (a bot input, a user creation) |
//! | **Entity** | Whoever produced the event; for this bot always a chat user |
//! | **Dataset** | One of the raw event collections the store can return |
//! | **Granularity** | Calendar unit used to bucket events (day, week, month) |
//! | **Scope** | A named output series requested by the caller |
//! | **Series** | Ordered per-bucket values for one scope and one granularity |

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

// ============================================
// Events
// ============================================

/// A single timestamped interaction or record.
///
/// Both bot inputs and user creation records are reduced to this shape.
/// Snapshots from the store arrive unsorted; the engine sorts them before
/// bucketing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Identifier of the entity that produced the event
    #[serde(alias = "userId", deserialize_with = "deserialize_entity_id")]
    pub entity_id: String,
    /// When the event happened
    pub created_at: DateTime<Utc>,
    /// Whether the user has saved any favourites (user records only)
    #[serde(default)]
    pub has_favourites: bool,
}

impl Event {
    /// Create an event without the favourites flag.
    pub fn new(entity_id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            entity_id: entity_id.into(),
            created_at,
            has_favourites: false,
        }
    }

    /// Set the favourites flag.
    pub fn with_favourites(mut self, has_favourites: bool) -> Self {
        self.has_favourites = has_favourites;
        self
    }
}

/// Chat platform ids are numeric, other sources use strings.
fn deserialize_entity_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Signed(i64),
        Unsigned(u64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Signed(n) => n.to_string(),
        RawId::Unsigned(n) => n.to_string(),
    })
}

// ============================================
// Datasets
// ============================================

/// Raw event collections that can be fetched from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RawDataset {
    /// Every message or command a user sent to the bot
    InputEvents,
    /// One record per user, stamped with the account creation time
    UserCreationEvents,
}

impl RawDataset {
    pub fn as_str(&self) -> &'static str {
        match self {
            RawDataset::InputEvents => "inputs",
            RawDataset::UserCreationEvents => "users",
        }
    }
}

impl fmt::Display for RawDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================
// Granularity
// ============================================

/// Calendar unit for bucketing.
///
/// Weeks start on Monday, months on the 1st, days at local midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Granularity {
    #[serde(rename = "byDay")]
    Day,
    #[serde(rename = "byWeek")]
    Week,
    #[serde(rename = "byMonth")]
    Month,
}

impl Granularity {
    pub const ALL: [Granularity; 3] = [Granularity::Day, Granularity::Week, Granularity::Month];

    /// Key used in request toggle maps and response objects.
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Day => "byDay",
            Granularity::Week => "byWeek",
            Granularity::Month => "byMonth",
        }
    }

    /// Parse a request key (`byDay`, `byWeek`, `byMonth`).
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.as_str() == key)
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================
// Scopes
// ============================================

/// A named output series.
///
/// See [`crate::stats::scope`] for the dataset and calculator each scope uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Scope {
    /// Raw number of inputs per bucket
    #[serde(rename = "inputs")]
    Inputs,
    /// Users whose first-ever input falls in the bucket
    #[serde(rename = "newUsersFromInputs")]
    NewUsersFromInputs,
    /// Raw number of user records created per bucket
    #[serde(rename = "users")]
    Users,
    /// Users whose first-ever creation record falls in the bucket
    #[serde(rename = "newUsers")]
    NewUsers,
    /// Share of created users that have favourites
    #[serde(rename = "usersWithFavourites")]
    UsersWithFavourites,
}

impl Scope {
    pub const ALL: [Scope; 5] = [
        Scope::Inputs,
        Scope::NewUsersFromInputs,
        Scope::Users,
        Scope::NewUsers,
        Scope::UsersWithFavourites,
    ];

    /// Key used in request toggle maps and response objects.
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Inputs => "inputs",
            Scope::NewUsersFromInputs => "newUsersFromInputs",
            Scope::Users => "users",
            Scope::NewUsers => "newUsers",
            Scope::UsersWithFavourites => "usersWithFavourites",
        }
    }

    /// Parse a request key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == key)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================
// Series
// ============================================

/// Raw count for one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountEntry {
    pub date: NaiveDate,
    pub count: u64,
}

/// New entities in one bucket plus the running total up to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CumulativeEntry {
    pub date: NaiveDate,
    pub new: u64,
    /// Sum of `new` over this and all earlier buckets
    pub total: u64,
}

/// Ratio of two cumulative entries, rounded to two decimals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatioEntry {
    pub date: NaiveDate,
    pub new: f64,
    pub total: f64,
}

/// One computed series, serialized as a bare JSON array.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Series {
    Counts(Vec<CountEntry>),
    Cumulative(Vec<CumulativeEntry>),
    Ratio(Vec<RatioEntry>),
}

impl Series {
    /// Number of buckets in the series.
    pub fn len(&self) -> usize {
        match self {
            Series::Counts(entries) => entries.len(),
            Series::Cumulative(entries) => entries.len(),
            Series::Ratio(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_event_deserializes_numeric_and_string_ids() {
        let events: Vec<Event> = serde_json::from_str(
            r#"[
                {"entityId": 123456789, "createdAt": "2021-01-01T10:00:00.000Z"},
                {"userId": "abc", "createdAt": "2021-01-02T00:00:00Z", "hasFavourites": true}
            ]"#,
        )
        .unwrap();

        assert_eq!(events[0].entity_id, "123456789");
        assert_eq!(
            events[0].created_at,
            Utc.with_ymd_and_hms(2021, 1, 1, 10, 0, 0).unwrap()
        );
        assert!(!events[0].has_favourites);
        assert_eq!(events[1].entity_id, "abc");
        assert!(events[1].has_favourites);
    }

    #[test]
    fn test_keys_round_trip() {
        for g in Granularity::ALL {
            assert_eq!(Granularity::from_key(g.as_str()), Some(g));
        }
        for s in Scope::ALL {
            assert_eq!(Scope::from_key(s.as_str()), Some(s));
        }
        assert_eq!(Granularity::from_key("byYear"), None);
        assert_eq!(Scope::from_key("Inputs"), None);
    }

    #[test]
    fn test_series_serializes_as_plain_array() {
        let date = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        let series = Series::Cumulative(vec![CumulativeEntry {
            date,
            new: 2,
            total: 5,
        }]);

        let json = serde_json::to_value(&series).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{"date": "2021-01-01", "new": 2, "total": 5}])
        );
    }
}

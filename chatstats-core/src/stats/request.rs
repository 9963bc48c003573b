//! Request parsing and validation.
//!
//! The wire format uses boolean toggle maps:
//!
//! ```json
//! {
//!   "scopes": { "inputs": true, "newUsers": false },
//!   "timeframes": { "byMonth": true },
//!   "fromDate": "2021-01-01",
//!   "toDate": "2021-03-31"
//! }
//! ```
//!
//! Toggle maps become sets of enum tags here. Unknown keys and non-boolean
//! values are rejected, and a key set to `false` is treated as absent.

use chrono::NaiveDate;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::types::{Granularity, Scope};

const MISSING_BODY: &str = "Missing request body";
const INVALID_SCOPES: &str = "Invalid type of scopes";
const INVALID_TIMEFRAMES: &str = "Invalid type of timeframes";
const INVALID_FROM_DATE: &str = "Invalid type of fromDate";
const INVALID_TO_DATE: &str = "Invalid type of toDate";

/// A validated statistics request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsRequest {
    /// Requested series; never empty
    pub scopes: BTreeSet<Scope>,
    /// Requested granularities; never empty
    pub timeframes: BTreeSet<Granularity>,
    /// Inclusive lower bound (local date)
    pub from_date: Option<NaiveDate>,
    /// Inclusive upper bound (local date)
    pub to_date: Option<NaiveDate>,
}

impl StatsRequest {
    /// Parse and validate a JSON request body.
    ///
    /// Shape errors are reported before empty selections.
    pub fn from_json(body: Option<&Value>) -> Result<Self> {
        let body = match body {
            Some(Value::Object(map)) => map,
            _ => return Err(Error::MalformedRequest(MISSING_BODY)),
        };

        let scopes = parse_toggles(body, "scopes", Scope::from_key, INVALID_SCOPES)?;
        let timeframes =
            parse_toggles(body, "timeframes", Granularity::from_key, INVALID_TIMEFRAMES)?;
        let from_date = parse_date(body, "fromDate", INVALID_FROM_DATE)?;
        let to_date = parse_date(body, "toDate", INVALID_TO_DATE)?;

        if scopes.is_empty() {
            return Err(Error::NoScopes);
        }
        if timeframes.is_empty() {
            return Err(Error::NoTimeframes);
        }

        Ok(Self {
            scopes,
            timeframes,
            from_date,
            to_date,
        })
    }
}

/// Parse a raw request body. Blank or unparsable input counts as missing.
impl FromStr for StatsRequest {
    type Err = Error;

    fn from_str(body: &str) -> Result<Self> {
        if body.trim().is_empty() {
            return Err(Error::MalformedRequest(MISSING_BODY));
        }
        let value: Value =
            serde_json::from_str(body).map_err(|_| Error::MalformedRequest(MISSING_BODY))?;
        Self::from_json(Some(&value))
    }
}

fn parse_toggles<T: Ord>(
    body: &Map<String, Value>,
    field: &str,
    from_key: fn(&str) -> Option<T>,
    invalid: &'static str,
) -> Result<BTreeSet<T>> {
    let toggles = match body.get(field) {
        None | Some(Value::Null) => return Ok(BTreeSet::new()),
        Some(Value::Object(toggles)) => toggles,
        Some(_) => return Err(Error::MalformedRequest(invalid)),
    };

    let mut selected = BTreeSet::new();
    for (key, value) in toggles {
        let tag = from_key(key).ok_or(Error::MalformedRequest(invalid))?;
        match value {
            Value::Bool(true) => {
                selected.insert(tag);
            }
            Value::Bool(false) => {}
            _ => return Err(Error::MalformedRequest(invalid)),
        }
    }
    Ok(selected)
}

fn parse_date(
    body: &Map<String, Value>,
    field: &str,
    invalid: &'static str,
) -> Result<Option<NaiveDate>> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| Error::MalformedRequest(invalid)),
        Some(_) => Err(Error::MalformedRequest(invalid)),
    }
}

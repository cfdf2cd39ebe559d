//! Shared row-mapping helpers.

use chrono::{DateTime, Utc};

use crate::domain::errors::{CoordinationError, CoordinationResult};

pub fn parse_datetime(raw: &str) -> CoordinationResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CoordinationError::Fatal(format!("corrupt timestamp '{raw}': {e}")))
}

pub fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};

use crate::error::AppError;

/// Current time as a canonical RFC3339 UTC string.
pub fn now_rfc3339_utc() -> Result<String, AppError> {
    format_rfc3339_utc(OffsetDateTime::now_utc())
}

pub fn format_rfc3339_utc(dt: OffsetDateTime) -> Result<String, AppError> {
    dt.to_offset(UtcOffset::UTC)
        .format(&Rfc3339)
        .map_err(|e| AppError::new("TIME_FORMAT_FAILED", "Failed to format time").with_details(e.to_string()))
}

/// Parse an RFC3339 timestamp; used to validate caller-supplied timestamps.
pub fn parse_rfc3339(raw: &str) -> Result<OffsetDateTime, AppError> {
    OffsetDateTime::parse(raw.trim(), &Rfc3339).map_err(|e| {
        AppError::new("TIME_PARSE_FAILED", "Timestamp is not RFC3339")
            .with_details(format!("value={raw}; err={e}"))
    })
}

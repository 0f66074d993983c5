use crate::error::Result;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Current UTC time as a FHIR `instant` string.
pub fn now_rfc3339() -> Result<String> {
    format_rfc3339(OffsetDateTime::now_utc())
}

pub fn format_rfc3339(datetime: OffsetDateTime) -> Result<String> {
    Ok(datetime.format(&Rfc3339)?)
}

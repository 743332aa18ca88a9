//! Date parsing and clinic-local time helpers
//!
//! The frontend sends dates from `<input type="date">` (`YYYY-MM-DD`),
//! occasionally from `datetime-local` inputs, and echoes back RFC 3339
//! values it received from the API. All of them land here.

use crate::error::ApiError;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};

const LOCAL_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Parse a date or timestamp sent by the client
///
/// Date-only values are midnight UTC, matching how browsers read them.
pub fn parse_fecha(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    let value = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in LOCAL_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ApiError::validation(format!("Fecha inválida: {}", value)))
}

/// Parse an optional date field; blank strings count as absent
pub fn parse_fecha_opt(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_fecha(value).map(Some),
    }
}

/// Current clinic-local time as `HH:MM`
pub fn hora_local(now: DateTime<Utc>, utc_offset_hours: i32) -> String {
    let offset = FixedOffset::east_opt(utc_offset_hours.saturating_mul(3600))
        .unwrap_or_else(|| Utc.fix());
    now.with_timezone(&offset).format("%H:%M").to_string()
}

/// Due date shown on invoices that were saved without one
pub fn vencimiento_por_defecto(fecha: DateTime<Utc>) -> DateTime<Utc> {
    fecha + Duration::days(30)
}

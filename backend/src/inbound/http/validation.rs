//! Request-field validation shared by the HTTP handlers.
//!
//! Every failure becomes an `invalid_request` error whose `details` carry the
//! offending `field`, a machine-readable `code` and, where useful, the
//! rejected `value`.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::json;

use crate::domain::{Error, QueryId};

/// Field-level validation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldErrorCode {
    MissingField,
    InvalidId,
    InvalidDate,
    InvalidChoice,
    OutOfRange,
}

impl FieldErrorCode {
    const fn as_str(self) -> &'static str {
        match self {
            Self::MissingField => "missing_field",
            Self::InvalidId => "invalid_id",
            Self::InvalidDate => "invalid_date",
            Self::InvalidChoice => "invalid_choice",
            Self::OutOfRange => "out_of_range",
        }
    }
}

/// Wire name of a request field, e.g. `dateFrom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FieldName(&'static str);

impl FieldName {
    pub(crate) const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub(crate) const fn as_str(self) -> &'static str {
        self.0
    }
}

pub(crate) fn field_error(
    field: FieldName,
    code: FieldErrorCode,
    message: impl Into<String>,
    value: Option<&str>,
) -> Error {
    let mut details = json!({ "field": field.as_str(), "code": code.as_str() });
    if let (Some(value), Some(map)) = (value, details.as_object_mut()) {
        map.insert("value".to_owned(), json!(value));
    }
    Error::invalid_request(message).with_details(details)
}

pub(crate) fn missing_field_error(field: FieldName, message: &str) -> Error {
    field_error(field, FieldErrorCode::MissingField, message, None)
}

/// Returns the trimmed value or a `missing_field` error when it is absent or
/// blank.
pub(crate) fn require_text(
    value: Option<String>,
    field: FieldName,
    message: &str,
) -> Result<String, Error> {
    match value.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_owned()),
        _ => Err(missing_field_error(field, message)),
    }
}

pub(crate) fn parse_query_id(raw: &str) -> Result<QueryId, Error> {
    raw.parse().map_err(|_| {
        field_error(
            FieldName::new("id"),
            FieldErrorCode::InvalidId,
            "id must be a valid query identifier",
            Some(raw),
        )
    })
}

/// Which end of a date window a bare calendar date should snap to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DateBound {
    Start,
    End,
}

/// Parse an RFC 3339 timestamp or a bare `YYYY-MM-DD` date.
///
/// Bare dates cover the whole day: a start bound snaps to midnight and an
/// end bound to the last representable instant of that day.
pub(crate) fn parse_date_bound(
    value: Option<&str>,
    field: FieldName,
    bound: DateBound,
) -> Result<Option<DateTime<Utc>>, Error> {
    let Some(raw) = value.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(None);
    };
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(timestamp.with_timezone(&Utc)));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        field_error(
            field,
            FieldErrorCode::InvalidDate,
            format!("{} must be a date or RFC 3339 timestamp", field.as_str()),
            Some(raw),
        )
    })?;
    let time = match bound {
        DateBound::Start => NaiveTime::MIN,
        DateBound::End => NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999)
            .unwrap_or(NaiveTime::MIN),
    };
    Ok(Some(date.and_time(time).and_utc()))
}

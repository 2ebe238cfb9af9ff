use chrono::{Duration, NaiveDate};
use thiserror::Error;

use crate::domain::certificate::CertificateRequest;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),
    #[error("invalid date `{value}` for {field} (expected YYYY-MM-DD)")]
    InvalidDate { field: &'static str, value: String },
    #[error("leave range ends before it starts")]
    EndBeforeStart,
    #[error("leave cannot cover more than {max_days} days")]
    TooLong { max_days: i64 },
    #[error("leave cannot start more than {max_backdate_days} days in the past")]
    StartsTooFarBack { max_backdate_days: i64 },
}

/// The leave date rule. One definition, applied by the wizard before it
/// submits and by the registry before it issues, always against a
/// caller-supplied `today`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DatePolicy {
    pub max_duration_days: i64,
    pub max_backdate_days: i64,
}

impl Default for DatePolicy {
    fn default() -> Self {
        Self { max_duration_days: 5, max_backdate_days: 7 }
    }
}

impl DatePolicy {
    pub fn check(
        &self,
        today: NaiveDate,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<(), ValidationError> {
        if to < from {
            return Err(ValidationError::EndBeforeStart);
        }
        // Duration counts both endpoints: a Monday-to-Friday certificate is
        // five days.
        let covered_days = (to - from).num_days() + 1;
        if covered_days > self.max_duration_days {
            return Err(ValidationError::TooLong { max_days: self.max_duration_days });
        }
        if from < today - Duration::days(self.max_backdate_days) {
            return Err(ValidationError::StartsTooFarBack {
                max_backdate_days: self.max_backdate_days,
            });
        }
        Ok(())
    }
}

/// Wire names of required fields that are empty after trimming.
pub fn missing_required_fields(request: &CertificateRequest) -> Vec<String> {
    let required: [(&str, &str); 5] = [
        ("email", &request.email),
        ("firstName", &request.first_name),
        ("lastName", &request.last_name),
        ("fromDate", &request.from_date),
        ("toDate", &request.to_date),
    ];

    required
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name.to_string())
        .collect()
}

fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| ValidationError::InvalidDate { field, value: value.to_string() })
}

/// Full request validation: required fields, then the date policy against
/// `today`.
pub fn validate_request(
    request: &CertificateRequest,
    policy: DatePolicy,
    today: NaiveDate,
) -> Result<(), ValidationError> {
    let missing = missing_required_fields(request);
    if !missing.is_empty() {
        return Err(ValidationError::MissingFields(missing));
    }

    let from = parse_date("fromDate", &request.from_date)?;
    let to = parse_date("toDate", &request.to_date)?;
    policy.check(today, from, to)
}

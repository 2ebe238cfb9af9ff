use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codes::CertificateCode;

/// Snapshot of the intake form as submitted. Every field travels as a
/// string and defaults to empty when absent; the registry validates,
/// the transport layer does not.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CertificateRequest {
    pub cert_type: String,
    pub leave_from: String,
    pub other_leave: String,
    pub reason: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub dob: String,
    pub mobile: String,
    pub gender: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postcode: String,
    pub from_date: String,
    pub to_date: String,
    pub symptoms: String,
    pub doctor_note: String,
}

impl CertificateRequest {
    pub fn full_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        full.trim().to_string()
    }
}

/// The durable, append-only record: the submitted request plus the code
/// assigned at issuance and the issuance instant. Never updated after
/// creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRecord {
    pub code: CertificateCode,
    pub request: CertificateRequest,
    pub issued_at: DateTime<Utc>,
}

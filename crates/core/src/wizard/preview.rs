use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Read-only summary shown beside the form while the user types. Recomputed
/// synchronously on every field change; unset fields render as placeholders.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificatePreview {
    pub cert_type: String,
    pub full_name: String,
    pub from_date: String,
    pub to_date: String,
}

const DATE_PLACEHOLDER: &str = "-";

fn field_or<'a>(fields: &'a BTreeMap<String, String>, name: &str, placeholder: &'a str) -> &'a str {
    match fields.get(name) {
        Some(value) if !value.trim().is_empty() => value.as_str(),
        _ => placeholder,
    }
}

pub(crate) fn render(fields: &BTreeMap<String, String>) -> CertificatePreview {
    let first = field_or(fields, "firstName", "First Name");
    let last = field_or(fields, "lastName", "Last Name");

    CertificatePreview {
        cert_type: field_or(fields, "certType", DATE_PLACEHOLDER).to_string(),
        full_name: format!("{first} {last}"),
        from_date: field_or(fields, "fromDate", DATE_PLACEHOLDER).to_string(),
        to_date: field_or(fields, "toDate", DATE_PLACEHOLDER).to_string(),
    }
}

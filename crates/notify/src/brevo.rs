use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::{json, Value};

use medicert_core::config::NotifyConfig;
use medicert_core::domain::certificate::CertificateRecord;

use crate::sink::{NotificationSink, NotifyError};

/// Brevo transactional-email client. Sends the staff notification for every
/// issued certificate, plus a confirmation to the patient when they supplied
/// an email address.
#[derive(Debug)]
pub struct BrevoMailer {
    client: reqwest::Client,
    api_base_url: String,
    api_key: String,
    sender_name: String,
    sender_email: String,
    staff_email: String,
}

impl BrevoMailer {
    pub fn new(config: &NotifyConfig) -> Result<Self, NotifyError> {
        let api_key = config
            .api_key
            .as_ref()
            .map(|key| key.expose_secret().to_string())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                NotifyError::Configuration("notify.api_key is required for Brevo".to_string())
            })?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key,
            sender_name: config.sender_name.clone(),
            sender_email: config.sender_email.clone(),
            staff_email: config.staff_email.clone(),
        })
    }

    fn sender(&self) -> Value {
        json!({ "name": self.sender_name, "email": self.sender_email })
    }

    pub(crate) fn staff_email_payload(&self, record: &CertificateRecord) -> Value {
        let request = &record.request;
        json!({
            "sender": self.sender(),
            "to": [{ "email": self.staff_email }],
            "subject": format!(
                "New medical certificate request - {} ({})",
                request.full_name(),
                record.code
            ),
            "htmlContent": format!(
                "<h2>New medical certificate request</h2>\
                 <p><strong>Certificate:</strong> {}</p>\
                 <p><strong>Name:</strong> {}</p>\
                 <p><strong>Email:</strong> {}</p>\
                 <p><strong>Type:</strong> {}</p>\
                 <p><strong>Reason:</strong> {}</p>\
                 <p><strong>Dates:</strong> {} to {}</p>\
                 <p><strong>Symptoms:</strong> {}</p>\
                 <p>Issued at {}</p>",
                record.code,
                request.full_name(),
                request.email,
                request.cert_type,
                request.reason,
                request.from_date,
                request.to_date,
                request.symptoms,
                record.issued_at.to_rfc3339(),
            ),
        })
    }

    pub(crate) fn patient_email_payload(&self, record: &CertificateRecord) -> Option<Value> {
        let request = &record.request;
        if request.email.trim().is_empty() {
            return None;
        }

        Some(json!({
            "sender": self.sender(),
            "to": [{ "email": request.email }],
            "subject": "Your medical certificate request has been received",
            "htmlContent": format!(
                "<h2>Hi {},</h2>\
                 <p>Your medical certificate request has been received and is \
                 being reviewed by a registered doctor.</p>\
                 <p>Your reference code is <strong>{}</strong>. You will be \
                 notified if any further details are needed.</p>\
                 <p><strong>Requested dates:</strong> {} to {}</p>",
                request.first_name,
                record.code,
                request.from_date,
                request.to_date,
            ),
        }))
    }

    async fn send(&self, payload: &Value) -> Result<(), NotifyError> {
        let url = format!("{}/v3/smtp/email", self.api_base_url);
        let response = self
            .client
            .post(&url)
            .header("api-key", &self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|error| NotifyError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Provider { status: status.as_u16(), body });
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for BrevoMailer {
    async fn certificate_issued(&self, record: &CertificateRecord) -> Result<(), NotifyError> {
        self.send(&self.staff_email_payload(record)).await?;
        if let Some(payload) = self.patient_email_payload(record) {
            self.send(&payload).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use medicert_core::codes::CertificateCode;
    use medicert_core::config::NotifyConfig;
    use medicert_core::domain::certificate::{CertificateRecord, CertificateRequest};

    use super::BrevoMailer;
    use crate::sink::NotifyError;

    fn config() -> NotifyConfig {
        NotifyConfig {
            enabled: true,
            api_base_url: "https://api.brevo.com/".to_string(),
            api_key: Some("xkeysib-test".to_string().into()),
            sender_name: "Medicert".to_string(),
            sender_email: "noreply@medicert.example".to_string(),
            staff_email: "intake@medicert.example".to_string(),
            queue_capacity: 8,
        }
    }

    fn record(patient_email: &str) -> CertificateRecord {
        CertificateRecord {
            code: CertificateCode::parse("MEDC123456").expect("valid code"),
            request: CertificateRequest {
                email: patient_email.to_string(),
                first_name: "Ann".to_string(),
                last_name: "Lee".to_string(),
                cert_type: "Sick Leave".to_string(),
                reason: "Flu".to_string(),
                from_date: "2025-01-10".to_string(),
                to_date: "2025-01-12".to_string(),
                ..CertificateRequest::default()
            },
            issued_at: Utc::now(),
        }
    }

    #[test]
    fn missing_api_key_is_a_configuration_error() {
        let mut config = config();
        config.api_key = None;

        let error = BrevoMailer::new(&config).expect_err("mailer needs an api key");
        assert!(matches!(error, NotifyError::Configuration(_)));
    }

    #[test]
    fn staff_payload_carries_code_and_identity() {
        let mailer = BrevoMailer::new(&config()).expect("mailer");
        let payload = mailer.staff_email_payload(&record("a@b.com"));

        assert_eq!(payload["to"][0]["email"], "intake@medicert.example");
        let subject = payload["subject"].as_str().expect("subject is a string");
        assert!(subject.contains("Ann Lee"));
        assert!(subject.contains("MEDC123456"));
        let html = payload["htmlContent"].as_str().expect("html body");
        assert!(html.contains("2025-01-10"));
        assert!(html.contains("Sick Leave"));
    }

    #[test]
    fn patient_confirmation_is_skipped_without_an_address() {
        let mailer = BrevoMailer::new(&config()).expect("mailer");

        assert!(mailer.patient_email_payload(&record("  ")).is_none());

        let payload =
            mailer.patient_email_payload(&record("a@b.com")).expect("payload for patient");
        assert_eq!(payload["to"][0]["email"], "a@b.com");
        let html = payload["htmlContent"].as_str().expect("html body");
        assert!(html.contains("MEDC123456"));
        assert!(html.contains("Hi Ann"));
    }
}

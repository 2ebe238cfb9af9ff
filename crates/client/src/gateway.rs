use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use medicert_core::codes::CertificateCode;
use medicert_core::config::SubmitConfig;
use medicert_core::domain::certificate::CertificateRequest;
use medicert_core::wizard::controller::{SubmitError, SubmitGateway};

#[derive(Debug, Deserialize)]
struct SubmitResponseBody {
    #[serde(default)]
    success: bool,
    #[serde(rename = "certificateNumber")]
    certificate_number: Option<String>,
    message: Option<String>,
}

/// Sends the submission payload to the registry. One request per call, no
/// retries here; the wizard decides whether a retry happens.
pub struct HttpSubmitGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSubmitGateway {
    pub fn new(config: &SubmitConfig) -> Result<Self, SubmitError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| SubmitError::Transport(error.to_string()))?;

        Ok(Self { client, base_url: config.base_url.trim_end_matches('/').to_string() })
    }

    fn submit_url(&self) -> String {
        format!("{}/api/submit", self.base_url)
    }
}

#[async_trait]
impl SubmitGateway for HttpSubmitGateway {
    async fn submit(&self, request: &CertificateRequest) -> Result<CertificateCode, SubmitError> {
        let response = self
            .client
            .post(self.submit_url())
            .json(request)
            .send()
            .await
            .map_err(|error| SubmitError::Transport(error.to_string()))?;

        let status = response.status();
        let body: SubmitResponseBody = match response.json().await {
            Ok(body) => body,
            Err(error) if status.is_success() => {
                return Err(SubmitError::Transport(format!("malformed response: {error}")));
            }
            Err(_) => {
                return Err(SubmitError::Rejected(format!(
                    "server responded with status {status}"
                )));
            }
        };

        if !status.is_success() || !body.success {
            let message = body
                .message
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| format!("server responded with status {status}"));
            return Err(SubmitError::Rejected(message));
        }

        let raw_code = body.certificate_number.ok_or_else(|| {
            SubmitError::Rejected("server accepted the request without a certificate code".into())
        })?;
        CertificateCode::parse(&raw_code).map_err(|error| {
            SubmitError::Rejected(format!("server returned a malformed certificate code: {error}"))
        })
    }
}

use std::sync::Arc;

use thiserror::Error;

use medicert_core::clock::Clock;
use medicert_core::codes::CodeGenerator;
use medicert_core::domain::certificate::{CertificateRecord, CertificateRequest};

use crate::repositories::{CertificateRepository, RepositoryError};

const DEFAULT_MAX_ATTEMPTS: u32 = 32;

#[derive(Debug, Error)]
pub enum IssueError {
    #[error("could not allocate a unique certificate code after {attempts} attempts")]
    CodeSpaceExhausted { attempts: u32 },
    #[error(transparent)]
    Repository(RepositoryError),
}

/// Turns an accepted request into a durable record with a unique code.
///
/// The loop draws a candidate code and attempts the insert; the store's
/// uniqueness constraint decides winners, so there is no read-check-write
/// window between concurrent submissions. A duplicate rejection just means
/// another draw.
pub struct CertificateIssuer {
    repository: Arc<dyn CertificateRepository>,
    generator: Arc<dyn CodeGenerator>,
    clock: Arc<dyn Clock>,
    max_attempts: u32,
}

impl CertificateIssuer {
    pub fn new(
        repository: Arc<dyn CertificateRepository>,
        generator: Arc<dyn CodeGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { repository, generator, clock, max_attempts: DEFAULT_MAX_ATTEMPTS }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub async fn issue(&self, request: CertificateRequest) -> Result<CertificateRecord, IssueError> {
        for _ in 0..self.max_attempts {
            let record = CertificateRecord {
                code: self.generator.draw(),
                request: request.clone(),
                issued_at: self.clock.now(),
            };

            match self.repository.insert(record.clone()).await {
                Ok(()) => return Ok(record),
                Err(RepositoryError::DuplicateCode) => continue,
                Err(error) => return Err(IssueError::Repository(error)),
            }
        }

        Err(IssueError::CodeSpaceExhausted { attempts: self.max_attempts })
    }
}

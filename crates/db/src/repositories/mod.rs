use async_trait::async_trait;
use thiserror::Error;

use medicert_core::codes::CertificateCode;
use medicert_core::domain::certificate::CertificateRecord;

pub mod certificate;
pub mod memory;

pub use certificate::SqlCertificateRepository;
pub use memory::InMemoryCertificateRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The code is already present; the issuer resamples on this.
    #[error("certificate code already taken")]
    DuplicateCode,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Durable, append-only store of issued certificates. `insert` must be
/// atomic with respect to code uniqueness: two concurrent inserts of the
/// same code may not both succeed.
#[async_trait]
pub trait CertificateRepository: Send + Sync {
    async fn insert(&self, record: CertificateRecord) -> Result<(), RepositoryError>;

    async fn find_by_code(
        &self,
        code: &CertificateCode,
    ) -> Result<Option<CertificateRecord>, RepositoryError>;

    async fn count(&self) -> Result<i64, RepositoryError>;
}

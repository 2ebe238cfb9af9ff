use std::collections::HashMap;

use tokio::sync::RwLock;

use medicert_core::codes::CertificateCode;
use medicert_core::domain::certificate::CertificateRecord;

use super::{CertificateRepository, RepositoryError};

/// Test-friendly store with the same duplicate-code semantics as the SQL
/// implementation: insertion under a write lock, so check-and-append is
/// atomic here too.
#[derive(Default)]
pub struct InMemoryCertificateRepository {
    records: RwLock<HashMap<String, CertificateRecord>>,
}

#[async_trait::async_trait]
impl CertificateRepository for InMemoryCertificateRepository {
    async fn insert(&self, record: CertificateRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        if records.contains_key(record.code.as_str()) {
            return Err(RepositoryError::DuplicateCode);
        }
        records.insert(record.code.as_str().to_string(), record);
        Ok(())
    }

    async fn find_by_code(
        &self,
        code: &CertificateCode,
    ) -> Result<Option<CertificateRecord>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.get(code.as_str()).cloned())
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.len() as i64)
    }
}

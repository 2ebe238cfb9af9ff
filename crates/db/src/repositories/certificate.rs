use chrono::{DateTime, Utc};
use sqlx::Row;

use medicert_core::codes::CertificateCode;
use medicert_core::domain::certificate::{CertificateRecord, CertificateRequest};

use super::{CertificateRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCertificateRepository {
    pool: DbPool,
}

impl SqlCertificateRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode_record(row: &sqlx::sqlite::SqliteRow) -> Result<CertificateRecord, RepositoryError> {
    let raw_code = row.get::<String, _>("code");
    let code = CertificateCode::parse(&raw_code)
        .map_err(|error| RepositoryError::Decode(format!("stored code `{raw_code}`: {error}")))?;

    let raw_issued_at = row.get::<String, _>("issued_at");
    let issued_at = DateTime::parse_from_rfc3339(&raw_issued_at)
        .map_err(|error| {
            RepositoryError::Decode(format!("stored issued_at `{raw_issued_at}`: {error}"))
        })?
        .with_timezone(&Utc);

    let request = CertificateRequest {
        cert_type: row.get("cert_type"),
        leave_from: row.get("leave_from"),
        other_leave: row.get("other_leave"),
        reason: row.get("reason"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        dob: row.get("dob"),
        mobile: row.get("mobile"),
        gender: row.get("gender"),
        address: row.get("address"),
        city: row.get("city"),
        state: row.get("state"),
        postcode: row.get("postcode"),
        from_date: row.get("from_date"),
        to_date: row.get("to_date"),
        symptoms: row.get("symptoms"),
        doctor_note: row.get("doctor_note"),
    };

    Ok(CertificateRecord { code, request, issued_at })
}

#[async_trait::async_trait]
impl CertificateRepository for SqlCertificateRepository {
    async fn insert(&self, record: CertificateRecord) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO certificate (
                 code, cert_type, leave_from, other_leave, reason, email,
                 first_name, last_name, dob, mobile, gender, address, city,
                 state, postcode, from_date, to_date, symptoms, doctor_note,
                 issued_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.code.as_str())
        .bind(&record.request.cert_type)
        .bind(&record.request.leave_from)
        .bind(&record.request.other_leave)
        .bind(&record.request.reason)
        .bind(&record.request.email)
        .bind(&record.request.first_name)
        .bind(&record.request.last_name)
        .bind(&record.request.dob)
        .bind(&record.request.mobile)
        .bind(&record.request.gender)
        .bind(&record.request.address)
        .bind(&record.request.city)
        .bind(&record.request.state)
        .bind(&record.request.postcode)
        .bind(&record.request.from_date)
        .bind(&record.request.to_date)
        .bind(&record.request.symptoms)
        .bind(&record.request.doctor_note)
        .bind(record.issued_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_error)) if db_error.is_unique_violation() => {
                Err(RepositoryError::DuplicateCode)
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn find_by_code(
        &self,
        code: &CertificateCode,
    ) -> Result<Option<CertificateRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT code, cert_type, leave_from, other_leave, reason, email,
                    first_name, last_name, dob, mobile, gender, address, city,
                    state, postcode, from_date, to_date, symptoms, doctor_note,
                    issued_at
             FROM certificate WHERE code = ?",
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(decode_record).transpose()
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM certificate")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use medicert_core::codes::CertificateCode;
    use medicert_core::domain::certificate::{CertificateRecord, CertificateRequest};

    use super::SqlCertificateRepository;
    use crate::repositories::{CertificateRepository, RepositoryError};
    use crate::{connect_with_settings, migrations};

    async fn repository() -> SqlCertificateRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");
        SqlCertificateRepository::new(pool)
    }

    fn record(code: &str) -> CertificateRecord {
        CertificateRecord {
            code: CertificateCode::parse(code).expect("valid code"),
            request: CertificateRequest {
                cert_type: "Sick Leave".to_string(),
                reason: "Flu".to_string(),
                email: "a@b.com".to_string(),
                first_name: "Ann".to_string(),
                last_name: "Lee".to_string(),
                from_date: "2025-01-10".to_string(),
                to_date: "2025-01-12".to_string(),
                ..CertificateRequest::default()
            },
            issued_at: Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).single().expect("valid instant"),
        }
    }

    #[tokio::test]
    async fn insert_and_find_round_trip() {
        let repo = repository().await;
        let stored = record("MEDC123456");

        repo.insert(stored.clone()).await.expect("insert record");
        let found = repo
            .find_by_code(&stored.code)
            .await
            .expect("lookup should succeed")
            .expect("record should exist");

        assert_eq!(found, stored);
        assert_eq!(repo.count().await.expect("count"), 1);
    }

    #[tokio::test]
    async fn duplicate_code_insert_is_rejected() {
        let repo = repository().await;

        repo.insert(record("MEDC123456")).await.expect("first insert");
        let error = repo
            .insert(record("MEDC123456"))
            .await
            .expect_err("second insert of the same code must fail");

        assert!(matches!(error, RepositoryError::DuplicateCode));
        assert_eq!(repo.count().await.expect("count"), 1);
    }

    #[tokio::test]
    async fn lookup_against_an_empty_store_finds_nothing() {
        let repo = repository().await;
        let code = CertificateCode::parse("MEDC000000").expect("valid code");

        let found = repo.find_by_code(&code).await.expect("lookup should succeed");
        assert!(found.is_none());
    }
}

use medicert_core::codes::CertificateCode;
use medicert_core::config::{AppConfig, LoadOptions};
use medicert_db::repositories::SqlCertificateRepository;
use medicert_db::{connect_with_settings, CertificateRepository};

use crate::commands::{build_runtime, CommandResult};

pub fn run(raw_code: &str) -> CommandResult {
    let code = match CertificateCode::parse(raw_code) {
        Ok(code) => code,
        Err(error) => {
            return CommandResult::failure(
                "verify",
                "malformed_code",
                format!("`{raw_code}` is not a certificate code: {error}"),
                2,
            );
        }
    };

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "verify",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match build_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "verify",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        let repository = SqlCertificateRepository::new(pool.clone());
        let found = repository
            .find_by_code(&code)
            .await
            .map_err(|error| ("lookup", error.to_string(), 5u8))?;
        pool.close().await;
        Ok::<_, (&'static str, String, u8)>(found)
    });

    match result {
        Ok(Some(record)) => CommandResult::success(
            "verify",
            format!(
                "{} is valid: {} ({}) {} to {}, issued {}",
                record.code,
                record.request.full_name(),
                record.request.cert_type,
                record.request.from_date,
                record.request.to_date,
                record.issued_at.to_rfc3339(),
            ),
        ),
        Ok(None) => {
            CommandResult::failure("verify", "not_found", format!("{code} is not on record"), 1)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("verify", error_class, message, exit_code)
        }
    }
}

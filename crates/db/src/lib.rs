pub mod connection;
pub mod issuer;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use issuer::{CertificateIssuer, IssueError};
pub use repositories::{
    CertificateRepository, InMemoryCertificateRepository, RepositoryError,
    SqlCertificateRepository,
};

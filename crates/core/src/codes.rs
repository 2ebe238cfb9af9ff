use std::fmt;
use std::sync::Mutex;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CODE_PREFIX: &str = "MEDC";
pub const CODE_DIGITS: usize = 6;
const CODE_SPACE: u32 = 1_000_000;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CodeError {
    #[error("certificate code must start with `{CODE_PREFIX}`")]
    BadPrefix,
    #[error("certificate code must carry exactly {CODE_DIGITS} digits after the prefix")]
    BadLength,
    #[error("certificate code suffix must be ASCII digits")]
    BadDigits,
}

/// A certificate identifier of the form `MEDC` + six digits. Parsing
/// normalizes to uppercase; the inner string is always canonical.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CertificateCode(String);

impl CertificateCode {
    pub fn parse(raw: &str) -> Result<Self, CodeError> {
        let normalized = raw.trim().to_ascii_uppercase();
        let Some(suffix) = normalized.strip_prefix(CODE_PREFIX) else {
            return Err(CodeError::BadPrefix);
        };
        if suffix.len() != CODE_DIGITS {
            return Err(CodeError::BadLength);
        }
        if !suffix.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(CodeError::BadDigits);
        }
        Ok(Self(normalized))
    }

    /// Canonical code for a numeric suffix, zero-padded to six digits.
    /// Callers must stay below the code space; generators guarantee this.
    pub fn from_suffix(suffix: u32) -> Self {
        debug_assert!(suffix < CODE_SPACE);
        Self(format!("{CODE_PREFIX}{suffix:06}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CertificateCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CertificateCode {
    type Error = CodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CertificateCode> for String {
    fn from(code: CertificateCode) -> Self {
        code.0
    }
}

/// Draws candidate codes for the issuer. Draws are independent samples, not
/// a counter; uniqueness is the store's job, the issuer resamples on
/// collision.
pub trait CodeGenerator: Send + Sync {
    fn draw(&self) -> CertificateCode;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn draw(&self) -> CertificateCode {
        let suffix = rand::thread_rng().gen_range(0..CODE_SPACE);
        CertificateCode::from_suffix(suffix)
    }
}

/// Replays a scripted sequence of draws, then falls back to random ones.
/// Lets tests force a collision on the first draw without patching the
/// issuer.
#[derive(Debug, Default)]
pub struct ScriptedCodeGenerator {
    scripted: Mutex<Vec<CertificateCode>>,
}

impl ScriptedCodeGenerator {
    pub fn new(codes: impl IntoIterator<Item = CertificateCode>) -> Self {
        let mut scripted: Vec<CertificateCode> = codes.into_iter().collect();
        scripted.reverse();
        Self { scripted: Mutex::new(scripted) }
    }
}

impl CodeGenerator for ScriptedCodeGenerator {
    fn draw(&self) -> CertificateCode {
        let next = self.scripted.lock().ok().and_then(|mut scripted| scripted.pop());
        next.unwrap_or_else(|| RandomCodeGenerator.draw())
    }
}

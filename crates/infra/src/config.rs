//! Engine configuration, read from the process environment.

use thiserror::Error;

use tallybook_accounting::LedgerPolicy;

pub const ALLOW_DUPLICATE_CODES: &str = "TALLYBOOK_ALLOW_DUPLICATE_CODES";
pub const ALLOW_TYPE_CHANGE_AFTER_POSTING: &str = "TALLYBOOK_ALLOW_TYPE_CHANGE_AFTER_POSTING";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a boolean (got '{value}')")]
    InvalidBool { var: &'static str, value: String },
}

/// Knobs for [`crate::engine::LedgerEngine`].
///
/// Defaults are the strict rules: account codes are unique per organization
/// and an account's type is frozen once a transaction references it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineConfig {
    pub allow_duplicate_codes: bool,
    pub allow_type_change_after_posting: bool,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source (unset variables keep their default).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let flag = |var: &'static str| -> Result<bool, ConfigError> {
            match lookup(var) {
                None => Ok(false),
                Some(value) => parse_bool(&value)
                    .ok_or_else(|| ConfigError::InvalidBool { var, value }),
            }
        };

        Ok(Self {
            allow_duplicate_codes: flag(ALLOW_DUPLICATE_CODES)?,
            allow_type_change_after_posting: flag(ALLOW_TYPE_CHANGE_AFTER_POSTING)?,
        })
    }

    pub fn policy(&self) -> LedgerPolicy {
        LedgerPolicy {
            unique_codes: !self.allow_duplicate_codes,
            lock_type_once_posted: !self.allow_type_change_after_posting,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

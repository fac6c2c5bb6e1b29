// Error taxonomy for the battle ledger.
//
// Only a missing or unreadable data source is an error. Bad identifiers and
// malformed records degrade to empty results instead (see analyzer.rs).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("battle data unavailable from {origin}: {source}")]
    DataUnavailable {
        origin: String,
        source: anyhow::Error,
    },
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl LedgerError {
    pub fn unavailable(origin: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        LedgerError::DataUnavailable {
            origin: origin.into(),
            source: source.into(),
        }
    }

    pub fn is_data_unavailable(&self) -> bool {
        matches!(self, LedgerError::DataUnavailable { .. })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid listen address {value:?} in {var}")]
    InvalidAddr { var: &'static str, value: String },
}

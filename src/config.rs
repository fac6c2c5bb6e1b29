use std::{env, net::SocketAddr, path::PathBuf};

use crate::error::{ConfigError, Result};

pub const ROSTER_CSV_VAR: &str = "BATTLE_LEDGER_ROSTER_CSV";
pub const BATTLES_CSV_VAR: &str = "BATTLE_LEDGER_BATTLES_CSV";
pub const DATABASE_VAR: &str = "BATTLE_LEDGER_DB";
pub const ADDR_VAR: &str = "BATTLE_LEDGER_ADDR";

const DEFAULT_ROSTER_CSV: &str = "data/pokedex.csv";
const DEFAULT_BATTLES_CSV: &str = "data/combats.csv";
const DEFAULT_DATABASE: &str = "data/battles.db";
const DEFAULT_ADDR: &str = "0.0.0.0:3000";

/// Data locations and listen address, read from the environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub roster_csv: PathBuf,
    pub battles_csv: PathBuf,
    pub database: PathBuf,
    pub server_addr: SocketAddr,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Build from any variable source; unset or blank values use defaults.
    ///
    /// A bad value surfaces as `LedgerError::Config`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |var: &str, default: &str| {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let addr = value(ADDR_VAR, DEFAULT_ADDR);
        let server_addr = addr.parse().map_err(|_| ConfigError::InvalidAddr {
            var: ADDR_VAR,
            value: addr.clone(),
        })?;

        Ok(Self {
            roster_csv: PathBuf::from(value(ROSTER_CSV_VAR, DEFAULT_ROSTER_CSV)),
            battles_csv: PathBuf::from(value(BATTLES_CSV_VAR, DEFAULT_BATTLES_CSV)),
            database: PathBuf::from(value(DATABASE_VAR, DEFAULT_DATABASE)),
            server_addr,
        })
    }

    /// Whether `battle-ledger import` has already written the database.
    pub fn has_database(&self) -> bool {
        self.database.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config.roster_csv, PathBuf::from("data/pokedex.csv"));
        assert_eq!(config.battles_csv, PathBuf::from("data/combats.csv"));
        assert_eq!(config.database, PathBuf::from("data/battles.db"));
        assert_eq!(config.server_addr.port(), 3000);
    }

    #[test]
    fn overrides_and_blank_values() {
        let config = AppConfig::from_lookup(lookup_from(&[
            (BATTLES_CSV_VAR, "/srv/combats.csv"),
            (DATABASE_VAR, "   "),
            (ADDR_VAR, "127.0.0.1:8080"),
        ]))
        .unwrap();

        assert_eq!(config.battles_csv, PathBuf::from("/srv/combats.csv"));
        assert_eq!(config.database, PathBuf::from("data/battles.db"));
        assert_eq!(config.server_addr.to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn invalid_addr_is_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[(ADDR_VAR, "localhost")])).unwrap_err();

        assert!(matches!(
            err,
            LedgerError::Config(ConfigError::InvalidAddr { var: ADDR_VAR, .. })
        ));
        assert!(!err.is_data_unavailable());
        assert!(err.to_string().contains("localhost"));
    }
}

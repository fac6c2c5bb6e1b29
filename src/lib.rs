// Battle Ledger - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod analyzer;
pub mod audit;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod roster;

// Re-export commonly used types
pub use analyzer::{BattleAnalyzer, BattleStats, OpponentRef, PokemonReport, TypeWinRate};
pub use audit::{AuditIssue, AuditReport, IssueKind, LedgerAuditor, Severity};
pub use config::AppConfig;
pub use db::{
    insert_battles, insert_roster, load_battles, load_roster, setup_database,
    verify_battle_count, verify_roster_count,
};
pub use error::{ConfigError, LedgerError};
pub use ledger::{BattleRecord, EntityId, Ledger};
pub use roster::{Pokemon, Rarity, Roster};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the `tracing` subscriber used by both binaries
///
/// Filter comes from `RUST_LOG`, defaulting to `info`. Logs go to stderr so
/// CLI output on stdout stays machine-readable.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

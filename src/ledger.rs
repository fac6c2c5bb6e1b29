// ⚔️ Battle Ledger - Pairwise battle records keyed by Pokédex identifier
//
// The ledger is loaded once (CSV or SQLite) and then read-only for the
// session. Records are never rejected on shape: a row with a blank or
// unrelated winner still counts as a battle for both participants.

use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

// ============================================================================
// ENTITY IDENTIFIER
// ============================================================================

/// Canonical, comparable form of a Pokédex identifier
///
/// The combat log and the Pokédex do not agree on representation ("6",
/// " 6", "006", or a number 6), so every id is normalised on the way in:
/// - surrounding whitespace is trimmed
/// - all-digit ids lose their leading zeros ("006" → "6", "0" stays "0")
/// - empty, "undefined", "null" and "NaN" are not identifiers
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Normalise any displayable value (string or number) into an id
    pub fn parse(raw: impl fmt::Display) -> Option<EntityId> {
        let raw = raw.to_string();
        let trimmed = raw.trim();

        if trimmed.is_empty() || matches!(trimmed, "undefined" | "null" | "NaN") {
            return None;
        }

        if trimmed.bytes().all(|b| b.is_ascii_digit()) {
            let stripped = trimmed.trim_start_matches('0');
            let canonical = if stripped.is_empty() { "0" } else { stripped };
            return Some(EntityId(canonical.to_string()));
        }

        Some(EntityId(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// BATTLE RECORD
// ============================================================================

/// One logged contest between two participants
///
/// Blank fields are `None`. `winner` is expected to equal `first` or
/// `second`, but anything else is kept as-is and simply never matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleRecord {
    pub first: Option<EntityId>,
    pub second: Option<EntityId>,
    pub winner: Option<EntityId>,
}

impl BattleRecord {
    pub fn new(first: impl fmt::Display, second: impl fmt::Display, winner: impl fmt::Display) -> Self {
        BattleRecord {
            first: EntityId::parse(first),
            second: EntityId::parse(second),
            winner: EntityId::parse(winner),
        }
    }

    /// Does `id` appear on either side?
    pub fn involves(&self, id: &EntityId) -> bool {
        self.first.as_ref() == Some(id) || self.second.as_ref() == Some(id)
    }

    pub fn won_by(&self, id: &EntityId) -> bool {
        self.winner.as_ref() == Some(id)
    }

    /// The participant facing `id`
    ///
    /// Mirrors the combat log convention: if `id` is the first participant
    /// the opponent is the second, otherwise the first. A self-battle
    /// therefore yields `id` itself.
    pub fn opponent_of(&self, id: &EntityId) -> Option<&EntityId> {
        if self.first.as_ref() == Some(id) {
            self.second.as_ref()
        } else {
            self.first.as_ref()
        }
    }

    pub fn is_self_battle(&self) -> bool {
        self.first.is_some() && self.first == self.second
    }

    /// Winner present and equal to one of the participants
    pub fn has_attributable_winner(&self) -> bool {
        match &self.winner {
            Some(w) => self.first.as_ref() == Some(w) || self.second.as_ref() == Some(w),
            None => false,
        }
    }
}

/// Column positions of a CSV header row, looked up by name
///
/// A column absent from the header reads as blank in every row, and so does
/// a field missing from a short row.
pub(crate) struct CsvColumns {
    positions: Vec<Option<usize>>,
}

impl CsvColumns {
    pub(crate) fn locate(headers: &csv::StringRecord, names: &[&str]) -> Self {
        let positions = names
            .iter()
            .map(|name| headers.iter().position(|h| h.trim() == *name))
            .collect();
        CsvColumns { positions }
    }

    /// Field for the `column`-th requested name, "" when absent
    pub(crate) fn field<'r>(&self, record: &'r csv::StringRecord, column: usize) -> &'r str {
        self.positions
            .get(column)
            .copied()
            .flatten()
            .and_then(|pos| record.get(pos))
            .unwrap_or("")
    }
}

const COMBAT_COLUMNS: [&str; 3] = ["First_pokemon", "Second_pokemon", "Winner"];

// ============================================================================
// LEDGER
// ============================================================================

/// Read-only sequence of battle records plus load provenance
#[derive(Debug, Clone, Serialize)]
pub struct Ledger {
    records: Vec<BattleRecord>,
    origin: String,
    loaded_at: DateTime<Utc>,
}

impl Ledger {
    /// Store an already-parsed sequence of records. Never fails.
    pub fn load(records: Vec<BattleRecord>) -> Self {
        Self::with_origin(records, "memory")
    }

    pub fn with_origin(records: Vec<BattleRecord>, origin: impl Into<String>) -> Self {
        let origin = origin.into();
        info!(battles = records.len(), %origin, "battle ledger loaded");
        Ledger {
            records,
            origin,
            loaded_at: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Ledger {
            records: Vec::new(),
            origin: "empty".to_string(),
            loaded_at: Utc::now(),
        }
    }

    /// Load combats.csv (`First_pokemon,Second_pokemon,Winner`)
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let origin = path.display().to_string();
        let file = std::fs::File::open(path).map_err(|e| LedgerError::unavailable(&origin, e))?;
        Self::from_reader(file, origin)
    }

    /// Parse combat CSV from any reader
    ///
    /// Short rows and blank fields are kept as records with `None` sides.
    /// Only a failing reader (I/O) or header is fatal; a row that is not
    /// valid UTF-8 is skipped with a warning.
    pub fn from_reader<R: Read>(reader: R, origin: impl Into<String>) -> Result<Self> {
        let origin = origin.into();
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = rdr
            .headers()
            .map_err(|e| LedgerError::unavailable(&origin, e))?;
        let columns = CsvColumns::locate(headers, &COMBAT_COLUMNS);

        let mut records = Vec::new();
        let mut skipped = 0usize;

        for (line_num, result) in rdr.records().enumerate() {
            match result {
                Ok(row) => records.push(BattleRecord::new(
                    columns.field(&row, 0),
                    columns.field(&row, 1),
                    columns.field(&row, 2),
                )),
                Err(e) if e.is_io_error() => {
                    return Err(LedgerError::unavailable(&origin, e));
                }
                Err(e) => {
                    skipped += 1;
                    // +2: 1-indexed plus the header row
                    warn!(line = line_num + 2, error = %e, %origin, "skipping unreadable combat row");
                }
            }
        }

        if skipped > 0 {
            warn!(skipped, %origin, "combat rows skipped during load");
        }

        Ok(Self::with_origin(records, origin))
    }

    /// Load the battles table written by `battle-ledger import`
    pub fn from_database(conn: &rusqlite::Connection) -> Result<Self> {
        let records = crate::db::load_battles(conn)
            .map_err(|e| LedgerError::unavailable("sqlite:battles", e))?;
        Ok(Self::with_origin(records, "sqlite:battles"))
    }

    pub fn records(&self) -> &[BattleRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &BattleRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================

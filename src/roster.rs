// 📖 Roster - Pokédex entries joined against the battle ledger by id
//
// Identity is the Pokédex number only. Several entries may share one number
// (alternate forms); lookups return the first, joins return all of them.

use crate::error::{LedgerError, Result};
use crate::ledger::{CsvColumns, EntityId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

// ============================================================================
// RARITY
// ============================================================================

/// Rarity tier, resolved once from the pokedex flag columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rarity {
    Mythical,
    Legendary,
    SubLegendary,
    Normal,
}

impl Rarity {
    /// Precedence: mythical > legendary > sub-legendary > normal
    pub fn from_flags(is_sub_legendary: &str, is_legendary: &str, is_mythical: &str) -> Self {
        if is_truthy(is_mythical) {
            Rarity::Mythical
        } else if is_truthy(is_legendary) {
            Rarity::Legendary
        } else if is_truthy(is_sub_legendary) {
            Rarity::SubLegendary
        } else {
            Rarity::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rarity::Mythical => "Mythical",
            Rarity::Legendary => "Legendary",
            Rarity::SubLegendary => "Sub-Legendary",
            Rarity::Normal => "Normal",
        }
    }

    /// Higher is rarer
    pub fn rank(&self) -> u8 {
        match self {
            Rarity::Mythical => 3,
            Rarity::Legendary => 2,
            Rarity::SubLegendary => 1,
            Rarity::Normal => 0,
        }
    }

    /// Accepts the display names plus the short filter names
    /// ("mythical", "legendary", "sub", "normal")
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mythical" => Some(Rarity::Mythical),
            "legendary" => Some(Rarity::Legendary),
            "sub" | "sub-legendary" | "sub_legendary" | "sublegendary" => Some(Rarity::SubLegendary),
            "normal" => Some(Rarity::Normal),
            _ => None,
        }
    }
}

fn is_truthy(flag: &str) -> bool {
    matches!(flag.trim(), "True" | "true" | "1")
}

// ============================================================================
// POKEMON ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pokemon {
    pub id: EntityId,
    pub name: String,
    pub generation: Option<u8>,
    pub primary_type: String,
    /// `None` when the pokedex column is blank
    pub secondary_type: Option<String>,
    pub rarity: Rarity,
}

impl Pokemon {
    pub fn new(id: EntityId, name: impl Into<String>, primary_type: impl Into<String>) -> Self {
        Pokemon {
            id,
            name: name.into(),
            generation: None,
            primary_type: primary_type.into().trim().to_string(),
            secondary_type: None,
            rarity: Rarity::Normal,
        }
    }

    /// Builder pattern: add secondary type (blank is ignored)
    pub fn with_secondary_type(mut self, secondary_type: impl Into<String>) -> Self {
        self.secondary_type = non_blank(secondary_type.into());
        self
    }

    /// Builder pattern: set generation
    pub fn with_generation(mut self, generation: u8) -> Self {
        self.generation = Some(generation);
        self
    }

    /// Builder pattern: set rarity
    pub fn with_rarity(mut self, rarity: Rarity) -> Self {
        self.rarity = rarity;
        self
    }

    /// Non-blank types, primary first
    pub fn types(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary_type.as_str())
            .chain(self.secondary_type.as_deref())
            .filter(|t| !t.trim().is_empty())
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

const POKEDEX_COLUMNS: [&str; 8] = [
    "pokedex_number",
    "name",
    "generation",
    "type_1",
    "type_2",
    "is_sub_legendary",
    "is_legendary",
    "is_mythical",
];

/// Build a roster entry from one pokedex row; `None` without a usable id
fn pokemon_from_row(columns: &CsvColumns, row: &csv::StringRecord) -> Option<Pokemon> {
    let field = |column| columns.field(row, column);

    let id = EntityId::parse(field(0))?;
    let rarity = Rarity::from_flags(field(5), field(6), field(7));

    let mut pokemon = Pokemon::new(id, field(1).trim(), field(3))
        .with_secondary_type(field(4))
        .with_rarity(rarity);
    pokemon.generation = field(2).trim().parse().ok();
    Some(pokemon)
}

// ============================================================================
// ROSTER
// ============================================================================

/// Immutable roster with an id index
#[derive(Debug, Clone, Default)]
pub struct Roster {
    pokemon: Vec<Pokemon>,
    /// id → positions in `pokemon`, in roster order
    index: HashMap<EntityId, Vec<usize>>,
}

impl Roster {
    pub fn load(pokemon: Vec<Pokemon>) -> Self {
        let mut index: HashMap<EntityId, Vec<usize>> = HashMap::new();
        for (pos, p) in pokemon.iter().enumerate() {
            index.entry(p.id.clone()).or_default().push(pos);
        }
        Roster { pokemon, index }
    }

    /// Load pokedex.csv
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let origin = path.display().to_string();
        let file = std::fs::File::open(path).map_err(|e| LedgerError::unavailable(&origin, e))?;
        Self::from_reader(file, origin)
    }

    /// Parse pokedex CSV from any reader
    ///
    /// Columns are found by header name, extra columns are ignored and
    /// missing trailing fields read as blank. Rows without a usable
    /// `pokedex_number` are skipped with a warning.
    pub fn from_reader<R: Read>(reader: R, origin: impl Into<String>) -> Result<Self> {
        let origin = origin.into();
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = rdr
            .headers()
            .map_err(|e| LedgerError::unavailable(&origin, e))?;
        let columns = CsvColumns::locate(headers, &POKEDEX_COLUMNS);

        let mut pokemon = Vec::new();

        for (line_num, result) in rdr.records().enumerate() {
            let row = match result {
                Ok(row) => row,
                Err(e) if e.is_io_error() => return Err(LedgerError::unavailable(&origin, e)),
                Err(e) => {
                    warn!(line = line_num + 2, error = %e, %origin, "skipping unreadable pokedex row");
                    continue;
                }
            };

            match pokemon_from_row(&columns, &row) {
                Some(p) => pokemon.push(p),
                None => warn!(line = line_num + 2, %origin, "pokedex row has no pokedex_number"),
            }
        }

        info!(pokemon = pokemon.len(), %origin, "roster loaded");
        Ok(Self::load(pokemon))
    }

    /// Load the pokemon table written by `battle-ledger import`
    pub fn from_database(conn: &rusqlite::Connection) -> Result<Self> {
        let pokemon = crate::db::load_roster(conn)
            .map_err(|e| LedgerError::unavailable("sqlite:pokemon", e))?;
        info!(pokemon = pokemon.len(), "roster loaded from database");
        Ok(Self::load(pokemon))
    }

    /// First roster entry with this id
    pub fn get(&self, id: &EntityId) -> Option<&Pokemon> {
        self.index
            .get(id)
            .and_then(|positions| positions.first())
            .map(|&pos| &self.pokemon[pos])
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pokemon> {
        self.pokemon.iter()
    }

    pub fn pokemon(&self) -> &[Pokemon] {
        &self.pokemon
    }

    pub fn len(&self) -> usize {
        self.pokemon.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pokemon.is_empty()
    }

    pub fn filter_by_rarity(&self, rarity: Rarity) -> Vec<&Pokemon> {
        self.pokemon.iter().filter(|p| p.rarity == rarity).collect()
    }

    /// Entries whose id is in `ids`, in roster order
    pub fn filter_by_ids(&self, ids: &HashSet<EntityId>) -> Vec<&Pokemon> {
        self.pokemon.iter().filter(|p| ids.contains(&p.id)).collect()
    }

    /// Rarest first, then by generation ascending (unknown generation = 0)
    pub fn sorted_by_rarity(&self) -> Vec<&Pokemon> {
        self.listing(None)
    }

    /// Roster as listed by the CLI and API: restricted to one rarity tier
    /// when given, rarest first, then by generation
    pub fn listing(&self, rarity: Option<Rarity>) -> Vec<&Pokemon> {
        let mut listed = match rarity {
            Some(r) => self.filter_by_rarity(r),
            None => self.pokemon.iter().collect(),
        };
        listed.sort_by(|a, b| {
            b.rarity
                .rank()
                .cmp(&a.rarity.rank())
                .then_with(|| a.generation.unwrap_or(0).cmp(&b.generation.unwrap_or(0)))
        });
        listed
    }
}

// ============================================================================
// TESTS
// ============================================================================

// 🗄️ Storage - Roster and battle ledger persisted to SQLite (WAL)
//
// `battle-ledger import` loads the CSVs once and writes them here; later
// sessions reload from the database instead of re-parsing.

use crate::ledger::{BattleRecord, EntityId};
use crate::roster::{Pokemon, Rarity};
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::info;

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Pokemon Table (roster)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS pokemon (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            pokedex_number TEXT NOT NULL,
            name TEXT NOT NULL,
            generation INTEGER,
            type_1 TEXT NOT NULL,
            type_2 TEXT,
            rarity TEXT NOT NULL,
            imported_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Battles Table (ledger) - repeated matchups are legitimate, no UNIQUE
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS battles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            first_pokemon TEXT,
            second_pokemon TEXT,
            winner TEXT,
            imported_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_pokemon_number ON pokemon(pokedex_number)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_battles_winner ON battles(winner)",
        [],
    )?;

    Ok(())
}

/// Replace the stored roster; returns rows written
pub fn insert_roster(conn: &mut Connection, roster: &[Pokemon]) -> Result<usize> {
    let imported_at = Utc::now().to_rfc3339();
    let tx = conn.transaction()?;

    tx.execute("DELETE FROM pokemon", [])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO pokemon (pokedex_number, name, generation, type_1, type_2, rarity, imported_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;

        for p in roster {
            stmt.execute(params![
                p.id.as_str(),
                p.name,
                p.generation,
                p.primary_type,
                p.secondary_type,
                rarity_code(p.rarity),
                imported_at,
            ])?;
        }
    }
    tx.commit()?;

    info!(rows = roster.len(), "roster stored");
    Ok(roster.len())
}

/// Replace the stored ledger; returns rows written
pub fn insert_battles(conn: &mut Connection, records: &[BattleRecord]) -> Result<usize> {
    let imported_at = Utc::now().to_rfc3339();
    let tx = conn.transaction()?;

    tx.execute("DELETE FROM battles", [])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO battles (first_pokemon, second_pokemon, winner, imported_at)
             VALUES (?1, ?2, ?3, ?4)",
        )?;

        for r in records {
            stmt.execute(params![
                r.first.as_ref().map(EntityId::as_str),
                r.second.as_ref().map(EntityId::as_str),
                r.winner.as_ref().map(EntityId::as_str),
                imported_at,
            ])?;
        }
    }
    tx.commit()?;

    info!(rows = records.len(), "battle ledger stored");
    Ok(records.len())
}

/// Stored ledger in insertion order
pub fn load_battles(conn: &Connection) -> Result<Vec<BattleRecord>> {
    let mut stmt = conn
        .prepare("SELECT first_pokemon, second_pokemon, winner FROM battles ORDER BY id")
        .context("Failed to query battles table")?;

    let records = stmt
        .query_map([], |row| {
            let first: Option<String> = row.get(0)?;
            let second: Option<String> = row.get(1)?;
            let winner: Option<String> = row.get(2)?;

            Ok(BattleRecord {
                first: first.and_then(EntityId::parse),
                second: second.and_then(EntityId::parse),
                winner: winner.and_then(EntityId::parse),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(records)
}

/// Stored roster in insertion order; rows with an unusable id are dropped
pub fn load_roster(conn: &Connection) -> Result<Vec<Pokemon>> {
    let mut stmt = conn
        .prepare(
            "SELECT pokedex_number, name, generation, type_1, type_2, rarity
             FROM pokemon
             ORDER BY id",
        )
        .context("Failed to query pokemon table")?;

    let rows = stmt
        .query_map([], |row| {
            let number: String = row.get(0)?;
            let name: String = row.get(1)?;
            let generation: Option<u8> = row.get(2)?;
            let type_1: String = row.get(3)?;
            let type_2: Option<String> = row.get(4)?;
            let rarity: String = row.get(5)?;

            Ok((number, name, generation, type_1, type_2, rarity))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let pokemon = rows
        .into_iter()
        .filter_map(|(number, name, generation, type_1, type_2, rarity)| {
            let id = EntityId::parse(number)?;
            let mut p = Pokemon::new(id, name, type_1)
                .with_secondary_type(type_2.unwrap_or_default())
                .with_rarity(Rarity::parse(&rarity).unwrap_or(Rarity::Normal));
            p.generation = generation;
            Some(p)
        })
        .collect();

    Ok(pokemon)
}

pub fn verify_battle_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM battles", [], |row| row.get(0))?;

    Ok(count)
}

pub fn verify_roster_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM pokemon", [], |row| row.get(0))?;

    Ok(count)
}

fn rarity_code(rarity: Rarity) -> &'static str {
    match rarity {
        Rarity::Mythical => "mythical",
        Rarity::Legendary => "legendary",
        Rarity::SubLegendary => "sub",
        Rarity::Normal => "normal",
    }
}

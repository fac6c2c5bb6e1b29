// 📊 Battle Analyzer - Win/loss derivation over the battle ledger
//
// Every query is a pure read of (id, roster, ledger). Bad ids and an empty
// ledger degrade to empty results and a log line, never an error.

use crate::config::AppConfig;
use crate::error::{LedgerError, Result};
use crate::ledger::{EntityId, Ledger};
use crate::roster::{Pokemon, Roster};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

// ============================================================================
// RESULT TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleStats {
    pub wins: usize,
    pub losses: usize,
    pub total: usize,
}

impl BattleStats {
    /// Percentage of battles won (0 when no battles)
    pub fn win_rate(&self) -> f64 {
        percentage(self.wins, self.total)
    }
}

/// Record against one opponent type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeWinRate {
    #[serde(rename = "type")]
    pub type_name: String,
    pub wins: usize,
    pub total: usize,
    /// 0..=100
    pub win_rate: f64,
}

/// Opponent summary for reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpponentRef {
    pub id: EntityId,
    pub name: String,
}

impl From<&Pokemon> for OpponentRef {
    fn from(p: &Pokemon) -> Self {
        OpponentRef {
            id: p.id.clone(),
            name: p.name.clone(),
        }
    }
}

/// Everything the detail panel shows for one Pokémon
#[derive(Debug, Clone, Serialize)]
pub struct PokemonReport {
    pub pokemon: Pokemon,
    pub stats: BattleStats,
    pub defeated_by: Vec<OpponentRef>,
    pub defeats: Vec<OpponentRef>,
    pub type_win_rates: Vec<TypeWinRate>,
    pub best_matchup: Option<TypeWinRate>,
}

impl PokemonReport {
    pub fn summary(&self) -> String {
        let best = self
            .best_matchup
            .as_ref()
            .map(|t| format!("{} ({:.1}%)", t.type_name, t.win_rate))
            .unwrap_or_else(|| "n/a".to_string());

        format!(
            "#{} {} [{}]: {} battles, {} wins, {} losses ({:.1}%), best against {}",
            self.pokemon.id,
            self.pokemon.name,
            self.pokemon.rarity.as_str(),
            self.stats.total,
            self.stats.wins,
            self.stats.losses,
            self.stats.win_rate(),
            best
        )
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

// ============================================================================
// BATTLE ANALYZER
// ============================================================================

/// Immutable query context: one roster, one ledger
///
/// Cheap to clone; both halves sit behind `Arc` so the HTTP server can share
/// a single instance across handlers without locking.
#[derive(Debug, Clone)]
pub struct BattleAnalyzer {
    roster: Arc<Roster>,
    ledger: Arc<Ledger>,
}

impl BattleAnalyzer {
    pub fn new(roster: Roster, ledger: Ledger) -> Self {
        BattleAnalyzer {
            roster: Arc::new(roster),
            ledger: Arc::new(ledger),
        }
    }

    /// Load roster and ledger for a session
    ///
    /// Reads the imported SQLite database when it exists, otherwise the CSVs.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let (roster, ledger) = if config.has_database() {
            let origin = config.database.display().to_string();
            let conn = rusqlite::Connection::open(&config.database)
                .map_err(|e| LedgerError::unavailable(&origin, e))?;
            (Roster::from_database(&conn)?, Ledger::from_database(&conn)?)
        } else {
            (
                Roster::from_csv_path(&config.roster_csv)?,
                Ledger::from_csv_path(&config.battles_csv)?,
            )
        };

        info!(pokemon = roster.len(), battles = ledger.len(), origin = ledger.origin(), "analyzer ready");
        Ok(Self::new(roster, ledger))
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn is_loaded(&self) -> bool {
        !self.ledger.is_empty()
    }

    /// Normalise a query id, logging the invalid case
    fn query_id(&self, raw: impl fmt::Display, query: &str) -> Option<EntityId> {
        let raw = raw.to_string();
        let Some(id) = EntityId::parse(&raw) else {
            warn!(query, raw = %raw, "invalid pokemon id, returning empty result");
            return None;
        };

        if self.ledger.is_empty() {
            debug!(query, %id, "battle ledger is empty");
            return None;
        }

        Some(id)
    }

    /// Ids of every opponent that beat `id`
    pub fn opponents_that_defeated(&self, id: impl fmt::Display) -> HashSet<EntityId> {
        let Some(id) = self.query_id(id, "opponents_that_defeated") else {
            return HashSet::new();
        };

        self.ledger
            .iter()
            .filter(|r| r.involves(&id) && !r.won_by(&id))
            .filter_map(|r| r.winner.clone())
            .collect()
    }

    /// Ids of every opponent `id` beat
    pub fn opponents_defeated_by(&self, id: impl fmt::Display) -> HashSet<EntityId> {
        let Some(id) = self.query_id(id, "opponents_defeated_by") else {
            return HashSet::new();
        };

        self.ledger
            .iter()
            .filter(|r| r.won_by(&id))
            .filter_map(|r| {
                let other = if r.first.as_ref() == Some(&id) {
                    r.second.as_ref()
                } else if r.second.as_ref() == Some(&id) {
                    r.first.as_ref()
                } else {
                    None
                };
                // Self-battles have no opponent
                other.filter(|o| **o != id).cloned()
            })
            .collect()
    }

    /// Roster entries that beat `id`, in roster order
    pub fn pokemon_that_defeated(&self, id: impl fmt::Display) -> Vec<&Pokemon> {
        let ids = self.opponents_that_defeated(id);
        self.roster.filter_by_ids(&ids)
    }

    /// Roster entries `id` beat, in roster order
    pub fn pokemon_defeated_by(&self, id: impl fmt::Display) -> Vec<&Pokemon> {
        let ids = self.opponents_defeated_by(id);
        self.roster.filter_by_ids(&ids)
    }

    /// Wins, losses and total battles
    ///
    /// `losses` is `total - wins`: a record whose winner matches neither
    /// participant counts as a loss for both.
    pub fn battle_stats(&self, id: impl fmt::Display) -> BattleStats {
        let Some(id) = self.query_id(id, "battle_stats") else {
            return BattleStats::default();
        };

        let (total, wins) = self
            .ledger
            .iter()
            .filter(|r| r.involves(&id))
            .fold((0, 0), |(total, wins), r| {
                (total + 1, if r.won_by(&id) { wins + 1 } else { wins })
            });

        BattleStats {
            wins,
            losses: total - wins,
            total,
        }
    }

    /// Win rate against each opponent type, best first
    ///
    /// A dual-type opponent counts once for each of its types. Ties keep the
    /// order in which types were first met (primary before secondary).
    pub fn win_rate_by_opponent_type(&self, id: impl fmt::Display) -> Vec<TypeWinRate> {
        let Some(id) = self.query_id(id, "win_rate_by_opponent_type") else {
            return Vec::new();
        };

        // (type, wins, total) in first-encounter order
        let mut tallies: Vec<(String, usize, usize)> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for record in self.ledger.iter().filter(|r| r.involves(&id)) {
            let Some(opponent) = record.opponent_of(&id).and_then(|o| self.roster.get(o)) else {
                continue;
            };
            let won = record.won_by(&id);

            for type_name in opponent.types() {
                let pos = *positions.entry(type_name.to_string()).or_insert_with(|| {
                    tallies.push((type_name.to_string(), 0, 0));
                    tallies.len() - 1
                });
                let tally = &mut tallies[pos];
                tally.2 += 1;
                if won {
                    tally.1 += 1;
                }
            }
        }

        let mut rates: Vec<TypeWinRate> = tallies
            .into_iter()
            .map(|(type_name, wins, total)| TypeWinRate {
                type_name,
                wins,
                total,
                win_rate: percentage(wins, total),
            })
            .collect();

        // sort_by is stable
        rates.sort_by(|a, b| b.win_rate.total_cmp(&a.win_rate));
        rates
    }

    /// The opponent type `id` fares best against
    pub fn best_matchup(&self, id: impl fmt::Display) -> Option<TypeWinRate> {
        self.win_rate_by_opponent_type(id).into_iter().next()
    }

    /// Full detail for one roster entry; `None` if `id` is not in the roster
    pub fn report(&self, id: impl fmt::Display) -> Option<PokemonReport> {
        let id = EntityId::parse(id)?;
        let pokemon = self.roster.get(&id)?.clone();

        let type_win_rates = self.win_rate_by_opponent_type(&id);
        let best_matchup = type_win_rates.first().cloned();

        Some(PokemonReport {
            stats: self.battle_stats(&id),
            defeated_by: self.pokemon_that_defeated(&id).into_iter().map(OpponentRef::from).collect(),
            defeats: self.pokemon_defeated_by(&id).into_iter().map(OpponentRef::from).collect(),
            type_win_rates,
            best_matchup,
            pokemon,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::BattleRecord;

    fn id(raw: &str) -> EntityId {
        EntityId::parse(raw).unwrap()
    }

    fn ids(raw: &[&str]) -> HashSet<EntityId> {
        raw.iter().map(|r| id(r)).collect()
    }

    fn create_test_pokemon(raw_id: &str, name: &str, primary: &str, secondary: &str) -> Pokemon {
        Pokemon::new(id(raw_id), name, primary).with_secondary_type(secondary)
    }

    /// A(X), B(Y), C(X/Z); A beats B, C beats A
    fn scenario() -> BattleAnalyzer {
        let roster = Roster::load(vec![
            create_test_pokemon("1", "A", "X", ""),
            create_test_pokemon("2", "B", "Y", ""),
            create_test_pokemon("3", "C", "X", "Z"),
        ]);
        let ledger = Ledger::load(vec![BattleRecord::new(1, 2, 1), BattleRecord::new(1, 3, 3)]);
        BattleAnalyzer::new(roster, ledger)
    }

    /// Larger fixture with repeats, unknown ids and malformed winners
    fn arena() -> BattleAnalyzer {
        let roster = Roster::load(vec![
            create_test_pokemon("1", "Bulbasaur", "Grass", "Poison"),
            create_test_pokemon("4", "Charmander", "Fire", ""),
            create_test_pokemon("7", "Squirtle", "Water", ""),
            create_test_pokemon("25", "Pikachu", "Electric", ""),
            create_test_pokemon("25", "Pikachu Cosplay", "Electric", "Fairy"),
        ]);
        let ledger = Ledger::load(vec![
            BattleRecord::new(1, 4, 4),
            BattleRecord::new(4, 1, 4),
            BattleRecord::new(7, 4, 7),
            BattleRecord::new(25, 7, 25),
            BattleRecord::new(1, 25, 1),
            BattleRecord::new(25, 900, 900),
            BattleRecord::new(4, 25, 88),
            BattleRecord::new(7, 7, 7),
            BattleRecord::new(1, 7, ""),
        ]);
        BattleAnalyzer::new(roster, ledger)
    }

    #[test]
    fn test_scenario_stats() {
        let analyzer = scenario();

        assert_eq!(
            analyzer.battle_stats("1"),
            BattleStats { wins: 1, losses: 1, total: 2 }
        );
    }

    #[test]
    fn test_scenario_opponent_sets() {
        let analyzer = scenario();

        assert_eq!(analyzer.opponents_that_defeated("1"), ids(&["3"]));
        assert_eq!(analyzer.opponents_defeated_by("1"), ids(&["2"]));
    }

    #[test]
    fn test_scenario_type_win_rates() {
        let analyzer = scenario();
        let rates = analyzer.win_rate_by_opponent_type("1");

        let summary: Vec<(&str, usize, usize)> = rates
            .iter()
            .map(|r| (r.type_name.as_str(), r.wins, r.total))
            .collect();
        assert_eq!(summary, vec![("Y", 1, 1), ("X", 0, 1), ("Z", 0, 1)]);
        assert_eq!(rates[0].win_rate, 100.0);
        assert_eq!(rates[1].win_rate, 0.0);
    }

    #[test]
    fn test_numeric_and_string_ids_agree() {
        let analyzer = scenario();

        assert_eq!(analyzer.battle_stats(1), analyzer.battle_stats("1"));
        assert_eq!(analyzer.battle_stats(1u32), analyzer.battle_stats(" 001 "));
        assert_eq!(analyzer.opponents_that_defeated(1), analyzer.opponents_that_defeated("1"));
    }

    #[test]
    fn test_invalid_id_degrades_to_empty() {
        let analyzer = scenario();

        assert_eq!(analyzer.battle_stats(""), BattleStats::default());
        assert!(analyzer.opponents_that_defeated("undefined").is_empty());
        assert!(analyzer.opponents_defeated_by("  ").is_empty());
        assert!(analyzer.pokemon_that_defeated("").is_empty());
        assert!(analyzer.win_rate_by_opponent_type("").is_empty());
        assert!(analyzer.best_matchup("").is_none());
    }

    #[test]
    fn test_empty_ledger_returns_zero_forms() {
        let analyzer = BattleAnalyzer::new(
            Roster::load(vec![create_test_pokemon("1", "A", "X", "")]),
            Ledger::empty(),
        );

        assert!(!analyzer.is_loaded());
        assert_eq!(analyzer.battle_stats(1), BattleStats::default());
        assert!(analyzer.opponents_that_defeated(1).is_empty());
        assert!(analyzer.opponents_defeated_by(1).is_empty());
        assert!(analyzer.pokemon_defeated_by(1).is_empty());
        assert!(analyzer.win_rate_by_opponent_type(1).is_empty());

        let report = analyzer.report(1).unwrap();
        assert_eq!(report.stats.total, 0);
        assert!(report.best_matchup.is_none());
    }

    #[test]
    fn test_unknown_id_has_no_battles() {
        let analyzer = arena();

        assert_eq!(analyzer.battle_stats(12345), BattleStats::default());
        assert!(analyzer.opponents_that_defeated(12345).is_empty());
        assert!(analyzer.report(12345).is_none());
    }

    #[test]
    fn test_malformed_winner_counts_as_loss_for_both() {
        let analyzer = arena();

        // (4, 25, winner 88): a loss for 4 and for 25, and 88 "defeated" both
        let charmander = analyzer.battle_stats(4);
        assert_eq!(charmander, BattleStats { wins: 2, losses: 2, total: 4 });
        assert!(analyzer.opponents_that_defeated(4).contains(&id("88")));
        assert!(!analyzer.opponents_defeated_by(88).contains(&id("4")));
    }

    #[test]
    fn test_blank_winner_contributes_no_opponent() {
        let analyzer = arena();

        // (1, 7, blank) is a loss for both but names nobody
        assert_eq!(analyzer.battle_stats(1), BattleStats { wins: 1, losses: 3, total: 4 });
        assert_eq!(analyzer.opponents_that_defeated(1), ids(&["4"]));
    }

    #[test]
    fn test_self_battle_has_no_opponent() {
        let analyzer = arena();

        let defeats = analyzer.opponents_defeated_by(7);
        assert_eq!(defeats, ids(&["4"]));
        assert!(!analyzer.opponents_that_defeated(7).contains(&id("7")));
    }

    #[test]
    fn test_opponent_sets_never_contain_self() {
        let analyzer = arena();

        for pokemon in analyzer.roster().iter() {
            assert!(!analyzer.opponents_that_defeated(&pokemon.id).contains(&pokemon.id));
            assert!(!analyzer.opponents_defeated_by(&pokemon.id).contains(&pokemon.id));
        }
    }

    #[test]
    fn test_wins_plus_losses_equals_total() {
        let analyzer = arena();

        for raw in ["1", "4", "7", "25", "900", "88"] {
            let stats = analyzer.battle_stats(raw);
            assert_eq!(stats.wins + stats.losses, stats.total, "id {}", raw);
        }
    }

    #[test]
    fn test_queries_are_idempotent() {
        let analyzer = arena();

        assert_eq!(analyzer.battle_stats(25), analyzer.battle_stats(25));
        assert_eq!(analyzer.opponents_that_defeated(25), analyzer.opponents_that_defeated(25));
        assert_eq!(analyzer.win_rate_by_opponent_type(25), analyzer.win_rate_by_opponent_type(25));
    }

    #[test]
    fn test_pokemon_join_drops_unknown_ids() {
        let analyzer = arena();

        // 900 and 88 beat Pikachu but are not in the roster
        let raw_ids = analyzer.opponents_that_defeated(25);
        assert_eq!(raw_ids, ids(&["1", "88", "900"]));

        let joined = analyzer.pokemon_that_defeated(25);
        let joined_ids: HashSet<EntityId> = joined.iter().map(|p| p.id.clone()).collect();
        let expected: HashSet<EntityId> = raw_ids
            .into_iter()
            .filter(|i| analyzer.roster().contains(i))
            .collect();
        assert_eq!(joined_ids, expected);
    }

    #[test]
    fn test_pokemon_join_returns_every_form() {
        let analyzer = arena();

        let names: Vec<_> = analyzer.pokemon_defeated_by(1).iter().map(|p| p.name.clone()).collect();
        assert_eq!(names, vec!["Pikachu", "Pikachu Cosplay"]);
    }

    #[test]
    fn test_type_totals_cover_battle_total() {
        let analyzer = arena();

        for raw in ["1", "4", "7", "25"] {
            let type_total: usize = analyzer.win_rate_by_opponent_type(raw).iter().map(|r| r.total).sum();
            assert!(type_total >= analyzer.battle_stats(raw).total - unresolved_opponents(&analyzer, raw));
        }

        // Bulbasaur is dual-typed: one tally more than Squirtle's four battles
        let squirtle_types: usize = analyzer.win_rate_by_opponent_type(7).iter().map(|r| r.total).sum();
        assert_eq!(squirtle_types, 4 + 1);
    }

    fn unresolved_opponents(analyzer: &BattleAnalyzer, raw: &str) -> usize {
        let me = id(raw);
        analyzer
            .ledger()
            .iter()
            .filter(|r| r.involves(&me))
            .filter(|r| r.opponent_of(&me).map_or(true, |o| !analyzer.roster().contains(o)))
            .count()
    }

    #[test]
    fn test_dual_type_opponent_counts_twice() {
        let analyzer = arena();

        // Charmander vs Bulbasaur twice, won both: Grass 2/2 and Poison 2/2
        let rates = analyzer.win_rate_by_opponent_type(4);
        let grass = rates.iter().find(|r| r.type_name == "Grass").unwrap();
        let poison = rates.iter().find(|r| r.type_name == "Poison").unwrap();
        assert_eq!((grass.wins, grass.total), (2, 2));
        assert_eq!((poison.wins, poison.total), (2, 2));
        assert_eq!(rates[0].type_name, "Grass");
        assert_eq!(rates[1].type_name, "Poison");
    }

    #[test]
    fn test_type_rates_use_first_roster_form() {
        let analyzer = arena();

        // Pikachu (first form) is pure Electric, so no Fairy tally appears
        let rates = analyzer.win_rate_by_opponent_type(1);
        assert!(rates.iter().all(|r| r.type_name != "Fairy"));
        let electric = rates.iter().find(|r| r.type_name == "Electric").unwrap();
        assert_eq!((electric.wins, electric.total), (1, 1));
    }

    #[test]
    fn test_best_matchup_and_report() {
        let analyzer = scenario();

        let best = analyzer.best_matchup("1").unwrap();
        assert_eq!(best.type_name, "Y");

        let report = analyzer.report(1).unwrap();
        assert_eq!(report.pokemon.name, "A");
        assert_eq!(report.defeated_by, vec![OpponentRef { id: id("3"), name: "C".to_string() }]);
        assert_eq!(report.defeats, vec![OpponentRef { id: id("2"), name: "B".to_string() }]);
        assert_eq!(report.best_matchup, Some(best));
        assert!(report.summary().contains("best against Y (100.0%)"));
    }

    #[test]
    fn test_stats_win_rate() {
        assert_eq!(BattleStats { wins: 1, losses: 3, total: 4 }.win_rate(), 25.0);
        assert_eq!(BattleStats::default().win_rate(), 0.0);
    }

    #[test]
    fn test_type_win_rate_serializes_type_key() {
        let rate = TypeWinRate {
            type_name: "Fire".to_string(),
            wins: 1,
            total: 2,
            win_rate: 50.0,
        };
        let json = serde_json::to_value(&rate).unwrap();
        assert_eq!(json["type"], "Fire");
        assert_eq!(json["win_rate"], 50.0);
    }

    #[test]
    fn test_from_config_reads_csvs_when_no_database() {
        let dir = std::env::temp_dir().join(format!("battle-ledger-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let roster_csv = dir.join("pokedex.csv");
        let battles_csv = dir.join("combats.csv");
        std::fs::write(
            &roster_csv,
            "pokedex_number,name,generation,type_1,type_2,is_sub_legendary,is_legendary,is_mythical\n\
             1,Bulbasaur,1,Grass,Poison,False,False,False\n\
             4,Charmander,1,Fire,,False,False,False\n",
        )
        .unwrap();
        std::fs::write(&battles_csv, "First_pokemon,Second_pokemon,Winner\n1,4,4\n").unwrap();

        let config = AppConfig {
            roster_csv,
            battles_csv,
            database: dir.join("absent.db"),
            server_addr: "127.0.0.1:0".parse().unwrap(),
        };
        let analyzer = BattleAnalyzer::from_config(&config).unwrap();

        assert_eq!(analyzer.roster().len(), 2);
        assert_eq!(analyzer.battle_stats(4), BattleStats { wins: 1, losses: 0, total: 1 });

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_from_config_missing_sources_is_data_unavailable() {
        let dir = std::env::temp_dir().join("battle-ledger-missing-sources");
        let config = AppConfig {
            roster_csv: dir.join("pokedex.csv"),
            battles_csv: dir.join("combats.csv"),
            database: dir.join("battles.db"),
            server_addr: "127.0.0.1:0".parse().unwrap(),
        };

        let err = BattleAnalyzer::from_config(&config).unwrap_err();
        assert!(err.is_data_unavailable());
    }
}

use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use std::env;

// Use library instead of local modules
use battle_ledger::{
    init_logging, insert_battles, insert_roster, setup_database, verify_battle_count,
    verify_roster_count, AppConfig, BattleAnalyzer, Ledger, LedgerAuditor, Rarity, Roster,
};

const USAGE: &str = "\
usage: battle-ledger <command>

  import             load pokedex + combats CSVs into the SQLite database
  stats <id>         wins / losses / total for one pokemon
  report <id>        full detail report (JSON)
  types <id>         win rate by opponent type, best first (JSON)
  audit              count malformed or unattributed battle records
  roster [rarity]    list pokemon, rarest first (mythical|legendary|sub|normal)";

fn main() -> Result<()> {
    init_logging();

    let args: Vec<String> = env::args().collect();
    let config = AppConfig::from_env()?;

    match args.get(1).map(String::as_str) {
        Some("import") => run_import(&config)?,
        Some("stats") => run_stats(&config, required_id(&args)?)?,
        Some("report") => run_report(&config, required_id(&args)?)?,
        Some("types") => run_types(&config, required_id(&args)?)?,
        Some("audit") => run_audit(&config)?,
        Some("roster") => run_roster(&config, args.get(2).map(String::as_str))?,
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }

    Ok(())
}

fn required_id(args: &[String]) -> Result<&str> {
    match args.get(2) {
        Some(id) => Ok(id.as_str()),
        None => bail!("missing <id>\n\n{}", USAGE),
    }
}

fn load_analyzer(config: &AppConfig) -> Result<BattleAnalyzer> {
    BattleAnalyzer::from_config(config).context("Failed to load battle data")
}

fn run_import(config: &AppConfig) -> Result<()> {
    println!("🗄️  Battle Ledger import - CSV → SQLite + WAL");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Load CSVs
    println!("\n📂 Loading CSVs...");
    let roster = Roster::from_csv_path(&config.roster_csv)?;
    let ledger = Ledger::from_csv_path(&config.battles_csv)?;
    println!("✓ Loaded {} pokemon, {} battles", roster.len(), ledger.len());

    // 2. Setup database
    println!("\n🔧 Setting up database...");
    if let Some(parent) = config.database.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let mut conn = Connection::open(&config.database)
        .with_context(|| format!("Failed to open {}", config.database.display()))?;
    setup_database(&conn)?;
    println!("✓ Database initialized with WAL mode");

    // 3. Insert
    println!("\n💾 Writing roster and ledger...");
    insert_roster(&mut conn, roster.pokemon())?;
    insert_battles(&mut conn, ledger.records())?;

    // 4. Verify counts
    println!("\n🔍 Verifying database...");
    let battles = verify_battle_count(&conn)?;
    let pokemon = verify_roster_count(&conn)?;
    println!("✓ Database contains {} pokemon, {} battles", pokemon, battles);

    if battles != ledger.len() as i64 || pokemon != roster.len() as i64 {
        bail!(
            "row count mismatch: wrote {}/{} pokemon/battles, found {}/{}",
            roster.len(),
            ledger.len(),
            pokemon,
            battles
        );
    }

    println!("\n✅ Import complete: {}", config.database.display());
    Ok(())
}

fn run_stats(config: &AppConfig, id: &str) -> Result<()> {
    let analyzer = load_analyzer(config)?;
    let stats = analyzer.battle_stats(id);

    println!(
        "#{}: {} battles, {} wins, {} losses ({:.1}% win rate)",
        id,
        stats.total,
        stats.wins,
        stats.losses,
        stats.win_rate()
    );
    Ok(())
}

fn run_report(config: &AppConfig, id: &str) -> Result<()> {
    let analyzer = load_analyzer(config)?;

    let Some(report) = analyzer.report(id) else {
        bail!("pokemon {} is not in the roster", id);
    };

    eprintln!("{}", report.summary());
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_types(config: &AppConfig, id: &str) -> Result<()> {
    let analyzer = load_analyzer(config)?;
    let rates = analyzer.win_rate_by_opponent_type(id);

    if let Some(best) = rates.first() {
        eprintln!("Use this pokemon against {}!", best.type_name.to_uppercase());
    }
    println!("{}", serde_json::to_string_pretty(&rates)?);
    Ok(())
}

fn run_audit(config: &AppConfig) -> Result<()> {
    let analyzer = load_analyzer(config)?;
    let report = LedgerAuditor::new().audit(analyzer.ledger(), analyzer.roster());

    println!("🔎 {}", report.summary());
    println!("   {:.1}% of battles are clean", report.clean_percentage());

    for issue in &report.samples {
        println!(
            "   [{:?}] record {}: {}",
            issue.severity,
            issue.record_index,
            issue.kind.describe()
        );
    }
    Ok(())
}

fn run_roster(config: &AppConfig, rarity: Option<&str>) -> Result<()> {
    let analyzer = load_analyzer(config)?;
    let roster = analyzer.roster();

    let filter = match rarity {
        Some(value) => match Rarity::parse(value) {
            Some(r) => Some(r),
            None => bail!("unknown rarity {:?}; expected mythical|legendary|sub|normal", value),
        },
        None => None,
    };

    for p in roster.listing(filter) {
        let types: Vec<&str> = p.types().collect();
        println!(
            "#{:<5} {:<24} gen {:<2} {:<14} {}",
            p.id.as_str(),
            p.name,
            p.generation.map(|g| g.to_string()).unwrap_or_else(|| "?".to_string()),
            p.rarity.as_str(),
            types.join("/")
        );
    }
    Ok(())
}

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use inventory_reconcile::{
    distance, load_registry_records, load_system_records, parse_pasted, similarity, Config,
    PatternStore, Reconciler, RegistryRecord, SqlitePatternStore, SystemRecord,
};

/// Reconcile a local inventory against an external asset registry
#[derive(Parser)]
#[command(name = "reconcile", version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, default_value = "reconcile.toml", env = "RECONCILE_CONFIG")]
    config: PathBuf,

    /// Learned-pattern database (overrides the config file)
    #[arg(long, env = "RECONCILE_DB")]
    db: Option<PathBuf>,

    /// Acting user recorded on confirmed matches (overrides the config file)
    #[arg(short, long, env = "RECONCILE_USER")]
    user: Option<String>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Score two descriptions
    Similarity { a: String, b: String },

    /// Rank registry records against one system record
    Rank {
        /// Registry CSV (tag,description,species,supplier,unit,status)
        #[arg(long)]
        registry: PathBuf,

        #[arg(long)]
        description: String,

        #[arg(long)]
        supplier: Option<String>,

        /// Show only the first N candidates
        #[arg(long, default_value_t = 10)]
        top: usize,
    },

    /// Match a tab-separated paste (description, location, state) against system records
    Match {
        /// System CSV (id,description,supplier,unit,type,state,location)
        #[arg(long)]
        pool: PathBuf,

        /// Pasted rows file, or "-" for stdin
        #[arg(long, default_value = "-")]
        pasted: String,
    },

    /// Record a human-confirmed link between a system record and a registry tag
    Confirm {
        /// Registry CSV holding the confirmed tag
        #[arg(long)]
        registry: PathBuf,

        #[arg(long)]
        tag: String,

        #[arg(long)]
        description: String,

        #[arg(long)]
        supplier: Option<String>,

        #[arg(long)]
        unit: Option<String>,

        #[arg(long = "type")]
        item_type: Option<String>,
    },

    /// List the most recent learned patterns
    Patterns {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inventory_reconcile=info,reconcile=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;
    if let Some(db) = &cli.db {
        config.patterns.database = db.clone();
    }
    if let Some(user) = &cli.user {
        config.user = user.clone();
    }

    match &cli.command {
        Command::Similarity { a, b } => run_similarity(a, b, cli.json),
        Command::Rank {
            registry,
            description,
            supplier,
            top,
        } => {
            let item = SystemRecord {
                description: Some(description.clone()),
                supplier: supplier.clone(),
                ..Default::default()
            };
            run_rank(config, registry, &item, *top, cli.json)
        }
        Command::Match { pool, pasted } => run_match(config, pool, pasted, cli.json),
        Command::Confirm {
            registry,
            tag,
            description,
            supplier,
            unit,
            item_type,
        } => {
            let item = SystemRecord {
                description: Some(description.clone()),
                supplier: supplier.clone(),
                unit: unit.clone(),
                item_type: item_type.clone(),
                ..Default::default()
            };
            run_confirm(config, registry, tag, &item)
        }
        Command::Patterns { limit } => run_patterns(config, *limit, cli.json),
    }
}

fn open_session(config: Config) -> Result<Reconciler<SqlitePatternStore>> {
    let store = SqlitePatternStore::open(&config.patterns.database).with_context(|| {
        format!(
            "Failed to open pattern database {}",
            config.patterns.database.display()
        )
    })?;
    Ok(Reconciler::start(store, config))
}

fn run_similarity(a: &str, b: &str, json: bool) -> Result<()> {
    let score = similarity(a, b);
    if json {
        println!(
            "{}",
            serde_json::json!({ "similarity": score, "distance": distance(a, b) })
        );
    } else {
        println!("similarity: {:.4}", score);
        println!("distance:   {}", distance(a, b));
    }
    Ok(())
}

fn run_rank(
    config: Config,
    registry_path: &Path,
    item: &SystemRecord,
    top: usize,
    json: bool,
) -> Result<()> {
    let pool = load_registry_records(registry_path)
        .with_context(|| format!("Failed to load registry {}", registry_path.display()))?;
    let session = open_session(config)?;

    let ranked = session.rank(item, &pool);
    let best_guess = session.best_guess(&ranked).map(|c| c.pool_index);

    if json {
        let shown: Vec<_> = ranked.iter().take(top).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "best_guess": best_guess,
                "candidates": shown,
            }))?
        );
        return Ok(());
    }

    println!(
        "{:>4}  {:<12} {:>6} {:>6} {:>6}  description",
        "", "tag", "base", "bonus", "final"
    );
    for candidate in ranked.iter().take(top) {
        let marker = if Some(candidate.pool_index) == best_guess {
            "★"
        } else {
            ""
        };
        println!(
            "{:>4}  {:<12} {:>6.3} {:>6.3} {:>6.3}  {}",
            marker,
            candidate.record.tag.as_deref().unwrap_or("-"),
            candidate.base_score,
            candidate.bonus_score,
            candidate.final_score,
            candidate.record.description.as_deref().unwrap_or(""),
        );
    }
    Ok(())
}

fn run_match(config: Config, pool_path: &Path, pasted_source: &str, json: bool) -> Result<()> {
    let pool = load_system_records(pool_path)
        .with_context(|| format!("Failed to load system records {}", pool_path.display()))?;

    let text = if pasted_source == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read pasted rows from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(pasted_source)
            .with_context(|| format!("Failed to read pasted rows {}", pasted_source))?
    };
    let pasted = parse_pasted(&text).context("Failed to parse pasted rows")?;

    let session = open_session(config)?;
    let outcome = session.match_batch(&pasted, &pool);
    let summary = outcome.summary();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "results": outcome.results,
                "summary": summary,
            }))?
        );
        return Ok(());
    }

    for result in &outcome.results {
        let pasted_desc = pasted[result.pasted_index]
            .description
            .as_deref()
            .unwrap_or("");
        let matched = result
            .pool_index
            .map(|j| describe_system(&pool[j]))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<40} → {:<40} [{}]",
            pasted_desc,
            matched,
            result.match_type.label()
        );
    }

    info!(
        "{} pasted rows: {} matched, {} ambiguous, {} not found",
        summary.total, summary.matched, summary.ambiguous, summary.not_found
    );
    Ok(())
}

fn run_confirm(
    config: Config,
    registry_path: &Path,
    tag: &str,
    item: &SystemRecord,
) -> Result<()> {
    let pool = load_registry_records(registry_path)
        .with_context(|| format!("Failed to load registry {}", registry_path.display()))?;

    let Some(registry) = pool.iter().find(|r| r.tag.as_deref() == Some(tag)) else {
        bail!("Tag {} not found in {}", tag, registry_path.display());
    };

    let mut session = open_session(config)?;
    let score = score_of(&session, item, registry);
    let pattern = session.record_confirmed_match(item, registry, score);

    println!(
        "✓ Recorded {} ↔ {} (score {:.3}, by {})",
        item.description.as_deref().unwrap_or(""),
        tag,
        pattern.original_score,
        pattern.user
    );
    Ok(())
}

fn run_patterns(config: Config, limit: usize, json: bool) -> Result<()> {
    let store = SqlitePatternStore::open(&config.patterns.database)?;
    let patterns = store.recent(limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&patterns)?);
        return Ok(());
    }

    for p in &patterns {
        println!(
            "{}  {:<10} {:<30} → {:<12} {:.3}",
            p.timestamp.format("%Y-%m-%d %H:%M"),
            p.user,
            p.system_description.as_deref().unwrap_or(""),
            p.tag.as_deref().unwrap_or("-"),
            p.original_score
        );
    }
    println!("{} of {} stored patterns", patterns.len(), store.count()?);
    Ok(())
}

/// Score the confirmed registry record the way the ranker would
fn score_of(
    session: &Reconciler<SqlitePatternStore>,
    item: &SystemRecord,
    registry: &RegistryRecord,
) -> f64 {
    let single = std::slice::from_ref(registry);
    session
        .rank(item, single)
        .first()
        .map(|c| c.final_score)
        .unwrap_or(0.0)
}

fn describe_system(record: &SystemRecord) -> String {
    match (&record.id, &record.description) {
        (Some(id), Some(description)) => format!("#{} {}", id, description),
        (None, Some(description)) => description.clone(),
        (Some(id), None) => format!("#{}", id),
        (None, None) => "(no description)".to_string(),
    }
}

mod collectors;
mod config;
mod db;
mod error;
mod models;

use clap::Parser;
use sqlx::PgPool;
use tracing::Instrument;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::config::{Command, Config, ScrapeArgs, ScrapeConfig};
use crate::models::job::StoreStats;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jobscout=info"));
    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url).await?;

    if config.run_migrations {
        tracing::info!("Running database migrations...");
        db::run_migrations(&pool).await?;
        tracing::info!("Migrations complete");
    }

    match config.resolved_command() {
        Command::Scrape(args) => scrape(&config, &args, &pool).await,
        Command::Stats { recent } => stats(&pool, recent, config.json).await,
    }
}

async fn scrape(config: &Config, args: &ScrapeArgs, pool: &PgPool) -> anyhow::Result<()> {
    let mut scrape_config = ScrapeConfig::load(&config.config)?;
    scrape_config.apply_args(args);
    if scrape_config.keywords.is_empty() {
        anyhow::bail!(
            "No keywords to search; add `keywords` to {} or pass --keyword",
            config.config.display()
        );
    }

    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("run", %run_id);
    let summary = collectors::runner::run(&scrape_config, args.credentials(), !args.headed, pool)
        .instrument(span)
        .await?;
    summary.log();
    if config.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}

async fn stats(pool: &PgPool, recent: i64, json: bool) -> anyhow::Result<()> {
    let stats = StoreStats::load(pool, recent).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Stored jobs: {}", stats.total);

    if !stats.by_keyword.is_empty() {
        println!("\nBy search keyword:");
        for k in &stats.by_keyword {
            println!("  {:>6}  {}", k.jobs, k.keyword);
        }
    }

    if !stats.recent.is_empty() {
        println!("\nMost recent:");
        for j in &stats.recent {
            let skills = if j.matched_skills.is_empty() {
                "-".to_string()
            } else {
                j.matched_skills.join(", ")
            };
            println!(
                "  {}  {} @ {}  [{}]\n      {}",
                j.scraped_at.format("%Y-%m-%d %H:%M"),
                j.title,
                j.company,
                skills,
                j.job_url
            );
        }
    }
    Ok(())
}

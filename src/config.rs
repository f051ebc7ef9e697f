use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;

use crate::collectors::Timeouts;
use crate::collectors::politeness::Politeness;
use crate::collectors::selectors::SelectorSet;
use crate::error::ScrapeError;

#[derive(Parser, Debug, Clone)]
#[command(name = "jobscout", about = "Job listing scraper with detail enrichment")]
pub struct Config {
    /// Database connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Run database migrations on startup
    #[arg(long, env = "RUN_MIGRATIONS", default_value = "true")]
    pub run_migrations: bool,

    /// Path to the JSON scrape configuration
    #[arg(long, env = "SCRAPER_CONFIG", default_value = "config.json")]
    pub config: PathBuf,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,

    /// Print the command's result as JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Scrape options used when no subcommand is given
    #[command(flatten)]
    pub scrape: ScrapeArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Scrape every configured keyword (default when no subcommand given)
    Scrape(ScrapeArgs),
    /// Summarize what is already stored
    Stats {
        /// Number of most recently scraped jobs to list
        #[arg(long, default_value = "10")]
        recent: i64,
    },
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct ScrapeArgs {
    /// Keyword to search for; repeat to search several. Replaces the file's keywords.
    #[arg(long = "keyword")]
    pub keywords: Vec<String>,

    /// Pages to visit per keyword
    #[arg(long)]
    pub pages: Option<u32>,

    /// Skip the detail page pass
    #[arg(long)]
    pub no_details: bool,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Account identifier for the login flow
    #[arg(long, env = "SCRAPER_EMAIL")]
    pub email: Option<String>,

    /// Account secret for the login flow
    #[arg(long, env = "SCRAPER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

impl Config {
    /// Resolve the command, defaulting to Scrape with the top-level options.
    pub fn resolved_command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or_else(|| Command::Scrape(self.scrape.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl ScrapeArgs {
    /// Both halves must be present; anything else means "skip login".
    pub fn credentials(&self) -> Option<Credentials> {
        let email = self.email.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let password = self.password.as_deref().filter(|s| !s.is_empty())?;
        Some(Credentials {
            email: email.to_string(),
            password: password.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Experience {
    pub min: Option<u32>,
    pub max: Option<u32>,
}

impl Experience {
    /// Human-readable description of the bound applied at search time.
    pub fn label(experience: Option<&Experience>) -> String {
        match experience.map(|e| (e.min, e.max)) {
            Some((Some(min), Some(max))) => format!("{min}-{max} years"),
            Some((Some(min), None)) => format!("{min}+ years"),
            Some((None, Some(max))) => format!("0-{max} years"),
            _ => "Any".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScrapingOptions {
    pub pages_per_keyword: u32,
    pub delay_between_keywords: u64,
    pub scrape_job_details: bool,
}

impl Default for ScrapingOptions {
    fn default() -> Self {
        Self {
            pages_per_keyword: 3,
            delay_between_keywords: 5000,
            scrape_job_details: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SiteConfig {
    pub origin: String,
    pub login_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            origin: "https://www.naukri.com".to_string(),
            login_url: "https://www.naukri.com/nlogin/login".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScrapeConfig {
    pub keywords: Vec<String>,
    pub skills: Vec<String>,
    pub experience: Option<Experience>,
    pub scraping: ScrapingOptions,
    pub site: SiteConfig,
    pub politeness: Politeness,
    pub timeouts: Timeouts,
    pub selectors: SelectorSet,
}

impl ScrapeConfig {
    /// Load the scrape configuration. A missing file is not an error: every
    /// section falls back to its defaults.
    pub fn load(path: &Path) -> Result<Self, ScrapeError> {
        if !path.exists() {
            tracing::warn!("Config file {} not found, using defaults", path.display());
            return Self::default().normalized();
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ScrapeError> {
        let config: ScrapeConfig = serde_json::from_str(raw)?;
        config.normalized()
    }

    /// Apply command-line overrides on top of the file.
    pub fn apply_args(&mut self, args: &ScrapeArgs) {
        let keywords = clean_list(&args.keywords);
        if !keywords.is_empty() {
            self.keywords = keywords;
        }
        if let Some(pages) = args.pages {
            self.scraping.pages_per_keyword = pages;
        }
        if args.no_details {
            self.scraping.scrape_job_details = false;
        }
    }

    fn normalized(mut self) -> Result<Self, ScrapeError> {
        self.keywords = clean_list(&self.keywords);
        self.skills = clean_list(&self.skills);
        self.site.origin = self.site.origin.trim_end_matches('/').to_string();

        if let Some(Experience {
            min: Some(min),
            max: Some(max),
        }) = self.experience
            && min > max
        {
            return Err(ScrapeError::Config(format!(
                "experience.min ({min}) is greater than experience.max ({max})"
            )));
        }

        self.politeness.keyword_delay_ms = self.scraping.delay_between_keywords;
        Ok(self)
    }

    pub fn experience_label(&self) -> String {
        Experience::label(self.experience.as_ref())
    }
}

fn clean_list(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

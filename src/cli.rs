use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use url::Url;

use crate::auth;
use crate::config::Config;
use crate::develocity::{attribute_models, process_builds, BuildCache, DevelocityClient};
use crate::insights::{IncidentReport, IncidentTracker};
use crate::output;

#[derive(Parser)]
#[command(name = "remedylens")]
#[command(author, version, about = "Time-to-remediate insights for Develocity builds", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch builds and print time-to-remediate reports
    Report {
        /// Develocity server base URL
        #[arg(short, long, env = "DEVELOCITY_URL")]
        url: Option<String>,

        /// Analyze builds since this date ("2024-01-15" or "2024-01-15 08:00")
        #[arg(short, long)]
        since: Option<String>,

        /// Build query passed through to the builds listing
        #[arg(short, long)]
        query: Option<String>,

        /// Upper bound on builds fetched per model request
        #[arg(short, long)]
        max_builds_per_request: Option<usize>,

        /// Override the build cache location
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },

    /// Remove all cached build data
    ClearCache {
        /// Override the build cache location
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        match &self.command {
            Commands::Report {
                url,
                since,
                query,
                max_builds_per_request,
                cache_dir,
            } => {
                self.execute_report(
                    url.as_deref(),
                    since.as_deref(),
                    query.as_deref(),
                    *max_builds_per_request,
                    cache_dir.clone(),
                )
                .await
            }
            Commands::ClearCache { cache_dir } => {
                let cache = BuildCache::new(cache_dir.clone())?;
                cache.clear()?;
                Ok(())
            }
        }
    }

    async fn execute_report(
        &self,
        url: Option<&str>,
        since: Option<&str>,
        query: Option<&str>,
        max_builds_per_request: Option<usize>,
        cache_dir: Option<PathBuf>,
    ) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;

        let url = url
            .map(ToString::to_string)
            .or(config.develocity.server_url)
            .context("No Develocity server URL given (--url, DEVELOCITY_URL or config file)")?;
        let since = match since.or(config.develocity.since.as_deref()) {
            Some(value) => parse_since(value)?,
            None => Utc::now() - Duration::days(7),
        };
        let query = query
            .map(ToString::to_string)
            .or(config.develocity.query);
        let max_builds_per_request =
            max_builds_per_request.unwrap_or(config.develocity.max_builds_per_request);
        if max_builds_per_request == 0 {
            bail!("--max-builds-per-request must be at least 1");
        }
        let cache_dir = cache_dir.or(config.develocity.cache_dir);

        let server_url = Url::parse(&url).with_context(|| format!("Invalid server URL: {url}"))?;
        let access_key = auth::lookup_access_key(&server_url)?;
        if access_key.is_none() {
            info!("No access key found for {url}, fetching without authentication");
        }

        let client = DevelocityClient::new(&url, access_key)?;
        let cache = BuildCache::new(cache_dir)?;
        let mut tracker = IncidentTracker::new();

        info!("Processing builds from {url}");
        process_builds(
            &client,
            &cache,
            query.as_deref(),
            since,
            max_builds_per_request,
            &attribute_models(),
            &mut [&mut tracker],
        )
        .await?;

        info!(
            "{} resolved incidents, {} still open",
            tracker.resolved_incidents().len(),
            tracker.open_incident_count()
        );

        let until = Utc::now();
        let report = IncidentReport::new(tracker.resolved_incidents(), since, until);

        output::print_report(&report.overall());
        output::print_report(&report.ci_overall());
        output::print_report(&report.local_overall());
        output::print_report(&report.ci_per_project_requested());
        output::print_report(&report.local_per_user());
        output::print_report(&report.local_per_project());
        output::print_report(&report.local_per_user_project());
        output::print_report(&report.overall_trends());
        output::print_report(&report.ci_overall_trends());
        output::print_report(&report.local_overall_trends());
        output::print_report(&report.ci_per_project_requested_trends());
        output::print_report(&report.local_per_user_trends());
        output::print_report(&report.local_per_project_trends());
        output::print_report(&report.local_per_user_project_trends());

        Ok(())
    }
}

/// Accepts RFC 3339, "2024-01-15 08:00" and "2024-01-15"; dates and naive
/// date-times are taken as UTC.
fn parse_since(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M") {
        return Ok(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date.and_hms_opt(0, 0, 0).unwrap().and_utc());
    }
    bail!("Invalid date '{value}' (expected '2024-01-15', '2024-01-15 08:00' or RFC 3339)")
}

//! Manga Conduit main entry point
//!
//! This is the command-line interface for searching sources, inspecting
//! series and running download jobs.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use manga_conduit::config::{load_or_default, Config};
use manga_conduit::download::{DownloadRequest, Downloader};
use manga_conduit::manager::{ConnectorManager, SearchOptions};
use manga_conduit::model::{Chapter, ChapterNumber, SeriesKey, SourceId};
use manga_conduit::storage::{open_job_store, JobStatus, JobStore, NewJob};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Manga Conduit: one catalog, chapter and page contract over several manga sites
#[derive(Parser, Debug)]
#[command(name = "manga-conduit")]
#[command(version)]
#[command(about = "Search, inspect and download manga from several sources", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (built-in defaults when omitted)
    #[arg(short, long, value_name = "CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List enabled sources
    Sources,

    /// Search every enabled source (or the given ones)
    Search {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Restrict to a source; repeatable
        #[arg(short, long = "source")]
        sources: Vec<String>,

        /// Results per source
        #[arg(short, long)]
        limit: Option<usize>,

        /// Hide adult sources and entries
        #[arg(long)]
        safe: bool,

        /// Merge and de-duplicate results across sources
        #[arg(long)]
        merged: bool,
    },

    /// Browse a source's catalog
    Catalog {
        source: String,

        #[arg(short, long, default_value_t = 50)]
        limit: usize,

        #[arg(long)]
        safe: bool,
    },

    /// List the chapters of a series (key such as `mangahub:one-piece`)
    Chapters { series: String },

    /// List the page images of one chapter
    Pages {
        series: String,

        /// Chapter number, e.g. `12` or `10.5`
        #[arg(long)]
        chapter: String,
    },

    /// Show series metadata
    Details { series: String },

    /// Download a series as CBZ archives
    Download {
        series: String,

        /// Series title used for the output directory
        #[arg(short, long)]
        title: Option<String>,

        /// Chapter selection such as `1-10,12,15.5`
        #[arg(long)]
        chapters: Option<String>,
    },

    /// Inspect and cancel download jobs
    Jobs {
        #[command(subcommand)]
        command: JobsCommand,
    },
}

#[derive(Subcommand, Debug)]
enum JobsCommand {
    /// List jobs, newest first
    List {
        /// Only jobs with this status
        #[arg(long)]
        status: Option<String>,
    },

    /// Flag a job as cancelled; a running download stops at the next page
    Cancel { id: i64 },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = load_or_default(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("Failed to load configuration from {}", path.display()),
        None => "Failed to build default configuration".to_string(),
    })?;
    tracing::debug!("Configuration loaded");

    if let Command::Jobs { command } = cli.command {
        return handle_jobs(&config, command, cli.json);
    }

    let manager = Arc::new(ConnectorManager::from_config(&config)?);
    handle_command(&config, manager, cli.command, cli.json).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("manga_conduit=info,warn"),
            1 => EnvFilter::new("manga_conduit=debug,info"),
            2 => EnvFilter::new("manga_conduit=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn handle_command(
    config: &Config,
    manager: Arc<ConnectorManager>,
    command: Command,
    json: bool,
) -> anyhow::Result<()> {
    match command {
        Command::Sources => {
            let sources = manager.sources();
            if json {
                return print_json(&sources);
            }
            for id in SourceId::ALL {
                let state = if sources.contains(&id) { "enabled" } else { "disabled" };
                let adult = if id.is_adult_only() { " (adult)" } else { "" };
                println!("{:<12} {:<10} {}{}", id.as_str(), state, id.display_name(), adult);
            }
        }

        Command::Search {
            query,
            sources,
            limit,
            safe,
            merged,
        } => {
            let query = query.join(" ");
            let options = SearchOptions {
                sources: parse_sources(&sources)?,
                limit_per_source: limit,
                filter_adult: safe,
            };

            if merged {
                let results = manager.search_merged(&query, &options).await;
                if json {
                    return print_json(&results);
                }
                for scored in &results {
                    println!(
                        "[{:>3}] {:<40} {}",
                        scored.relevance, scored.entry.title, scored.entry.key
                    );
                }
            } else {
                let results = manager.search(&query, &options).await;
                if json {
                    let grouped: Vec<SourceResult> = results
                        .into_iter()
                        .map(|(source, entries)| SourceResult { source, entries })
                        .collect();
                    return print_json(&grouped);
                }
                for (source, entries) in &results {
                    println!("{} ({} result(s))", source.display_name(), entries.len());
                    for entry in entries {
                        println!("  {:<40} {}", entry.title, entry.key);
                    }
                }
            }
        }

        Command::Catalog {
            source,
            limit,
            safe,
        } => {
            let id: SourceId = source.parse()?;
            let entries = manager.list_catalog(id, Some(limit), safe).await?;
            if json {
                return print_json(&entries);
            }
            for entry in &entries {
                println!("{:<40} {}", entry.title, entry.key);
            }
            println!("\n{} entries", entries.len());
        }

        Command::Chapters { series } => {
            let key: SeriesKey = series.parse()?;
            let chapters = manager.for_series(&key)?.list_chapters(&key).await;
            if json {
                return print_json(&chapters);
            }
            for chapter in &chapters {
                let fallbacks = if chapter.fallback_urls.is_empty() {
                    String::new()
                } else {
                    format!(" (+{} fallback)", chapter.fallback_urls.len())
                };
                println!("{:>7}  {}{}", chapter.number, chapter.title, fallbacks);
            }
        }

        Command::Pages { series, chapter } => {
            let key: SeriesKey = series.parse()?;
            let connector = manager.for_series(&key)?;
            let chapters = connector.list_chapters(&key).await;
            let Some(chapter) = find_chapter(&chapters, &chapter) else {
                bail!("Chapter {} not found in {}", chapter, key);
            };
            let pages = connector.list_pages(chapter).await?;
            if json {
                return print_json(&pages);
            }
            for (index, page) in pages.iter().enumerate() {
                println!("{:>4}  {}", index + 1, page.url);
            }
        }

        Command::Details { series } => {
            let key: SeriesKey = series.parse()?;
            let details = manager.for_series(&key)?.get_details(&key).await;
            if json {
                return print_json(&details);
            }
            println!("Status:  {}", details.status.as_deref().unwrap_or("-"));
            println!("Authors: {}", details.authors.join(", "));
            println!("Genres:  {}", details.genres.join(", "));
            println!("Cover:   {}", details.cover_url.as_deref().unwrap_or("-"));
            if let Some(description) = &details.description {
                println!("\n{}", description);
            }
        }

        Command::Download {
            series,
            title,
            chapters,
        } => {
            let key: SeriesKey = series.parse()?;
            let title = title.unwrap_or_else(|| default_title(&key));
            handle_download(config, manager, key, title, chapters, json).await?;
        }

        Command::Jobs { command } => handle_jobs(config, command, json)?,
    }

    Ok(())
}

/// Runs a download job in the background; Ctrl-C cancels it
async fn handle_download(
    config: &Config,
    manager: Arc<ConnectorManager>,
    series: SeriesKey,
    title: String,
    selection: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let mut request = DownloadRequest::new(series.clone(), title.clone());
    if let Some(selection) = selection {
        let ranges = parse_selection(&selection)?;
        let chapters = manager.for_series(&series)?.list_chapters(&series).await;
        let selected: Vec<Chapter> = chapters
            .into_iter()
            .filter(|chapter| ranges.iter().any(|r| r.contains(chapter.number)))
            .collect();
        if selected.is_empty() {
            bail!("No chapter of {} matches '{}'", series, selection);
        }
        request.chapters = Some(selected);
    }

    let jobs = open_job_store(Path::new(&config.download.database_path))?;
    let job_id = {
        let mut store = jobs.lock().map_err(|_| anyhow::anyhow!("job store lock poisoned"))?;
        store.create_job(&NewJob::new(title, series))?
    };
    tracing::info!("Created download job {}", job_id);

    let downloader = Arc::new(Downloader::new(manager, Arc::clone(&jobs), &config.download));
    let mut handle = Arc::clone(&downloader).spawn(job_id, request);

    let report = tokio::select! {
        joined = &mut handle => joined??,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted; cancelling job {}", job_id);
            if let Ok(mut store) = jobs.lock() {
                store.cancel(job_id)?;
            }
            handle.await??
        }
    };

    if json {
        return print_json(&report);
    }

    println!(
        "Job {} {}: {}/{} chapter(s) downloaded",
        report.job_id, report.status, report.chapters_downloaded, report.chapters_total
    );
    for failure in &report.failures {
        println!("  {} skipped: {}", failure.chapter, failure.reason.as_str());
    }
    if let Some(destination) = &report.destination {
        println!("Saved to {}", destination.display());
    }
    Ok(())
}

fn handle_jobs(config: &Config, command: JobsCommand, json: bool) -> anyhow::Result<()> {
    let jobs = open_job_store(Path::new(&config.download.database_path))?;
    let mut store = jobs.lock().map_err(|_| anyhow::anyhow!("job store lock poisoned"))?;

    match command {
        JobsCommand::List { status } => {
            let status = match status {
                Some(raw) => Some(
                    JobStatus::from_db_string(&raw.to_lowercase())
                        .with_context(|| format!("Unknown job status '{}'", raw))?,
                ),
                None => None,
            };
            let records = store.list_jobs(status)?;
            if json {
                return print_json(&records);
            }
            for job in &records {
                println!(
                    "{:>5}  {:<11} {:>3}%  {:<30} {}",
                    job.id, job.status, job.progress, job.title, job.series_key
                );
                if let Some(error) = &job.error {
                    println!("       error: {}", error);
                }
            }
        }
        JobsCommand::Cancel { id } => {
            if store.cancel(id)? {
                println!("Job {} cancelled", id);
            } else {
                println!("Job {} has already finished", id);
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct SourceResult {
    source: SourceId,
    entries: Vec<manga_conduit::CatalogEntry>,
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_sources(raw: &[String]) -> anyhow::Result<Option<Vec<SourceId>>> {
    if raw.is_empty() {
        return Ok(None);
    }
    let ids = raw
        .iter()
        .flat_map(|s| s.split(','))
        .map(|s| s.parse::<SourceId>())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(ids))
}

fn find_chapter<'a>(chapters: &'a [Chapter], number: &str) -> Option<&'a Chapter> {
    let wanted = ChapterNumber::parse(number)?;
    chapters.iter().find(|c| c.number == wanted)
}

/// Title derived from the key when none is given
fn default_title(key: &SeriesKey) -> String {
    let words = |slug: &str| slug.replace(['-', '_'], " ");
    match key {
        SeriesKey::MangaHub { slug } | SeriesKey::FanFox { slug } => words(slug),
        SeriesKey::OmegaScans { slug, .. } => words(slug),
        SeriesKey::HentaiFox { gallery_id } => format!("Gallery {}", gallery_id),
    }
}

/// An inclusive range of chapter numbers
#[derive(Debug, Clone, Copy, PartialEq)]
struct ChapterRange {
    start: f64,
    end: f64,
}

impl ChapterRange {
    fn contains(&self, number: ChapterNumber) -> bool {
        number.value() >= self.start && number.value() <= self.end
    }
}

/// Parses `1-10,12,15.5`
fn parse_selection(raw: &str) -> anyhow::Result<Vec<ChapterRange>> {
    let mut ranges = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (start, end) = match part.split_once('-') {
            Some((start, end)) => (start.trim(), end.trim()),
            None => (part, part),
        };
        let start: f64 = start
            .parse()
            .with_context(|| format!("Invalid chapter number '{}'", start))?;
        let end: f64 = end
            .parse()
            .with_context(|| format!("Invalid chapter number '{}'", end))?;
        if end < start {
            bail!("Empty chapter range '{}'", part);
        }
        ranges.push(ChapterRange { start, end });
    }
    if ranges.is_empty() {
        bail!("Empty chapter selection");
    }
    Ok(ranges)
}

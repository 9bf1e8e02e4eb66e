//! Tagdex - location indexing and tag search
//!
//! Entry point for the tagdex command line.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::de::DeserializeOwned;
use tagdex::model::{Entry, Location};
use tagdex::search::{FileTypeGroup, SearchBoxing, SearchQuery};
use tagdex::service::{
    LocationIndexService, LocationRegistry, NotificationKind, StaticRegistry, UiSink,
};
use tagdex::telemetry::{gather_metrics, init_metrics, init_tracing};
use tagdex::{Config, Error, Result};

/// Tagdex - location indexing and tag search
#[derive(Parser, Debug)]
#[command(name = "tagdex")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON file with the configured locations
    #[arg(short, long, env = "TAGDEX_LOCATIONS_FILE")]
    locations: Option<PathBuf>,

    /// Use this directory as the only location
    #[arg(long, conflicts_with = "locations")]
    root: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TAGDEX_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, env = "TAGDEX_LOG_JSON")]
    log_json: bool,

    /// Index age in milliseconds after which a location is re-indexed
    #[arg(long, env = "TAGDEX_MAX_INDEX_AGE", default_value = "600000")]
    max_index_age: u64,

    /// Default global result cap
    #[arg(long, env = "TAGDEX_MAX_SEARCH_RESULTS", default_value = "1000")]
    max_search_results: usize,

    /// Milliseconds our own changes stay hidden from the watcher after they complete
    #[arg(long, env = "TAGDEX_IGNORE_GRACE", default_value = "1000")]
    ignore_grace: u64,

    /// Upper bound in milliseconds on hiding a path from the watcher
    #[arg(long, env = "TAGDEX_IGNORE_MAX_HOLD", default_value = "60000")]
    ignore_max_hold: u64,

    /// Largest file whose text is extracted
    #[arg(long, env = "TAGDEX_TEXT_MAX_BYTES", default_value = "1048576")]
    text_max_bytes: u64,

    /// Characters kept from an extracted text
    #[arg(long, env = "TAGDEX_TEXT_EXCERPT_CHARS", default_value = "16384")]
    text_excerpt_chars: usize,

    /// Directory levels below the root to watch
    #[arg(long, env = "TAGDEX_WATCH_DEPTH")]
    watch_depth: Option<usize>,

    /// Capacity of the watch event channel
    #[arg(long, env = "TAGDEX_WATCH_CHANNEL_CAPACITY", default_value = "256")]
    watch_channel_capacity: usize,

    /// Print Prometheus metrics before exiting
    #[arg(long)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build and persist location indexes
    Index {
        /// Location uuid or name (defaults to the current location)
        location: Option<String>,

        /// Index every configured location
        #[arg(long)]
        all: bool,

        /// Extract text for full-text search
        #[arg(long)]
        extract_text: bool,
    },

    /// Search one or all locations
    Search(SearchArgs),

    /// Keep a location index in sync until Ctrl+C
    Watch {
        /// Location uuid or name (defaults to the current location)
        location: Option<String>,
    },
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Location uuid or name (defaults to the current location)
    location: Option<String>,

    /// Search every configured location
    #[arg(long)]
    all: bool,

    /// Text to find in names and extracted text
    #[arg(short, long)]
    text: Option<String>,

    /// Tags that must all be present
    #[arg(long = "and", value_name = "TAG")]
    tags_and: Vec<String>,

    /// Tags of which one must be present
    #[arg(long = "or", value_name = "TAG")]
    tags_or: Vec<String>,

    /// Tags that must be absent
    #[arg(long = "not", value_name = "TAG")]
    tags_not: Vec<String>,

    /// Text matching: fuzzy, semistrict or strict
    #[arg(long, default_value = "fuzzy")]
    mode: String,

    /// File type group (images, documents, notes, audio, video, archives, bookmarks, ebooks)
    #[arg(long = "type", value_name = "GROUP")]
    file_type: Option<String>,

    /// Size bucket (empty, tiny, verySmall, small, medium, large, huge)
    #[arg(long)]
    size: Option<String>,

    /// Modification bucket (today, yesterday, pastSevenDays, pastThirtyDays, pastSixMonths, pastYear, moreThanYear)
    #[arg(long)]
    modified: Option<String>,

    /// Restrict to descendants of this directory
    #[arg(long)]
    folder: Option<String>,

    /// Result cap
    #[arg(long, default_value = "0")]
    max: usize,

    /// Re-index even if the index is fresh
    #[arg(long)]
    force: bool,

    /// Print results as JSON lines
    #[arg(long)]
    json: bool,
}

/// Prints notifications to stderr and directory changes to stdout.
struct ConsoleSink;

impl UiSink for ConsoleSink {
    fn show_notification(&self, text: &str, kind: NotificationKind) {
        let label = match kind {
            NotificationKind::Info => "info",
            NotificationKind::Warning => "warning",
            NotificationKind::Error => "error",
        };
        eprintln!("[{label}] {text}");
    }

    fn update_directory_entries(&self, dir: &str, entries: &[Entry]) {
        for entry in entries {
            println!("+ {} (in {dir})", entry.path);
        }
    }

    fn remove_directory_entries(&self, paths: &[String]) {
        for path in paths {
            println!("- {path}");
        }
    }

    fn reload_directory(&self, dir: &str) {
        println!("~ {dir}");
    }
}

/// Parse a camelCase enum value the way the JSON query format spells it.
fn parse_value<T: DeserializeOwned>(what: &str, value: &str) -> Result<T> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|_| Error::config(format!("invalid {what} '{value}'")))
}

fn build_query(args: &SearchArgs) -> Result<SearchQuery> {
    let mut query = SearchQuery::new()
        .with_tags_and(args.tags_and.iter().cloned())
        .with_tags_or(args.tags_or.iter().cloned())
        .with_tags_not(args.tags_not.iter().cloned())
        .with_max_results(args.max);
    if let Some(text) = &args.text {
        query = query.with_text(text.clone(), parse_value("search mode", &args.mode)?);
    }
    if let Some(group) = &args.file_type {
        let group = FileTypeGroup::from_name(group)
            .ok_or_else(|| Error::config(format!("unknown file type group '{group}'")))?;
        query = query.with_file_types(group);
    }
    if let Some(size) = &args.size {
        query = query.with_file_size(parse_value("size bucket", size)?);
    }
    if let Some(modified) = &args.modified {
        query = query.with_last_modified(parse_value("date bucket", modified)?);
    }
    if let Some(folder) = &args.folder {
        query = query.in_directory(folder.clone());
    }
    if args.all {
        query = query.with_boxing(SearchBoxing::Global);
    }
    if args.force {
        query = query.forced();
    }
    Ok(query)
}

fn registry(cli: &Cli, location: Option<&str>) -> Result<StaticRegistry> {
    if let Some(root) = &cli.root {
        let root = root.to_string_lossy().into_owned();
        let registry = StaticRegistry::new(vec![Location::local(root.clone(), root)]);
        let uuid = registry.locations()[0].uuid.clone();
        registry.set_current(&uuid)?;
        return Ok(registry);
    }

    let path = cli
        .locations
        .as_ref()
        .ok_or_else(|| Error::config("either --locations or --root is required"))?;
    let registry = StaticRegistry::load(path)?;
    if let Some(key) = location {
        registry.set_current(key)?;
    }
    Ok(registry)
}

fn print_results(results: &[Entry], json: bool) -> Result<()> {
    for entry in results {
        if json {
            println!("{}", serde_json::to_string(entry)?);
        } else {
            let tags: Vec<&str> = entry.tags.iter().map(|t| t.title.as_str()).collect();
            if tags.is_empty() {
                println!("{}", entry.path);
            } else {
                println!("{}  [{}]", entry.path, tags.join(" "));
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.log_json);
    init_metrics();

    tracing::info!("Tagdex v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config {
        locations_file: cli.locations.clone(),
        log_level: cli.log_level.clone(),
        log_json: cli.log_json,
        max_index_age: Duration::from_millis(cli.max_index_age),
        max_search_results: cli.max_search_results,
        ignore_grace: Duration::from_millis(cli.ignore_grace),
        ignore_max_hold: Duration::from_millis(cli.ignore_max_hold),
        text_max_bytes: cli.text_max_bytes,
        text_excerpt_chars: cli.text_excerpt_chars,
        watch_depth: cli.watch_depth,
        watch_channel_capacity: cli.watch_channel_capacity,
    };

    tracing::debug!(?config, "Configuration loaded");
    config.validate()?;

    let selected = match &cli.command {
        Command::Index { location, .. } | Command::Watch { location } => location.as_deref(),
        Command::Search(args) => args.location.as_deref(),
    };
    let registry = Arc::new(registry(&cli, selected)?);
    let service = LocationIndexService::new(config, registry.clone(), Arc::new(ConsoleSink));

    match &cli.command {
        Command::Index {
            all, extract_text, ..
        } => {
            if *all {
                let summary = service.create_all_location_indexes(*extract_text).await;
                println!(
                    "indexed {} locations ({} failed, {} skipped)",
                    summary.indexed, summary.failed, summary.skipped
                );
            } else {
                let location = registry
                    .current()
                    .ok_or_else(|| Error::config("no location selected"))?;
                let outcome = service.create_location_index(&location).await?;
                println!(
                    "indexed {} entries of {} ({} directories, {} errors)",
                    outcome.entries.len(),
                    location.name,
                    outcome.stats.directories,
                    outcome.stats.errors
                );
            }
        }
        Command::Search(args) => {
            let query = build_query(args)?;
            let results = if args.all {
                service.search_all_locations(&query).await
            } else {
                service.search_current_location(&query).await?
            };
            print_results(&results, args.json)?;
        }
        Command::Watch { .. } => {
            let location = registry
                .current()
                .ok_or_else(|| Error::config("no location selected"))?;
            service.create_location_index(&location).await?;
            let state = service.start_watching().await?;
            tracing::info!(?state, "Watching, press Ctrl+C to stop");

            tokio::signal::ctrl_c()
                .await
                .map_err(|e| Error::internal(format!("failed to listen for Ctrl+C: {e}")))?;

            if let Some(stats) = service.stop_watching().await {
                eprintln!(
                    "{} events: {} applied, {} ignored, {} suppressed",
                    stats.received, stats.applied, stats.ignored, stats.suppressed
                );
            }
        }
    }

    if cli.metrics {
        print!("{}", gather_metrics()?);
    }

    Ok(())
}

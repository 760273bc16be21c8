//! Harvest Ingest - metadata harvesting and index sync tool

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use harvest_common::logging::{init_logging, LogConfig, LogLevel};
use harvest_common::Position;
use harvest_ingest::checkpoint::CheckpointStore;
use harvest_ingest::config::{FetchConfig, SyncConfig};
use harvest_ingest::feed::CouchChangeFeed;
use harvest_ingest::fetcher::emuseum::EMuseumSource;
use harvest_ingest::fetcher::flickr::FlickrPhotoSource;
use harvest_ingest::fetcher::solr::{SolrCursorSource, SolrPageSource};
use harvest_ingest::fetcher::{write_jsonl, CursorFetcher, Fetcher, PagedFetcher, DEFAULT_PAGE_SIZE};
use harvest_ingest::http::build_client;
use harvest_ingest::index::SolrIndex;
use harvest_ingest::sync::{SyncEngine, SyncOptions};
use std::path::PathBuf;
use std::process;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "harvest-ingest")]
#[command(author, version, about = "Metadata harvesting and search index sync")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Push changes from the document store into the search index
    Sync {
        /// Document store server URL
        couch_url: String,

        /// Database holding harvested records
        dbname: String,

        /// Search index core URL
        solr_url: String,

        /// Start from this change-feed position instead of the stored checkpoint
        #[arg(long, conflicts_with = "all_docs")]
        since: Option<Position>,

        /// Replay every document; the stored checkpoint is not updated
        #[arg(long)]
        all_docs: bool,
    },

    /// Harvest records from an upstream source into a JSON Lines file
    Fetch {
        #[command(subcommand)]
        source: FetchSource,
    },
}

#[derive(Subcommand, Debug)]
enum FetchSource {
    /// Search index replica
    Solr {
        /// Core URL
        url: String,

        /// Query string
        query: String,

        /// Paginate with cursor marks instead of page numbers
        #[arg(long)]
        cursor: bool,

        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: u64,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Public photos of one Flickr user
    Flickr {
        user_id: String,

        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: u64,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Approved objects of an eMuseum site
    Emuseum {
        /// Site base URL
        url: String,

        /// Objects per page as served by the site
        #[arg(long)]
        page_size: u64,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("harvest-ingest")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);
    let _guard = match init_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {:#}", e);
            None
        },
    };

    if let Err(e) = run(cli.command).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run(command: Command) -> Result<()> {
    match command {
        Command::Sync {
            couch_url,
            dbname,
            solr_url,
            since,
            all_docs,
        } => {
            let config = SyncConfig::from_env()?;
            let client = build_client(config.fetch.http_timeout())?;

            let feed = CouchChangeFeed::new(client.clone(), &couch_url, &dbname);
            let index = SolrIndex::new(client, &solr_url);
            let backend = config
                .checkpoint
                .connect()
                .await
                .context("Failed to connect checkpoint storage")?;

            let engine = SyncEngine::new(feed, index, CheckpointStore::new(backend), &config.scope)
                .with_concurrency(config.concurrency);
            let options = SyncOptions {
                since,
                full_reindex: all_docs,
            };

            let report = engine.run(&options).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        },
        Command::Fetch { source } => {
            let config = FetchConfig::from_env()?;
            let client = build_client(config.http_timeout())?;

            let (mut fetcher, output): (Box<dyn Fetcher>, PathBuf) = match source {
                FetchSource::Solr {
                    url,
                    query,
                    cursor: true,
                    page_size,
                    output,
                } => {
                    let source = SolrCursorSource::new(client, &url, query).with_rows(page_size);
                    (Box::new(CursorFetcher::new(source).await?), output)
                },
                FetchSource::Solr {
                    url,
                    query,
                    page_size,
                    output,
                    ..
                } => {
                    let source = SolrPageSource::new(client, &url, query);
                    (Box::new(PagedFetcher::new(source, page_size).await?), output)
                },
                FetchSource::Flickr {
                    user_id,
                    page_size,
                    output,
                } => {
                    let source = FlickrPhotoSource::new(client, config.flickr_api_key, user_id);
                    (Box::new(PagedFetcher::new(source, page_size).await?), output)
                },
                FetchSource::Emuseum {
                    url,
                    page_size,
                    output,
                } => {
                    let source = EMuseumSource::new(client, &url);
                    (Box::new(PagedFetcher::new(source, page_size).await?), output)
                },
            };

            info!(total = fetcher.state().reported_total, "Harvest started");
            let written = write_jsonl(fetcher.as_mut(), &output).await?;
            println!("{} records written to {}", written, output.display());
        },
    }
    Ok(())
}

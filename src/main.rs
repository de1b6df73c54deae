use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use anime_search::api::{self, AppState};
use anime_search::config::Config;
use anime_search::error::Result;
use anime_search::logging;
use anime_search::preprocess;
use anime_search::query::{clamp_limit, clamp_offset, parse_exclude_list, validate_query};
use anime_search::search::SearchService;

#[derive(Parser)]
#[command(name = "anime-search")]
#[command(about = "Natural-language anime search service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP search service
    Serve {
        /// Bind host (overrides HOST)
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides PORT)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Build the embeddings file from a source dataset
    Preprocess {
        /// Source dataset: a JSON array of catalog records
        #[arg(short, long, default_value = "anime_clean.json")]
        input: PathBuf,

        /// Output embeddings file (overrides EMBEDDINGS_FILE)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a single query from the command line
    Search {
        /// Search query
        query: String,

        /// Comma-separated exclusion list
        #[arg(short, long)]
        exclude: Option<String>,

        /// Number of results to return
        #[arg(short = 'n', long, default_value = "5")]
        limit: i64,

        /// Number of ranked results to skip
        #[arg(long, default_value = "0")]
        offset: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    logging::init(&config)?;

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            serve(config).await
        }

        Commands::Preprocess { input, output } => {
            let output = output.unwrap_or_else(|| config.embeddings_file.clone());
            let embedder =
                anime_search::embedding::Embedder::load(config.model_type.clone())?;
            let summary = preprocess::run(&input, &output, &embedder, config.embed_batch_size)?;
            println!(
                "Embedded {}/{} rows ({} dropped), dimension {}, saved to {}",
                summary.embedded_rows,
                summary.total_rows,
                summary.dropped_rows,
                summary.dimension,
                output.display()
            );
            Ok(())
        }

        Commands::Search {
            query,
            exclude,
            limit,
            offset,
        } => {
            let query = validate_query(Some(query.as_str()), config.max_query_length)?;
            let exclude = parse_exclude_list(exclude.as_deref().unwrap_or(""));
            let limit = clamp_limit(limit, config.max_limit);
            let offset = clamp_offset(offset);

            let service = SearchService::from_config(&config)?;
            let page = service.search(&query, &exclude, limit, offset)?;

            if page.results.is_empty() {
                println!("No anime found matching your query.");
                return Ok(());
            }
            for (rank, item) in page.results.iter().enumerate() {
                println!(
                    "{:>3}. {:<60} {:.4}",
                    offset + rank + 1,
                    item.title,
                    item.score
                );
            }
            println!("({} of {} accumulated results)", page.results.len(), page.total);
            Ok(())
        }
    }
}

async fn serve(config: Config) -> Result<()> {
    let service = match SearchService::from_config(&config) {
        Ok(service) => {
            info!(total_anime = service.catalog_len(), "resources loaded, system ready");
            Some(service)
        }
        Err(err) => {
            // Serve anyway: /health reports unhealthy and /search answers
            // 503 until the process is restarted with good resources.
            error!(error = %err, "failed to load resources, serving unhealthy");
            None
        }
    };

    let addr = format!("{}:{}", config.host, config.port);
    let app = api::router(Arc::new(AppState { config, service }));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

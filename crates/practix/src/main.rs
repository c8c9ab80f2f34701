//! practix - practice catalog server and terminal browser

mod cli;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use practix_core::watcher::WatcherConfig;
use practix_core::{
    invalidation, CorpusStore, FileWatcher, PractixConfig, QueryService, SqliteSharedTier,
    SyntheticCorpus,
};
use practix_tui::client::{ListRequest, SearchRequest};
use practix_tui::{CatalogClient, HttpCatalogClient, LocalCatalogClient};
use practix_types::{ListFilters, SearchFilters, SortSpec, UserId};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "practix",
    version,
    about = "Practice catalog server and terminal browser",
    long_about = "Serves a catalog of practice items grouped into categories, with cached\n\
                  overviews, paginated listings and search, and browses it in a terminal UI.\n\
                  \n\
                  Examples:\n\
                    practix --demo 551                     # Browse a generated catalog (TUI)\n\
                    practix --corpus ./corpus serve        # JSON API on port 3333\n\
                    practix --server http://localhost:3333 # Browse a running server\n\
                    practix --corpus ./corpus list graphs --sort title\n\
                    practix --corpus ./corpus search \"two pointers\" -d easy\n\
                  \n\
                  Environment Variables:\n\
                    PRACTIX_CONFIG                         # TOML config file\n\
                    PRACTIX_CORPUS                         # Corpus directory\n\
                    PRACTIX_SHARED_CACHE                   # Shared cache file (SQLite)\n\
                    PRACTIX_SERVER                         # Server URL for tui/list/search\n\
                    PRACTIX_PORT                           # Port for serve\n\
                    PRACTIX_NO_COLOR                       # Disable ANSI colors\n\
                    RUST_LOG                               # Log filter (default practix=info)"
)]
struct Cli {
    #[command(subcommand)]
    mode: Option<Mode>,

    /// Config file (TOML); defaults apply to anything it leaves out
    #[arg(long, env = "PRACTIX_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Corpus directory holding categories.json and the item files
    #[arg(long, env = "PRACTIX_CORPUS", global = true)]
    corpus: Option<PathBuf>,

    /// Use a generated catalog of N items instead of a corpus
    #[arg(long, value_name = "N", global = true, conflicts_with = "corpus")]
    demo: Option<usize>,

    /// Shared cache file, overrides cache.shared_path
    #[arg(long, env = "PRACTIX_SHARED_CACHE", global = true)]
    shared: Option<PathBuf>,

    /// Read from a running server instead of a local catalog
    #[arg(long, env = "PRACTIX_SERVER", global = true)]
    server: Option<String>,

    /// Disable ANSI colors (log-friendly)
    #[arg(long, env = "PRACTIX_NO_COLOR", global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Mode {
    /// Browse the catalog in the terminal (default)
    Tui {
        /// Show mastery for this user
        #[arg(long, env = "PRACTIX_USER")]
        user: Option<String>,
    },
    /// Serve the JSON API
    Serve {
        /// Port for the web server
        #[arg(long, short, env = "PRACTIX_PORT", default_value = "3333")]
        port: u16,
        /// Do not reload the corpus when its files change
        #[arg(long)]
        no_watch: bool,
    },
    /// Print the category overview
    Overview {
        /// Add the mastery overlay for this user
        #[arg(long)]
        user: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print one page of a category
    List {
        /// Category id
        category: String,
        /// Difficulty filter: easy, medium, hard
        #[arg(long, short = 'd')]
        difficulty: Option<String>,
        /// Sort field: quality, relevance, difficulty, title
        #[arg(long, short = 's')]
        sort: Option<String>,
        /// Sort order: asc, desc
        #[arg(long, short = 'o')]
        order: Option<String>,
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long)]
        page_size: Option<u32>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search item titles and tags
    Search {
        query: String,
        /// Difficulty filter: easy, medium, hard
        #[arg(long, short = 'd')]
        difficulty: Option<String>,
        /// Restrict to one category
        #[arg(long, short = 'c')]
        category: Option<String>,
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long)]
        page_size: Option<u32>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove every entry from the shared cache file
    ClearCache,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mode = cli.mode.unwrap_or(Mode::Tui { user: None });

    init_logging(matches!(mode, Mode::Tui { .. }), cli.no_color)?;

    let mut config = PractixConfig::load(cli.config.as_deref())?;
    if let Some(shared) = &cli.shared {
        config.cache.shared_path = Some(shared.clone());
    }

    let catalog = CatalogArgs {
        corpus: cli.corpus,
        demo: cli.demo,
        server: cli.server,
    };
    let no_color = cli.no_color;

    match mode {
        Mode::Tui { user } => run_tui(catalog, config, user).await,
        Mode::Serve { port, no_watch } => run_serve(catalog, config, port, !no_watch).await,
        Mode::Overview { user, json } => {
            run_overview(catalog, config, user, json, no_color).await
        }
        Mode::List {
            category,
            difficulty,
            sort,
            order,
            page,
            page_size,
            json,
        } => {
            let request = ListRequest {
                category: category.into(),
                filters: ListFilters::parse(difficulty.as_deref())?,
                sort: SortSpec::parse(sort.as_deref(), order.as_deref())?,
                page,
                page_size: page_size.unwrap_or(config.query.default_page_size),
            };
            let client = catalog_client(&catalog, &config).await?;
            let page = client.list(request).await?;
            println!("{}", cli::format_page(&page, json, no_color));
            Ok(())
        }
        Mode::Search {
            query,
            difficulty,
            category,
            page,
            page_size,
            json,
        } => {
            let request = SearchRequest {
                query: query.clone(),
                filters: SearchFilters::parse(difficulty.as_deref(), category.as_deref())?,
                page,
                page_size: page_size.unwrap_or(config.query.default_page_size),
            };
            let client = catalog_client(&catalog, &config).await?;
            let results = client.search(request).await?;
            if results.total_matching == 0 && !json {
                return Err(cli::CliError::NoResults { query }.into());
            }
            println!("{}", cli::format_page(&results, json, no_color));
            Ok(())
        }
        Mode::ClearCache => run_clear_cache(&config),
    }
}

/// Where the catalog comes from
struct CatalogArgs {
    corpus: Option<PathBuf>,
    demo: Option<usize>,
    server: Option<String>,
}

/// `RUST_LOG` filter, default `practix=info`; the TUI logs to a file so the
/// terminal stays clean
fn init_logging(tui: bool, no_color: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "practix=info".into()),
    );

    if tui {
        let dir = dirs::cache_dir()
            .map(|d| d.join("practix"))
            .context("Could not determine cache directory")?;
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
        let path = dir.join("practix.log");
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file)),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(!no_color)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
    Ok(())
}

/// Build the query service over a corpus directory or a generated catalog
async fn build_service(
    catalog: &CatalogArgs,
    config: &PractixConfig,
) -> Result<(Arc<QueryService>, Option<PathBuf>)> {
    let (store, watch_dir) = if let Some(total) = catalog.demo {
        let snapshot = SyntheticCorpus::demo(total)
            .build()
            .context("Failed to generate demo catalog")?;
        info!(items = total, "Generated demo catalog");
        (CorpusStore::from_snapshot(snapshot), None)
    } else {
        let root = catalog.corpus.clone().ok_or(cli::CliError::NoCatalog)?;
        let (store, report) = CorpusStore::open(&root).await;

        if report.has_fatal_errors() {
            let details: Vec<String> = report
                .errors
                .iter()
                .map(|e| format!("  - {}: {}", e.source, e.message))
                .collect();
            anyhow::bail!(
                "Failed to load corpus at {}:\n{}",
                root.display(),
                details.join("\n")
            );
        }
        for error in &report.errors {
            warn!(source = %error.source, "{}", error.message);
        }
        info!(
            categories = report.categories_loaded,
            items = report.items_loaded,
            skipped = report.items_skipped,
            "Corpus loaded"
        );
        (store, Some(root))
    };

    let mut builder = QueryService::for_corpus(Arc::new(store)).config(config.clone());
    if let Some(path) = &config.cache.shared_path {
        let shared = SqliteSharedTier::open(path)
            .with_context(|| format!("Failed to open shared cache: {}", path.display()))?;
        builder = builder.shared_tier(Arc::new(shared));
    }

    Ok((Arc::new(builder.build()), watch_dir))
}

async fn catalog_client(
    catalog: &CatalogArgs,
    config: &PractixConfig,
) -> Result<Arc<dyn CatalogClient>> {
    if let Some(url) = &catalog.server {
        return Ok(Arc::new(HttpCatalogClient::new(url.as_str())?));
    }
    let (service, _) = build_service(catalog, config).await?;
    Ok(Arc::new(LocalCatalogClient::new(service)))
}

async fn start_watcher(service: &Arc<QueryService>, dir: PathBuf) -> Result<FileWatcher> {
    FileWatcher::start(dir, Arc::clone(service), WatcherConfig::default())
        .await
        .context("Failed to start file watcher")
}

async fn run_tui(catalog: CatalogArgs, config: PractixConfig, user: Option<String>) -> Result<()> {
    let user = user.map(UserId::from);

    if let Some(url) = &catalog.server {
        let client = HttpCatalogClient::new(url.as_str())?;
        info!(server = %client.base_url(), "Browsing remote catalog");
        return practix_tui::run(Arc::new(client), config.client, user).await;
    }

    let (service, watch_dir) = build_service(&catalog, &config).await?;
    let listener = invalidation::spawn_listener(Arc::clone(&service));
    let _watcher = match watch_dir {
        Some(dir) => Some(start_watcher(&service, dir).await?),
        None => None,
    };

    let client = Arc::new(LocalCatalogClient::new(service));
    let result = practix_tui::run(client, config.client, user).await;
    listener.abort();
    result
}

async fn run_serve(
    catalog: CatalogArgs,
    config: PractixConfig,
    port: u16,
    watch: bool,
) -> Result<()> {
    use indicatif::{ProgressBar, ProgressStyle};
    use std::time::Instant;

    let start = Instant::now();

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")?
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));

    spinner.set_message("Loading catalog...");
    let (service, watch_dir) = match build_service(&catalog, &config).await {
        Ok(built) => built,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e);
        }
    };

    let _listener = invalidation::spawn_listener(Arc::clone(&service));

    let _watcher = match watch_dir.filter(|_| watch) {
        Some(dir) => {
            spinner.set_message("Starting file watcher...");
            Some(start_watcher(&service, dir).await?)
        }
        None => None,
    };

    let health = service.health();
    spinner.finish_with_message(format!(
        "✓ Ready in {:.2}s ({} categories, {} items, corpus {})",
        start.elapsed().as_secs_f64(),
        health.categories,
        health.items,
        health.corpus
    ));
    println!("\nAPI: http://localhost:{}/api/categories", port);

    practix_web::run(service, port).await
}

async fn run_overview(
    catalog: CatalogArgs,
    config: PractixConfig,
    user: Option<String>,
    json: bool,
    no_color: bool,
) -> Result<()> {
    let client = catalog_client(&catalog, &config).await?;
    let categories = client.overview().await?;
    let mastery = match user {
        Some(user) => Some(client.mastery(UserId::from(user)).await?),
        None => None,
    };

    println!(
        "{}",
        cli::format_overview(&categories, mastery.as_deref(), json, no_color)
    );
    Ok(())
}

fn run_clear_cache(config: &PractixConfig) -> Result<()> {
    let Some(path) = config.cache.shared_path.as_deref() else {
        println!("No shared cache configured (set --shared or cache.shared_path).");
        return Ok(());
    };

    if !path.exists() {
        println!("❌ Cache not found at: {}", path.display());
        println!("   Nothing to clear.");
        return Ok(());
    }

    let size_bytes = file_size(path)?;
    let shared = SqliteSharedTier::open(path)
        .with_context(|| format!("Failed to open shared cache: {}", path.display()))?;
    let removed = shared
        .clear()
        .with_context(|| format!("Failed to clear shared cache: {}", path.display()))?;

    println!("✅ Cache cleared successfully");
    println!("   Location: {}", path.display());
    println!("   Entries removed: {}", removed);
    println!("   File size: {}", cli::format_size(size_bytes));
    Ok(())
}

fn file_size(path: &Path) -> Result<u64> {
    Ok(std::fs::metadata(path)
        .with_context(|| format!("Failed to read cache metadata: {}", path.display()))?
        .len())
}

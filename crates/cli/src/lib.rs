use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use config::{Overrides, Settings};
use flags::{ArtifactFlag, CompressionFlag};
use simrec_engine::{recommend, RecommendError};
use simrec_ingest::{encode, load_artifact, ArtifactKind, Compression, Fetcher, SourceSpec};
use simrec_protocol::{
    serialize_json, RecommendResponse, TitlesResponse, PROTOCOL_SCHEMA_VERSION,
};
use simrec_store::{load_store, Catalog, LoadError, SimilarityTable, Store};
use std::fs;
use std::io;
use std::path::PathBuf;

mod config;
mod flags;
mod http_api;
mod report;
mod server_security;

const EXIT_FAILURE: i32 = 1;
const EXIT_ITEM_NOT_FOUND: i32 = 2;

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "simrec")]
#[command(about = "Content-based recommendations from a precomputed similarity table", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,

    /// Config file (env: SIMREC_CONFIG, default: ./simrec.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Catalog source: path, http(s) URL, gdrive:<id> or a Drive share link
    #[arg(long, global = true)]
    catalog: Option<String>,

    /// Similarity table source: path, http(s) URL, gdrive:<id> or a Drive share link
    #[arg(long, global = true)]
    similarity: Option<String>,

    /// Gzip handling for fetched artifacts
    #[arg(long, global = true, value_enum)]
    compression: Option<CompressionFlag>,

    /// Default number of recommendations (env: SIMREC_TOP_K)
    #[arg(long, global = true)]
    top_k: Option<usize>,

    /// Per-fetch timeout in seconds
    #[arg(long, global = true)]
    fetch_timeout_secs: Option<u64>,

    /// Directory for cached Drive downloads
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Recommend the items most similar to a title
    Recommend(RecommendArgs),

    /// List catalog titles in index order
    Titles(TitlesArgs),

    /// Load and validate both artifacts
    Check(CheckArgs),

    /// Decode an artifact and write it back as JSON (optionally gzip-wrapped)
    Pack(PackArgs),

    /// Serve recommendations over HTTP
    ServeHttp(ServeArgs),
}

#[derive(Args)]
struct RecommendArgs {
    /// Exact catalog title (case-sensitive)
    title: String,

    /// Number of recommendations (default: --top-k, then the configured top_k, then 5)
    #[arg(short, long)]
    k: Option<usize>,

    /// Output JSON format
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct TitlesArgs {
    /// Output JSON format
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct CheckArgs {
    /// Output JSON format
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct PackArgs {
    /// Artifact source to read (same forms as --catalog)
    input: String,

    /// Destination file
    output: PathBuf,

    /// Which artifact the input holds
    #[arg(long, value_enum, default_value_t = ArtifactFlag::Similarity)]
    kind: ArtifactFlag,

    /// Gzip-wrap the output
    #[arg(long)]
    gzip: bool,
}

#[derive(Args)]
struct ServeArgs {
    /// Bind address, e.g. 127.0.0.1:7878
    #[arg(long, default_value = "127.0.0.1:7878")]
    bind: String,

    /// Allow binding to non-loopback addresses
    #[arg(long)]
    public: bool,
}

pub async fn main_entry() -> Result<()> {
    let mut cli = Cli::parse();

    // JSON output keeps stdout clean, so logs drop to warnings.
    let json_output = match &cli.command {
        Commands::Recommend(args) => args.json,
        Commands::Titles(args) => args.json,
        Commands::Check(args) => args.json,
        _ => false,
    };
    if json_output {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let overrides = Overrides {
        config: cli.config.clone(),
        catalog: cli.catalog.clone(),
        similarity: cli.similarity.clone(),
        compression: cli.compression.map(CompressionFlag::as_domain),
        top_k: cli.top_k,
        fetch_timeout_secs: cli.fetch_timeout_secs,
        cache_dir: cli.cache_dir.clone(),
    };
    let settings = config::resolve(&overrides, |key| std::env::var(key).ok())?;

    match cli.command {
        Commands::Recommend(args) => run_recommend(args, settings).await?,
        Commands::Titles(args) => run_titles(args, settings).await?,
        Commands::Check(args) => run_check(args, settings).await?,
        Commands::Pack(args) => run_pack(args, settings).await?,
        Commands::ServeHttp(args) => {
            http_api::serve_http(&args.bind, args.public, settings).await?
        }
    }

    Ok(())
}

/// Loads the store; with `json` a load failure is printed as an envelope and the process exits.
async fn load_or_exit(settings: &Settings, json: bool) -> Result<Store> {
    let fetcher = Fetcher::new(settings.fetch.clone())?;
    match load_store(&fetcher, &settings.load).await {
        Ok(store) => Ok(store),
        Err(err) if json => {
            print_stdout(&serialize_json(&report::load_error(&err))?)?;
            std::process::exit(EXIT_FAILURE);
        }
        Err(err) => Err(describe_load_error(err)),
    }
}

pub(crate) fn describe_load_error(err: LoadError) -> anyhow::Error {
    let hint = report::load_error(&err).hint.unwrap_or_default();
    anyhow::Error::new(err).context(format!("Failed to load the recommendation store. {hint}"))
}

async fn run_recommend(args: RecommendArgs, settings: Settings) -> Result<()> {
    let store = load_or_exit(&settings, args.json).await?;
    let k = args.k.unwrap_or(settings.top_k);

    let (response, exit_code) = match recommend(&store, &args.title, k) {
        Ok(recs) => (report::recommend_response(&args.title, k, &recs), None),
        Err(err) => {
            let code = match err {
                RecommendError::ItemNotFound { .. } => EXIT_ITEM_NOT_FOUND,
                RecommendError::MissingSimilarityRow { .. } => EXIT_FAILURE,
            };
            let envelope = report::request_error(&err);
            (
                RecommendResponse::error(args.title.clone(), k, envelope),
                Some(code),
            )
        }
    };

    if args.json {
        print_stdout(&serialize_json(&response)?)?;
    } else if exit_code.is_some() {
        eprintln!("{}", report::render_recommendations(&response));
    } else {
        print_stdout(&report::render_recommendations(&response))?;
    }

    if let Some(code) = exit_code {
        std::process::exit(code);
    }
    Ok(())
}

async fn run_titles(args: TitlesArgs, settings: Settings) -> Result<()> {
    let store = load_or_exit(&settings, args.json).await?;
    if args.json {
        let response = TitlesResponse {
            schema_version: PROTOCOL_SCHEMA_VERSION,
            titles: store.titles().map(str::to_string).collect(),
        };
        print_stdout(&serialize_json(&response)?)?;
    } else {
        for title in store.titles() {
            print_stdout(title)?;
        }
    }
    Ok(())
}

async fn run_check(args: CheckArgs, settings: Settings) -> Result<()> {
    let store = load_or_exit(&settings, args.json).await?;
    let summary = report::store_summary(&store);
    if args.json {
        print_stdout(&serialize_json(&summary)?)?;
    } else {
        print_stdout(&format!(
            "ok: {} items, {} similarity table with {} rows",
            summary.catalog_len, summary.similarity_layout, summary.similarity_rows
        ))?;
        if summary.duplicate_titles > 0 {
            print_stdout(&format!(
                "note: {} duplicate titles resolve to their first occurrence",
                summary.duplicate_titles
            ))?;
        }
    }
    Ok(())
}

async fn run_pack(args: PackArgs, settings: Settings) -> Result<()> {
    let source: SourceSpec = args
        .input
        .parse()
        .with_context(|| format!("Invalid input source '{}'", args.input))?;
    let fetcher = Fetcher::new(settings.fetch.clone())?;
    let artifact = args.kind.as_domain();
    let mode = if args.gzip {
        Compression::Yes
    } else {
        Compression::No
    };
    let compression = settings.load.compression;
    let max_bytes = settings.load.max_decoded_bytes;

    let bytes = match artifact {
        ArtifactKind::Catalog => {
            let catalog: Catalog =
                load_artifact(&fetcher, &source, artifact, compression, max_bytes).await?;
            log::info!("Decoded catalog with {} items", catalog.len());
            encode(&catalog, mode)?
        }
        ArtifactKind::Similarity => {
            let table: SimilarityTable =
                load_artifact(&fetcher, &source, artifact, compression, max_bytes).await?;
            log::info!(
                "Decoded {} similarity table with {} rows",
                table.layout(),
                table.row_count()
            );
            encode(&table, mode)?
        }
    };

    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(&args.output, &bytes)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    print_stdout(&format!(
        "Packed {artifact} into {} ({} bytes, {})",
        args.output.display(),
        bytes.len(),
        mode
    ))?;
    Ok(())
}

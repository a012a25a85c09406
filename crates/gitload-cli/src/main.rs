use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use gitload_backend_github::GitHubApi;
use gitload_common::config::{PublisherConfig, TickConfig, GARAGE_TICK_URL, REVIEW_LAB_TICK_URL};
use gitload_common::Token;
use gitload_core::tick::run_tick;
use gitload_core::{PublishSettings, Publisher};
use gitload_fake::{FakeConfig, FakeState};
use opentelemetry_otlp::WithExportConfig;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "gitload", version, about = "Synthetic load for Git hosting APIs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create many blobs, then one tree and one commit per batch
    PostLots(PostLotsArgs),
    /// Clone, commit tick.txt on a branch, push
    Tick(TickArgs),
    /// Serve an in-memory Git Data API for dry runs
    ServeFake(ServeFakeArgs),
    Version,
}

#[derive(Args, Debug)]
struct PostLotsArgs {
    /// Number of blobs to create
    #[arg(short = 'n', long)]
    count: Option<usize>,
    /// Blobs per tree
    #[arg(short, long)]
    batch_size: Option<usize>,
    /// Upper bound on concurrent create-blob requests
    #[arg(short = 'j', long)]
    max_in_flight: Option<usize>,
    #[arg(long)]
    api_url: Option<String>,
    /// Target repository as owner/repo
    #[arg(long)]
    repo: Option<String>,
    /// Print prometheus counters to stderr when done
    #[arg(long)]
    dump_metrics: bool,
}

impl PostLotsArgs {
    fn apply(&self, cfg: &mut PublisherConfig) -> anyhow::Result<()> {
        if let Some(v) = self.count { cfg.object_count = v; }
        if let Some(v) = self.batch_size { cfg.batch_size = v; }
        if let Some(v) = self.max_in_flight { cfg.max_in_flight = v; }
        if let Some(v) = &self.api_url { cfg.api_url = v.clone(); }
        if let Some(slug) = &self.repo {
            let Some((owner, repo)) = slug.split_once('/') else {
                bail!("--repo must look like owner/repo, got {:?}", slug);
            };
            cfg.owner = owner.to_string();
            cfg.repo = repo.to_string();
        }
        Ok(())
    }
}

#[derive(Args, Debug)]
struct TickArgs {
    /// Show push progress
    #[arg(short, long)]
    progress: bool,
    /// Progress plus verbose HTTP tracing from git
    #[arg(short, long)]
    verbose: bool,
    #[arg(short, long, conflicts_with_all = ["garage", "url"])]
    review_lab: bool,
    #[arg(short, long, conflicts_with = "url")]
    garage: bool,
    #[arg(short, long)]
    url: Option<String>,
    #[arg(long)]
    branch: Option<String>,
    #[arg(long)]
    user: Option<String>,
}

impl TickArgs {
    fn into_config(self) -> TickConfig {
        let mut cfg = TickConfig::default();
        if self.review_lab { cfg.url = REVIEW_LAB_TICK_URL.into(); }
        if self.garage { cfg.url = GARAGE_TICK_URL.into(); }
        if let Some(url) = self.url { cfg.url = url; }
        if let Some(branch) = self.branch { cfg.branch = branch; }
        if let Some(user) = self.user { cfg.user = user; }
        cfg.show_progress = self.progress || self.verbose;
        cfg.verbose = self.verbose;
        cfg
    }
}

#[derive(Args, Debug)]
struct ServeFakeArgs {
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: String,
    /// Answer the first N blob requests with 500
    #[arg(long, default_value_t = 0)]
    fail_first_blobs: usize,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::PostLots(args) => post_lots(args).await,
        Commands::Tick(args) => tick(args).await,
        Commands::ServeFake(args) => serve_fake(args).await,
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn post_lots(args: PostLotsArgs) -> anyhow::Result<()> {
    let token = Token::discover()?;
    let mut cfg = PublisherConfig::load()?;
    args.apply(&mut cfg)?;
    cfg.validate()?;
    gitload_obs::init();

    let api = GitHubApi::new(&cfg, token)?;
    tracing::info!(target: "cli", "publishing to {}", api.base_url());
    println!("posting {} new objects...", cfg.object_count);

    let summary = Publisher::new(Arc::new(api), PublishSettings::from(&cfg)).run().await;
    println!("{}", summary);
    if args.dump_metrics {
        eprint!("{}", gitload_obs::render());
    }
    Ok(())
}

async fn tick(args: TickArgs) -> anyhow::Result<()> {
    let cfg = args.into_config();
    let token = Token::discover().ok();
    if token.is_none() {
        tracing::warn!(target: "cli", "no token found; pushing without credentials");
    }
    tracing::info!(target: "cli", "pushing to {}", cfg.url);
    let commit = run_tick(&cfg, token.as_ref()).await?;
    println!("{}", commit);
    Ok(())
}

async fn serve_fake(args: ServeFakeArgs) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("binding {}", args.bind))?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    let state = FakeState::new(FakeConfig { fail_first_blobs: args.fail_first_blobs, ..Default::default() });
    gitload_fake::serve(listener, state).await?;
    Ok(())
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    );
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    if let Ok(endpoint) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic().with_endpoint(endpoint))
            .install_simple()
            .ok();
        if let Some(tracer) = tracer {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .with(OpenTelemetryLayer::new(tracer))
                .init();
            return;
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

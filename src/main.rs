//! # Vaultwright Command Line
//!
//! Loads a template pool, runs one generation pass and prints the outcome as
//! JSON.

use clap::Parser;
use log::{error, info, warn};
use serde::Serialize;
use std::path::PathBuf;
use vaultwright::{
    EngineConfig, GenerationConfig, GenerationContext, GenerationPass, PassOutcome,
    PlacementRequest, PlacementScheduler, Region, Selector, TemplateFailure, TemplatePool,
    VaultResult,
};

/// Command line arguments for the Vaultwright placement tool.
#[derive(Parser, Debug)]
#[command(name = "vaultwright")]
#[command(about = "Resolve and place roguelike vault templates from a JSON pool")]
#[command(version)]
struct Args {
    /// JSON file holding the template records
    #[arg(short, long)]
    pool: PathBuf,

    /// JSON engine configuration (defaults apply when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Random seed for the pass
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Depth within the branch
    #[arg(short, long, default_value_t = 1)]
    depth: i32,

    /// Branch name
    #[arg(short, long, default_value = "D")]
    branch: String,

    /// Context tag to activate (repeatable)
    #[arg(long = "tag")]
    tags: Vec<String>,

    /// Context parameter as NAME=VALUE (repeatable)
    #[arg(long = "param", value_parser = parse_param)]
    params: Vec<(String, String)>,

    /// Template tag to select, or `name:<template>` for one template by name
    #[arg(long)]
    select: Option<String>,

    /// Number of placements to request
    #[arg(short, long, default_value_t = 1)]
    count: u32,

    /// Run the shop-count policy instead of a plain request
    #[arg(long)]
    shops: bool,

    /// Region width (unbounded when omitted)
    #[arg(long)]
    width: Option<usize>,

    /// Region height (unbounded when omitted)
    #[arg(long)]
    height: Option<usize>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// What the tool prints.
#[derive(Serialize)]
struct Report {
    load_failures: Vec<TemplateFailure>,
    outcome: PassOutcome,
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", raw))
}

fn main() {
    let args = Args::parse();
    initialize_logging(&args.log_level);

    if let Err(error) = run(&args) {
        error!("Generation failed: {}", error);
        std::process::exit(1);
    }
}

/// Initializes the logging system based on the specified log level.
fn initialize_logging(log_level: &str) {
    #[cfg(feature = "dev-tools")]
    {
        use tracing::Level;

        let level = match log_level.to_lowercase().as_str() {
            "error" => Level::ERROR,
            "warn" => Level::WARN,
            "info" => Level::INFO,
            "debug" => Level::DEBUG,
            "trace" => Level::TRACE,
            _ => Level::INFO,
        };

        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    #[cfg(not(feature = "dev-tools"))]
    {
        env_logger::Builder::new()
            .parse_filters(log_level)
            .target(env_logger::Target::Stderr)
            .init();
    }
}

fn run(args: &Args) -> VaultResult<()> {
    info!("Starting Vaultwright v{}", vaultwright::VERSION);

    let engine = match &args.config {
        Some(path) => EngineConfig::from_path(path)?,
        None => EngineConfig::default(),
    };
    let (pool, load_failures) = TemplatePool::from_path(&args.pool, &engine)?;
    if pool.is_empty() {
        warn!("Template pool {} holds no usable templates", args.pool.display());
    }

    let mut context = GenerationContext::new(args.depth, args.branch.as_str());
    for tag in &args.tags {
        context = context.with_tag(tag.clone());
    }
    for (name, value) in &args.params {
        context = context.with_param(name.clone(), value.clone());
    }

    let region = match (args.width, args.height) {
        (None, None) => Region::unbounded("level"),
        (width, height) => Region::new(
            "level",
            width.unwrap_or(usize::MAX),
            height.unwrap_or(usize::MAX),
        ),
    };

    let scheduler = PlacementScheduler::new(&pool, &engine);
    let mut pass = GenerationPass::new(&scheduler, context, &GenerationConfig::new(args.seed))?;

    if args.shops {
        pass.schedule_shops(&region)?;
    } else {
        let selector = match args.select.as_deref() {
            None => Selector::Any,
            Some(raw) => match raw.strip_prefix("name:") {
                Some(name) => Selector::Name(name.to_string()),
                None => Selector::Tag(raw.to_string()),
            },
        };
        let request = PlacementRequest {
            selector,
            count: args.count,
            region,
            chance: None,
        };
        pass.schedule(&request)?;
    }

    let report = Report {
        load_failures,
        outcome: pass.finish(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

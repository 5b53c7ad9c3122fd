use anyhow::{Context, Result};
use tracing::level_filters::LevelFilter;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use engine::{DiscoveryConfig, Pipeline};

use crate::args::ScanArgs;
use crate::config::resolve_config;
use crate::output::{self, BootstrapReport, Format, ScanReport};
use crate::ui;

fn init_logging(args: &ScanArgs) {
    let level = if args.quiet {
        LevelFilter::OFF
    } else if args.debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false);
    if !args.quiet && std::env::var_os("RUST_LOG").is_some() {
        builder.with_env_filter(EnvFilter::from_default_env()).init();
    } else {
        builder.with_max_level(level).init();
    }
    if args.debug && !args.quiet {
        debug!("Debug mode enabled");
    }
}

fn prepare(args: &ScanArgs) -> Result<Pipeline> {
    init_logging(args);
    let cfg: DiscoveryConfig = resolve_config(args).context("failed to load configuration")?;
    if args.format == Format::Text && !args.quiet {
        ui::print_header();
    }
    info!(
        dir = %cfg.plugin_dir.display(),
        nested_dir = %cfg.nested_dir().display(),
        threads = cfg.thread_count(),
        "Discovery started"
    );
    Pipeline::new(cfg).context("failed to prepare discovery")
}

pub fn run_scan(args: ScanArgs) -> Result<()> {
    let pipeline = prepare(&args)?;
    let outcome = pipeline
        .run()
        .with_context(|| format!("discovery failed in {}", args.dir.display()))?;
    info!(activated = outcome.activation.len(), "Discovery completed");
    output::print_scan(&ScanReport::from_outcome(&outcome), args.format)
}

pub fn run_bootstrap(args: ScanArgs) -> Result<()> {
    let pipeline = prepare(&args)?;
    let outcome = pipeline
        .bootstrap()
        .with_context(|| format!("bootstrap pass failed in {}", args.dir.display()))?;
    info!(activated = outcome.activated.len(), "Bootstrap completed");
    output::print_bootstrap(&BootstrapReport::from_outcome(&outcome), args.format)
}

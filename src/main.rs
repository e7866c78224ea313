// Command-line runner: streams a JSON-lines thermal recording through the monitor.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use thermal_sentry::config::{MonitorConfig, load_config};
use thermal_sentry::core_modules::display::DashboardDisplay;
use thermal_sentry::core_modules::frame_source::JsonLinesSource;
use thermal_sentry::core_modules::renderer::CompositeRenderer;
use thermal_sentry::core_modules::scene_analyzer::SceneAnalyzer;
use thermal_sentry::core_modules::vision_service::OpenAiVisionClient;
use thermal_sentry::pipeline::CycleDriver;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "thermal_sentry",
    version,
    about = "Watch a thermal frame stream for hot spots and ask a vision model what it sees"
)]
struct Args {
    /// JSON-lines file, one `{"image": [[...], ...]}` record per line.
    input: PathBuf,

    /// TOML configuration file. CLI flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for collages, frame images and analysis summaries.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Number of frames in the sliding window.
    #[arg(long)]
    window: Option<usize>,

    /// Admit only every k-th record.
    #[arg(long)]
    decimation: Option<usize>,

    /// Fire threshold in the sensor's native units.
    #[arg(long)]
    threshold: Option<f64>,

    /// Pause between cycles in milliseconds.
    #[arg(long)]
    pacing_ms: Option<u64>,

    /// Fill the window before the first rendered cycle.
    #[arg(long)]
    prefill: bool,

    /// Wait for Ctrl-C after the source drains.
    #[arg(long)]
    hold: bool,

    /// Skip the vision service entirely.
    #[arg(long)]
    no_analysis: bool,

    /// Debug-level logging.
    #[arg(long, short)]
    verbose: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = load_config(args.config.as_deref()).context("failed to load configuration")?;
    apply_overrides(&mut config, &args);
    config.validate().context("invalid configuration")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(monitor(config, args.input))
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose {
        "thermal_sentry=debug"
    } else {
        "thermal_sentry=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn apply_overrides(config: &mut MonitorConfig, args: &Args) {
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(window) = args.window {
        config.window_capacity = window;
    }
    if let Some(decimation) = args.decimation {
        config.decimation = decimation;
    }
    if let Some(threshold) = args.threshold {
        config.fire_threshold = threshold;
    }
    if let Some(pacing_ms) = args.pacing_ms {
        config.pacing_ms = pacing_ms;
    }
    config.prefill_window |= args.prefill;
    config.hold_on_drain |= args.hold;
    if args.no_analysis {
        config.analysis.enabled = false;
    }
}

async fn monitor(config: MonitorConfig, input: PathBuf) -> Result<()> {
    let source = JsonLinesSource::open(&input)?;
    let renderer = CompositeRenderer::new(
        &config.output_dir,
        config.render.cell_size,
        config.render.newest_cell_size,
    )?;
    let display = DashboardDisplay::new(
        renderer.output_dir(),
        config.render.cell_size,
        config.render.newest_cell_size,
    );

    let analyzer = if config.analysis.enabled {
        let client = OpenAiVisionClient::from_config(&config.analysis)
            .context("analysis is enabled but the vision client is not configured (use --no-analysis to skip it)")?;
        Some(SceneAnalyzer::new(client).drop_first_summary_item(config.analysis.drop_first_summary_item))
    } else {
        None
    };

    info!(
        input = %input.display(),
        output_dir = %config.output_dir.display(),
        window = config.window_capacity,
        decimation = config.decimation,
        threshold = config.fire_threshold,
        analysis = config.analysis.enabled,
        "starting thermal monitor"
    );

    let mut driver = CycleDriver::new(&config, source, renderer, analyzer, display);
    let summary = driver.run().await?;

    info!(
        records = summary.records_read,
        admitted = summary.frames_admitted,
        rejected = summary.frames_rejected,
        cycles = summary.cycles_completed,
        anomalous_cycles = summary.anomalous_cycles,
        parsed = summary.analyses_parsed,
        degraded = summary.analyses_degraded,
        failed = summary.analyses_failed,
        "run complete"
    );

    if config.hold_on_drain {
        info!("holding final state, press Ctrl-C to exit");
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")?;
    }
    Ok(())
}

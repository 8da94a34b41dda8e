//! Simulate command - run a scripted GPS scenario through the full core.
//!
//! The scenario scripts a simulated device, the core is started with a
//! pixmap canvas, a number of frames is painted, and the resulting GPS
//! state, layer timings and bus history are printed. The last frame can be
//! written to a PNG.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, ValueEnum};
use console::style;
use futures::StreamExt;
use sanctuary::app::{AppConfig, AppDeps, SanctuaryApp};
use sanctuary::canvas::PixmapCanvas;
use sanctuary::config::ConfigFile;
use sanctuary::events::EventRecord;
use sanctuary::gps::{GpsError, GpsState, JsonFileStore, RawReading, SimulatedProvider};
use sanctuary::layers::{run_render_loop, LayerInfo};
use tokio_util::sync::CancellationToken;

use super::common;
use crate::error::CliError;

/// Device response latency in simulated scenarios.
const DEVICE_LATENCY: Duration = Duration::from_millis(120);

/// Frame cadence at 60 fps.
const FRAME_PERIOD: Duration = Duration::from_micros(16_667);

/// Watch updates delivered by the walk scenario.
const WALK_STEPS: usize = 12;

/// Degrees moved per walk step (about 11 m of latitude).
const WALK_STEP_DEG: f64 = 0.0001;

const HOME: (f64, f64) = (61.50, 23.76);

/// Scripted device behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// One accurate fix
    Happy,
    /// The user refuses location access
    Denied,
    /// Two timeouts, then a fix after back-off
    Timeout,
    /// The device reports no position
    Unavailable,
    /// The device returns out-of-range coordinates
    Invalid,
    /// A fix followed by tracked movement
    Walk,
}

impl Scenario {
    /// One-shot results the device returns, in order.
    pub fn script(self) -> Vec<Result<RawReading, GpsError>> {
        let fix = Ok(RawReading::new(HOME.0, HOME.1, Some(8.0)));
        match self {
            Scenario::Happy | Scenario::Walk => vec![fix],
            Scenario::Denied => vec![Err(GpsError::permission_denied())],
            Scenario::Timeout => vec![Err(GpsError::timeout()), Err(GpsError::timeout()), fix],
            Scenario::Unavailable => vec![Err(GpsError::unavailable())],
            Scenario::Invalid => vec![Ok(RawReading::new(123.0, 200.0, Some(5.0)))],
        }
    }

    fn provider(self) -> SimulatedProvider {
        SimulatedProvider::scripted(self.script()).with_latency(DEVICE_LATENCY)
    }
}

/// Arguments for the simulate command.
#[derive(Debug, Clone, Args)]
pub struct SimulateArgs {
    /// Device behaviour to script
    #[arg(short, long, value_enum, default_value = "happy")]
    pub scenario: Scenario,

    /// Frames to paint after the GPS flow settles
    #[arg(short, long, default_value = "60")]
    pub frames: u32,

    /// Write the last frame to this PNG file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Scatter this many test objects around the player
    #[arg(long, default_value = "0")]
    pub objects: usize,

    /// Seed for the background and test objects (default: random)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Show the debug overlay
    #[arg(long)]
    pub debug_layer: bool,

    /// Persist the last known position to the data directory
    #[arg(long)]
    pub persist: bool,

    /// Bus history entries to print
    #[arg(long, default_value = "25")]
    pub history: usize,
}

/// What a simulation run produced.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub scenario: Scenario,
    pub settled: bool,
    pub gps: GpsState,
    pub retries: u64,
    pub device_requests: u64,
    pub status_text: String,
    pub frames: u64,
    pub layers: Vec<LayerInfo>,
    pub objects: usize,
    pub markers: usize,
    pub trail_points: usize,
    pub history: Vec<EventRecord>,
}

/// Run the simulate command.
pub fn run(args: SimulateArgs, config: &ConfigFile) -> Result<(), CliError> {
    let runtime = common::runtime()?;
    let output = args.output.clone();
    let report = runtime.block_on(simulate(args, config))?;
    print_report(&report);
    if let Some(path) = output {
        println!();
        println!("Frame written to {}", style(path.display()).green());
    }
    Ok(())
}

/// Drive one scenario end to end.
pub async fn simulate(args: SimulateArgs, config: &ConfigFile) -> Result<SimulationReport, CliError> {
    let mut app_config = AppConfig::from(config);
    let mut render = app_config
        .render
        .clone()
        .with_debug_layer(args.debug_layer || app_config.render.debug_layer);
    if let Some(seed) = args.seed {
        render = render.with_background_seed(seed);
    }
    app_config = app_config.with_render(render);

    let canvas = PixmapCanvas::new(app_config.render.width, app_config.render.height)?;
    let provider = Arc::new(args.scenario.provider());
    let mut deps = AppDeps::new(provider.clone()).with_canvas(Box::new(canvas.clone()));
    if args.persist {
        deps = deps.with_position_store(Arc::new(JsonFileStore::in_data_dir()));
    }
    let app = SanctuaryApp::start(app_config, deps)?;
    tracing::info!(scenario = ?args.scenario, frames = args.frames, "Simulation started");

    app.gps().request_location();
    let settled = common::wait_for_settled(&app, common::acquisition_budget(&app)).await;
    if !settled {
        tracing::warn!(scenario = ?args.scenario, "GPS flow did not settle in time");
    }

    if args.scenario == Scenario::Walk {
        walk(&app, &provider).await;
    }

    if args.objects > 0 {
        let center = app
            .gps()
            .position()
            .map(|p| p.lat_lng())
            .unwrap_or(app.config().gps.fallback.position);
        let mut rng = common::rng(args.seed);
        app.objects().create_test_objects(center, args.objects, &mut rng);
        app.objects().flush();
    }

    let frames = common::frame_ticks(FRAME_PERIOD).take(args.frames as usize);
    let painted = run_render_loop(app.layers().clone(), frames, CancellationToken::new()).await;

    if let Some(path) = &args.output {
        canvas.save_png(path)?;
    }

    let report = SimulationReport {
        scenario: args.scenario,
        settled,
        gps: app.gps().state(),
        retries: app.gps().retries_scheduled(),
        device_requests: provider.request_count(),
        status_text: app.store().read(|s| s.ui.status_text.clone()),
        frames: painted,
        layers: app.layers().lock().layers(),
        objects: app.objects().len(),
        markers: app.map().marker_count(),
        trail_points: app.trail().lock().len(),
        history: app.bus().history(args.history),
    };
    app.shutdown().await;
    Ok(report)
}

/// Feed tracked movement north-east of the first fix.
async fn walk(app: &SanctuaryApp, provider: &SimulatedProvider) {
    if !app.gps().is_tracking() {
        tracing::warn!("Walk skipped: tracking did not start");
        return;
    }
    for step in 1..=WALK_STEPS {
        let offset = step as f64 * WALK_STEP_DEG;
        let reading = RawReading::new(HOME.0 + offset, HOME.1 + offset, Some(6.0));
        provider.push_watch(Ok(reading));
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

fn print_report(report: &SimulationReport) {
    let gps = &report.gps;

    println!("Eldritch Sanctuary Simulation v{}", sanctuary::VERSION);
    println!("===================================");
    println!();
    println!("Scenario:   {:?}", report.scenario);
    if report.settled {
        println!("Settled:    {}", style("yes").green());
    } else {
        println!("Settled:    {}", style("no").red());
    }
    println!("Status:     {}", report.status_text);
    println!("Phase:      {:?}", gps.phase);
    println!("Permission: {}", gps.permission);
    match gps.position {
        Some(p) if p.is_fallback => println!(
            "Position:   {:.4}, {:.4} {}",
            p.lat,
            p.lng,
            style("(fallback)").yellow()
        ),
        Some(p) => println!(
            "Position:   {:.4}, {:.4} (±{:.0} m)",
            p.lat,
            p.lng,
            p.accuracy.unwrap_or_default()
        ),
        None => println!("Position:   {}", style("none").red()),
    }
    if let Some(error) = &gps.error {
        println!("Last error: {}", style(error).red());
    }
    println!("Tracking:   {}", gps.tracking);
    println!(
        "Device:     {} requests, {} retries scheduled",
        report.device_requests, report.retries
    );
    println!(
        "Objects:    {} ({} markers), trail {} points",
        report.objects, report.markers, report.trail_points
    );

    println!();
    println!("Layers ({} frames)", report.frames);
    println!("───────────────────");
    for layer in &report.layers {
        let name = if layer.visible {
            style(layer.name.clone()).bold()
        } else {
            style(layer.name.clone()).dim()
        };
        println!(
            "  {:>4}  {:<12} {:>6.3} ms avg  {} failures",
            layer.z_index,
            name,
            layer.timing.average_ms(),
            layer.timing.failures
        );
    }

    println!();
    println!("Event history (last {})", report.history.len());
    println!("───────────────────────");
    for record in &report.history {
        println!(
            "  {:>10}  {:<28} {:?}",
            record.timestamp_ms,
            style(record.topic).cyan(),
            record.event
        );
    }
}

//! Stress command - churn map objects and verify marker bookkeeping.
//!
//! Every round scatters objects around the fallback location, paints a frame,
//! then removes them again. After each phase the map must hold exactly one
//! marker per live object.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use sanctuary::app::{AppConfig, AppDeps, SanctuaryApp};
use sanctuary::config::ConfigFile;
use sanctuary::events::{topics, Event};
use sanctuary::gps::SimulatedProvider;

use super::common;
use crate::error::CliError;

/// Objects created per progress tick.
const BATCH: usize = 50;

/// Arguments for the stress command.
#[derive(Debug, Clone, Args)]
pub struct StressArgs {
    /// Objects to create per round
    #[arg(short, long, default_value = "750")]
    pub objects: usize,

    /// Create/remove rounds
    #[arg(short, long, default_value = "4")]
    pub rounds: u32,

    /// Random seed (default: random)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Hide the progress bar
    #[arg(short, long)]
    pub quiet: bool,
}

/// Outcome of a stress run.
#[derive(Debug, Clone, PartialEq)]
pub struct StressReport {
    pub rounds: u32,
    pub created: usize,
    pub removed: usize,
    pub peak: usize,
    pub performance_transitions: usize,
    pub invalidations: u64,
    pub elapsed: Duration,
}

/// Run the stress command.
pub fn run(args: StressArgs, config: &ConfigFile) -> Result<(), CliError> {
    let runtime = common::runtime()?;
    let report = runtime.block_on(stress(args, config))?;

    println!();
    println!("Stress Summary");
    println!("──────────────");
    println!("  Rounds:       {}", report.rounds);
    println!("  Created:      {}", report.created);
    println!("  Removed:      {}", report.removed);
    println!("  Peak objects: {}", report.peak);
    println!("  Perf mode:    {} transitions", report.performance_transitions);
    println!("  Invalidations: {}", report.invalidations);
    println!("  Elapsed:      {:.2?}", report.elapsed);
    println!("  Markers:      {}", style("consistent").green());
    Ok(())
}

fn progress_bar(total: u64, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total);
    let template = "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ops ({per_sec}) {msg}";
    let style = ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");
    bar.set_style(style);
    bar
}

fn check_markers(app: &SanctuaryApp, phase: &str) -> Result<(), CliError> {
    let markers = app.map().marker_count();
    let objects = app.objects().len();
    if markers != objects {
        return Err(CliError::Invariant(format!(
            "{} markers for {} objects after {}",
            markers, objects, phase
        )));
    }
    Ok(())
}

/// Churn objects for the configured number of rounds.
pub async fn stress(args: StressArgs, config: &ConfigFile) -> Result<StressReport, CliError> {
    let app_config = AppConfig::from(config);
    let center = app_config.gps.fallback.position;
    let app = SanctuaryApp::start(app_config, AppDeps::new(Arc::new(SimulatedProvider::new())))?;

    let transitions = Arc::new(AtomicUsize::new(0));
    let counter = transitions.clone();
    let subscription = app.bus().on(topics::MAP_PERFORMANCE_MODE, move |event| {
        if let Event::MapPerformanceMode { enabled, object_count } = event {
            tracing::debug!(enabled, object_count, "Performance mode changed");
            counter.fetch_add(1, Ordering::Relaxed);
        }
    });

    let total_ops = u64::from(args.rounds) * (args.objects as u64) * 2;
    let bar = progress_bar(total_ops, args.quiet);
    let mut rng = common::rng(args.seed);
    let started = Instant::now();
    let (mut created, mut removed, mut peak) = (0, 0, 0);

    let outcome = async {
        for round in 1..=args.rounds {
            bar.set_message(format!("round {}/{}", round, args.rounds));

            let mut ids = Vec::with_capacity(args.objects);
            let mut remaining = args.objects;
            while remaining > 0 {
                let batch = remaining.min(BATCH);
                ids.extend(app.objects().create_test_objects(center, batch, &mut rng));
                remaining -= batch;
                bar.inc(batch as u64);
            }
            created += ids.len();
            peak = peak.max(app.objects().len());
            app.objects().flush();
            app.render_frame(16.0);
            check_markers(&app, "creation")?;

            for id in ids {
                if app.objects().remove_object(id) {
                    removed += 1;
                }
                bar.inc(1);
            }
            app.objects().flush();
            check_markers(&app, "removal")?;

            tokio::task::yield_now().await;
        }
        Ok::<(), CliError>(())
    }
    .await;

    bar.finish_and_clear();
    app.bus().off(&subscription);
    let invalidations = app.map().invalidation_count();
    app.shutdown().await;
    outcome?;

    Ok(StressReport {
        rounds: args.rounds,
        created,
        removed,
        peak,
        performance_transitions: transitions.load(Ordering::Relaxed),
        invalidations,
        elapsed: started.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_churn_keeps_markers_consistent() {
        let mut config = ConfigFile::default();
        config.map.performance_threshold = 20;
        let args = StressArgs {
            objects: 40,
            rounds: 2,
            seed: Some(3),
            quiet: true,
        };

        let report = stress(args, &config).await.unwrap();

        assert_eq!(report.created, 80);
        assert_eq!(report.removed, 80);
        assert_eq!(report.peak, 40);
        assert_eq!(report.performance_transitions, 4);
        assert!(report.invalidations > 0);
    }
}

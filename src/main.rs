use anyhow::{bail, Context, Result};
use clap::Parser;
use crimesound_sim::cli::{Cli, Commands};
use crimesound_sim::config::{self, SimulatorConfig};
use crimesound_sim::detection_feed::DetectionFeed;
use crimesound_sim::events::{EventBus, LoggingEventHandler, NotificationHandler};
use crimesound_sim::logging;
use crimesound_sim::notifications::{Notification, NotificationKind, NotificationSink, TracingSink};
use crimesound_sim::shutdown::ShutdownCoordinator;
use crimesound_sim::upload_queue::format::{format_confidence, format_file_size};
use crimesound_sim::upload_queue::validation::media_type_for_path;
use crimesound_sim::upload_queue::{AudioCandidate, OutcomeSampler, UploadQueue};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// Prints notifications to the terminal as they arrive
struct ConsoleSink;

impl NotificationSink for ConsoleSink {
    fn notify(&self, notification: Notification) {
        let marker = match notification.kind {
            NotificationKind::Success => "✓",
            NotificationKind::Error => "✗",
        };
        println!("{} {}: {}", marker, notification.title, notification.message);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::load_config_from(path)?,
        None => config::load_config()?,
    };
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }

    match config::get_logs_dir() {
        Ok(logs_dir) => {
            if let Err(e) = logging::init_logging(&logs_dir, cli.verbose) {
                eprintln!("Failed to initialize logging: {}", e);
            }
        }
        Err(e) => eprintln!("Failed to resolve logs directory: {}", e),
    }

    match cli.command {
        Commands::Upload { files, media_type } => run_upload(&config, files, media_type).await,
        Commands::Monitor { detections } => run_monitor(&config, detections).await,
    }
}

async fn run_upload(
    config: &SimulatorConfig,
    files: Vec<PathBuf>,
    media_type: Option<String>,
) -> Result<()> {
    println!("📤 CrimeSound AI - Upload Audio Files\n");

    let event_bus = EventBus::new();
    let shutdown = ShutdownCoordinator::new();
    let queue = UploadQueue::from_config(config, event_bus.clone())?;

    // Piped output goes to the log instead of interleaving with the table
    let sink: Arc<dyn NotificationSink> = if std::io::stdout().is_terminal() {
        Arc::new(ConsoleSink)
    } else {
        Arc::new(TracingSink)
    };
    let notifier = NotificationHandler::new(event_bus.clone(), sink, shutdown.clone()).start();
    let activity_log = LoggingEventHandler::new(event_bus.clone(), shutdown.clone()).start();

    for path in &files {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| path.display().to_string());
        let size_bytes = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        let media_type = media_type
            .clone()
            .unwrap_or_else(|| media_type_for_path(path).to_string());

        match queue.submit(AudioCandidate::new(name.clone(), size_bytes, media_type)) {
            Ok(id) => println!("  queued {} ({}) as {}", name, format_file_size(size_bytes), id),
            // The notification handler reports rejections
            Err(e) if e.is_rejection() => {}
            Err(e) => return Err(e).with_context(|| format!("Failed to submit {}", name)),
        }
    }

    queue.wait_idle().await;

    println!("\nProcessing Queue ({})", queue.len());
    for item in queue.snapshot() {
        let outcome = item
            .result
            .as_ref()
            .map(|result| {
                format!(
                    "{} ({})",
                    result.label.display_name().to_uppercase(),
                    format_confidence(result.confidence)
                )
            })
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<32} {:>10}  {:<10} {}",
            item.name,
            format_file_size(item.size_bytes),
            item.stage,
            outcome
        );
    }

    // Dropping every bus handle lets the handlers drain what is buffered and exit
    drop(queue);
    drop(event_bus);
    notifier.await?;
    activity_log.await?;

    Ok(())
}

async fn run_monitor(config: &SimulatorConfig, detections: usize) -> Result<()> {
    println!("🎙 CrimeSound AI - Live Audio Monitor\n");

    let shutdown = ShutdownCoordinator::new();
    let feed = DetectionFeed::new(
        config.monitor.clone(),
        Arc::new(OutcomeSampler::new(config.seed)),
        shutdown.clone(),
    );
    let mut rx = feed.subscribe();
    let handle = feed.start();

    let mut seen = 0;
    while seen < detections {
        let detection = match rx.recv().await {
            Ok(detection) => detection,
            Err(RecvError::Lagged(skipped)) => {
                eprintln!("  ({} detections skipped)", skipped);
                continue;
            }
            Err(RecvError::Closed) => bail!("Detection feed closed"),
        };
        seen += 1;
        println!(
            "  [{}] {:<15} {:>6}  {:<15} {}",
            detection.detected_at.format("%H:%M:%S"),
            detection.label.display_name(),
            format_confidence(detection.confidence),
            detection.location,
            detection.threat.as_str()
        );
    }

    shutdown.shutdown();
    handle.await?;

    let waveform = feed.waveform();
    if let Some(peak) = waveform.iter().copied().reduce(f64::max) {
        println!("\nWaveform: {} samples, peak {:.1}", waveform.len(), peak);
    }

    Ok(())
}

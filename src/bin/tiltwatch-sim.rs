// tiltwatch-sim - drive a recording session from a synthetic tilt profile
//
// Feeds a comma-separated list of X-axis angles (degrees) through the
// session engine at a fixed sample period and prints the status line,
// tilt events, and the final records report. Useful for exercising the
// detection and vibration pipeline without device hardware.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::broadcast::error::TryRecvError;

use tiltwatch::config::{MonitorConfig, ThresholdSetting};
use tiltwatch::engine::backend::{RecordingHaptics, StubAccelerometer};
use tiltwatch::engine::SessionEngine;
use tiltwatch::events::{EventKind, TiltEvent};
use tiltwatch::store::{JsonFileStore, MemoryStore, PreferenceStore};

#[derive(Parser, Debug)]
#[command(name = "tiltwatch-sim")]
#[command(about = "Run a simulated tilt-monitoring session")]
struct Args {
    /// Tilt threshold in degrees (0.1 to 10.0)
    #[arg(long, default_value_t = 3.0)]
    threshold: f64,

    /// Countdown delay before the stable period, in seconds
    #[arg(long, default_value_t = 0)]
    delay: u32,

    /// Stable-period length in seconds; 0 means unbounded
    #[arg(long, default_value_t = 0)]
    stable: u32,

    /// Capture the starting orientation as the baseline
    #[arg(long)]
    relative: bool,

    /// Repeating magnitude-scaled vibration while tilted
    #[arg(long)]
    radar: bool,

    /// Vibration intensity, 0 to 1000
    #[arg(long, default_value_t = 500)]
    intensity: i64,

    /// X-axis tilt profile in degrees, one sample per period
    #[arg(long, value_delimiter = ',', default_value = "0,1,4,4,1,0")]
    samples: Vec<f64>,

    /// Sample period in milliseconds
    #[arg(long, default_value_t = 500)]
    period_ms: u64,

    /// Persist preferences and records to this JSON file instead of memory
    #[arg(long)]
    prefs: Option<std::path::PathBuf>,
}

fn describe(event: &TiltEvent) -> String {
    let kind = match event.kind {
        EventKind::Start => "tilt started",
        EventKind::End => "tilt ended",
    };
    format!(
        "{} at +{}ms  X={:.1} Y={:.1}",
        kind, event.relative_ms, event.x_angle, event.y_angle
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tiltwatch::init_logging();
    let args = Args::parse();

    let store: Arc<dyn PreferenceStore> = match &args.prefs {
        Some(path) => Arc::new(JsonFileStore::open(path)),
        None => Arc::new(MemoryStore::new()),
    };

    let config = MonitorConfig {
        threshold: ThresholdSetting::custom(args.threshold)
            .context("invalid --threshold")?,
        delay_seconds: args.delay,
        stable_seconds: args.stable,
        vibration_enabled: true,
        radar_vibration_enabled: args.radar,
        vibration_intensity: tiltwatch::config::parse_vibration_intensity(args.intensity)
            .context("invalid --intensity")?,
        relative_baseline: args.relative,
    };
    config.save(&*store);

    let accel = Arc::new(StubAccelerometer::new());
    let haptics = Arc::new(RecordingHaptics::new());
    let alerts = Arc::new(tiltwatch::engine::backend::RecordingAlertSink::new());
    let engine = SessionEngine::new(
        Arc::clone(&store),
        accel.clone(),
        haptics.clone(),
        alerts.clone(),
    );

    engine
        .start_sensor()
        .context("accelerometer unavailable")?;
    let mut events = engine
        .subscribe_tilt_events()
        .context("event channel not initialized")?;

    // Settle at level before the session starts
    accel.push(0.0, 0.0, 1.0);
    engine.start_recording();

    if args.delay > 0 {
        println!("waiting {}s countdown...", args.delay);
        tokio::time::sleep(Duration::from_secs(args.delay as u64 + 1)).await;
    }

    for (i, &x_deg) in args.samples.iter().enumerate() {
        tokio::time::sleep(Duration::from_millis(args.period_ms)).await;
        accel.push(x_deg / 90.0, 0.0, 1.0);

        if let Some(snapshot) = engine.snapshot() {
            println!(
                "[{:>3}] X={:>5.1} Y={:>5.1}  {:?}  tilted={}  magnitude={:.2}",
                i,
                snapshot.x_angle,
                snapshot.y_angle,
                snapshot.status,
                snapshot.is_tilted,
                snapshot.tilt_magnitude
            );
        }
        loop {
            match events.try_recv() {
                Ok(event) => println!("      {}", describe(&event)),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                Err(TryRecvError::Lagged(_)) => continue,
            }
        }
    }

    engine.stop_session().context("failed to store session records")?;
    println!("\nhaptic pulses fired: {:?}", haptics.pulses());
    for message in alerts.modals() {
        println!("alert: {}", message);
    }
    println!("\n{}", engine.records_report());
    println!("cumulative events: {}", engine.cumulative_record_count());
    Ok(())
}

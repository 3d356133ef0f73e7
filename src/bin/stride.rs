//! Stride CLI - Command-line interface for Synheart Stride
//!
//! Commands:
//! - distance: Great-circle distance between two coordinates
//! - simulate: Run the simulated loop end to end through the tracker
//! - replay: Drive a session from a recorded NDJSON track
//! - history: List stored activities
//! - badges: Re-evaluate achievements over the stored history

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use synheart_stride::source::{SampleSink, Subscription};
use synheart_stride::store::{load_history, persist_in_background};
use synheart_stride::{
    distance_km, ActivityStore, BadgeBook, CompletedActivity, JsonFileStore, LocationProvider,
    LocationSample, PermissionStatus, ProviderError, ReplayProvider, SessionSnapshot,
    SystemClock, Tracker, TrackerConfig, TrackingError, UnlockedBadge, WatchOptions,
    PRODUCER_NAME, STRIDE_VERSION,
};

/// Stride - On-device live activity tracking engine
#[derive(Parser)]
#[command(name = "stride")]
#[command(author = "Synheart AI Inc")]
#[command(version = STRIDE_VERSION)]
#[command(about = "Track runs from live, simulated or recorded location fixes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Great-circle distance in kilometers between two coordinates
    Distance {
        #[arg(allow_hyphen_values = true)]
        lat1: f64,
        #[arg(allow_hyphen_values = true)]
        lon1: f64,
        #[arg(allow_hyphen_values = true)]
        lat2: f64,
        #[arg(allow_hyphen_values = true)]
        lon2: f64,
    },

    /// Run the simulated loop end to end and print the finished activity
    Simulate {
        /// Append the activity to this history file
        #[arg(long)]
        store: Option<PathBuf>,

        /// Evaluate and record badges in this file
        #[arg(long)]
        badges: Option<PathBuf>,

        /// Tracker configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Drive a session from a recorded track through the live-provider path
    Replay {
        /// Recorded fixes, one JSON sample per line
        #[arg(short, long)]
        input: PathBuf,

        /// Delay between recorded fixes in milliseconds
        #[arg(long, default_value = "100")]
        pace_ms: u64,

        /// Append the activity to this history file
        #[arg(long)]
        store: Option<PathBuf>,

        /// Evaluate and record badges in this file
        #[arg(long)]
        badges: Option<PathBuf>,

        /// Tracker configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List stored activities, newest first
    History {
        #[arg(long)]
        store: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Re-evaluate badges over the stored history
    Badges {
        #[arg(long)]
        store: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("synheart_stride=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), StrideCliError> {
    match cli.command {
        Commands::Distance {
            lat1,
            lon1,
            lat2,
            lon2,
        } => cmd_distance(lat1, lon1, lat2, lon2),

        Commands::Simulate {
            store,
            badges,
            config,
        } => cmd_simulate(store.as_deref(), badges.as_deref(), config.as_deref()).await,

        Commands::Replay {
            input,
            pace_ms,
            store,
            badges,
            config,
        } => {
            cmd_replay(
                &input,
                pace_ms,
                store.as_deref(),
                badges.as_deref(),
                config.as_deref(),
            )
            .await
        }

        Commands::History { store, json } => cmd_history(&store, json),

        Commands::Badges { store, json } => cmd_badges(&store, json),
    }
}

fn cmd_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> Result<(), StrideCliError> {
    let km = distance_km(lat1, lon1, lat2, lon2);
    emit(&serde_json::json!({ "distance_km": km }))
}

async fn cmd_simulate(
    store: Option<&Path>,
    badges: Option<&Path>,
    config: Option<&Path>,
) -> Result<(), StrideCliError> {
    let config = load_config(config)?;
    let tracker = Tracker::spawn(Arc::new(NoLocationProvider), config.clone())?;

    let started = tracker.start_simulation().await?;
    tracing::info!(started_at = ?started.started_at, "Simulated run started");

    let mut updates = tracker.watch();
    updates
        .wait_for(|s| !s.simulating)
        .await
        .map_err(|_| TrackingError::TrackerClosed)?;

    finish(&tracker, &config, store, badges).await
}

async fn cmd_replay(
    input: &Path,
    pace_ms: u64,
    store: Option<&Path>,
    badges: Option<&Path>,
    config: Option<&Path>,
) -> Result<(), StrideCliError> {
    let config = load_config(config)?;
    let provider = ReplayProvider::from_path(input, Duration::from_millis(pace_ms))?;
    if provider.is_empty() {
        return Err(StrideCliError::NoSamples);
    }
    tracing::info!(
        samples = provider.len(),
        duration_ms = u64::try_from(provider.duration().as_millis()).unwrap_or(u64::MAX),
        "Replaying recorded track"
    );

    let tracker = Tracker::spawn(Arc::new(provider), config.clone())?;
    tracker.start().await?;

    // The recording reports an interruption once it runs out of fixes
    let mut updates = tracker.watch();
    updates
        .wait_for(|s| s.stream_interrupted)
        .await
        .map_err(|_| TrackingError::TrackerClosed)?;

    finish(&tracker, &config, store, badges).await
}

/// Stop the session, finalize, persist and evaluate badges
async fn finish(
    tracker: &Tracker,
    config: &TrackerConfig,
    store: Option<&Path>,
    badges: Option<&Path>,
) -> Result<(), StrideCliError> {
    let snapshot: SessionSnapshot = tracker.snapshot().await?;
    tracing::info!(
        distance_km = snapshot.distance_km,
        elapsed_seconds = snapshot.elapsed_seconds,
        samples = snapshot.sample_count,
        "Stopping run"
    );

    let activity = tracker.stop().await?.into_activity(&SystemClock, config);

    if let Some(path) = store {
        let store: Arc<dyn ActivityStore> = Arc::new(JsonFileStore::new(path));
        if let Err(e) = persist_in_background(store, activity.clone()).await {
            tracing::error!(%e, "Activity save task failed");
        }
    }

    let unlocked = match badges {
        Some(path) => {
            let mut book = BadgeBook::load(path);
            let fresh = book.record(&activity, Utc::now());
            book.save(path);
            fresh
        }
        None => Vec::new(),
    };

    emit(&RunReport {
        producer: PRODUCER_NAME,
        version: STRIDE_VERSION,
        activity: &activity,
        unlocked_badges: &unlocked,
    })
}

fn cmd_history(store: &Path, json: bool) -> Result<(), StrideCliError> {
    let activities = JsonFileStore::new(store).load_all()?;

    if json {
        return emit(&activities);
    }

    if activities.is_empty() {
        println!("No activities recorded");
        return Ok(());
    }
    for activity in &activities {
        println!(
            "{:<14} {:>7} km  {}  {:>5} kcal  {:>5} km/h",
            activity.date,
            activity.distance_label(),
            activity.duration_label(),
            activity.calories,
            activity.speed_label(),
        );
    }
    Ok(())
}

fn cmd_badges(store: &Path, json: bool) -> Result<(), StrideCliError> {
    let activities = load_history(&JsonFileStore::new(store));

    // History is newest first; unlock in the order the runs happened
    let mut book = BadgeBook::new();
    for activity in activities.iter().rev() {
        book.record(activity, finished_at(activity));
    }

    if json {
        return emit(&book);
    }

    if book.unlocked().is_empty() {
        println!("No badges unlocked");
        return Ok(());
    }
    for badge in book.unlocked() {
        println!("  {} {}: {}", badge.icon, badge.name, badge.description);
    }
    Ok(())
}

// Helper functions

fn load_config(path: Option<&Path>) -> Result<TrackerConfig, StrideCliError> {
    match path {
        Some(path) => Ok(TrackerConfig::from_path(path)?),
        None => Ok(TrackerConfig::default()),
    }
}

fn finished_at(activity: &CompletedActivity) -> chrono::DateTime<Utc> {
    let duration = i64::try_from(activity.duration_seconds).unwrap_or(i64::MAX);
    activity.started_at.with_timezone(&Utc) + ChronoDuration::seconds(duration)
}

/// Print JSON: pretty on a terminal, compact when piped
fn emit<T: Serialize + ?Sized>(value: &T) -> Result<(), StrideCliError> {
    let text = if atty::is(atty::Stream::Stdout) {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", text);
    Ok(())
}

/// Stand-in for a device without a positioning service. Simulated runs
/// still work; re-acquiring live tracking afterwards fails and is logged.
struct NoLocationProvider;

#[async_trait]
impl LocationProvider for NoLocationProvider {
    async fn request_permission(&self) -> PermissionStatus {
        PermissionStatus::Denied
    }

    async fn current_position(&self) -> Result<LocationSample, ProviderError> {
        Err(ProviderError::NoFix("no positioning service".to_string()))
    }

    async fn watch_position(
        &self,
        _options: &WatchOptions,
        _sink: SampleSink,
    ) -> Result<Box<dyn Subscription>, ProviderError> {
        Err(ProviderError::Subscription(
            "no positioning service".to_string(),
        ))
    }
}

// Report types

#[derive(Serialize)]
struct RunReport<'a> {
    producer: &'static str,
    version: &'static str,
    activity: &'a CompletedActivity,
    unlocked_badges: &'a [UnlockedBadge],
}

// Error types

#[derive(Debug)]
enum StrideCliError {
    Io(io::Error),
    Tracking(TrackingError),
    Store(synheart_stride::StoreError),
    Json(serde_json::Error),
    NoSamples,
}

impl From<io::Error> for StrideCliError {
    fn from(e: io::Error) -> Self {
        StrideCliError::Io(e)
    }
}

impl From<TrackingError> for StrideCliError {
    fn from(e: TrackingError) -> Self {
        StrideCliError::Tracking(e)
    }
}

impl From<synheart_stride::StoreError> for StrideCliError {
    fn from(e: synheart_stride::StoreError) -> Self {
        StrideCliError::Store(e)
    }
}

impl From<serde_json::Error> for StrideCliError {
    fn from(e: serde_json::Error) -> Self {
        StrideCliError::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<StrideCliError> for CliError {
    fn from(e: StrideCliError) -> Self {
        match e {
            StrideCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            StrideCliError::Tracking(e) => {
                let hint = match &e {
                    TrackingError::PermissionDenied => {
                        Some("Grant location access and retry".to_string())
                    }
                    TrackingError::InvalidConfig(_) | TrackingError::JsonError(_) => {
                        Some("Check the --config file".to_string())
                    }
                    TrackingError::Provider(_) => {
                        Some("Ensure the input is NDJSON location samples".to_string())
                    }
                    _ => None,
                };
                CliError {
                    code: "TRACKING_ERROR".to_string(),
                    message: e.to_string(),
                    hint,
                }
            }
            StrideCliError::Store(e) => CliError {
                code: "STORE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check that --store points at an activity history file".to_string()),
            },
            StrideCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            StrideCliError::NoSamples => CliError {
                code: "NO_SAMPLES".to_string(),
                message: "No location samples found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
        }
    }
}

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use timetable_updater::periodic::PeriodicRunner;
use timetable_updater::schedule::ScheduleFixture;
use timetable_updater::updater::{ReplaySource, StoptimeUpdater, UpdaterConfig};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// How often the demo reader asks for a snapshot.
const READER_INTERVAL: Duration = Duration::from_secs(10);

fn path_from_env(key: &str, default: &str) -> PathBuf {
    std::env::var_os(key)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(default))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = UpdaterConfig::from_env();
    let schedule_path = path_from_env("RT_SCHEDULE_FIXTURE", "data/schedule.json");
    let replay_dir = path_from_env("RT_REPLAY_DIR", "data/replay");

    info!(path = %schedule_path.display(), "loading schedule");
    let (index, graph) = ScheduleFixture::load(&schedule_path)?.build()?;
    let source = ReplaySource::new(&replay_dir)?;
    info!(
        dir = %replay_dir.display(),
        files = source.remaining(),
        "replaying trip updates"
    );

    let updater = StoptimeUpdater::new(source, index, graph, config.clone());
    let snapshots = updater.snapshot_reader();

    let mut runner = PeriodicRunner::new(config.update_frequency);
    runner.register(updater);

    let (stop, shutdown) = watch::channel(false);
    let runner = tokio::spawn(runner.run(shutdown.clone()));

    // Stands in for routing: reads whatever snapshot is current.
    let mut reader_shutdown = shutdown;
    let reader = tokio::spawn(async move {
        let mut interval = tokio::time::interval(READER_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = reader_shutdown.changed() => break,
            }
            let snapshot = snapshots.get_snapshot();
            info!(
                generation = snapshot.generation(),
                timetables = snapshot.len(),
                "realtime snapshot"
            );
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    if stop.send(true).is_err() {
        warn!("background tasks already stopped");
    }
    runner.await?;
    reader.await?;
    Ok(())
}

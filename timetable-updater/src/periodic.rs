//! Runs blocking tasks on a fixed interval.
//!
//! A failed or panicking invocation is logged and the loop carries on;
//! the next tick runs the task again.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Error a single invocation may return.
pub type TaskError = Box<dyn std::error::Error + Send + Sync>;

/// Work the runner invokes on every tick.
///
/// Invocations are blocking and never overlap for the same task.
pub trait PeriodicTask: Send + 'static {
    /// Name used in log lines.
    fn name(&self) -> &str;

    fn run_once(&mut self) -> Result<(), TaskError>;
}

struct Registered {
    name: String,
    task: Arc<Mutex<Box<dyn PeriodicTask>>>,
}

/// Invokes registered tasks every `frequency` until told to stop.
pub struct PeriodicRunner {
    frequency: Duration,
    tasks: Vec<Registered>,
}

impl PeriodicRunner {
    /// Shortest interval the runner ticks at.
    pub const MIN_FREQUENCY: Duration = Duration::from_millis(1);

    /// A runner ticking every `frequency`, raised to [`Self::MIN_FREQUENCY`]
    /// if shorter.
    pub fn new(frequency: Duration) -> Self {
        if frequency < Self::MIN_FREQUENCY {
            warn!(
                frequency_ms = frequency.as_millis() as u64,
                "frequency too short, using minimum"
            );
        }
        Self {
            frequency: frequency.max(Self::MIN_FREQUENCY),
            tasks: Vec::new(),
        }
    }

    pub fn frequency(&self) -> Duration {
        self.frequency
    }

    pub fn register(&mut self, task: impl PeriodicTask) {
        self.tasks.push(Registered {
            name: task.name().to_string(),
            task: Arc::new(Mutex::new(Box::new(task))),
        });
    }

    /// Number of registered tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Run until `shutdown` changes or its sender is dropped.
    ///
    /// The first tick fires immediately.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.frequency);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            tasks = self.tasks.len(),
            frequency_ms = self.frequency.as_millis() as u64,
            "periodic runner started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.changed() => break,
            }
            for registered in &self.tasks {
                run_task(registered).await;
            }
        }
        info!("periodic runner stopped");
    }
}

async fn run_task(registered: &Registered) {
    let task = registered.task.clone();
    let started = Instant::now();
    let result = tokio::task::spawn_blocking(move || {
        let mut task = task.lock().unwrap_or_else(PoisonError::into_inner);
        task.run_once()
    })
    .await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(Ok(())) => debug!(task = %registered.name, elapsed_ms, "task finished"),
        Ok(Err(e)) => warn!(task = %registered.name, elapsed_ms, error = %e, "task failed"),
        Err(e) if e.is_panic() => error!(task = %registered.name, elapsed_ms, "task panicked"),
        Err(e) => warn!(task = %registered.name, error = %e, "task was cancelled"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        runs: Arc<AtomicUsize>,
        fail_every: usize,
        panic_on: Option<usize>,
    }

    impl PeriodicTask for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn run_once(&mut self) -> Result<(), TaskError> {
            let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            if self.panic_on == Some(run) {
                panic!("boom on run {run}");
            }
            if self.fail_every > 0 && run % self.fail_every == 0 {
                return Err(format!("failure on run {run}").into());
            }
            Ok(())
        }
    }

    async fn wait_for(runs: &AtomicUsize, at_least: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while runs.load(Ordering::SeqCst) < at_least {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn failures_and_panics_do_not_stop_the_loop() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut runner = PeriodicRunner::new(Duration::from_millis(5));
        runner.register(Counting {
            runs: runs.clone(),
            fail_every: 2,
            panic_on: Some(3),
        });
        assert_eq!(runner.len(), 1);

        let (stop, shutdown) = watch::channel(false);
        let handle = tokio::spawn(runner.run(shutdown));

        wait_for(&runs, 6).await;
        stop.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn zero_frequency_still_ticks() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut runner = PeriodicRunner::new(Duration::ZERO);
        assert_eq!(runner.frequency(), PeriodicRunner::MIN_FREQUENCY);
        runner.register(Counting {
            runs: runs.clone(),
            fail_every: 0,
            panic_on: None,
        });

        let (stop, shutdown) = watch::channel(false);
        let handle = tokio::spawn(runner.run(shutdown));

        wait_for(&runs, 3).await;
        stop.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn stops_when_sender_dropped() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut runner = PeriodicRunner::new(Duration::from_secs(3600));
        runner.register(Counting {
            runs: runs.clone(),
            fail_every: 0,
            panic_on: None,
        });

        let (stop, shutdown) = watch::channel(false);
        let handle = tokio::spawn(runner.run(shutdown));

        // the first tick is immediate
        wait_for(&runs, 1).await;
        drop(stop);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}

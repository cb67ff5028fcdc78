//! Interval scheduler for the portal's housekeeping jobs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// How often a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobFrequency {
    Seconds(u64),
    Minutes(u64),
    Hourly,
}

impl JobFrequency {
    pub fn period(&self) -> Duration {
        match self {
            JobFrequency::Seconds(secs) => Duration::from_secs(*secs),
            JobFrequency::Minutes(mins) => Duration::from_secs(*mins * 60),
            JobFrequency::Hourly => Duration::from_secs(3600),
        }
    }
}

/// A unit of periodic background work.
#[async_trait::async_trait]
pub trait Job: Send + Sync {
    /// Stable name, used as a log field and a metrics label.
    fn name(&self) -> &'static str;

    fn frequency(&self) -> JobFrequency;

    /// One run. A failure is logged and counted; the job is retried on its
    /// next tick.
    async fn execute(&self) -> anyhow::Result<()>;
}

/// Runs every registered job on its own interval until shut down.
pub struct JobScheduler {
    jobs: Vec<Arc<dyn Job>>,
    stop_tx: watch::Sender<bool>,
    tasks: JoinSet<()>,
}

impl JobScheduler {
    pub fn new() -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            jobs: Vec::new(),
            stop_tx,
            tasks: JoinSet::new(),
        }
    }

    pub fn register<J: Job + 'static>(&mut self, job: J) {
        self.jobs.push(Arc::new(job));
    }

    /// Names of the registered jobs in registration order.
    pub fn job_names(&self) -> Vec<&'static str> {
        self.jobs.iter().map(|job| job.name()).collect()
    }

    /// Spawn one task per job. The first run happens one period after start.
    pub fn start(&mut self) {
        info!(jobs = ?self.job_names(), "Starting background jobs");
        for job in &self.jobs {
            self.tasks
                .spawn(run_job(Arc::clone(job), self.stop_tx.subscribe()));
        }
    }

    /// Ask every job task to stop after its current run.
    pub fn shutdown(&self) {
        info!("Stopping background jobs");
        self.stop_tx.send_replace(true);
    }

    /// Wait for the job tasks to finish, aborting whatever is still running
    /// once `timeout` has elapsed.
    pub async fn wait_for_shutdown(mut self, timeout: Duration) {
        let drain = async {
            while let Some(joined) = self.tasks.join_next().await {
                if let Err(e) = joined {
                    warn!(error = %e, "Background job task panicked");
                }
            }
        };

        if tokio::time::timeout(timeout, drain).await.is_err() {
            warn!(?timeout, "Background jobs did not stop in time, aborting");
            self.tasks.abort_all();
        } else {
            info!("Background jobs stopped");
        }
    }
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_job(job: Arc<dyn Job>, mut stop_rx: watch::Receiver<bool>) {
    let name = job.name();
    let period = job.frequency().period();
    let mut ticker = tokio::time::interval(period);
    // A slow run must not cause a burst of catch-up runs.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    debug!(job = name, ?period, "Job scheduled");

    loop {
        tokio::select! {
            _ = ticker.tick() => run_once(job.as_ref()).await,
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    debug!(job = name, "Job stopped");
                    return;
                }
            }
        }
    }
}

async fn run_once(job: &dyn Job) {
    let name = job.name();
    let started = Instant::now();
    let outcome = job.execute().await;
    let elapsed = started.elapsed();

    histogram!("background_job_duration_seconds", "job" => name).record(elapsed.as_secs_f64());
    match outcome {
        Ok(()) => {
            counter!("background_job_runs_total", "job" => name, "outcome" => "success")
                .increment(1);
            debug!(job = name, elapsed_ms = elapsed.as_millis() as u64, "Job finished");
        }
        Err(e) => {
            counter!("background_job_runs_total", "job" => name, "outcome" => "failure")
                .increment(1);
            error!(
                job = name,
                elapsed_ms = elapsed.as_millis() as u64,
                error = %format!("{e:#}"),
                "Job failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingJob {
        runs: Arc<AtomicUsize>,
        fail: bool,
    }

    impl CountingJob {
        fn new(fail: bool) -> (Self, Arc<AtomicUsize>) {
            let runs = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    runs: Arc::clone(&runs),
                    fail,
                },
                runs,
            )
        }
    }

    #[async_trait::async_trait]
    impl Job for CountingJob {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn frequency(&self) -> JobFrequency {
            JobFrequency::Seconds(1)
        }

        async fn execute(&self) -> anyhow::Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("expired rows could not be removed");
            }
            Ok(())
        }
    }

    #[test]
    fn test_frequency_period() {
        assert_eq!(JobFrequency::Seconds(10).period(), Duration::from_secs(10));
        assert_eq!(JobFrequency::Minutes(15).period(), Duration::from_secs(900));
        assert_eq!(JobFrequency::Hourly.period(), Duration::from_secs(3600));
    }

    #[test]
    fn test_register_keeps_order() {
        let mut scheduler = JobScheduler::default();
        scheduler.register(CountingJob::new(false).0);
        scheduler.register(CountingJob::new(true).0);
        assert_eq!(scheduler.job_names(), vec!["counting", "counting"]);
    }

    #[tokio::test]
    async fn test_shutdown_before_first_period() {
        let mut scheduler = JobScheduler::new();
        let (job, runs) = CountingJob::new(false);
        scheduler.register(job);
        scheduler.start();

        tokio::time::sleep(Duration::from_millis(100)).await;
        scheduler.shutdown();
        scheduler.wait_for_shutdown(Duration::from_secs(2)).await;

        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failing_job_keeps_running() {
        let mut scheduler = JobScheduler::new();
        let (job, runs) = CountingJob::new(true);
        scheduler.register(job);
        scheduler.start();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(runs.load(Ordering::SeqCst) >= 2);

        scheduler.shutdown();
        scheduler.wait_for_shutdown(Duration::from_secs(1)).await;
    }
}

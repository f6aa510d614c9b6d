//! Server status and job stage polling.
//!
//! Both loops are fixed-delay: the next tick is armed only after the
//! previous request has been answered, so a slow server stretches the
//! period instead of piling up requests. Failures are logged and the loop
//! carries on at the next tick.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use url::Url;

use crate::error::PollError;
use crate::sink::RenderSink;
use crate::{ServerStatusSnapshot, StageProgress};

pub const STATUS_INTERVAL: Duration = Duration::from_millis(15_000);
pub const STAGE_INTERVAL: Duration = Duration::from_millis(5_000);
/// Delay between seeing the final stage and asking the sink to reload.
pub const RELOAD_DELAY: Duration = Duration::from_millis(50);

#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn server_status(&self) -> Result<ServerStatusSnapshot, PollError>;

    async fn stage_progress(&self, job_id: &str) -> Result<StageProgress, PollError>;
}

/// HTTP client for the service's JSON endpoints.
pub struct StatusClient {
    client: Client,
    base_url: Url,
}

impl StatusClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PollError> {
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: Url::parse(&base)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, PollError> {
        let url = self.base_url.join(path)?;
        let res = self.client.get(url.clone()).send().await?;

        if !res.status().is_success() {
            return Err(PollError::Status {
                status: res.status(),
                url: url.to_string(),
            });
        }

        Ok(res.json::<T>().await?)
    }
}

#[async_trait]
impl StatusSource for StatusClient {
    async fn server_status(&self) -> Result<ServerStatusSnapshot, PollError> {
        self.get_json("status").await
    }

    async fn stage_progress(&self, job_id: &str) -> Result<StageProgress, PollError> {
        self.get_json(&format!("results/stage/{job_id}")).await
    }
}

/// What a stage response asks of the display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageUpdate {
    /// All stages done: reload instead of marking anything.
    Reload,
    /// Stages that became complete with this response.
    Marked(Vec<u32>),
}

/// Stages already shown as complete for one job.
///
/// Marking is monotonic: a response reporting fewer finished stages than
/// before leaves the earlier marks in place.
#[derive(Debug, Default, Clone)]
pub struct StageBoard {
    completed: BTreeSet<u32>,
}

impl StageBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completed(&self) -> &BTreeSet<u32> {
        &self.completed
    }

    pub fn apply(&mut self, progress: StageProgress) -> StageUpdate {
        if progress.is_complete() {
            return StageUpdate::Reload;
        }

        // No stage icons exist past `total`.
        let finished = progress
            .finished
            .min(progress.total)
            .clamp(0, i64::from(u32::MAX)) as u32;
        let newly = (1..=finished)
            .filter(|stage| self.completed.insert(*stage))
            .collect();
        StageUpdate::Marked(newly)
    }
}

/// Handle to a spawned polling loop.
///
/// Dropping the handle leaves the loop running; only [`PeriodicTask::stop`]
/// ends it early.
pub struct PeriodicTask {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    fn spawn<F, Fut>(interval: Duration, body: F) -> Self
    where
        F: FnOnce(Ticker) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (stop, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(body(Ticker { interval, stop_rx }));
        Self { stop, handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signals the loop and waits for it to exit. An in-flight request is
    /// abandoned.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        self.join().await;
    }

    /// Runs until the loop ends on its own or `shutdown` resolves, in which
    /// case the loop is stopped.
    pub async fn stop_on<F: Future>(mut self, shutdown: F) {
        let finished = tokio::select! {
            _ = shutdown => false,
            res = &mut self.handle => {
                if let Err(e) = res {
                    tracing::error!(error = %e, "Polling task panicked");
                }
                true
            }
        };
        if !finished {
            self.stop().await;
        }
    }

    /// Waits for the loop to end on its own.
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "Polling task panicked");
        }
    }
}

struct Ticker {
    interval: Duration,
    stop_rx: watch::Receiver<bool>,
}

impl Ticker {
    /// Sleeps one interval. False when stopped meanwhile.
    async fn wait(&mut self) -> bool {
        tokio::select! {
            _ = stopped(&mut self.stop_rx) => false,
            _ = tokio::time::sleep(self.interval) => true,
        }
    }

    /// Runs `fut` unless a stop arrives first.
    async fn guard<F: Future>(&mut self, fut: F) -> Option<F::Output> {
        tokio::select! {
            _ = stopped(&mut self.stop_rx) => None,
            out = fut => Some(out),
        }
    }
}

async fn stopped(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Handle dropped without stopping: never fires.
            std::future::pending::<()>().await;
        }
    }
}

/// Drives the status display and the stage display of one result page.
#[derive(Clone)]
pub struct StatusPoller {
    source: Arc<dyn StatusSource>,
    sink: Arc<dyn RenderSink>,
    status_interval: Duration,
    stage_interval: Duration,
    reload_delay: Duration,
}

impl StatusPoller {
    pub fn new(source: Arc<dyn StatusSource>, sink: Arc<dyn RenderSink>) -> Self {
        Self {
            source,
            sink,
            status_interval: STATUS_INTERVAL,
            stage_interval: STAGE_INTERVAL,
            reload_delay: RELOAD_DELAY,
        }
    }

    pub fn with_intervals(mut self, status: Duration, stage: Duration) -> Self {
        self.status_interval = status;
        self.stage_interval = stage;
        self
    }

    pub fn with_reload_delay(mut self, delay: Duration) -> Self {
        self.reload_delay = delay;
        self
    }

    /// One status fetch. On success all four fields are displayed; on
    /// failure the display is left as it was.
    pub async fn refresh_status(&self) -> Result<ServerStatusSnapshot, PollError> {
        let status = self.source.server_status().await?;
        self.sink.display_status(&status);
        Ok(status)
    }

    /// Polls `/status` every status interval, starting one interval from
    /// now, until stopped.
    pub fn start_status_loop(&self) -> PeriodicTask {
        let poller = self.clone();
        PeriodicTask::spawn(self.status_interval, move |mut ticker| async move {
            while ticker.wait().await {
                match ticker.guard(poller.refresh_status()).await {
                    None => return,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Unable to fetch server status");
                    }
                }
            }
        })
    }

    /// Polls the stage endpoint of `job_id` right away and then every stage
    /// interval. The loop ends after it has asked the sink to reload.
    pub fn start_stage_loop(&self, job_id: &str) -> PeriodicTask {
        let poller = self.clone();
        let job_id = job_id.to_string();
        PeriodicTask::spawn(self.stage_interval, move |mut ticker| async move {
            let mut board = StageBoard::new();
            loop {
                let Some(result) = ticker.guard(poller.source.stage_progress(&job_id)).await
                else {
                    return;
                };

                match result {
                    Ok(progress) => {
                        if poller.apply_stage(&job_id, &mut board, progress) {
                            let delay = tokio::time::sleep(poller.reload_delay);
                            if ticker.guard(delay).await.is_none() {
                                return;
                            }
                            poller.sink.reload(&job_id);
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(job_id = %job_id, error = %e, "Error fetching stage");
                    }
                }

                if !ticker.wait().await {
                    return;
                }
            }
        })
    }

    /// Applies one stage response to the board and the sink. Returns true
    /// when a reload is due.
    fn apply_stage(&self, job_id: &str, board: &mut StageBoard, progress: StageProgress) -> bool {
        tracing::debug!(
            job_id,
            finished = progress.finished,
            total = progress.total,
            percentage = ?progress.percentage(),
            "Stage progress"
        );

        match board.apply(progress) {
            StageUpdate::Reload => {
                tracing::info!(job_id, "Job finished, scheduling reload");
                true
            }
            StageUpdate::Marked(stages) => {
                for stage in stages {
                    self.sink.mark_stage_complete(stage);
                }
                false
            }
        }
    }
}

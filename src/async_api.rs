use crate::pipeline::{DeviceOutcome, Pipeline, PipelineConfig};
use crate::{CaptureTiming, DeviceProfile, Error, MockupResult, Result};
use futures::future::join_all;
use log::debug;
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::thread;
use tokio::sync::oneshot;

/// One unit of work for the worker: capture `url` for `device_classes`.
#[derive(Debug, Clone)]
pub struct CaptureJob {
    pub url: String,
    pub device_classes: Vec<String>,
    pub timing: CaptureTiming,
}

impl CaptureJob {
    pub fn new(url: impl Into<String>, device_classes: &[&str]) -> Self {
        Self {
            url: url.into(),
            device_classes: device_classes.iter().map(|c| c.to_string()).collect(),
            timing: CaptureTiming::default(),
        }
    }

    pub fn with_timing(mut self, timing: CaptureTiming) -> Self {
        self.timing = timing;
        self
    }
}

enum Command {
    Run(CaptureJob, oneshot::Sender<Result<Vec<DeviceOutcome>>>),
    Regenerate(String, DeviceProfile, CaptureTiming, oneshot::Sender<Result<DeviceOutcome>>),
    Recompose(PathBuf, String, oneshot::Sender<MockupResult>),
    Close(oneshot::Sender<Result<()>>),
}

/// An async-friendly pipeline handle backed by a dedicated worker thread.
///
/// Browser sessions and HTTP calls are blocking; the worker thread owns the
/// `Pipeline` and runs commands one at a time, so async tasks only ever
/// await a reply channel.
#[derive(Clone)]
pub struct PipelineWorker {
    cmd_tx: Sender<Command>,
}

impl PipelineWorker {
    /// Build the default pipeline on a new worker thread.
    pub async fn new(config: PipelineConfig) -> Result<Self> {
        let (init_tx, init_rx) = oneshot::channel::<Result<Pipeline>>();
        thread::spawn(move || {
            let _ = init_tx.send(Pipeline::with_default_backends(config));
        });
        let pipeline = init_rx
            .await
            .map_err(|e| Error::Other(format!("Worker init canceled: {}", e)))??;
        Ok(Self::spawn(pipeline))
    }

    /// Move an already assembled pipeline onto a worker thread.
    pub fn spawn(pipeline: Pipeline) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();

        thread::spawn(move || {
            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    Command::Run(job, resp) => {
                        debug!("Worker running {} for {:?}", job.url, job.device_classes);
                        let res = pipeline.run(&job.url, &job.device_classes, &job.timing);
                        let _ = resp.send(res);
                    }
                    Command::Regenerate(url, device, timing, resp) => {
                        let res = pipeline.regenerate(&url, &device, &timing);
                        let _ = resp.send(res);
                    }
                    Command::Recompose(path, class, resp) => {
                        let _ = resp.send(pipeline.recompose(&path, &class));
                    }
                    Command::Close(resp) => {
                        let _ = resp.send(Ok(()));
                        break;
                    }
                }
            }
        });

        Self { cmd_tx }
    }

    fn send(&self, cmd: Command) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| Error::Other("Pipeline worker has shut down".into()))
    }

    /// Capture and composite one job.
    pub async fn run(&self, job: CaptureJob) -> Result<Vec<DeviceOutcome>> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Run(job, tx))?;
        rx.await
            .map_err(|e| Error::Other(format!("Run canceled: {}", e)))?
    }

    /// Submit several jobs and wait for all of them; results are in
    /// submission order, each job succeeding or failing on its own.
    pub async fn run_all(&self, jobs: Vec<CaptureJob>) -> Vec<Result<Vec<DeviceOutcome>>> {
        join_all(jobs.into_iter().map(|job| self.run(job))).await
    }

    pub async fn regenerate(&self, url: &str, device: DeviceProfile, timing: CaptureTiming) -> Result<DeviceOutcome> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Regenerate(url.to_string(), device, timing, tx))?;
        rx.await
            .map_err(|e| Error::Other(format!("Regenerate canceled: {}", e)))?
    }

    pub async fn recompose(&self, screenshot_path: PathBuf, device_class: &str) -> Result<MockupResult> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Recompose(screenshot_path, device_class.to_string(), tx))?;
        rx.await
            .map_err(|e| Error::Other(format!("Recompose canceled: {}", e)))
    }

    /// Stop the worker thread once queued commands have run.
    pub async fn close(self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Close(tx))?;
        rx.await
            .map_err(|e| Error::Other(format!("Close canceled: {}", e)))?
    }
}

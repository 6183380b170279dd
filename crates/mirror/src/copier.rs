//! Background cache fill.
//!
//! A cache miss on archive retrieval submits the resolved provider here. Jobs
//! wait in a bounded queue and are drained by a fixed set of worker tasks, so
//! the request that triggered a job never waits on it. When the queue is full
//! the new job is rejected.

use crate::error::{MirrorError, MirrorResult};
use crate::upstream::UpstreamRegistry;
use dashmap::DashMap;
use depot_core::config::CopierConfig;
use depot_core::{Provider, ResolvedProvider, SigningKeys};
use depot_storage::MirrorStorage;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Terminal state of a submitted job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed,
    Rejected,
    Deduplicated,
}

impl JobOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            JobOutcome::Completed => "completed",
            JobOutcome::Failed => "failed",
            JobOutcome::Rejected => "rejected",
            JobOutcome::Deduplicated => "deduplicated",
        }
    }
}

/// What `submit` did with a job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitResult {
    Queued,
    Rejected,
    Deduplicated,
}

/// Callback invoked with every job outcome, e.g. to feed metrics.
pub type OutcomeObserver = Arc<dyn Fn(JobOutcome) + Send + Sync>;

struct Shared {
    storage: Arc<dyn MirrorStorage>,
    upstream: Arc<dyn UpstreamRegistry>,
    in_flight: Option<DashMap<Provider, ()>>,
    observer: Option<OutcomeObserver>,
    transfer_timeout: Duration,
}

impl Shared {
    fn observe(&self, outcome: JobOutcome) {
        if let Some(observer) = &self.observer {
            observer(outcome);
        }
    }

    fn release(&self, provider: &Provider) {
        if let Some(in_flight) = &self.in_flight {
            in_flight.remove(provider);
        }
    }
}

/// Handle for submitting cache-fill jobs. Cheap to clone.
#[derive(Clone)]
pub struct Copier {
    tx: mpsc::Sender<ResolvedProvider>,
    shared: Arc<Shared>,
}

/// Owns the worker tasks of a [`Copier`].
pub struct CopierHandle {
    shutdown: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl CopierHandle {
    /// Stop accepting jobs, finish everything already queued and wait for
    /// the workers to exit.
    pub async fn shutdown(self) {
        self.shutdown.send_replace(true);
        for worker in self.workers {
            if let Err(e) = worker.await {
                error!(error = %e, "copier worker panicked");
            }
        }
    }
}

impl Copier {
    /// Spawn the worker tasks on the current runtime.
    pub fn spawn(
        config: &CopierConfig,
        storage: Arc<dyn MirrorStorage>,
        upstream: Arc<dyn UpstreamRegistry>,
        transfer_timeout: Duration,
        observer: Option<OutcomeObserver>,
    ) -> (Self, CopierHandle) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let rx = Arc::new(Mutex::new(rx));

        let shared = Arc::new(Shared {
            storage,
            upstream,
            in_flight: config.deduplicate.then(DashMap::new),
            observer,
            transfer_timeout,
        });

        let workers = (0..config.workers.max(1))
            .map(|id| {
                tokio::spawn(worker_loop(
                    id,
                    rx.clone(),
                    shutdown_rx.clone(),
                    shared.clone(),
                ))
            })
            .collect();

        info!(
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            deduplicate = config.deduplicate,
            "copier started"
        );

        (
            Self { tx, shared },
            CopierHandle {
                shutdown: shutdown_tx,
                workers,
            },
        )
    }

    /// Queue a job without waiting. Never blocks.
    pub fn submit(&self, job: ResolvedProvider) -> SubmitResult {
        let provider = job.provider.clone();

        if let Some(in_flight) = &self.shared.in_flight
            && in_flight.insert(provider.clone(), ()).is_some()
        {
            debug!(provider = %provider, "copy already in flight, dropping duplicate");
            self.shared.observe(JobOutcome::Deduplicated);
            return SubmitResult::Deduplicated;
        }

        match self.tx.try_send(job) {
            Ok(()) => SubmitResult::Queued,
            Err(e) => {
                let reason = match e {
                    mpsc::error::TrySendError::Full(_) => "queue full",
                    mpsc::error::TrySendError::Closed(_) => "copier shut down",
                };
                warn!(provider = %provider, reason, "copy job rejected");
                self.shared.release(&provider);
                self.shared.observe(JobOutcome::Rejected);
                SubmitResult::Rejected
            }
        }
    }

    /// Jobs waiting for a worker.
    pub fn queue_depth(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}

async fn worker_loop(
    id: usize,
    rx: Arc<Mutex<mpsc::Receiver<ResolvedProvider>>>,
    mut shutdown: watch::Receiver<bool>,
    shared: Arc<Shared>,
) {
    loop {
        let next = {
            let mut rx = rx.lock().await;
            let received = tokio::select! {
                job = rx.recv() => Some(job),
                Ok(()) = shutdown.changed() => None,
            };
            match received {
                Some(job) => job,
                None => {
                    // Closing lets queued jobs drain, then recv yields None.
                    rx.close();
                    rx.recv().await
                }
            }
        };

        let Some(job) = next else {
            debug!(worker = id, "copier worker exiting");
            return;
        };

        let provider = job.provider.clone();
        let outcome = match copy(&shared, &job).await {
            Ok(()) => {
                info!(
                    worker = id,
                    hostname = provider.hostname(),
                    namespace = provider.namespace(),
                    name = provider.name(),
                    version = provider.version(),
                    os = provider.os(),
                    arch = provider.arch(),
                    "provider mirrored"
                );
                JobOutcome::Completed
            }
            Err(e) => {
                error!(
                    worker = id,
                    hostname = provider.hostname(),
                    namespace = provider.namespace(),
                    name = provider.name(),
                    version = provider.version(),
                    os = provider.os(),
                    arch = provider.arch(),
                    error = %e,
                    "failed to mirror provider"
                );
                JobOutcome::Failed
            }
        };
        shared.release(&provider);
        shared.observe(outcome);
    }
}

async fn fetch(shared: &Shared, url: &str) -> MirrorResult<bytes::Bytes> {
    tokio::time::timeout(shared.transfer_timeout, shared.upstream.download(url))
        .await
        .map_err(|_| {
            crate::error::UpstreamError::transport(
                url,
                format!("download timed out after {:?}", shared.transfer_timeout),
            )
        })?
        .map_err(MirrorError::from)
}

/// Download one build and persist it. The archive is written last so its
/// presence implies the manifest is present too.
async fn copy(shared: &Shared, job: &ResolvedProvider) -> MirrorResult<()> {
    let provider = &job.provider;
    let storage = &shared.storage;

    let archive = fetch(shared, &job.download_url).await?;
    job.shasum.verify(&archive)?;

    let manifest = fetch(shared, &job.shasums_url).await?;
    storage
        .upload_mirrored_file(provider, &provider.shasums_file_name()?, manifest)
        .await?;

    if let Some(signature_url) = &job.shasums_signature_url {
        let signature = fetch(shared, signature_url).await?;
        storage
            .upload_mirrored_file(provider, &provider.shasums_signature_file_name()?, signature)
            .await?;
    }

    if !job.signing_keys.is_empty() {
        let mut keys = match storage
            .mirrored_signing_keys(provider.hostname(), provider.namespace())
            .await
        {
            Ok(keys) => keys,
            Err(e) if e.is_not_found() => SigningKeys::default(),
            Err(e) => return Err(e.into()),
        };
        if keys.merge(&job.signing_keys) {
            storage
                .upload_mirrored_signing_keys(provider.hostname(), provider.namespace(), &keys)
                .await?;
        }
    }

    storage
        .upload_mirrored_file(provider, &job.filename, archive)
        .await?;
    Ok(())
}

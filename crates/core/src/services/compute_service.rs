use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::aggregate::PortfolioAggregate;
use crate::models::analytics::{IndicatorSet, RiskReport};
use crate::models::holding::Holding;
use crate::services::indicator_service::IndicatorService;
use crate::services::metrics_service::MetricsService;
use crate::services::risk_service::RiskService;

/// Heavier calculations that can be pushed off the caller's task.
#[derive(Debug, Clone, PartialEq)]
pub enum ComputeJob {
    /// Recompute the portfolio aggregate for these holdings
    Aggregate(Vec<Holding>),
    RiskReport {
        prices: Vec<f64>,
        confidence: f64,
        risk_free_rate: f64,
    },
    Indicators {
        prices: Vec<f64>,
        period: usize,
    },
}

impl ComputeJob {
    fn label(&self) -> &'static str {
        match self {
            ComputeJob::Aggregate(_) => "aggregate",
            ComputeJob::RiskReport { .. } => "risk-report",
            ComputeJob::Indicators { .. } => "indicators",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ComputeOutput {
    Aggregate(PortfolioAggregate),
    RiskReport(RiskReport),
    Indicators(IndicatorSet),
}

/// Runs a job to completion. Called on tokio's blocking pool.
pub trait ComputeBackend: Send + Sync + 'static {
    fn run(&self, job: ComputeJob) -> Result<ComputeOutput, CoreError>;
}

/// Backend built on the crate's own services.
#[derive(Default)]
pub struct StandardBackend {
    metrics: MetricsService,
    risk: RiskService,
    indicators: IndicatorService,
}

impl StandardBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ComputeBackend for StandardBackend {
    fn run(&self, job: ComputeJob) -> Result<ComputeOutput, CoreError> {
        match job {
            ComputeJob::Aggregate(holdings) => {
                let outcome = self.metrics.calculate(&holdings, None);
                Ok(ComputeOutput::Aggregate(outcome.aggregate))
            }
            ComputeJob::RiskReport {
                prices,
                confidence,
                risk_free_rate,
            } => Ok(ComputeOutput::RiskReport(
                self.risk.analyze(&prices, confidence, risk_free_rate),
            )),
            ComputeJob::Indicators { prices, period } => Ok(ComputeOutput::Indicators(
                self.indicators.indicator_set(&prices, period)?,
            )),
        }
    }
}

type JobResult = Result<ComputeOutput, CoreError>;

struct ComputeRequest {
    id: Uuid,
    job: ComputeJob,
    cancelled: Arc<AtomicBool>,
    reply: oneshot::Sender<JobResult>,
}

/// Background computation delegate.
///
/// Jobs are queued to a single worker task and served one at a time. Each
/// dispatch is correlated by a fresh id; callers wait with a bound and treat
/// anything other than a timely answer as a failure.
pub struct ComputeWorker {
    tx: Option<mpsc::UnboundedSender<ComputeRequest>>,
    task: Option<JoinHandle<()>>,
    timeout: Duration,
}

impl ComputeWorker {
    /// Spawn the worker on the current tokio runtime.
    pub fn spawn(backend: Arc<dyn ComputeBackend>, timeout: Duration) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<ComputeRequest>();

        let task = tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                let id = request.id;
                if request.cancelled.load(Ordering::SeqCst) || request.reply.is_closed() {
                    log::debug!("skipping abandoned compute job {id}");
                    continue;
                }

                let label = request.job.label();
                let backend = Arc::clone(&backend);
                let job = request.job;
                let result = match tokio::task::spawn_blocking(move || backend.run(job)).await {
                    Ok(result) => result,
                    Err(e) => Err(CoreError::WorkerUnavailable(format!("{label} job {id} failed: {e}"))),
                };

                if request.reply.send(result).is_err() {
                    log::debug!("{label} job {id} finished after its caller gave up");
                }
            }
            log::debug!("compute worker stopped");
        });

        Self {
            tx: Some(tx),
            task: Some(task),
            timeout,
        }
    }

    /// Worker backed by [`StandardBackend`].
    pub fn standard(timeout: Duration) -> Self {
        Self::spawn(Arc::new(StandardBackend::new()), timeout)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.tx.is_some() && self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Queue a job without waiting for it.
    pub fn dispatch(&self, job: ComputeJob) -> ComputeTask {
        let id = Uuid::new_v4();
        let (reply, rx) = oneshot::channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        let label = job.label();

        // If the worker is gone the request (and its reply sender) is dropped,
        // which `wait` reports as `WorkerUnavailable`.
        if let Some(tx) = &self.tx {
            let request = ComputeRequest {
                id,
                job,
                cancelled: Arc::clone(&cancelled),
                reply,
            };
            if tx.send(request).is_err() {
                log::warn!("compute worker closed; {label} job {id} dropped");
            }
        }

        ComputeTask {
            id,
            label,
            rx,
            cancelled,
            timeout: self.timeout,
        }
    }

    /// Dispatch and wait with the worker's default bound.
    pub async fn submit(&self, job: ComputeJob) -> Result<ComputeOutput, CoreError> {
        self.dispatch(job).wait().await
    }

    /// Stop accepting jobs, let the queued ones drain, and join the task.
    pub async fn shutdown(mut self) {
        self.tx.take();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                log::warn!("compute worker ended abnormally: {e}");
            }
        }
    }
}

/// A dispatched job. Dropping it abandons the result.
pub struct ComputeTask {
    id: Uuid,
    label: &'static str,
    rx: oneshot::Receiver<JobResult>,
    cancelled: Arc<AtomicBool>,
    timeout: Duration,
}

impl ComputeTask {
    /// Correlation id of this job.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait with the worker's default bound.
    pub async fn wait(self) -> Result<ComputeOutput, CoreError> {
        let timeout = self.timeout;
        self.wait_for(timeout).await
    }

    /// Wait at most `timeout` for the answer.
    pub async fn wait_for(self, timeout: Duration) -> Result<ComputeOutput, CoreError> {
        let id = self.id;
        let label = self.label;
        match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                if self.cancelled.load(Ordering::SeqCst) {
                    Err(CoreError::WorkerCancelled(id.to_string()))
                } else {
                    Err(CoreError::WorkerUnavailable(format!("{label} job {id} got no reply")))
                }
            }
            Err(_) => {
                self.cancelled.store(true, Ordering::SeqCst);
                log::warn!("{label} job {id} timed out after {timeout:?}");
                Err(CoreError::WorkerTimeout {
                    job_id: id.to_string(),
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                })
            }
        }
    }

    /// Abandon the job. If the worker has not started it yet, it never runs.
    pub fn cancel(self) {
        self.cancelled.store(true, Ordering::SeqCst);
        log::debug!("{} job {} cancelled", self.label, self.id);
    }
}

use crate::models::{Click, NewAnalyticsEvent};
use crate::services::classifier::RequestClassifier;
use crate::services::redirect::Visit;
use crate::store::Store;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Click to be classified and recorded off the request path.
#[derive(Debug, Clone)]
pub struct ClickJob {
    pub link_id: i64,
    pub owner_id: i64,
    pub short_code: String,
    pub visit: Visit,
}

/// Background job types
#[derive(Debug)]
pub enum Job {
    /// Record one redirect: click log entry plus analytics event
    RecordClick(ClickJob),
}

/// Background job worker
pub struct Worker {
    store: Arc<dyn Store>,
    classifier: RequestClassifier,
    receiver: mpsc::UnboundedReceiver<Job>,
}

impl Worker {
    /// Create a new worker
    pub fn new(
        store: Arc<dyn Store>,
        classifier: RequestClassifier,
        receiver: mpsc::UnboundedReceiver<Job>,
    ) -> Self {
        Self {
            store,
            classifier,
            receiver,
        }
    }

    /// Run the worker - processes jobs until every sender is dropped
    pub async fn run(mut self) {
        info!("Background worker started");

        while let Some(job) = self.receiver.recv().await {
            self.process_job(job).await;
        }

        info!("Background worker stopped");
    }

    /// Failures are logged and dropped; recording is never retried.
    async fn process_job(&self, job: Job) {
        if let Err(e) = self.execute_job(&job).await {
            warn!("Job failed: {:?}: {}", job, e);
        }
    }

    async fn execute_job(&self, job: &Job) -> anyhow::Result<()> {
        match job {
            Job::RecordClick(click) => self.record_click(click).await,
        }
    }

    async fn record_click(&self, job: &ClickJob) -> anyhow::Result<()> {
        let visit = &job.visit;
        let classification = self
            .classifier
            .classify(visit.ip.as_deref(), visit.user_agent.as_deref())
            .await;

        self.store
            .append_click(
                job.link_id,
                Click {
                    timestamp: visit.timestamp,
                    device_type: classification.device_type,
                    region: classification.region(),
                    user_agent: visit.user_agent.clone(),
                },
            )
            .await?;

        self.store
            .record_event(NewAnalyticsEvent {
                owner_id: job.owner_id,
                short_code: job.short_code.clone(),
                link_id: job.link_id,
                timestamp: visit.timestamp,
                ip: visit.ip.clone(),
                referrer: visit.referrer.clone(),
                device_type: classification.device_type,
                user_agent: visit.user_agent.clone(),
                country: classification.country,
                city: classification.city,
            })
            .await?;

        debug!(short_code = %job.short_code, "Recorded click");
        Ok(())
    }
}

/// Job sender - used to submit jobs to the worker
#[derive(Clone)]
pub struct JobSender {
    sender: mpsc::UnboundedSender<Job>,
}

impl JobSender {
    /// Create a new job sender
    pub fn new(sender: mpsc::UnboundedSender<Job>) -> Self {
        Self { sender }
    }

    /// Submit a job to be processed asynchronously
    pub fn send(&self, job: Job) {
        if self.sender.send(job).is_err() {
            error!("Failed to send job to worker - channel may be closed");
        }
    }

    pub fn record_click(&self, job: ClickJob) {
        self.send(Job::RecordClick(job));
    }
}

/// Create a new job sender and receiver pair
pub fn create_job_channel() -> (JobSender, mpsc::UnboundedReceiver<Job>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (JobSender::new(sender), receiver)
}

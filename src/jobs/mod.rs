//! In-process background job queue.
//!
//! Jobs are pushed onto an unbounded channel and drained by a fixed number of
//! worker tasks. A failing job is logged and dropped; nothing is retried and
//! nothing is reported back to the request that enqueued it.

pub mod images;

use std::{path::PathBuf, sync::Arc};

use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use crate::services::email_service::{EmailMessage, EmailService};

#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    SendEmail(EmailMessage),
    NormalizeImage { path: PathBuf },
}

impl Job {
    pub fn kind(&self) -> &'static str {
        match self {
            Job::SendEmail(_) => "send_email",
            Job::NormalizeImage { .. } => "normalize_image",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Job queue is closed")]
    QueueClosed,
    #[error("Email delivery failed: {0}")]
    Email(#[from] crate::services::email_service::EmailError),
    #[error("Image normalization failed: {0}")]
    Image(#[from] images::ImageJobError),
    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Cloneable handle used by request handlers to enqueue work.
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::UnboundedSender<Job>,
}

impl JobQueue {
    /// Never blocks; fails only once every worker has stopped.
    pub fn enqueue(&self, job: Job) -> Result<(), JobError> {
        let kind = job.kind();
        self.sender.send(job).map_err(|_| JobError::QueueClosed)?;
        debug!("Enqueued {} job", kind);
        Ok(())
    }
}

/// What the workers need to execute jobs.
#[derive(Clone)]
pub struct JobContext {
    pub email_service: Arc<dyn EmailService>,
    pub image_target_size: u32,
}

/// Owns the worker tasks. Workers exit once every [`JobQueue`] is dropped
/// and the remaining jobs are done.
pub struct JobRunner {
    workers: Vec<JoinHandle<()>>,
}

impl JobRunner {
    pub async fn join(self) {
        for worker in self.workers {
            if let Err(e) = worker.await {
                error!("Job worker panicked: {}", e);
            }
        }
    }
}

pub fn start(context: JobContext, workers: usize) -> (JobQueue, JobRunner) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let receiver = Arc::new(Mutex::new(receiver));
    let workers = workers.max(1);

    let handles = (0..workers)
        .map(|id| {
            let receiver = receiver.clone();
            let context = context.clone();
            tokio::spawn(async move { worker_loop(id, receiver, context).await })
        })
        .collect();

    info!("Started {} job workers", workers);

    (JobQueue { sender }, JobRunner { workers: handles })
}

async fn worker_loop(
    id: usize,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<Job>>>,
    context: JobContext,
) {
    loop {
        let job = {
            let mut receiver = receiver.lock().await;
            receiver.recv().await
        };

        let Some(job) = job else {
            debug!("Job worker {} stopping", id);
            break;
        };

        let kind = job.kind();
        match run_job(&context, job).await {
            Ok(()) => debug!("Worker {} finished {} job", id, kind),
            Err(e) => error!("Worker {} failed {} job: {}", id, kind, e),
        }
    }
}

/// Execute a single job on the current task.
pub async fn run_job(context: &JobContext, job: Job) -> Result<(), JobError> {
    match job {
        Job::SendEmail(message) => {
            context.email_service.send(&message).await?;
            info!(
                "Sent email '{}' to {}",
                message.subject,
                message.recipients.join(", ")
            );
            Ok(())
        }
        Job::NormalizeImage { path } => {
            let target = context.image_target_size;
            let shown = path.display().to_string();
            let dims =
                tokio::task::spawn_blocking(move || images::normalize_image(&path, target)).await??;
            info!("Normalized {} to {}x{}", shown, dims.0, dims.1);
            Ok(())
        }
    }
}

/// Log-and-continue wrapper for handlers that must not fail on enqueue.
pub fn enqueue_or_warn(queue: &JobQueue, job: Job) {
    let kind = job.kind();
    if let Err(e) = queue.enqueue(job) {
        warn!("Could not enqueue {} job: {}", kind, e);
    }
}

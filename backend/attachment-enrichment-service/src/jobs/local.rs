//! In-process job queue
use super::{JobHandler, JobScheduler, ScheduledJob, SchedulerError};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Queue drained by a single worker task; jobs run one at a time
#[derive(Clone)]
pub struct LocalJobScheduler {
    sender: mpsc::UnboundedSender<ScheduledJob>,
}

impl LocalJobScheduler {
    /// Spawn the worker. It exits once every scheduler clone is dropped and
    /// the queue is drained.
    pub fn spawn(handler: Arc<dyn JobHandler>) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::unbounded_channel::<ScheduledJob>();

        let worker = tokio::spawn(async move {
            info!("Local job worker started");
            while let Some(job) = receiver.recv().await {
                let wait = (job.run_at - Utc::now()).to_std().unwrap_or_default();
                if !wait.is_zero() {
                    debug!(attachment_id = %job.attachment_id, wait_ms = wait.as_millis(), "Waiting for job");
                    tokio::time::sleep(wait).await;
                }
                handler.execute(&job).await;
            }
            info!("Local job worker stopped");
        });

        (Self { sender }, worker)
    }
}

#[async_trait]
impl JobScheduler for LocalJobScheduler {
    async fn schedule_once(&self, job: ScheduledJob) -> Result<(), SchedulerError> {
        self.sender.send(job).map_err(|_| SchedulerError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<Uuid>>,
    }

    #[async_trait]
    impl JobHandler for Recorder {
        async fn execute(&self, job: &ScheduledJob) {
            self.seen.lock().unwrap().push(job.attachment_id);
        }
    }

    #[tokio::test]
    async fn test_jobs_run_in_order() {
        let recorder = Arc::new(Recorder::default());
        let (scheduler, worker) = LocalJobScheduler::spawn(recorder.clone());

        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        scheduler
            .schedule_once(ScheduledJob::enrichment(first, Utc::now()))
            .await
            .unwrap();
        scheduler
            .schedule_once(ScheduledJob::enrichment(second, Utc::now()))
            .await
            .unwrap();

        drop(scheduler);
        worker.await.unwrap();

        assert_eq!(*recorder.seen.lock().unwrap(), vec![first, second]);
    }
}

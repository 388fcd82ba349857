use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::{
    jobs::{abandon, claim_due, finish, push_back, QueueError},
    models::Job,
    state::AppState,
};

pub mod sla;

/// What a handler decided about a claimed job. `Reschedule` covers both
/// transient failures and jobs that are simply not ripe yet.
#[derive(Debug)]
pub enum JobOutcome {
    Done,
    Reschedule { delay: Duration, reason: String },
    Abandon { error: String },
}

#[async_trait]
pub trait JobHandler: Send + Sync {
    fn kind(&self) -> &'static str;
    async fn run(&self, state: Arc<AppState>, job: Job) -> JobOutcome;
}

pub struct Worker {
    state: Arc<AppState>,
    registry: HashMap<&'static str, Arc<dyn JobHandler>>,
    idle_wait: Duration,
}

impl Worker {
    pub fn new(
        state: Arc<AppState>,
        handlers: Vec<Arc<dyn JobHandler>>,
        idle_wait: Duration,
    ) -> Self {
        let registry = handlers
            .into_iter()
            .map(|handler| (handler.kind(), handler))
            .collect();
        Self {
            state,
            registry,
            idle_wait,
        }
    }

    /// Poll until cancelled. Due jobs are drained back to back; the idle
    /// wait only applies when the queue is empty or the tick errored.
    pub async fn run(&self) {
        info!(handlers = self.registry.len(), "job worker online");
        loop {
            match self.poll_once().await {
                Ok(true) => {}
                Ok(false) => sleep(self.idle_wait).await,
                Err(err) => {
                    error!(error = %err, "worker poll failed");
                    sleep(self.idle_wait).await;
                }
            }
        }
    }

    async fn poll_once(&self) -> Result<bool, QueueError> {
        let kinds: Vec<&str> = self.registry.keys().copied().collect();
        if kinds.is_empty() {
            return Ok(false);
        }

        let claimed = {
            let mut conn = match self.state.db() {
                Ok(conn) => conn,
                Err(err) => {
                    error!(?err, "worker could not check out a connection");
                    return Ok(false);
                }
            };
            claim_due(&mut conn, &kinds)?
        };

        let Some(job) = claimed else { return Ok(false) };

        let outcome = match self.registry.get(job.job_type.as_str()) {
            Some(handler) => handler.run(self.state.clone(), job.clone()).await,
            None => JobOutcome::Abandon {
                error: format!("no handler registered for '{}'", job.job_type),
            },
        };
        self.settle(&job, outcome)?;
        Ok(true)
    }

    fn settle(&self, job: &Job, outcome: JobOutcome) -> Result<(), QueueError> {
        let mut conn = match self.state.db() {
            Ok(conn) => conn,
            Err(err) => {
                // The job stays in `processing`; operators can requeue it
                // from the table if the pool never recovers.
                error!(job_id = %job.id, ?err, "could not record job outcome");
                return Ok(());
            }
        };

        match outcome {
            JobOutcome::Done => {
                info!(job_id = %job.id, kind = %job.job_type, "job done");
                finish(&mut conn, job.id)
            }
            JobOutcome::Reschedule { delay, reason } => {
                warn!(job_id = %job.id, kind = %job.job_type, %reason, ?delay, "job rescheduled");
                push_back(&mut conn, job.id, delay, &reason)
            }
            JobOutcome::Abandon { error } => {
                error!(job_id = %job.id, kind = %job.job_type, %error, "job abandoned");
                abandon(&mut conn, job.id, &error)
            }
        }
    }
}

pub fn default_handlers() -> Vec<Arc<dyn JobHandler>> {
    vec![Arc::new(sla::SlaSweepJob::new())]
}

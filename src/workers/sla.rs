use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use tracing::info;
use uuid::Uuid;

use crate::{
    jobs::JOB_SLA_SWEEP,
    models::{EfilingFile, Job},
    schema::files,
    state::AppState,
    workers::{JobHandler, JobOutcome},
};

pub const SLA_ACTIVE: &str = "ACTIVE";
pub const SLA_PAUSED: &str = "PAUSED";
pub const SLA_BREACHED: &str = "BREACHED";
pub const SLA_COMPLETED: &str = "COMPLETED";

const PAUSED_RECHECK: Duration = Duration::from_secs(3600);
const TRANSIENT_RETRY: Duration = Duration::from_secs(30);

/// Marks a file's SLA as breached once its deadline passes. Scheduled at
/// file creation for the deadline itself, so the sweep mostly fires exactly
/// once per file.
pub struct SlaSweepJob;

impl SlaSweepJob {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SlaSweepJob {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobHandler for SlaSweepJob {
    fn kind(&self) -> &'static str {
        JOB_SLA_SWEEP
    }

    async fn run(&self, state: Arc<AppState>, job: Job) -> JobOutcome {
        let file_id = match job
            .payload
            .get("file_id")
            .and_then(|value| value.as_str())
            .and_then(|raw| Uuid::parse_str(raw).ok())
        {
            Some(id) => id,
            None => {
                return JobOutcome::Abandon {
                    error: "payload missing file_id".to_string(),
                }
            }
        };

        let mut conn = match state.db() {
            Ok(conn) => conn,
            Err(err) => {
                return JobOutcome::Reschedule {
                    delay: TRANSIENT_RETRY,
                    reason: format!("pool error: {err:?}"),
                }
            }
        };

        let file: EfilingFile = match files::table.find(file_id).first(&mut conn).optional() {
            Ok(Some(file)) => file,
            Ok(None) => {
                return JobOutcome::Abandon {
                    error: format!("file {file_id} no longer exists"),
                }
            }
            Err(err) => {
                return JobOutcome::Reschedule {
                    delay: TRANSIENT_RETRY,
                    reason: format!("database error: {err}"),
                }
            }
        };

        match (file.sla_status.as_str(), file.sla_deadline) {
            (SLA_COMPLETED | SLA_BREACHED, _) | (_, None) => JobOutcome::Done,
            (SLA_PAUSED, _) => JobOutcome::Reschedule {
                delay: PAUSED_RECHECK,
                reason: "sla paused".to_string(),
            },
            (_, Some(deadline)) => {
                let now = Utc::now().naive_utc();
                if now < deadline {
                    let remaining = (deadline - now)
                        .to_std()
                        .unwrap_or(Duration::from_secs(60));
                    return JobOutcome::Reschedule {
                        delay: remaining,
                        reason: "deadline not reached".to_string(),
                    };
                }

                let updated = diesel::update(files::table.find(file.id))
                    .set((
                        files::sla_status.eq(SLA_BREACHED),
                        files::updated_at.eq(now),
                    ))
                    .execute(&mut conn);

                match updated {
                    Ok(_) => {
                        info!(file_id = %file.id, file_number = %file.file_number, "sla breached");
                        JobOutcome::Done
                    }
                    Err(err) => JobOutcome::Reschedule {
                        delay: TRANSIENT_RETRY,
                        reason: format!("failed to mark breach: {err}"),
                    },
                }
            }
        }
    }
}

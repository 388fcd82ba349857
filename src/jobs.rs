use std::time::Duration;

use chrono::{Duration as ChronoDuration, NaiveDateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Job, NewJob};
use crate::schema::jobs;

pub const STATUS_QUEUED: &str = "queued";
pub const STATUS_PROCESSING: &str = "processing";
pub const STATUS_SUCCEEDED: &str = "succeeded";
pub const STATUS_FAILED: &str = "failed";

pub const JOB_SLA_SWEEP: &str = "sla-sweep";

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

pub type QueueResult<T> = Result<T, QueueError>;

/// Insert a job that becomes due at `run_at`. SLA sweeps are scheduled for
/// the deadline itself, so a freshly created file sits idle in the queue
/// until then.
pub fn schedule_at(
    conn: &mut PgConnection,
    kind: &str,
    payload: Value,
    run_at: NaiveDateTime,
) -> QueueResult<Job> {
    let new_job = NewJob {
        id: Uuid::new_v4(),
        job_type: kind.to_string(),
        payload,
        status: STATUS_QUEUED.to_string(),
        run_after: run_at,
    };

    let job = diesel::insert_into(jobs::table)
        .values(&new_job)
        .get_result(conn)?;
    Ok(job)
}

/// Claim the next due job, if any. `FOR UPDATE SKIP LOCKED` lets several
/// worker processes poll the same table without stepping on each other; the
/// claim and the status flip happen in one transaction.
pub fn claim_due(conn: &mut PgConnection, kinds: &[&str]) -> QueueResult<Option<Job>> {
    let now = Utc::now().naive_utc();

    let claimed = conn.transaction::<Option<Job>, diesel::result::Error, _>(|conn| {
        let due = jobs::table
            .filter(jobs::status.eq(STATUS_QUEUED))
            .filter(jobs::run_after.le(now))
            .filter(jobs::job_type.eq_any(kinds))
            .order(jobs::run_after.asc())
            .for_update()
            .skip_locked()
            .first::<Job>(conn)
            .optional()?;

        let Some(job) = due else { return Ok(None) };

        let job = diesel::update(jobs::table.find(job.id))
            .set((
                jobs::status.eq(STATUS_PROCESSING),
                jobs::attempts.eq(job.attempts + 1),
                jobs::updated_at.eq(now),
            ))
            .get_result(conn)?;
        Ok(Some(job))
    })?;

    Ok(claimed)
}

pub fn finish(conn: &mut PgConnection, job_id: Uuid) -> QueueResult<()> {
    diesel::update(jobs::table.find(job_id))
        .set((
            jobs::status.eq(STATUS_SUCCEEDED),
            jobs::last_error.eq::<Option<String>>(None),
            jobs::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;
    Ok(())
}

/// Put a claimed job back in the queue, due again after `delay`. The reason
/// is recorded on the row so a stuck job can be diagnosed from the table.
pub fn push_back(
    conn: &mut PgConnection,
    job_id: Uuid,
    delay: Duration,
    reason: &str,
) -> QueueResult<()> {
    let delay = ChronoDuration::from_std(delay).unwrap_or_else(|_| ChronoDuration::seconds(30));
    let now = Utc::now();

    diesel::update(jobs::table.find(job_id))
        .set((
            jobs::status.eq(STATUS_QUEUED),
            jobs::run_after.eq((now + delay).naive_utc()),
            jobs::last_error.eq(Some(reason.to_string())),
            jobs::updated_at.eq(now.naive_utc()),
        ))
        .execute(conn)?;
    Ok(())
}

pub fn abandon(conn: &mut PgConnection, job_id: Uuid, error: &str) -> QueueResult<()> {
    diesel::update(jobs::table.find(job_id))
        .set((
            jobs::status.eq(STATUS_FAILED),
            jobs::last_error.eq(Some(error.to_string())),
            jobs::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;
    Ok(())
}

//! SQLite-backed job queue implementation.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::job::{Job, JobOptions, JobRecord, JobStatus, QueueState};
use crate::metrics;

use super::config::QueueConfig;
use super::store::{Delivery, JobQueue, QueueError, QueueStatus, ReapOutcome};

const COLUMNS: &str = "id, pdf_url, options, submitted_by, created_at, status, queue_state, \
                       deliveries, lease_expires_ms, run_id, failure_reason, updated_at";

/// SQLite-backed job queue.
///
/// All mutations run inside an immediate transaction while holding the
/// connection mutex, so concurrent workers in this process and other
/// processes sharing the file never lease the same job twice.
pub struct SqliteJobQueue {
    conn: Mutex<Connection>,
    config: QueueConfig,
    notify: Notify,
    closed: AtomicBool,
}

impl SqliteJobQueue {
    /// Open (or create) a queue database file.
    pub fn new(path: &Path, config: QueueConfig) -> Result<Self, QueueError> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::from_connection(conn, config)
    }

    /// Create an in-memory queue (useful for testing).
    pub fn in_memory(config: QueueConfig) -> Result<Self, QueueError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::from_connection(conn, config)
    }

    fn from_connection(conn: Connection, config: QueueConfig) -> Result<Self, QueueError> {
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            config,
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), QueueError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                pdf_url TEXT NOT NULL,
                options TEXT NOT NULL,
                submitted_by TEXT NOT NULL,
                created_at TEXT NOT NULL,
                status TEXT NOT NULL,
                queue_state TEXT NOT NULL,
                deliveries INTEGER NOT NULL DEFAULT 0,
                lease_expires_ms INTEGER,
                run_id TEXT,
                failure_reason TEXT,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_queue_state ON jobs(queue_state, seq);
            "#,
        )
        .map_err(db_err)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, QueueError> {
        self.conn
            .lock()
            .map_err(|_| QueueError::Database("queue connection lock poisoned".to_string()))
    }

    fn visibility_timeout(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.config.visibility_timeout_ms as i64)
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<JobRecord> {
        let id: String = row.get(0)?;
        let pdf_url: String = row.get(1)?;
        let options_json: String = row.get(2)?;
        let submitted_by: String = row.get(3)?;
        let created_at_str: String = row.get(4)?;
        let status_str: String = row.get(5)?;
        let queue_state_str: String = row.get(6)?;
        let deliveries: u32 = row.get(7)?;
        let lease_expires_ms: Option<i64> = row.get(8)?;
        let run_id: Option<String> = row.get(9)?;
        let failure_reason: Option<String> = row.get(10)?;
        let updated_at_str: String = row.get(11)?;

        let options: JobOptions =
            serde_json::from_str(&options_json).map_err(|e| conversion_error(2, e.to_string()))?;
        let status: JobStatus = status_str.parse().map_err(|e| conversion_error(5, e))?;
        let queue_state: QueueState = queue_state_str
            .parse()
            .map_err(|e| conversion_error(6, e))?;

        Ok(JobRecord {
            job: Job {
                id,
                pdf_url,
                options,
                submitted_by,
                created_at: parse_timestamp(4, &created_at_str)?,
            },
            status,
            queue_state,
            deliveries,
            lease_expires_at: lease_expires_ms.and_then(DateTime::<Utc>::from_timestamp_millis),
            run_id,
            failure_reason,
            updated_at: parse_timestamp(11, &updated_at_str)?,
        })
    }

    fn load(conn: &Connection, id: &str) -> Result<Option<JobRecord>, QueueError> {
        conn.query_row(
            &format!("SELECT {} FROM jobs WHERE id = ?", COLUMNS),
            params![id],
            Self::row_to_record,
        )
        .optional()
        .map_err(db_err)
    }

    /// Load a record and check it is in the expected delivery state.
    fn require_state(
        conn: &Connection,
        id: &str,
        expected: QueueState,
        operation: &str,
    ) -> Result<JobRecord, QueueError> {
        let record = Self::load(conn, id)?.ok_or_else(|| QueueError::NotFound(id.to_string()))?;
        if record.queue_state != expected {
            return Err(QueueError::InvalidState {
                job_id: id.to_string(),
                current_state: record.queue_state.to_string(),
                operation: operation.to_string(),
            });
        }
        Ok(record)
    }

    fn require_transition(
        record: &JobRecord,
        next: JobStatus,
        operation: &str,
    ) -> Result<(), QueueError> {
        if record.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(QueueError::InvalidState {
                job_id: record.job.id.clone(),
                current_state: record.status.to_string(),
                operation: operation.to_string(),
            })
        }
    }
}

#[async_trait]
impl JobQueue for SqliteJobQueue {
    fn enqueue(&self, job: Job) -> Result<JobRecord, QueueError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }
        let options_json =
            serde_json::to_string(&job.options).map_err(|e| QueueError::Serialization(e.to_string()))?;
        let now = Utc::now();

        {
            let mut conn = self.lock()?;
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(db_err)?;

            let exists: bool = tx
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM jobs WHERE id = ?)",
                    params![job.id],
                    |row| row.get(0),
                )
                .map_err(db_err)?;
            if exists {
                return Err(QueueError::Conflict(job.id));
            }

            tx.execute(
                "INSERT INTO jobs (id, pdf_url, options, submitted_by, created_at, status, queue_state, deliveries, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?)",
                params![
                    job.id,
                    job.pdf_url,
                    options_json,
                    job.submitted_by,
                    job.created_at.to_rfc3339(),
                    JobStatus::Enqueued.as_str(),
                    QueueState::Ready.as_str(),
                    now.to_rfc3339(),
                ],
            )
            .map_err(db_err)?;
            tx.commit().map_err(db_err)?;
        }

        debug!("Enqueued job {}", job.id);
        self.notify.notify_waiters();

        Ok(JobRecord {
            job,
            status: JobStatus::Enqueued,
            queue_state: QueueState::Ready,
            deliveries: 0,
            lease_expires_at: None,
            run_id: None,
            failure_reason: None,
            updated_at: now,
        })
    }

    async fn dequeue(&self) -> Result<Delivery, QueueError> {
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms.max(1));
        loop {
            if self.closed.load(Ordering::SeqCst) {
                return Err(QueueError::Closed);
            }

            // Register for wake-ups before looking, so an enqueue between the
            // lookup and the wait is not missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(delivery) = self.try_dequeue()? {
                return Ok(delivery);
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep(poll_interval) => {}
            }
        }
    }

    fn try_dequeue(&self) -> Result<Option<Delivery>, QueueError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }

        let now = Utc::now();
        let lease_expires_at = now + self.visibility_timeout();

        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_err)?;

        let record = tx
            .query_row(
                &format!(
                    "SELECT {} FROM jobs WHERE queue_state = ? ORDER BY seq ASC LIMIT 1",
                    COLUMNS
                ),
                params![QueueState::Ready.as_str()],
                Self::row_to_record,
            )
            .optional()
            .map_err(db_err)?;

        let Some(record) = record else {
            return Ok(None);
        };

        let attempt = record.deliveries + 1;
        tx.execute(
            "UPDATE jobs SET queue_state = ?, status = ?, deliveries = ?, lease_expires_ms = ?, updated_at = ? WHERE id = ?",
            params![
                QueueState::Leased.as_str(),
                JobStatus::Running.as_str(),
                attempt,
                lease_expires_at.timestamp_millis(),
                now.to_rfc3339(),
                record.job.id,
            ],
        )
        .map_err(db_err)?;
        tx.commit().map_err(db_err)?;

        metrics::QUEUE_DELIVERIES.inc();
        debug!("Leased job {} (delivery {})", record.job.id, attempt);

        Ok(Some(Delivery {
            job: record.job,
            attempt,
            lease_expires_at,
        }))
    }

    fn ack(&self, job_id: &str) -> Result<(), QueueError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_err)?;
        Self::require_state(&tx, job_id, QueueState::Leased, "ack")?;

        tx.execute(
            "UPDATE jobs SET queue_state = ?, lease_expires_ms = NULL, updated_at = ? WHERE id = ?",
            params![QueueState::Acked.as_str(), Utc::now().to_rfc3339(), job_id],
        )
        .map_err(db_err)?;
        tx.commit().map_err(db_err)?;

        debug!("Acked job {}", job_id);
        Ok(())
    }

    fn fail(&self, job_id: &str, reason: &str) -> Result<(), QueueError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_err)?;
        let record = Self::require_state(&tx, job_id, QueueState::Leased, "fail")?;
        Self::require_transition(&record, JobStatus::Failed, "fail")?;

        tx.execute(
            "UPDATE jobs SET queue_state = ?, status = ?, failure_reason = ?, lease_expires_ms = NULL, updated_at = ? WHERE id = ?",
            params![
                QueueState::Dead.as_str(),
                JobStatus::Failed.as_str(),
                reason,
                Utc::now().to_rfc3339(),
                job_id,
            ],
        )
        .map_err(db_err)?;
        tx.commit().map_err(db_err)?;

        info!("Job {} failed: {}", job_id, reason);
        Ok(())
    }

    fn cancel(&self, job_id: &str) -> Result<JobRecord, QueueError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_err)?;
        let record = Self::require_state(&tx, job_id, QueueState::Ready, "cancel")?;
        if record.deliveries > 0 {
            // Already taken by a worker once; only never-dequeued jobs may be cancelled.
            return Err(QueueError::InvalidState {
                job_id: job_id.to_string(),
                current_state: format!("{} after {} deliveries", record.queue_state, record.deliveries),
                operation: "cancel".to_string(),
            });
        }

        tx.execute(
            "UPDATE jobs SET queue_state = ?, status = ?, failure_reason = ?, updated_at = ? WHERE id = ?",
            params![
                QueueState::Cancelled.as_str(),
                JobStatus::Failed.as_str(),
                "cancelled",
                Utc::now().to_rfc3339(),
                job_id,
            ],
        )
        .map_err(db_err)?;
        let updated = Self::load(&tx, job_id)?.ok_or_else(|| QueueError::NotFound(job_id.to_string()))?;
        tx.commit().map_err(db_err)?;

        info!("Cancelled job {}", job_id);
        Ok(updated)
    }

    fn reap_expired(&self) -> Result<ReapOutcome, QueueError> {
        let now = Utc::now();
        let mut outcome = ReapOutcome::default();

        {
            let mut conn = self.lock()?;
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(db_err)?;

            let expired: Vec<(String, u32)> = {
                let mut stmt = tx
                    .prepare(
                        "SELECT id, deliveries FROM jobs WHERE queue_state = ? AND lease_expires_ms <= ? ORDER BY seq ASC",
                    )
                    .map_err(db_err)?;
                let rows = stmt
                    .query_map(
                        params![QueueState::Leased.as_str(), now.timestamp_millis()],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .map_err(db_err)?;
                rows.collect::<Result<_, _>>().map_err(db_err)?
            };

            for (id, deliveries) in expired {
                if deliveries < self.config.max_deliveries {
                    tx.execute(
                        "UPDATE jobs SET queue_state = ?, lease_expires_ms = NULL, updated_at = ? WHERE id = ?",
                        params![QueueState::Ready.as_str(), now.to_rfc3339(), id],
                    )
                    .map_err(db_err)?;
                    outcome.requeued.push(id);
                } else {
                    let reason = format!("delivery limit exceeded after {} attempts", deliveries);
                    tx.execute(
                        "UPDATE jobs SET queue_state = ?, status = ?, failure_reason = ?, lease_expires_ms = NULL, updated_at = ? WHERE id = ?",
                        params![
                            QueueState::Dead.as_str(),
                            JobStatus::Failed.as_str(),
                            reason,
                            now.to_rfc3339(),
                            id,
                        ],
                    )
                    .map_err(db_err)?;
                    outcome.dead.push(id);
                }
            }

            tx.commit().map_err(db_err)?;
        }

        if !outcome.requeued.is_empty() {
            metrics::QUEUE_REDELIVERIES.inc_by(outcome.requeued.len() as u64);
            info!("Requeued {} expired leases", outcome.requeued.len());
            self.notify.notify_waiters();
        }
        for id in &outcome.dead {
            warn!("Job {} exhausted its deliveries", id);
        }

        Ok(outcome)
    }

    fn attach_run(&self, job_id: &str, run_id: &str) -> Result<(), QueueError> {
        let conn = self.lock()?;
        let updated = conn
            .execute(
                "UPDATE jobs SET run_id = ?, updated_at = ? WHERE id = ?",
                params![run_id, Utc::now().to_rfc3339(), job_id],
            )
            .map_err(db_err)?;
        if updated == 0 {
            return Err(QueueError::NotFound(job_id.to_string()));
        }
        Ok(())
    }

    fn awaiting_outcome(&self, limit: usize) -> Result<Vec<JobRecord>, QueueError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM jobs WHERE queue_state = ? AND status = ? AND run_id IS NOT NULL ORDER BY seq ASC LIMIT ?",
                COLUMNS
            ))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(
                params![
                    QueueState::Acked.as_str(),
                    JobStatus::Running.as_str(),
                    limit as i64
                ],
                Self::row_to_record,
            )
            .map_err(db_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
    }

    fn record_outcome(
        &self,
        job_id: &str,
        status: JobStatus,
        reason: Option<&str>,
    ) -> Result<JobRecord, QueueError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_err)?;
        let record = Self::load(&tx, job_id)?.ok_or_else(|| QueueError::NotFound(job_id.to_string()))?;
        Self::require_transition(&record, status, "record outcome for")?;

        tx.execute(
            "UPDATE jobs SET status = ?, failure_reason = COALESCE(?, failure_reason), updated_at = ? WHERE id = ?",
            params![status.as_str(), reason, Utc::now().to_rfc3339(), job_id],
        )
        .map_err(db_err)?;
        let updated = Self::load(&tx, job_id)?.ok_or_else(|| QueueError::NotFound(job_id.to_string()))?;
        tx.commit().map_err(db_err)?;

        Ok(updated)
    }

    fn get(&self, job_id: &str) -> Result<Option<JobRecord>, QueueError> {
        let conn = self.lock()?;
        Self::load(&conn, job_id)
    }

    fn status(&self) -> Result<QueueStatus, QueueError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT queue_state, COUNT(*) FROM jobs GROUP BY queue_state")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(db_err)?;

        let mut status = QueueStatus::default();
        for row in rows {
            let (state, count) = row.map_err(db_err)?;
            let count = count as usize;
            match state.parse::<QueueState>() {
                Ok(QueueState::Ready) => status.ready = count,
                Ok(QueueState::Leased) => status.leased = count,
                Ok(QueueState::Acked) => status.acked = count,
                Ok(QueueState::Dead) => status.dead = count,
                Ok(QueueState::Cancelled) => status.cancelled = count,
                Err(e) => return Err(QueueError::Serialization(e)),
            }
        }
        Ok(status)
    }

    fn ready_count(&self) -> Result<usize, QueueError> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM jobs WHERE queue_state = ?",
                params![QueueState::Ready.as_str()],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        Ok(count as usize)
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!("Job queue closed");
        }
        self.notify.notify_waiters();
    }
}

fn db_err(e: rusqlite::Error) -> QueueError {
    QueueError::Database(e.to_string())
}

fn conversion_error(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, msg.into())
}

fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e.to_string()))
}

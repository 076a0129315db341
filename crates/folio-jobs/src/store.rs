//! Job persistence using SQLite.
//!
//! Every status mutation is a conditional UPDATE keyed on the current
//! status, so concurrent writers (submitter, executor, cancellation
//! handler) cannot produce lost updates.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};

use folio_core::{
    ChunkingConfig, ExtractionResult, ProcessingError, ProcessingResult,
};

use crate::status::{JobPriority, JobStatus};

/// A persisted processing job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingJob {
    pub id: String,
    pub user_id: String,
    pub file_name: String,
    /// MIME type of the uploaded document.
    pub file_type: String,
    pub file_size: u64,
    /// Key of the uploaded bytes in object storage.
    pub storage_key: String,
    pub status: JobStatus,
    pub priority: JobPriority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunking_config: Option<ChunkingConfig>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub estimated_completion: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ExtractionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProcessingError>,
}

/// SQLite-backed job store.
pub struct JobStore {
    conn: Arc<Mutex<Connection>>,
}

fn db_err(e: impl std::fmt::Display) -> ProcessingError {
    ProcessingError::dependency(format!("job store error: {}", e))
}

impl JobStore {
    /// Open (or create) a store at the given path.
    pub fn new(db_path: impl AsRef<Path>) -> ProcessingResult<Self> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(db_err)?;
            }
        }

        let conn = Connection::open(db_path.as_ref()).map_err(db_err)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.create_table()?;
        Ok(store)
    }

    /// Open an in-memory store, mainly for tests.
    pub fn in_memory() -> ProcessingResult<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.create_table()?;
        Ok(store)
    }

    fn create_table(&self) -> ProcessingResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id                   TEXT PRIMARY KEY,
                user_id              TEXT NOT NULL,
                file_name            TEXT NOT NULL,
                file_type            TEXT NOT NULL,
                file_size            INTEGER NOT NULL,
                storage_key          TEXT NOT NULL,
                status               TEXT NOT NULL,
                priority             TEXT NOT NULL,
                course_id            TEXT,
                callback_url         TEXT,
                chunking_config      TEXT,
                created_at           TEXT NOT NULL,
                updated_at           TEXT NOT NULL,
                estimated_completion TEXT NOT NULL,
                result               TEXT,
                error                TEXT
            )
            "#,
            [],
        )
        .map_err(db_err)?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_jobs_user_id ON jobs(user_id)",
            [],
        )
        .map_err(db_err)?;

        Ok(())
    }

    /// Insert a new job row.
    pub fn insert(&self, job: &ProcessingJob) -> ProcessingResult<()> {
        let conn = self.conn.lock().unwrap();
        let chunking = job
            .chunking_config
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(db_err)?;
        let result = job
            .result
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(db_err)?;
        let error = job
            .error
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(db_err)?;

        conn.execute(
            r#"
            INSERT INTO jobs (
                id, user_id, file_name, file_type, file_size, storage_key,
                status, priority, course_id, callback_url, chunking_config,
                created_at, updated_at, estimated_completion, result, error
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
            params![
                job.id,
                job.user_id,
                job.file_name,
                job.file_type,
                job.file_size as i64,
                job.storage_key,
                job.status.as_str(),
                job.priority.as_str(),
                job.course_id,
                job.callback_url,
                chunking,
                job.created_at.to_rfc3339(),
                job.updated_at.to_rfc3339(),
                job.estimated_completion.to_rfc3339(),
                result,
                error,
            ],
        )
        .map_err(db_err)?;

        Ok(())
    }

    /// Fetch a job owned by `user_id`.
    ///
    /// A job owned by a different user is indistinguishable from a missing
    /// one; both return `JobNotFound`.
    pub fn get(&self, job_id: &str, user_id: &str) -> ProcessingResult<ProcessingJob> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!(
                "{} WHERE id = ?1 AND user_id = ?2",
                Self::SELECT_COLUMNS
            ))
            .map_err(db_err)?;

        let mut rows = stmt
            .query_map(params![job_id, user_id], row_to_job)
            .map_err(db_err)?;

        match rows.next() {
            Some(row) => row.map_err(db_err),
            None => Err(ProcessingError::job_not_found(job_id)),
        }
    }

    /// Fetch a job by id alone. Executor-side only; user-facing lookups go
    /// through `get`.
    pub(crate) fn get_any(&self, job_id: &str) -> ProcessingResult<ProcessingJob> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!("{} WHERE id = ?1", Self::SELECT_COLUMNS))
            .map_err(db_err)?;

        let mut rows = stmt.query_map(params![job_id], row_to_job).map_err(db_err)?;
        match rows.next() {
            Some(row) => row.map_err(db_err),
            None => Err(ProcessingError::job_not_found(job_id)),
        }
    }

    const SELECT_COLUMNS: &'static str = r#"
        SELECT id, user_id, file_name, file_type, file_size, storage_key,
               status, priority, course_id, callback_url, chunking_config,
               created_at, updated_at, estimated_completion, result, error
        FROM jobs
    "#;

    /// Conditionally transition a job from `from` to `to`.
    ///
    /// The UPDATE is keyed on the current status; if another writer got
    /// there first the row count is 0 and `InvalidJobState` is returned.
    pub fn transition(
        &self,
        job_id: &str,
        from: JobStatus,
        to: JobStatus,
        result: Option<&ExtractionResult>,
        error: Option<&ProcessingError>,
    ) -> ProcessingResult<()> {
        if !from.can_transition(to) {
            return Err(ProcessingError::invalid_job_state(
                job_id,
                format!("cannot transition {} -> {}", from.as_str(), to.as_str()),
            ));
        }

        let result_json = result.map(serde_json::to_string).transpose().map_err(db_err)?;
        let error_json = error.map(serde_json::to_string).transpose().map_err(db_err)?;
        let now = Utc::now().to_rfc3339();

        let conn = self.conn.lock().unwrap();
        let updated = conn
            .execute(
                r#"
                UPDATE jobs
                SET status = ?1,
                    updated_at = ?2,
                    result = COALESCE(?3, result),
                    error = COALESCE(?4, error)
                WHERE id = ?5 AND status = ?6
                "#,
                params![to.as_str(), now, result_json, error_json, job_id, from.as_str()],
            )
            .map_err(db_err)?;

        if updated == 0 {
            // Distinguish a missing row from a stale expected status.
            let exists: bool = conn
                .query_row(
                    "SELECT COUNT(*) FROM jobs WHERE id = ?1",
                    params![job_id],
                    |row| row.get::<_, i64>(0),
                )
                .map(|n| n > 0)
                .map_err(db_err)?;
            return if exists {
                Err(ProcessingError::invalid_job_state(
                    job_id,
                    format!("not in expected status '{}'", from.as_str()),
                ))
            } else {
                Err(ProcessingError::job_not_found(job_id))
            };
        }

        tracing::debug!(job_id, from = from.as_str(), to = to.as_str(), "job transitioned");
        Ok(())
    }

    /// Remove a job row. Missing rows are not an error.
    pub fn delete(&self, job_id: &str) -> ProcessingResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM jobs WHERE id = ?1", params![job_id])
            .map_err(db_err)?;
        Ok(())
    }
}

fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProcessingJob> {
    let id: String = row.get(0)?;
    let status_str: String = row.get(6)?;
    let priority_str: String = row.get(7)?;
    let chunking: Option<String> = row.get(10)?;
    let created_at: String = row.get(11)?;
    let updated_at: String = row.get(12)?;
    let estimated: String = row.get(13)?;
    let result: Option<String> = row.get(14)?;
    let error: Option<String> = row.get(15)?;

    let status = JobStatus::parse(&status_str).unwrap_or_else(|| {
        tracing::warn!(
            job_id = %id,
            status = %status_str,
            "unrecognized persisted job status, reading as failed"
        );
        JobStatus::Failed
    });

    Ok(ProcessingJob {
        id,
        user_id: row.get(1)?,
        file_name: row.get(2)?,
        file_type: row.get(3)?,
        file_size: row.get::<_, i64>(4)? as u64,
        storage_key: row.get(5)?,
        status,
        priority: JobPriority::parse(&priority_str).unwrap_or_default(),
        course_id: row.get(8)?,
        callback_url: row.get(9)?,
        chunking_config: chunking.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: parse_time(&created_at),
        updated_at: parse_time(&updated_at),
        estimated_completion: parse_time(&estimated),
        result: result.and_then(|s| serde_json::from_str(&s).ok()),
        error: error.and_then(|s| serde_json::from_str(&s).ok()),
    })
}

fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::ErrorKind;

    fn sample_job(id: &str, user_id: &str) -> ProcessingJob {
        let now = Utc::now();
        ProcessingJob {
            id: id.to_string(),
            user_id: user_id.to_string(),
            file_name: "thesis.pdf".to_string(),
            file_type: "application/pdf".to_string(),
            file_size: 1024,
            storage_key: format!("uploads/{}/2026-08-30/{}/thesis.pdf", user_id, id),
            status: JobStatus::Queued,
            priority: JobPriority::Normal,
            course_id: None,
            callback_url: None,
            chunking_config: None,
            created_at: now,
            updated_at: now,
            estimated_completion: now + chrono::Duration::seconds(60),
            result: None,
            error: None,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let store = JobStore::in_memory().unwrap();
        store.insert(&sample_job("job-1", "alice")).unwrap();

        let job = store.get("job-1", "alice").unwrap();
        assert_eq!(job.file_name, "thesis.pdf");
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.file_size, 1024);
    }

    #[test]
    fn test_cross_user_lookup_is_not_found() {
        let store = JobStore::in_memory().unwrap();
        store.insert(&sample_job("job-1", "alice")).unwrap();

        let err = store.get("job-1", "mallory").unwrap_err();
        assert_eq!(err.kind, ErrorKind::JobNotFound);
    }

    #[test]
    fn test_conditional_transition() {
        let store = JobStore::in_memory().unwrap();
        store.insert(&sample_job("job-1", "alice")).unwrap();

        store
            .transition("job-1", JobStatus::Queued, JobStatus::Processing, None, None)
            .unwrap();
        assert_eq!(
            store.get("job-1", "alice").unwrap().status,
            JobStatus::Processing
        );

        // A second writer expecting Queued loses the race.
        let err = store
            .transition("job-1", JobStatus::Queued, JobStatus::Cancelled, None, None)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidJobState);
    }

    #[test]
    fn test_illegal_transition_rejected() {
        let store = JobStore::in_memory().unwrap();
        store.insert(&sample_job("job-1", "alice")).unwrap();

        let err = store
            .transition("job-1", JobStatus::Queued, JobStatus::Completed, None, None)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidJobState);
    }

    #[test]
    fn test_terminal_transition_writes_result() {
        let store = JobStore::in_memory().unwrap();
        store.insert(&sample_job("job-1", "alice")).unwrap();
        store
            .transition("job-1", JobStatus::Queued, JobStatus::Processing, None, None)
            .unwrap();

        let result = ExtractionResult::new("Extracted document body text.".to_string());
        store
            .transition(
                "job-1",
                JobStatus::Processing,
                JobStatus::Completed,
                Some(&result),
                None,
            )
            .unwrap();

        let job = store.get("job-1", "alice").unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(
            job.result.unwrap().text,
            "Extracted document body text."
        );
    }

    #[test]
    fn test_failed_transition_writes_error() {
        let store = JobStore::in_memory().unwrap();
        store.insert(&sample_job("job-1", "alice")).unwrap();
        store
            .transition("job-1", JobStatus::Queued, JobStatus::Processing, None, None)
            .unwrap();

        let error = ProcessingError::corrupted_file("broken xref table");
        store
            .transition(
                "job-1",
                JobStatus::Processing,
                JobStatus::Failed,
                None,
                Some(&error),
            )
            .unwrap();

        let job = store.get("job-1", "alice").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.unwrap().kind, ErrorKind::CorruptedFile);
    }

    #[test]
    fn test_transition_missing_job() {
        let store = JobStore::in_memory().unwrap();
        let err = store
            .transition("ghost", JobStatus::Queued, JobStatus::Processing, None, None)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::JobNotFound);
    }

    #[test]
    fn test_corrupt_persisted_status_reads_as_failed() {
        let store = JobStore::in_memory().unwrap();
        store.insert(&sample_job("job-1", "alice")).unwrap();

        store
            .conn
            .lock()
            .unwrap()
            .execute(
                "UPDATE jobs SET status = 'exploded' WHERE id = ?1",
                params!["job-1"],
            )
            .unwrap();

        let job = store.get("job-1", "alice").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = JobStore::in_memory().unwrap();
        store.insert(&sample_job("job-1", "alice")).unwrap();

        store.delete("job-1").unwrap();
        assert!(store.get("job-1", "alice").is_err());
        // Deleting again is fine.
        store.delete("job-1").unwrap();
    }
}

//! SQLite-backed job store implementation.

use super::models::{JobRun, JobRunStatus};
use super::schema::SERVER_VERSIONED_SCHEMAS;
use super::trait_def::JobStore;
use crate::sqlite_persistence::migrate_if_needed;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// SQLite-backed job store.
#[derive(Clone)]
pub struct SqliteJobStore {
    read_conn: Arc<Mutex<Connection>>,
    write_conn: Arc<Mutex<Connection>>,
}

impl SqliteJobStore {
    /// Create a new SqliteJobStore.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path_ref = db_path.as_ref();

        let mut write_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open server database")?;

        migrate_if_needed(&mut write_conn, "server", SERVER_VERSIONED_SCHEMAS)?;

        write_conn
            .pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set WAL mode on server write connection")?;

        let read_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open server database for reading")?;

        read_conn
            .pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set WAL mode on server read connection")?;

        Ok(Self {
            read_conn: Arc::new(Mutex::new(read_conn)),
            write_conn: Arc::new(Mutex::new(write_conn)),
        })
    }
}

fn row_to_job_run(row: &rusqlite::Row) -> rusqlite::Result<JobRun> {
    let status_str: String = row.get(4)?;
    Ok(JobRun {
        id: row.get(0)?,
        job_name: row.get(1)?,
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        status: JobRunStatus::parse(&status_str).unwrap_or(JobRunStatus::Failed),
        error_message: row.get(5)?,
        triggered_by: row.get(6)?,
    })
}

const JOB_RUN_COLUMNS: &str =
    "id, job_name, started_at, finished_at, status, error_message, triggered_by";

impl JobStore for SqliteJobStore {
    fn record_job_start(&self, job_name: &str, triggered_by: &str) -> Result<i64> {
        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "INSERT INTO job_runs (job_name, started_at, status, triggered_by)
             VALUES (?1, cast(strftime('%s','now') as int), ?2, ?3)",
            params![job_name, JobRunStatus::Running.as_str(), triggered_by],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn record_job_finish(
        &self,
        run_id: i64,
        status: JobRunStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "UPDATE job_runs
             SET finished_at = cast(strftime('%s','now') as int),
                 status = ?2, error_message = ?3
             WHERE id = ?1",
            params![run_id, status.as_str(), error_message],
        )?;
        Ok(())
    }

    fn get_last_run(&self, job_name: &str) -> Result<Option<JobRun>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {JOB_RUN_COLUMNS} FROM job_runs
             WHERE job_name = ?1 ORDER BY id DESC LIMIT 1"
        ))?;
        let run = stmt.query_row(params![job_name], row_to_job_run).optional()?;
        Ok(run)
    }

    fn get_job_history(&self, job_name: &str, limit: usize) -> Result<Vec<JobRun>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {JOB_RUN_COLUMNS} FROM job_runs
             WHERE job_name = ?1 ORDER BY id DESC LIMIT ?2"
        ))?;
        let runs = stmt
            .query_map(params![job_name, limit], row_to_job_run)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(runs)
    }

    fn mark_stale_jobs_failed(&self) -> Result<usize> {
        let conn = self.write_conn.lock().unwrap();
        let marked = conn.execute(
            "UPDATE job_runs
             SET status = ?1, finished_at = cast(strftime('%s','now') as int),
                 error_message = ?2
             WHERE status = ?3",
            params![
                JobRunStatus::Failed.as_str(),
                "Interrupted by server restart",
                JobRunStatus::Running.as_str(),
            ],
        )?;
        Ok(marked)
    }
}

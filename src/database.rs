//! Database probe: one connection, one query, one classified outcome.
//!
//! The [`Database`] trait is the seam between the HTTP handler and the
//! driver, so the router can be exercised against fakes. [`PgDatabase`] is
//! the real implementation; it opens a private connection per call and always
//! closes it before returning.

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::{postgres::PgConnection, Connection, Either, Executor};
use thiserror::Error;

use crate::conninfo;

// ---

/// Status of a query that completed without a driver error.
///
/// Like `PQexec`, a multi-statement query is judged by its last statement.
/// The simple-query stream does not expose row descriptions, so a row
/// returning statement that produced zero rows reads as `CommandOk`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultStatus {
    /// The last statement completed without returning rows.
    CommandOk,
    /// The last statement returned at least one row.
    TuplesOk,
    /// The server received no statement at all (empty or comment-only text).
    EmptyQuery,
}

impl ResultStatus {
    /// Only `CommandOk` and `TuplesOk` count as a healthy database.
    pub fn is_success(self) -> bool {
        matches!(self, ResultStatus::CommandOk | ResultStatus::TuplesOk)
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("connection error: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("query error: {0}")]
    Query(#[source] sqlx::Error),
}

#[async_trait]
pub trait Database: Send + Sync {
    /// Run `query` on a fresh connection and report how it completed.
    async fn execute(&self, query: &str) -> Result<ResultStatus, ProbeError>;
}

/// PostgreSQL probe target, identified by a libpq connection string in
/// either URI or keyword/value form.
#[derive(Debug, Clone)]
pub struct PgDatabase {
    target: String,
}

impl PgDatabase {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn execute(&self, query: &str) -> Result<ResultStatus, ProbeError> {
        // ---
        let options = conninfo::connect_options(&self.target).map_err(ProbeError::Connection)?;
        let mut conn = PgConnection::connect_with(&options)
            .await
            .map_err(ProbeError::Connection)?;

        let outcome = run_query(&mut conn, query).await;

        if let Err(e) = conn.close().await {
            tracing::warn!("Failed to close database connection: {}", e);
        }

        outcome
    }
}

/// Execute `query` through the simple-query protocol and classify it.
async fn run_query(conn: &mut PgConnection, query: &str) -> Result<ResultStatus, ProbeError> {
    // ---
    let mut results = (&mut *conn).fetch_many(sqlx::raw_sql(query));
    let mut tracker = StatusTracker::default();

    while let Some(step) = results.try_next().await.map_err(ProbeError::Query)? {
        match step {
            Either::Right(_row) => tracker.row(),
            Either::Left(_done) => tracker.statement_done(),
        }
    }

    Ok(tracker.finish())
}

/// Follows the result stream of a simple query, one statement at a time.
#[derive(Debug)]
struct StatusTracker {
    status: ResultStatus,
    rows: bool,
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self {
            status: ResultStatus::EmptyQuery,
            rows: false,
        }
    }
}

impl StatusTracker {
    fn row(&mut self) {
        self.rows = true;
    }

    /// A statement completed; rows seen since the previous one belong to it.
    fn statement_done(&mut self) {
        // ---
        self.status = if self.rows {
            ResultStatus::TuplesOk
        } else {
            ResultStatus::CommandOk
        };
        self.rows = false;
    }

    fn finish(self) -> ResultStatus {
        self.status
    }
}

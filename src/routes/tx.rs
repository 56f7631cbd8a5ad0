// src/routes/tx.rs
//! Database connectivity probe endpoint.
//!
//! `GET /tx` opens a fresh connection to the configured database, runs the
//! probe query and answers in plain text. It is meant for load balancers and
//! orchestrator liveness checks:
//! - `200 Ok!` when the query completes with a success status
//! - `500 Connection error` when no session can be established
//! - `500 Query error` when the query fails or completes with any other status
//!
//! Driver messages go to the log only; the client never sees them.

use axum::{extract::State, http::StatusCode, routing::get, Router};
use tracing::error;

use crate::database::ProbeError;
use crate::AppState;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/tx", get(handler))
}

async fn handler(State((database, config)): State<AppState>) -> (StatusCode, &'static str) {
    // ---
    match database.execute(&config.probe_query).await {
        Ok(status) if status.is_success() => (StatusCode::OK, "Ok!"),
        Ok(status) => {
            error!("Unexpected query result status: {:?}", status);
            (StatusCode::INTERNAL_SERVER_ERROR, "Query error")
        }
        Err(ProbeError::Connection(e)) => {
            error!("{}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Connection error")
        }
        Err(ProbeError::Query(e)) => {
            error!("{}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Query error")
        }
    }
}

//! Application entry point for the `tx-probe` service.
//!
//! This binary runs a tiny HTTP probe for a PostgreSQL database:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Mounting the `/tx` probe route and the access log via the `routes` gateway
//! - Binding the Axum HTTP server and serving until SIGINT/SIGTERM
//!
//! No connection is opened at startup. Each `/tx` request opens its own
//! connection, runs the probe query and closes it again.
//!
//! # Environment Variables
//! - `DATABASE_URL` (optional) – PostgreSQL connection string (default: empty)
//! - `SQL_QUERY` (optional) – probe query (default: `SELECT 1`)
//! - `LISTEN_ADDR` (optional) – bind address (default: `0.0.0.0:8080`)
//! - `AXUM_LOG_LEVEL` (optional) – log verbosity (default: `info`)
//! - `AXUM_SPAN_EVENTS` (optional) – span event mode for tracing
use std::{env, io::IsTerminal, net::SocketAddr, sync::Arc};

use axum::Router;
use dotenvy::dotenv;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use anyhow::Result;

mod access_log;
mod config;
mod conninfo;
mod database;
mod routes;

pub use config::Config;

// Re-exported so routes/*.rs only depend on their parent module, not on
// the individual sibling modules.
pub use database::{Database, PgDatabase};

/// State shared read-only by every request.
pub type AppState = (Arc<dyn Database>, Arc<Config>);

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let database: Arc<dyn Database> = Arc::new(PgDatabase::new(cfg.connection_target.clone()));
    let addr = cfg.listen_addr;

    // Build app from routes gateway
    let app: Router = routes::router(database, cfg);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", addr, e))?;
    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

// ---

/// Resolve once SIGINT or (on Unix) SIGTERM is received.
///
/// A failure to install a handler is logged and that signal source is then
/// ignored; the other one keeps working.
async fn shutdown_signal() {
    // ---
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}

/// Install the stdout subscriber. Call once, before anything logs.
///
/// `RUST_LOG` takes precedence over `AXUM_LOG_LEVEL` (default `info`). The
/// access log and the startup configuration are kept at `info` whatever the
/// level, see [`filter_directives`]. `AXUM_SPAN_EVENTS` (`full`,
/// `enter_exit`) and `FORCE_COLOR` tune the output.
fn init_tracing() {
    // ---
    let span_events = match config::env_or("AXUM_SPAN_EVENTS", "close").as_str() {
        "full" => FmtSpan::FULL,
        "enter_exit" => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    let rust_log = env::var("RUST_LOG").ok().filter(|v| !v.trim().is_empty());
    let directives = filter_directives(
        rust_log.as_deref(),
        &config::env_or("AXUM_LOG_LEVEL", "info"),
    );

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(EnvFilter::builder().parse_lossy(directives))
        .with_ansi(use_color)
        .compact()
        .init();
}

/// Filter directives for the subscriber.
///
/// Target directives win over the global level, so appending `access=info`
/// and `tx_probe::config=info` keeps one access line per request and the
/// startup log even under `warn` or `error`.
fn filter_directives(rust_log: Option<&str>, level: &str) -> String {
    // ---
    let base = match rust_log {
        Some(directives) => directives.to_owned(),
        None => {
            let level = match level {
                "trace" | "debug" | "warn" | "error" => level,
                _ => "info",
            };
            format!("{level},sqlx::query=warn")
        }
    };

    format!("{base},access=info,tx_probe::config=info")
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn with_filter(directives: &str, check: impl FnOnce() -> bool) -> bool {
        // ---
        use tracing_subscriber::layer::SubscriberExt;

        let subscriber =
            tracing_subscriber::registry().with(EnvFilter::builder().parse_lossy(directives));
        tracing::subscriber::with_default(subscriber, check)
    }

    fn access_enabled(directives: &str) -> bool {
        with_filter(directives, || tracing::enabled!(target: "access", tracing::Level::INFO))
    }

    fn info_enabled(directives: &str) -> bool {
        with_filter(directives, || tracing::enabled!(tracing::Level::INFO))
    }

    #[test]
    fn test_level_comes_from_axum_log_level() {
        // ---
        assert_eq!(
            filter_directives(None, "warn"),
            "warn,sqlx::query=warn,access=info,tx_probe::config=info"
        );
        assert!(filter_directives(None, "verbose").starts_with("info,"));
    }

    #[test]
    fn test_rust_log_replaces_the_level() {
        // ---
        assert_eq!(
            filter_directives(Some("error,hyper=debug"), "trace"),
            "error,hyper=debug,access=info,tx_probe::config=info"
        );
    }

    #[test]
    fn test_access_log_survives_quiet_levels() {
        // ---
        for directives in [
            filter_directives(None, "error"),
            filter_directives(Some("warn"), "info"),
        ] {
            assert!(access_enabled(&directives));
            assert!(!info_enabled(&directives));
        }
    }
}

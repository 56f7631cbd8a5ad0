//! Per-request access log.
//!
//! Layered over the whole router, so every response is recorded: `/tx`
//! outcomes as well as 404s and 405s produced by axum itself.

use std::{borrow::Cow, fmt::Display, net::SocketAddr};

use axum::{
    extract::{ConnectInfo, Request},
    http::{StatusCode, Uri},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Local, TimeZone};

/// Middleware that logs one line once the inner service has responded.
pub async fn access_log(request: Request, next: Next) -> Response {
    // ---
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "-".to_owned());
    let path = decoded_path(request.uri());

    let response = next.run(request).await;

    let line = format_line(&Local::now(), &remote, &path, response.status());
    tracing::info!(target: "access", "{}", line);

    response
}

/// Percent-decoded request path, `+` left as is.
///
/// Paths whose escapes do not decode to UTF-8 are logged raw.
fn decoded_path(uri: &Uri) -> String {
    // ---
    let raw = uri.path();
    urlencoding::decode(raw)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| raw.to_owned())
}

/// `Tue Mar 05 2024 14:07:09.042 10.0.0.7 /tx - 200`
pub fn format_line<Tz>(at: &DateTime<Tz>, remote: &str, path: &str, status: StatusCode) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!(
        "{} {} {} - {}",
        at.format("%a %b %d %Y %T%.3f"),
        remote,
        path,
        status.as_u16()
    )
}

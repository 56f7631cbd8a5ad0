//! libpq connection strings for sqlx.
//!
//! sqlx only understands the URI form (`postgres://...`). libpq also accepts
//! whitespace-separated `keyword=value` pairs (`host=db port=5432 user=app`),
//! with single-quoted values and backslash escapes. Both are turned into
//! [`PgConnectOptions`] here. Keywords that are missing fall back to sqlx's
//! defaults, which honour the usual `PGHOST`/`PGPORT`/`PGUSER`/... variables,
//! so an empty string behaves like an empty libpq conninfo.

use sqlx::postgres::{PgConnectOptions, PgSslMode};

// ---

/// libpq keywords that are accepted but have no sqlx counterpart.
const IGNORED_KEYWORDS: &[&str] = &[
    "client_encoding",
    "connect_timeout",
    "gssencmode",
    "keepalives",
    "keepalives_count",
    "keepalives_idle",
    "keepalives_interval",
    "target_session_attrs",
];

/// Build driver options from a URI or keyword/value connection string.
pub fn connect_options(target: &str) -> Result<PgConnectOptions, sqlx::Error> {
    // ---
    if target.starts_with("postgres://") || target.starts_with("postgresql://") {
        return target.parse();
    }

    let mut options = PgConnectOptions::new();
    for (key, value) in parse_pairs(target)? {
        options = match key.as_str() {
            "host" | "hostaddr" if value.starts_with('/') => options.socket(&value),
            "host" | "hostaddr" => options.host(&value),
            "port" => {
                let port = value
                    .parse::<u16>()
                    .map_err(|_| config_error(format!("invalid port number: \"{value}\"")))?;
                options.port(port)
            }
            "user" => options.username(&value),
            "password" => options.password(&value),
            "dbname" => options.database(&value),
            "application_name" => options.application_name(&value),
            "sslmode" => options.ssl_mode(value.parse::<PgSslMode>()?),
            "sslrootcert" => options.ssl_root_cert(&value),
            k if IGNORED_KEYWORDS.contains(&k) => {
                tracing::debug!("Ignoring connection option \"{}\"", k);
                options
            }
            _ => return Err(config_error(format!("invalid connection option \"{key}\""))),
        };
    }

    Ok(options)
}

fn config_error(message: String) -> sqlx::Error {
    sqlx::Error::Configuration(message.into())
}

/// Split `keyword = value` pairs the way libpq's conninfo parser does.
fn parse_pairs(conninfo: &str) -> Result<Vec<(String, String)>, sqlx::Error> {
    // ---
    let mut pairs = Vec::new();
    let mut chars = conninfo.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| *c != '=' && !c.is_whitespace()) {
            key.push(c);
        }

        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.next_if_eq(&'=').is_none() {
            return Err(config_error(format!("missing \"=\" after \"{key}\"")));
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let mut value = String::new();
        if chars.next_if_eq(&'\'').is_some() {
            loop {
                match chars.next() {
                    Some('\\') => value.extend(chars.next()),
                    Some('\'') => break,
                    Some(c) => value.push(c),
                    None => return Err(config_error("unterminated quoted string".to_owned())),
                }
            }
        } else {
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                if c == '\\' {
                    value.extend(chars.next());
                } else {
                    value.push(c);
                }
            }
        }

        pairs.push((key, value));
    }

    Ok(pairs)
}

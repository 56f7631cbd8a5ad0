use std::sync::Arc;

use axum::{middleware, Router};

use crate::{access_log, AppState, Config, Database};

mod tx;

// ---

pub fn router(database: Arc<dyn Database>, config: Config) -> Router {
    // ---
    let state: AppState = (database, Arc::new(config));

    Router::new()
        .merge(tx::router())
        .layer(middleware::from_fn(access_log::access_log))
        .with_state(state)
}

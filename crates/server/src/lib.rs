use db::DbService;

pub mod error;
pub mod fingerprint;
pub mod http;
pub mod idempotency;
pub mod routes;

/// Explicit handle bundle passed to every handler. Stores are injected here
/// rather than reached through process-global state.
#[derive(Clone)]
pub struct AppState {
    db: DbService,
}

impl AppState {
    pub fn new(db: DbService) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &DbService {
        &self.db
    }
}

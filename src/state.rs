use std::sync::Arc;

use crate::{cache::ListCache, config::Config, database::Database, gateway::MpesaGateway};

/// Shared handles every handler gets through axum state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub cache: ListCache,
    pub gateway: MpesaGateway,
    pub config: Arc<Config>,
}

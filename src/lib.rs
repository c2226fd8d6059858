pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use std::sync::Arc;

use crate::infra::{db::Db, realtime::RealtimePublisher};

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub realtime: Arc<dyn RealtimePublisher>,
    pub admin_token: Option<String>,
}

use crate::engine::WellnessEngine;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub engine: WellnessEngine,
}

pub type SharedState = Arc<AppState>;

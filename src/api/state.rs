use crate::application::predict_use_case::PredictionService;

/// Shared by every handler; cloning is cheap (one `Arc` inside).
#[derive(Clone)]
pub struct AppState {
    pub service: PredictionService,
}

impl AppState {
    pub fn new(service: PredictionService) -> Self {
        Self { service }
    }
}

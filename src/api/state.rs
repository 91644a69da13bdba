use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::services::RecommendationService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RecommendationService>,
    pub limits: ResultLimits,
}

/// How many results a request gets by default and at most
#[derive(Debug, Clone, Copy)]
pub struct ResultLimits {
    pub default: usize,
    pub max: usize,
}

impl Default for ResultLimits {
    fn default() -> Self {
        Self { default: 10, max: 100 }
    }
}

impl ResultLimits {
    /// Resolves a requested count against the configured bounds
    pub fn resolve(&self, requested: Option<usize>) -> AppResult<usize> {
        match requested {
            None => Ok(self.default),
            Some(0) => Err(AppError::InvalidInput("n must be at least 1".to_string())),
            Some(n) if n > self.max => Err(AppError::InvalidInput(format!(
                "n must not exceed {}",
                self.max
            ))),
            Some(n) => Ok(n),
        }
    }
}

impl AppState {
    pub fn new(service: RecommendationService, limits: ResultLimits) -> Self {
        Self {
            service: Arc::new(service),
            limits,
        }
    }
}

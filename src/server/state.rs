use std::sync::Arc;

use crate::attempts::AttemptStore;
use crate::config::Settings;
use crate::dispatch::MessageProducer;
use crate::error::AppError;
use crate::ingress::{EmailValidator, LoginService};
use crate::metrics::Metrics;
use crate::queue::DispatchQueue;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub login: Arc<LoginService>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Wire the ingress pipeline from already-built backends.
    pub fn new(
        settings: Settings,
        store: Arc<dyn AttemptStore>,
        queue: Arc<dyn DispatchQueue>,
        metrics: Arc<Metrics>,
    ) -> Result<Self, AppError> {
        let validator = EmailValidator::new(&settings.validation)
            .map_err(|e| AppError::Internal(format!("invalid validation.email_pattern: {}", e)))?;

        let login = Arc::new(LoginService::new(
            store,
            MessageProducer::new(queue),
            Arc::new(validator),
            metrics.clone(),
        ));

        Ok(Self {
            settings: Arc::new(settings),
            login,
            metrics,
        })
    }
}

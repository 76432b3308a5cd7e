// HTTP adapter over the service layer
pub mod error; // DomainError -> (status, structured JSON)
pub mod handlers;
pub mod routes;
pub mod server;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::loaders::DataLoader;
use crate::rules::RuleLoader;
use crate::services::{InstrumentService, ValidationService};

/// Shared handles every request works from. Services themselves are built
/// per request on the stack; only the loader, rule loader, and config are
/// long-lived.
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub loader: Arc<dyn DataLoader>,
    pub rules: Arc<RuleLoader>,
}

impl AppContext {
    pub fn new(config: Arc<AppConfig>, loader: Arc<dyn DataLoader>, rules: Arc<RuleLoader>) -> Self {
        Self { config, loader, rules }
    }

    pub fn validation(&self) -> ValidationService {
        ValidationService::new(self.loader.clone(), self.rules.clone(), self.config.clone())
    }

    pub fn instruments(&self) -> InstrumentService {
        InstrumentService::new(self.loader.clone(), self.config.clone())
    }
}

pub type ApiState = Arc<AppContext>;

use crate::auth::CredentialProvider;
use crate::config::ServerConfig;
use crate::sheets::{GoogleSheetsClient, SheetsApi};
use crate::tools::Dispatcher;
use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct AppState {
    config: Arc<ServerConfig>,
    dispatcher: Arc<Dispatcher>,
    started_at: Instant,
}

impl AppState {
    pub fn new(config: Arc<ServerConfig>) -> Result<Self> {
        let credentials = Arc::new(CredentialProvider::from_config(&config)?);
        let api: Arc<dyn SheetsApi> = Arc::new(GoogleSheetsClient::new(
            config.api_base_url.clone(),
            credentials,
            config.request_timeout(),
        )?);
        Ok(Self::assemble(config, api))
    }

    /// Builds state around a caller-supplied API, e.g. an in-memory fake.
    pub fn with_api(config: Arc<ServerConfig>, api: Arc<dyn SheetsApi>) -> Self {
        Self::assemble(config, api)
    }

    fn assemble(config: Arc<ServerConfig>, api: Arc<dyn SheetsApi>) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(config.clone(), api));
        Self {
            config,
            dispatcher,
            started_at: Instant::now(),
        }
    }

    pub fn config(&self) -> Arc<ServerConfig> {
        self.config.clone()
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        self.dispatcher.clone()
    }

    pub fn credentials_configured(&self) -> bool {
        self.config.credentials_configured()
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

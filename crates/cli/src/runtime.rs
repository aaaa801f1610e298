use std::sync::Arc;

use anyhow::{Context, Result};
use opsdesk_client::{ClientError, HttpWorkflowClient};
use opsdesk_core::config::AppConfig;
use opsdesk_core::session::{
    CredentialStore, FileCredentialStore, InMemoryCredentialStore, Session,
};
use tokio::runtime::Runtime;

pub fn build() -> Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to initialize async runtime")
}

/// `api.token` takes precedence and is never written to disk; otherwise the session file is used.
pub fn credentials(config: &AppConfig) -> Arc<dyn CredentialStore> {
    match &config.api.token {
        Some(token) => Arc::new(InMemoryCredentialStore::with_session(Session::from_token(
            token.clone(),
        ))),
        None => Arc::new(FileCredentialStore::new(config.session.path.clone())),
    }
}

pub fn connect(config: &AppConfig) -> Result<HttpWorkflowClient, ClientError> {
    HttpWorkflowClient::from_config(config, credentials(config))
}

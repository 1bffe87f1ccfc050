mod handlers;
mod router;

pub(crate) use router::build_api_router;

use anyhow::Result;
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::info;

use crate::core::orchestrator::Orchestrator;
use crate::core::settings::LlmSettings;
use crate::core::store::Store;
use crate::core::tools::DomainTools;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) orchestrator: Arc<Orchestrator>,
    pub(crate) store: Store,
    pub(crate) tools: Arc<dyn DomainTools>,
    pub(crate) llm: LlmSettings,
    pub(crate) llm_configured: bool,
    pub(crate) tz: Tz,
}

impl AppState {
    pub(crate) fn new(
        orchestrator: Arc<Orchestrator>,
        store: Store,
        tools: Arc<dyn DomainTools>,
        llm: LlmSettings,
        llm_configured: bool,
        tz: Tz,
    ) -> Self {
        Self {
            orchestrator,
            store,
            tools,
            llm,
            llm_configured,
            tz,
        }
    }
}

pub struct ApiServer {
    state: AppState,
    host: String,
    port: u16,
}

impl ApiServer {
    pub(crate) fn new(state: AppState, host: String, port: u16) -> Self {
        Self { state, host, port }
    }

    /// Bind and serve until the process is stopped.
    pub async fn serve(self) -> Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let app = build_api_router(self.state, self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("API Server running at http://{addr}");
        axum::serve(listener, app).await?;
        Ok(())
    }
}

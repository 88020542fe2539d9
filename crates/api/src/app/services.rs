use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::Response;

use stockledger_infra::catalog::InMemoryCatalog;
use stockledger_infra::{EngineConfig, EngineResult, StockEngine};

use crate::app::errors;

/// What every handler gets: the engine plus the catalog behind its product,
/// location and batch ports.
#[derive(Debug, Clone)]
pub struct AppServices {
    engine: Arc<StockEngine>,
    catalog: Arc<InMemoryCatalog>,
}

impl AppServices {
    pub fn new(engine: Arc<StockEngine>, catalog: Arc<InMemoryCatalog>) -> Self {
        Self { engine, catalog }
    }

    /// In-memory wiring (dev/test).
    pub fn in_memory(config: EngineConfig) -> Self {
        let (engine, catalog) = StockEngine::in_memory(config);
        Self::new(Arc::new(engine), catalog)
    }

    pub fn engine(&self) -> &Arc<StockEngine> {
        &self.engine
    }

    pub fn catalog(&self) -> &InMemoryCatalog {
        &self.catalog
    }

    /// Run an engine call off the async runtime.
    ///
    /// Engine calls block on balance locks (bounded by the lock timeout) and on
    /// transfer credit backoff, so they never run on a runtime worker.
    pub async fn run<T, F>(&self, f: F) -> Result<T, Response>
    where
        F: FnOnce(&StockEngine) -> EngineResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let engine = self.engine.clone();
        match tokio::task::spawn_blocking(move || f(&engine)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(errors::engine_error_to_response(&err)),
            Err(join) => {
                tracing::error!(error = %join, "engine task failed");
                Err(errors::json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "engine task failed",
                ))
            }
        }
    }
}

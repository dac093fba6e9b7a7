//! Shared application state injected into all Axum handlers.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::GatewayConfig;
use crate::domain::{ChannelCatalog, Registry};
use crate::service::Publisher;
use crate::sse::StreamHandler;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
///
/// The registry is created here once and handed to both the publisher and
/// the stream handler; nothing else holds it.
#[derive(Debug, Clone)]
pub struct AppState {
    /// In-process publish API.
    pub publisher: Publisher,
    /// Subscriber stream lifecycle.
    pub streams: StreamHandler,
    /// Configured channel families.
    pub catalog: Arc<ChannelCatalog>,
    /// SSE keep-alive interval.
    pub keep_alive: Duration,
}

impl AppState {
    /// Builds the state with the built-in channel families.
    ///
    /// Cancelling `shutdown` closes every open stream.
    #[must_use]
    pub fn new(config: &GatewayConfig, shutdown: CancellationToken) -> Self {
        Self::with_catalog(config, shutdown, ChannelCatalog::builtin())
    }

    /// Builds the state with a custom channel catalog.
    #[must_use]
    pub fn with_catalog(
        config: &GatewayConfig,
        shutdown: CancellationToken,
        catalog: ChannelCatalog,
    ) -> Self {
        let registry = Arc::new(Registry::new());
        Self {
            publisher: Publisher::new(Arc::clone(&registry)),
            streams: StreamHandler::new(registry, shutdown, config.connection_buffer),
            catalog: Arc::new(catalog),
            keep_alive: config.keep_alive,
        }
    }

    /// Returns the subscriber registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        self.publisher.registry()
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::application::catalog::CatalogService;
use crate::infra::db::PostgresRepositories;
use crate::infra::error::InfraError;

/// Dependency probed by `/health`.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    async fn ready(&self) -> Result<(), InfraError>;
}

#[async_trait]
impl ReadinessProbe for PostgresRepositories {
    async fn ready(&self) -> Result<(), InfraError> {
        self.ping().await.map_err(InfraError::database)
    }
}

#[derive(Clone)]
pub struct ApiState {
    pub catalog: Arc<CatalogService>,
    pub readiness: Arc<dyn ReadinessProbe>,
    pub cache_backend: &'static str,
    pub shutdown: CancellationToken,
}

impl ApiState {
    /// Token for one request; fires when the server begins shutting down.
    pub fn request_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }
}

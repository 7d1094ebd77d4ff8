use std::sync::Arc;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::balancer::Balancer;
use crate::codec::JsonCodec;
use crate::config::RuntimeConfig;
use crate::error::SystemError;
use crate::pool::PoolManager;

/// Process-wide services, built once at startup.
///
/// Everything an actor may need beyond its own state (the pool registry,
/// the balancer, the codec and the root cancellation token) is reached
/// through this context, which is handed to every actor factory.
#[derive(Debug)]
pub struct ServerContext {
    config: RuntimeConfig,
    token: CancellationToken,
    pools: PoolManager,
    balancer: Balancer,
    codec: JsonCodec,
}

impl ServerContext {
    /// Build the context on `runtime`. The configuration is validated first.
    pub fn new(config: RuntimeConfig, runtime: Handle) -> Result<Arc<Self>, SystemError> {
        config.validate()?;

        let token = CancellationToken::new();
        let balancer = Balancer::new(config.balancer.clone(), runtime, &token)?;

        Ok(Arc::new(Self {
            config,
            token,
            pools: PoolManager::new(),
            balancer,
            codec: JsonCodec::new(),
        }))
    }

    /// Build the context on the runtime of the calling task.
    pub fn from_current(config: RuntimeConfig) -> Result<Arc<Self>, SystemError> {
        let runtime = Handle::try_current().map_err(|e| SystemError::Other(e.into()))?;
        Self::new(config, runtime)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Root token; cancelling it winds down every actor, group and worker.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn pools(&self) -> &PoolManager {
        &self.pools
    }

    pub fn balancer(&self) -> &Balancer {
        &self.balancer
    }

    pub fn codec(&self) -> &JsonCodec {
        &self.codec
    }
}

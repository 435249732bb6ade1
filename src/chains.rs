//! Chain Provider Registry — §4.1.
//!
//! Hands out a connected RPC client per chain id and tracks health. A
//! single failure in an execution-enabled chain's startup probe is fatal;
//! a failure in an observation-only chain downgrades it to `Disabled` with
//! a loud log line. Safe for concurrent use — no runtime reconfiguration.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use futures::future::join_all;
use tracing::{error, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::types::{ChainDescriptor, ChainId};

/// Default timeout for a read-only RPC call (`spec.md` §5).
pub const READ_TIMEOUT: Duration = Duration::from_secs(5);
/// Default timeout for a submission call (raw tx or bundle).
pub const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainHealth {
    Healthy,
    Disabled { reason: String },
}

struct ChainEntry {
    descriptor: ChainDescriptor,
    provider: RootProvider,
    health: ChainHealth,
}

/// Read-mostly table of connected chains. Readers hold shared references
/// (`Arc<ChainProviderRegistry>`); there is no reconfiguration path, so no
/// exclusive-access lock is needed once construction completes.
pub struct ChainProviderRegistry {
    entries: HashMap<ChainId, ChainEntry>,
}

impl ChainProviderRegistry {
    /// Connect to every configured chain and run the startup health probe
    /// concurrently. Returns `Err` if any execution-enabled chain fails its
    /// probe; observation-only failures are logged and downgrade that
    /// chain to `Disabled` instead of aborting the whole registry.
    pub async fn connect(descriptors: Vec<ChainDescriptor>) -> EngineResult<Arc<Self>> {
        let probes = descriptors.into_iter().map(|d| async move {
            let provider = ProviderBuilder::new()
                .connect(&d.rpc_url)
                .await
                .map_err(|e| EngineError::Config(format!("{}: connect failed: {e}", d.name)));

            match provider {
                Ok(provider) => {
                    let probe = tokio::time::timeout(READ_TIMEOUT, provider.get_chain_id()).await;
                    match probe {
                        Ok(Ok(remote_id)) if remote_id == d.chain_id => {
                            (d, Some(provider), ChainHealth::Healthy)
                        }
                        Ok(Ok(remote_id)) => (
                            d.clone(),
                            Some(provider),
                            ChainHealth::Disabled {
                                reason: format!(
                                    "chain id mismatch: configured {} got {}",
                                    d.chain_id, remote_id
                                ),
                            },
                        ),
                        Ok(Err(e)) => (
                            d.clone(),
                            Some(provider),
                            ChainHealth::Disabled { reason: format!("rpc error: {e}") },
                        ),
                        Err(_) => (
                            d.clone(),
                            Some(provider),
                            ChainHealth::Disabled { reason: "health probe timed out".into() },
                        ),
                    }
                }
                Err(e) => (d.clone(), None, ChainHealth::Disabled { reason: e.to_string() }),
            }
        });

        let results = join_all(probes).await;

        let mut entries = HashMap::new();
        for (descriptor, provider, health) in results {
            if let ChainHealth::Disabled { reason } = &health {
                if descriptor.execution_enabled {
                    error!(chain = %descriptor.name, %reason, "fatal: execution-enabled chain failed health probe");
                    return Err(EngineError::Config(format!(
                        "execution-enabled chain {} failed health probe: {reason}",
                        descriptor.name
                    )));
                }
                error!(chain = %descriptor.name, %reason, "observation-only chain disabled");
            } else {
                info!(chain = %descriptor.name, chain_id = descriptor.chain_id, "chain healthy");
            }

            let Some(provider) = provider else {
                // Connection itself failed; descriptor is execution_enabled=false
                // (else we would have returned above), so just record it disabled
                // with no provider — callers get NotRegistered on lookup.
                warn!(chain = %descriptor.name, "no provider available, chain unreachable");
                continue;
            };

            entries.insert(descriptor.chain_id, ChainEntry { descriptor, provider, health });
        }

        Ok(Arc::new(Self { entries }))
    }

    pub fn provider(&self, chain_id: ChainId) -> EngineResult<&RootProvider> {
        match self.entries.get(&chain_id) {
            Some(entry) if entry.health == ChainHealth::Healthy => Ok(&entry.provider),
            Some(entry) => Err(EngineError::Config(format!(
                "chain {chain_id} disabled: {:?}",
                entry.health
            ))),
            None => Err(EngineError::NotRegistered { key: format!("chain {chain_id}") }),
        }
    }

    pub fn health(&self, chain_id: ChainId) -> Option<&ChainHealth> {
        self.entries.get(&chain_id).map(|e| &e.health)
    }

    pub fn healthy_chain_ids(&self) -> Vec<ChainId> {
        self.entries
            .values()
            .filter(|e| e.health == ChainHealth::Healthy)
            .map(|e| e.descriptor.chain_id)
            .collect()
    }

    pub fn descriptor(&self, chain_id: ChainId) -> EngineResult<&ChainDescriptor> {
        self.entries
            .get(&chain_id)
            .map(|e| &e.descriptor)
            .ok_or_else(|| EngineError::NotRegistered { key: format!("chain {chain_id}") })
    }

    pub fn configured_count(&self) -> usize {
        self.entries.len()
    }

    /// Wrap a future representing a single RPC call with the standard
    /// per-call timeout, mapping a timeout into `EngineError::Rpc`.
    pub async fn call_with_timeout<F, T>(
        chain_id: ChainId,
        timeout: Duration,
        fut: F,
    ) -> EngineResult<T>
    where
        F: std::future::Future<Output = Result<T, alloy::transports::TransportError>>,
    {
        match tokio::time::timeout(timeout, fut).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(EngineError::Rpc { chain_id, message: e.to_string() }),
            Err(_) => Err(EngineError::Rpc { chain_id, message: "timed out".into() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_health_equality() {
        assert_eq!(ChainHealth::Healthy, ChainHealth::Healthy);
        assert_ne!(
            ChainHealth::Healthy,
            ChainHealth::Disabled { reason: "x".into() }
        );
    }
}

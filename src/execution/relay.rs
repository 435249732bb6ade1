//! Stage 7 — private bundle submission — §4.9, §6 "MEV relay JSON-RPC".

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::Sha256;
use tracing::{error, warn};

use crate::config::RelayConfig;
use crate::error::{EngineError, EngineResult};

use super::bundle::Bundle;

#[derive(Debug, Deserialize)]
struct RelayResponse {
    #[serde(default)]
    #[serde(rename = "bundleHash")]
    bundle_hash: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: &'a serde_json::Value,
}

pub struct RelayClient {
    http: reqwest::Client,
    endpoint: String,
    config: RelayConfig,
}

impl RelayClient {
    pub fn new(endpoint: impl Into<String>, config: RelayConfig) -> Self {
        Self { http: reqwest::Client::new(), endpoint: endpoint.into(), config }
    }

    /// Submit the bundle as `blxr_submit_bundle`. On any failure, the
    /// caller (`ExecutionPipeline`) decides whether to fall back to the
    /// public mempool; this function only reports success or
    /// `RelaySubmissionFailed`.
    pub async fn submit_bundle(
        &self,
        bundle: &Bundle,
        blockchain_network: &str,
        block_number: u64,
    ) -> EngineResult<String> {
        let params = json!({
            "transaction": bundle.transactions,
            "blockchain_network": blockchain_network,
            "block_number": block_number,
            "avoid_mempool": bundle.avoid_mempool,
            "merkle_root": format!("0x{:x}", bundle.merkle_root),
        });
        let body = JsonRpcRequest { jsonrpc: "2.0", id: 1, method: "blxr_submit_bundle", params: &params };
        let body_json = serde_json::to_string(&body)
            .map_err(|e| EngineError::RelaySubmissionFailed(format!("encode request: {e}")))?;

        let mut request = self.http.post(&self.endpoint).header("Content-Type", "application/json");

        if let Some(token) = &self.config.auth_token {
            request = request.header("Authorization", token);
        }
        if let Some(secret) = &self.config.hmac_secret {
            let signature = hmac_sha256_hex(secret, &body_json)?;
            request = request.header("X-Request-Signature", signature);
        }

        let response = request
            .body(body_json)
            .send()
            .await
            .map_err(|e| EngineError::RelaySubmissionFailed(e.to_string()))?;

        let parsed: RelayResponse = response
            .json()
            .await
            .map_err(|e| EngineError::RelaySubmissionFailed(format!("decode response: {e}")))?;

        if let Some(reason) = parsed.error {
            error!(%reason, "relay rejected bundle");
            return Err(EngineError::RelaySubmissionFailed(reason));
        }

        parsed.bundle_hash.ok_or_else(|| {
            EngineError::RelaySubmissionFailed("relay response missing bundleHash".into())
        })
    }
}

fn hmac_sha256_hex(secret: &str, payload: &str) -> EngineResult<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| EngineError::RelaySubmissionFailed(format!("bad HMAC secret: {e}")))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Fallback path when private submission fails and the deployment allows
/// degrading to the public mempool (§4.9 Stage 7).
pub async fn broadcast_public_fallback(
    chains: &crate::chains::ChainProviderRegistry,
    chain_id: u64,
    raw_tx: &alloy::primitives::Bytes,
) -> EngineResult<alloy::primitives::B256> {
    use alloy::providers::Provider;

    warn!(chain_id, "falling back to public mempool broadcast");
    let provider = chains.provider(chain_id)?;
    let pending = crate::chains::ChainProviderRegistry::call_with_timeout(
        chain_id,
        crate::chains::SUBMIT_TIMEOUT,
        provider.send_raw_transaction(raw_tx),
    )
    .await?;
    Ok(*pending.tx_hash())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_signature_is_deterministic() {
        let a = hmac_sha256_hex("secret", "payload").unwrap();
        let b = hmac_sha256_hex("secret", "payload").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64); // 32 bytes hex-encoded
    }

    #[test]
    fn hmac_signature_changes_with_payload() {
        let a = hmac_sha256_hex("secret", "payload-a").unwrap();
        let b = hmac_sha256_hex("secret", "payload-b").unwrap();
        assert_ne!(a, b);
    }
}

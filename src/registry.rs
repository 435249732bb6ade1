//! Token & DEX Registry — §4.2.
//!
//! Pure, read-only after init. All lookups fail closed with
//! `EngineError::NotRegistered` if the key is absent.

use std::collections::{HashMap, HashSet};

use crate::error::{EngineError, EngineResult};
use crate::types::{ChainId, DexDescriptor, TokenDescriptor};

/// The bridgeable symbol set is explicit and immutable, per `spec.md` §3 —
/// not configurable, unlike everything else in this registry.
pub const BRIDGEABLE_SYMBOLS: [&str; 5] = ["USDC", "USDT", "DAI", "WETH", "WBTC"];

pub struct Registries {
    tokens: HashMap<(ChainId, String), TokenDescriptor>,
    dexes: HashMap<(ChainId, String), DexDescriptor>,
    /// DEX pairs configured per chain, for intra-chain candidate enumeration.
    dex_pairs_by_chain: HashMap<ChainId, Vec<(String, String)>>,
}

impl Registries {
    pub fn builder() -> RegistriesBuilder {
        RegistriesBuilder::default()
    }

    pub fn lookup_token(&self, chain_id: ChainId, symbol: &str) -> EngineResult<&TokenDescriptor> {
        self.tokens
            .get(&(chain_id, symbol.to_string()))
            .ok_or_else(|| EngineError::NotRegistered { key: format!("token {symbol}@{chain_id}") })
    }

    pub fn lookup_dex(&self, chain_id: ChainId, dex_id: &str) -> EngineResult<&DexDescriptor> {
        self.dexes
            .get(&(chain_id, dex_id.to_string()))
            .ok_or_else(|| EngineError::NotRegistered { key: format!("dex {dex_id}@{chain_id}") })
    }

    pub fn list_dex_pairs_for(&self, chain_id: ChainId) -> &[(String, String)] {
        self.dex_pairs_by_chain.get(&chain_id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn bridgeable_symbols(&self) -> HashSet<&'static str> {
        BRIDGEABLE_SYMBOLS.into_iter().collect()
    }

    /// All `(chain_id, symbol)` tokens in the registry, for graph building.
    pub fn all_tokens(&self) -> impl Iterator<Item = (&(ChainId, String), &TokenDescriptor)> {
        self.tokens.iter()
    }

    /// Chains that carry a given bridgeable symbol, for bridge-edge construction.
    pub fn chains_carrying_symbol(&self, symbol: &str) -> Vec<ChainId> {
        let mut chains: Vec<ChainId> = self
            .tokens
            .keys()
            .filter(|(_, s)| s == symbol)
            .map(|(c, _)| *c)
            .collect();
        chains.sort_unstable();
        chains
    }
}

#[derive(Default)]
pub struct RegistriesBuilder {
    tokens: HashMap<(ChainId, String), TokenDescriptor>,
    dexes: HashMap<(ChainId, String), DexDescriptor>,
    dex_pairs_by_chain: HashMap<ChainId, Vec<(String, String)>>,
}

impl RegistriesBuilder {
    pub fn token(mut self, symbol: impl Into<String>, descriptor: TokenDescriptor) -> Self {
        let symbol = symbol.into();
        self.tokens.insert((descriptor.chain_id, symbol), descriptor);
        self
    }

    pub fn dex(mut self, dex_id: impl Into<String>, descriptor: DexDescriptor) -> Self {
        let dex_id = dex_id.into();
        self.dexes.insert((descriptor.chain_id, dex_id), descriptor);
        self
    }

    pub fn dex_pair(mut self, chain_id: ChainId, a: impl Into<String>, b: impl Into<String>) -> Self {
        self.dex_pairs_by_chain.entry(chain_id).or_default().push((a.into(), b.into()));
        self
    }

    pub fn build(self) -> Registries {
        Registries {
            tokens: self.tokens,
            dexes: self.dexes,
            dex_pairs_by_chain: self.dex_pairs_by_chain,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProtocolFamily;
    use alloy::primitives::Address;

    fn usdc(chain_id: ChainId) -> TokenDescriptor {
        TokenDescriptor { chain_id, address: Address::ZERO, decimals: 6, is_bridgeable: true }
    }

    #[test]
    fn lookup_fails_closed() {
        let registries = Registries::builder().build();
        assert!(matches!(
            registries.lookup_token(137, "USDC"),
            Err(EngineError::NotRegistered { .. })
        ));
    }

    #[test]
    fn lookup_succeeds_after_register() {
        let registries = Registries::builder().token("USDC", usdc(137)).build();
        assert!(registries.lookup_token(137, "USDC").is_ok());
        assert!(registries.lookup_token(1, "USDC").is_err());
    }

    #[test]
    fn bridgeable_set_is_fixed() {
        let registries = Registries::builder().build();
        let set = registries.bridgeable_symbols();
        assert!(set.contains("USDC"));
        assert!(set.contains("WBTC"));
        assert!(!set.contains("SHIB"));
    }

    #[test]
    fn dex_pairs_scoped_per_chain() {
        let registries = Registries::builder()
            .dex_pair(137, "uniswap", "sushiswap")
            .dex_pair(137, "uniswap", "quickswap")
            .build();
        assert_eq!(registries.list_dex_pairs_for(137).len(), 2);
        assert!(registries.list_dex_pairs_for(1).is_empty());
    }

    #[test]
    fn chains_carrying_symbol() {
        let registries = Registries::builder()
            .token("USDC", usdc(137))
            .token("USDC", usdc(1))
            .build();
        assert_eq!(registries.chains_carrying_symbol("USDC"), vec![1, 137]);
        assert!(registries.chains_carrying_symbol("DAI").is_empty());
    }

    #[test]
    fn dex_lookup_round_trip() {
        let dex = DexDescriptor {
            dex_id: "uniswap".into(),
            chain_id: 137,
            router_address: Address::ZERO,
            protocol_family: ProtocolFamily::UniV2Style,
            quoter_address: None,
        };
        let registries = Registries::builder().dex("uniswap", dex).build();
        let found = registries.lookup_dex(137, "uniswap").unwrap();
        assert_eq!(found.protocol_family, ProtocolFamily::UniV2Style);
    }
}

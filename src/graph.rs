//! Graph & Opportunity Engine — §4.3.
//!
//! Nodes = token instances `(chain-id, symbol)`, held in a contiguous
//! arena; edges hold `usize` indices into it. The graph is acyclic under
//! the intended traversal, so this avoids any reference-cycle concerns
//! (`spec.md` §9).

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::registry::Registries;
use crate::types::{CandidateOpportunity, ChainId};

/// Default trade-size sweep in USD, `spec.md` §4.3.
pub fn default_size_sweep() -> Vec<Decimal> {
    ["500", "1000", "2000", "5000"].iter().map(|s| s.parse().unwrap()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenNode {
    pub chain_id: ChainId,
    pub symbol: String,
}

#[derive(Debug, Clone)]
pub enum GraphEdge {
    /// Same symbol, different chains. Only present for bridgeable symbols.
    Bridge { from: usize, to: usize },
}

/// Per-token scan cadence. Default is "all tokens every iteration"; a
/// deployment may demote less-liquid symbols to `Rotating` to cut RPC load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanTier {
    Every,
    Rotating { every_nth: u64 },
}

impl ScanTier {
    fn due(self, iteration: u64) -> bool {
        match self {
            ScanTier::Every => true,
            ScanTier::Rotating { every_nth } => every_nth != 0 && iteration % every_nth == 0,
        }
    }
}

/// Built once at initialization, deterministic from the registries, then
/// treated as read-only. Owned by the engine; readers hold shared refs.
pub struct TokenGraph {
    nodes: Vec<TokenNode>,
    node_index: HashMap<TokenNode, usize>,
    edges: Vec<GraphEdge>,
}

impl TokenGraph {
    /// Build the graph: one node per `(chain, token)`, one bridge edge per
    /// pair of chains carrying the same bridgeable symbol.
    pub fn build(registries: &Registries) -> Self {
        let mut nodes = Vec::new();
        let mut node_index = HashMap::new();

        for ((chain_id, symbol), _) in registries.all_tokens() {
            let node = TokenNode { chain_id: *chain_id, symbol: symbol.clone() };
            if !node_index.contains_key(&node) {
                node_index.insert(node.clone(), nodes.len());
                nodes.push(node);
            }
        }

        let mut edges = Vec::new();
        for symbol in registries.bridgeable_symbols() {
            let chains = registries.chains_carrying_symbol(symbol);
            for i in 0..chains.len() {
                for j in (i + 1)..chains.len() {
                    let from_node = TokenNode { chain_id: chains[i], symbol: symbol.to_string() };
                    let to_node = TokenNode { chain_id: chains[j], symbol: symbol.to_string() };
                    if let (Some(&from), Some(&to)) =
                        (node_index.get(&from_node), node_index.get(&to_node))
                    {
                        edges.push(GraphEdge::Bridge { from, to });
                    }
                }
            }
        }

        Self { nodes, node_index, edges }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains(&self, chain_id: ChainId, symbol: &str) -> bool {
        self.node_index.contains_key(&TokenNode { chain_id, symbol: symbol.to_string() })
    }

    /// Enumerate candidates for one scan iteration: intra-chain DEX-pair
    /// candidates (per `spec.md` §4.3 rule 1) and cross-chain bridge
    /// candidates in both directions (rule 2). Deterministic given the
    /// registries; `iteration` only gates which tier-2 symbols fire this
    /// tick.
    pub fn enumerate_candidates(
        &self,
        registries: &Registries,
        tiers: &HashMap<String, ScanTier>,
        iteration: u64,
        size_sweep: &[Decimal],
    ) -> Vec<CandidateOpportunity> {
        let mut out = Vec::new();

        for node in &self.nodes {
            let tier = tiers.get(&node.symbol).copied().unwrap_or(ScanTier::Every);
            if !tier.due(iteration) {
                continue;
            }
            for (dex_a, dex_b) in registries.list_dex_pairs_for(node.chain_id) {
                for &size in size_sweep {
                    out.push(CandidateOpportunity {
                        source_chain: node.chain_id,
                        dest_chain: Some(node.chain_id),
                        token_symbol: node.symbol.clone(),
                        dex_a_id: Some(dex_a.clone()),
                        dex_b_id: Some(dex_b.clone()),
                        trade_size_usd: size,
                    });
                }
            }
        }

        for edge in &self.edges {
            let GraphEdge::Bridge { from, to } = edge;
            let (a, b) = (&self.nodes[*from], &self.nodes[*to]);
            for &size in size_sweep {
                out.push(CandidateOpportunity {
                    source_chain: a.chain_id,
                    dest_chain: Some(b.chain_id),
                    token_symbol: a.symbol.clone(),
                    dex_a_id: None,
                    dex_b_id: None,
                    trade_size_usd: size,
                });
                out.push(CandidateOpportunity {
                    source_chain: b.chain_id,
                    dest_chain: Some(a.chain_id),
                    token_symbol: a.symbol.clone(),
                    dex_a_id: None,
                    dex_b_id: None,
                    trade_size_usd: size,
                });
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TokenDescriptor;
    use alloy::primitives::Address;

    fn descriptor(chain_id: ChainId) -> TokenDescriptor {
        TokenDescriptor { chain_id, address: Address::ZERO, decimals: 6, is_bridgeable: true }
    }

    #[test]
    fn bridge_edge_requires_two_chains() {
        let registries = Registries::builder().token("USDC", descriptor(137)).build();
        let graph = TokenGraph::build(&registries);
        assert_eq!(graph.edge_count(), 0);

        let registries = Registries::builder()
            .token("USDC", descriptor(137))
            .token("USDC", descriptor(1))
            .build();
        let graph = TokenGraph::build(&registries);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn non_bridgeable_symbol_gets_no_bridge_edge() {
        // Registries only tracks symbols it's told about; bridgeability is
        // enforced by BRIDGEABLE_SYMBOLS regardless of per-token flags.
        let registries = Registries::builder()
            .token("SHIB", descriptor(137))
            .token("SHIB", descriptor(1))
            .build();
        let graph = TokenGraph::build(&registries);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn intra_chain_candidates_cover_full_size_sweep() {
        let registries = Registries::builder()
            .token("USDC", descriptor(137))
            .dex_pair(137, "uniswap", "sushiswap")
            .build();
        let graph = TokenGraph::build(&registries);
        let sweep = default_size_sweep();
        let candidates =
            graph.enumerate_candidates(&registries, &HashMap::new(), 0, &sweep);
        assert_eq!(candidates.len(), sweep.len());
        assert!(candidates.iter().all(|c| !c.is_cross_chain()));
    }

    #[test]
    fn cross_chain_candidates_emit_both_directions() {
        let registries = Registries::builder()
            .token("USDC", descriptor(137))
            .token("USDC", descriptor(1))
            .build();
        let graph = TokenGraph::build(&registries);
        let sweep = vec![Decimal::from(1000)];
        let candidates =
            graph.enumerate_candidates(&registries, &HashMap::new(), 0, &sweep);
        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().all(|c| c.is_cross_chain()));
        let sources: Vec<ChainId> = candidates.iter().map(|c| c.source_chain).collect();
        assert!(sources.contains(&137) && sources.contains(&1));
    }

    #[test]
    fn rotating_tier_skips_non_due_iterations() {
        let registries = Registries::builder()
            .token("LOWCAP", descriptor(137))
            .dex_pair(137, "uniswap", "sushiswap")
            .build();
        let graph = TokenGraph::build(&registries);
        let mut tiers = HashMap::new();
        tiers.insert("LOWCAP".to_string(), ScanTier::Rotating { every_nth: 3 });
        let sweep = vec![Decimal::from(1000)];

        assert!(graph.enumerate_candidates(&registries, &tiers, 1, &sweep).is_empty());
        assert!(!graph.enumerate_candidates(&registries, &tiers, 3, &sweep).is_empty());
    }
}

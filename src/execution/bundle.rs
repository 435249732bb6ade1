//! Stage 6 — bundle construction — §4.9.
//!
//! A binary Merkle tree over the bundle's signed transactions, leaves and
//! internal nodes both keccak-256. Odd levels duplicate the last leaf
//! rather than promoting it unhashed, so every level halves exactly.

use alloy::primitives::{keccak256, B256};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Bundle {
    pub transactions: Vec<String>,
    pub merkle_root: B256,
    pub target_block: u64,
    pub avoid_mempool: bool,
}

/// Leaf hash = keccak256(raw signed tx bytes).
pub fn leaf_hash(raw_tx: &[u8]) -> B256 {
    keccak256(raw_tx)
}

/// Build the full tree level by level, returning every level from leaves
/// (`levels[0]`) to the single-element root (`levels.last()`).
fn build_levels(leaves: &[B256]) -> Vec<Vec<B256>> {
    let mut levels = vec![leaves.to_vec()];
    while levels.last().unwrap().len() > 1 {
        let current = levels.last().unwrap();
        let mut next = Vec::with_capacity(current.len().div_ceil(2));
        let mut i = 0;
        while i < current.len() {
            let left = current[i];
            let right = if i + 1 < current.len() { current[i + 1] } else { current[i] };
            next.push(hash_pair(left, right));
            i += 2;
        }
        levels.push(next);
    }
    levels
}

fn hash_pair(left: B256, right: B256) -> B256 {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(left.as_slice());
    buf[32..].copy_from_slice(right.as_slice());
    keccak256(buf)
}

/// Root of the Merkle tree over `leaves`. Empty input has no defined root
/// and is the caller's responsibility to avoid.
pub fn root(leaves: &[B256]) -> B256 {
    build_levels(leaves).last().unwrap()[0]
}

/// Sibling hashes from leaf `index` up to (but not including) the root.
pub fn proof(index: usize, leaves: &[B256]) -> Vec<B256> {
    let levels = build_levels(leaves);
    let mut path = Vec::new();
    let mut idx = index;
    for level in &levels[..levels.len() - 1] {
        let sibling_idx = if idx % 2 == 0 {
            if idx + 1 < level.len() { idx + 1 } else { idx }
        } else {
            idx - 1
        };
        path.push(level[sibling_idx]);
        idx /= 2;
    }
    path
}

/// Re-derive the root from a leaf and its proof and compare against
/// `expected_root`. The proof alone doesn't carry the leaf's original
/// index's left/right parity, so `index` is required.
pub fn verify(expected_root: B256, leaf: B256, proof: &[B256], mut index: usize) -> bool {
    let mut current = leaf;
    for sibling in proof {
        current = if index % 2 == 0 { hash_pair(current, *sibling) } else { hash_pair(*sibling, current) };
        index /= 2;
    }
    current == expected_root
}

pub fn build_bundle(raw_txs: &[alloy::primitives::Bytes], target_block: u64) -> Bundle {
    let leaves: Vec<B256> = raw_txs.iter().map(|tx| leaf_hash(tx)).collect();
    let merkle_root = if leaves.is_empty() { B256::ZERO } else { root(&leaves) };
    Bundle {
        transactions: raw_txs.iter().map(|tx| format!("0x{}", hex::encode(tx))).collect(),
        merkle_root,
        target_block,
        avoid_mempool: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(n: usize) -> Vec<B256> {
        (0..n).map(|i| keccak256([i as u8])).collect()
    }

    #[test]
    fn single_leaf_bundle_root_is_the_leaf_hash() {
        let l = leaves(1);
        assert_eq!(root(&l), l[0]);
    }

    #[test]
    fn odd_leaf_count_duplicates_the_last_leaf() {
        let l = leaves(3);
        let levels = build_levels(&l);
        // level 0 has 3, level 1 should have 2 (3 paired with duplicated 3rd)
        assert_eq!(levels[0].len(), 3);
        assert_eq!(levels[1].len(), 2);
        assert_eq!(levels[1][1], hash_pair(l[2], l[2]));
    }

    #[test]
    fn every_leaf_verifies_against_its_own_proof() {
        for n in 1..9 {
            let l = leaves(n);
            let r = root(&l);
            for (i, &leaf) in l.iter().enumerate() {
                let p = proof(i, &l);
                assert!(verify(r, leaf, &p, i), "leaf {i} of {n} failed to verify");
            }
        }
    }

    #[test]
    fn tampered_leaf_fails_verification() {
        let l = leaves(4);
        let r = root(&l);
        let p = proof(0, &l);
        let wrong_leaf = keccak256([99u8]);
        assert!(!verify(r, wrong_leaf, &p, 0));
    }
}

//! Property-based tests — §8, properties 1-9.
//!
//! These exercise pure functions directly rather than standing up a full
//! pipeline; each property is checked against hundreds of generated
//! inputs via `proptest`.

use alloy::primitives::{Address, Bytes, U256};
use proptest::prelude::*;
use rust_decimal::Decimal;

use xarb_core::execution::bundle::{build_bundle, proof, root, verify};
use xarb_core::execution::calldata::{check_calldata_size, encode_execute_calldata, MAX_CALLDATA_BYTES};
use xarb_core::execution::signer::NonceManager;
use xarb_core::profitability::{compute_net_profit, size_safe_loan, ProfitInputs};
use xarb_core::signal::{TradeSignal, MAX_PROTOCOLS};
use xarb_core::types::{FlashLoanSource, TokenDescriptor};

fn arb_signal(n_hops: usize, extra_len: usize) -> TradeSignal {
    TradeSignal {
        chain_id: 137,
        token: Address::repeat_byte(1),
        amount: "1000000".into(),
        flash_source: FlashLoanSource::BalancerV3,
        protocols: vec![1; n_hops],
        routers: vec![Address::repeat_byte(2); n_hops],
        path: vec![Address::repeat_byte(3); n_hops],
        extras: vec![format!("0x{}", "ab".repeat(extra_len)); n_hops],
        expected_profit: 1.0,
    }
}

proptest! {
    /// Property 1 — calldata never exceeds the bundle size bound, and the
    /// size gate always agrees with the actual encoded length.
    #[test]
    fn calldata_size_bound_holds(n_hops in 1usize..=MAX_PROTOCOLS, extra_len in 0usize..20_000) {
        let signal = arb_signal(n_hops, extra_len);
        let calldata = encode_execute_calldata(&signal, U256::from(1u64)).unwrap();
        let gate = check_calldata_size(&calldata);
        if calldata.len() > MAX_CALLDATA_BYTES {
            prop_assert!(gate.is_err());
        } else {
            prop_assert!(gate.is_ok());
        }
    }

    /// Property 3 — a signal with mismatched array lengths never validates,
    /// whatever those lengths are (as long as they actually differ).
    #[test]
    fn mismatched_lengths_always_rejected(a in 1usize..6, b in 1usize..6) {
        prop_assume!(a != b);
        let mut signal = arb_signal(a, 0);
        signal.routers = vec![Address::ZERO; b];
        prop_assert!(signal.validate().is_err());
    }

    /// Property 3b — protocol counts outside `1..=MAX_PROTOCOLS` never validate.
    #[test]
    fn protocol_count_bounds_enforced(n in 0usize..10) {
        let signal = arb_signal(n, 0);
        let result = signal.validate();
        if (1..=MAX_PROTOCOLS).contains(&n) {
            prop_assert!(result.is_ok());
        } else {
            prop_assert!(result.is_err());
        }
    }

    /// Property 6 — every leaf in a Merkle bundle verifies against its own
    /// proof and index, for any non-empty set of transactions.
    #[test]
    fn merkle_round_trip_holds(n in 1usize..20) {
        let raw_txs: Vec<Bytes> = (0..n).map(|i| Bytes::from(vec![i as u8; 32])).collect();
        let bundle = build_bundle(&raw_txs, 100);
        let leaves: Vec<_> = raw_txs.iter().map(|tx| xarb_core::execution::bundle::leaf_hash(tx)).collect();
        for (i, leaf) in leaves.iter().enumerate() {
            let p = proof(i, &leaves);
            prop_assert!(verify(bundle.merkle_root, *leaf, &p, i));
        }
        prop_assert_eq!(root(&leaves), bundle.merkle_root);
    }

    /// Property 7 — net profit is strictly monotonically decreasing in gas
    /// cost, all else held fixed.
    #[test]
    fn profit_monotonic_in_gas_cost(gas_a in 0i64..1000, gas_b in 0i64..1000) {
        prop_assume!(gas_a != gas_b);
        let base = |gas: i64| ProfitInputs {
            cost_usd: Decimal::from(1000),
            revenue_usd: Decimal::from(1100),
            bridge_fee_usd: Decimal::ZERO,
            gas_cost_usd: Decimal::new(gas, 2),
            flashloan_source: FlashLoanSource::BalancerV3,
            flashloan_principal_usd: Decimal::from(1000),
            aave_fee_bps: Decimal::from(9),
            min_profit_usd: Decimal::from(5),
        };
        let result_a = compute_net_profit(base(gas_a));
        let result_b = compute_net_profit(base(gas_b));
        if gas_a < gas_b {
            prop_assert!(result_a.net_usd >= result_b.net_usd);
        } else {
            prop_assert!(result_a.net_usd <= result_b.net_usd);
        }
    }

    /// Property 8 — nonces issued by `NonceManager` for a single chain are
    /// always strictly increasing, regardless of how many are drawn.
    #[test]
    fn nonce_sequence_strictly_increases(count in 1usize..200) {
        let manager = NonceManager::new();
        let mut prev = None;
        for _ in 0..count {
            let n = manager.acquire(137);
            if let Some(p) = prev {
                prop_assert_eq!(n, p + 1);
            }
            prev = Some(n);
        }
    }

    /// Property 9 — a sized loan never exceeds `floor(fraction * vault)`.
    #[test]
    fn safe_loan_never_exceeds_cap(vault in 1_000_000u64..1_000_000_000_000u64, desired_mult in 1u64..20) {
        let token = TokenDescriptor { chain_id: 137, address: Address::ZERO, decimals: 6, is_bridgeable: true };
        let desired = U256::from(vault).saturating_mul(U256::from(desired_mult));
        let fraction = Decimal::new(20, 2); // 0.20
        if let Ok(loan) = size_safe_loan(&token, desired, U256::from(vault), Decimal::ONE, fraction, Decimal::ZERO) {
            let cap = U256::from(vault) * U256::from(20u64) / U256::from(100u64);
            prop_assert!(loan <= cap);
        }
    }
}

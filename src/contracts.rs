//! Centralized contract interfaces.
//!
//! All Solidity interfaces used by the pricing and execution modules,
//! defined with alloy's `sol!` macro. Each interface carries `#[sol(rpc)]`
//! so it generates a contract instance type that can make RPC calls via
//! any alloy `Provider`.

use alloy::sol;

// ── ERC20 ─────────────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function approve(address spender, uint256 amount) external returns (bool);
        function allowance(address owner, address spender) external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
        function decimals() external view returns (uint8);
    }
}

// ── Uniswap V2 ───────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IUniswapV2Factory {
        function getPair(address tokenA, address tokenB) external view returns (address pair);
    }
}

sol! {
    #[sol(rpc)]
    interface IUniswapV2Router02 {
        function getAmountsOut(uint256 amountIn, address[] calldata path) external view returns (uint256[] memory amounts);
    }
}

// ── Uniswap V3 ───────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface UniswapV3Pool {
        function slot0() external view returns (uint160 sqrtPriceX96, int24 tick, uint16 observationIndex, uint16 observationCardinality, uint16 observationCardinalityNext, uint8 feeProtocol, bool unlocked);
        function liquidity() external view returns (uint128);
    }
}

/// QuoterV1 — Polygon deploys this (flat params, revert-encoded return).
sol! {
    #[sol(rpc)]
    interface IQuoter {
        function quoteExactInputSingle(address tokenIn, address tokenOut, uint24 fee, uint256 amountIn, uint160 sqrtPriceLimitX96) external returns (uint256 amountOut);
    }
}

/// QuoterV2 — struct params, normal return (no revert-encoding trick).
/// Address comes from the per-chain DEX registry (`DexDescriptor::quoter_address`),
/// resolving the single-shared-constant bug documented in `spec.md` §9.
sol! {
    #[sol(rpc)]
    interface IQuoterV2 {
        struct QuoteExactInputSingleParams {
            address tokenIn;
            address tokenOut;
            uint256 amountIn;
            uint24 fee;
            uint160 sqrtPriceLimitX96;
        }

        function quoteExactInputSingle(QuoteExactInputSingleParams memory params) external returns (uint256 amountOut, uint160 sqrtPriceX96After, uint32 initializedTicksCrossed, uint256 gasEstimate);
    }
}

// ── Curve ────────────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface ICurvePool {
        function get_dy(int128 i, int128 j, uint256 dx) external view returns (uint256);
    }
}

// ── Multicall3 (batch pre-screen quoting) ───────────────────────────

sol! {
    #[sol(rpc)]
    interface IMulticall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct Result {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls) external payable returns (Result[] memory returnData);
    }
}

/// Deployed at the same address on every EVM chain that has it.
pub const MULTICALL3_ADDRESS: &str = "0xcA11bde05977b3631167028862bE2a173976CA11";

// ── ArbExecutor (atomic flash-loan arbitrage contract; out of scope) ──
//
// Treated as a black box per `spec.md` §1 — invoked with the four-field
// `execute` calldata Stage 3 builds. `routeData` is itself an ABI-encoded
// tuple of four same-length arrays; see `execution::calldata`.

sol! {
    #[sol(rpc)]
    interface IFlashArbExecutor {
        function execute(uint8 flashSource, address loanToken, uint256 loanAmount, bytes calldata routeData) external;
    }
}

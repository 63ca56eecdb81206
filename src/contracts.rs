//! Contract Interfaces
//!
//! Solidity interfaces used by the bot, declared with alloy's `sol!` macro.
//! Interfaces annotated with `#[sol(rpc)]` generate instance types that can
//! call through any alloy Provider; the receiver parameter structs are plain
//! ABI types encoded into the flash-loan `params` blob.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use alloy::primitives::aliases::U24;
use alloy::sol;

// ── ERC20 ─────────────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
    }
}

// ── Constant-product (Uniswap V2 family) ─────────────────────────────

sol! {
    #[sol(rpc)]
    interface IUniswapV2Factory {
        function getPair(address tokenA, address tokenB) external view returns (address pair);
    }
}

sol! {
    #[sol(rpc)]
    interface IUniswapV2Pair {
        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast);
        function token0() external view returns (address);
    }
}

sol! {
    #[sol(rpc)]
    interface IUniswapV2Router02 {
        function getAmountsOut(uint256 amountIn, address[] calldata path) external view returns (uint256[] memory amounts);
    }
}

// ── Concentrated liquidity (Uniswap V3 Quoter) ───────────────────────

sol! {
    #[sol(rpc)]
    interface IQuoter {
        function quoteExactInputSingle(address tokenIn, address tokenOut, uint24 fee, uint256 amountIn, uint160 sqrtPriceLimitX96) external returns (uint256 amountOut);
        function quoteExactInput(bytes memory path, uint256 amountIn) external returns (uint256 amountOut);
    }
}

// ── Flash-loan receiver ──────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IFlashLoanReceiver {
        function initiateFlashLoan(address[] calldata assets, uint256[] calldata amounts, uint256[] calldata modes, bytes calldata params) external;
    }
}

sol! {
    /// Single-hop receiver parameters: address routes only, one fee per leg.
    struct ArbParamsV1 {
        address targetToken;
        address buyRouter;
        address sellRouter;
        uint256 minOutBuy;
        uint256 minOutSell;
        uint256 deadline;
        uint24 buyFee;
        uint24 sellFee;
        address[] buyPath;
        address[] sellPath;
    }
}

sol! {
    /// Multi-hop receiver parameters: adds byte-encoded concentrated-liquidity paths.
    struct ArbParamsV2 {
        address targetToken;
        address buyRouter;
        address sellRouter;
        uint256 minOutBuy;
        uint256 minOutSell;
        uint256 deadline;
        uint24 buyFee;
        uint24 sellFee;
        address[] buyPath;
        address[] sellPath;
        bytes buyV3Path;
        bytes sellV3Path;
    }
}

/// Convert a u32 fee tier to the `uint24` ABI type.
/// Uses from_limbs() because Uint<24, 1> doesn't impl From<u32>.
pub fn fee_to_u24(fee: u32) -> U24 {
    debug_assert!(fee <= 0xFF_FFFF, "fee {} exceeds uint24", fee);
    U24::from_limbs([fee as u64])
}

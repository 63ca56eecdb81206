//! Concentrated-liquidity path codec
//!
//! Layout: token0 (20 bytes) | fee0 (3 bytes, big-endian) | token1 | fee1 | ... | tokenN
//! which is 20 + 23*hops bytes.

use crate::error::RouteError;
use alloy::primitives::{Address, Bytes};

const ADDR_LEN: usize = 20;
const FEE_LEN: usize = 3;
const STEP: usize = ADDR_LEN + FEE_LEN;

pub fn encode_path(tokens: &[Address], fees: &[u32]) -> Result<Bytes, RouteError> {
    if tokens.len() < 2 {
        return Err(RouteError::TooShort(tokens.len()));
    }
    if fees.len() != tokens.len() - 1 {
        return Err(RouteError::FeeCount {
            tokens: tokens.len(),
            fees: fees.len(),
        });
    }

    let mut out = Vec::with_capacity(ADDR_LEN + STEP * fees.len());
    for (token, fee) in tokens.iter().zip(fees) {
        if *fee > 0xFF_FFFF {
            return Err(RouteError::FeeOverflow(*fee));
        }
        out.extend_from_slice(token.as_slice());
        out.extend_from_slice(&fee.to_be_bytes()[1..]);
    }
    // zip stops one short; the final token has no trailing fee
    if let Some(last) = tokens.last() {
        out.extend_from_slice(last.as_slice());
    }
    Ok(Bytes::from(out))
}

pub fn decode_path(path: &[u8]) -> Result<(Vec<Address>, Vec<u32>), RouteError> {
    if path.len() < ADDR_LEN + STEP || (path.len() - ADDR_LEN) % STEP != 0 {
        return Err(RouteError::BadPathLength(path.len()));
    }

    let hops = (path.len() - ADDR_LEN) / STEP;
    let mut tokens = Vec::with_capacity(hops + 1);
    let mut fees = Vec::with_capacity(hops);

    for i in 0..hops {
        let at = i * STEP;
        tokens.push(Address::from_slice(&path[at..at + ADDR_LEN]));
        let f = &path[at + ADDR_LEN..at + STEP];
        fees.push(u32::from_be_bytes([0, f[0], f[1], f[2]]));
    }
    tokens.push(Address::from_slice(&path[hops * STEP..]));

    Ok((tokens, fees))
}

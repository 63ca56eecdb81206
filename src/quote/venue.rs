//! Venues
//!
//! Two venue kinds behind one enum: constant-product (router `getAmountsOut`
//! plus factory reserves for closed-form sizing) and concentrated-liquidity
//! (fee-tiered Quoter calls). Each generates its own route candidates and
//! knows how to issue a single quote for one route.
//!
//! Author: AI-Generated
//! Created: 2026-02-06

use crate::error::QuoteError;
use crate::routing::{encode_path, fee_combinations, hub_paths};
use crate::rpc::ChainClient;
use crate::types::{Route, VenueKind};
use alloy::primitives::{Address, U256};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantProductVenue {
    pub name: String,
    pub router: Address,
    pub factory: Address,
    /// Max intermediate hub tokens per route.
    pub max_hops: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcentratedLiquidityVenue {
    pub name: String,
    pub router: Address,
    pub quoter: Address,
    pub max_hops: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Venue {
    ConstantProduct(ConstantProductVenue),
    ConcentratedLiquidity(ConcentratedLiquidityVenue),
}

impl Venue {
    pub fn name(&self) -> &str {
        match self {
            Venue::ConstantProduct(v) => &v.name,
            Venue::ConcentratedLiquidity(v) => &v.name,
        }
    }

    pub fn kind(&self) -> VenueKind {
        match self {
            Venue::ConstantProduct(_) => VenueKind::ConstantProduct,
            Venue::ConcentratedLiquidity(_) => VenueKind::ConcentratedLiquidity,
        }
    }

    pub fn router(&self) -> Address {
        match self {
            Venue::ConstantProduct(v) => v.router,
            Venue::ConcentratedLiquidity(v) => v.router,
        }
    }

    pub fn max_hops(&self) -> usize {
        match self {
            Venue::ConstantProduct(v) => v.max_hops,
            Venue::ConcentratedLiquidity(v) => v.max_hops,
        }
    }

    /// Every route this venue would consider from `from` to `to`.
    /// Direct routes come first, so ties resolve to the shortest route.
    pub fn route_candidates(&self, from: Address, to: Address, hubs: &[Address]) -> Vec<Route> {
        let paths = hub_paths(from, to, hubs, self.max_hops());
        match self {
            Venue::ConstantProduct(_) => paths
                .into_iter()
                .filter_map(|p| Route::constant_product(p).ok())
                .collect(),
            Venue::ConcentratedLiquidity(_) => paths
                .into_iter()
                .flat_map(|p| {
                    fee_combinations(p.len() - 1)
                        .into_iter()
                        .filter_map(move |fees| Route::concentrated(p.clone(), fees).ok())
                })
                .collect(),
        }
    }

    /// One raw quote call for one route. No retry, no cache.
    pub async fn quote_route(
        &self,
        client: &dyn ChainClient,
        route: &Route,
        amount_in: U256,
    ) -> Result<U256, QuoteError> {
        match self {
            Venue::ConstantProduct(v) => client.amounts_out(v.router, amount_in, route.tokens()).await,
            Venue::ConcentratedLiquidity(v) => {
                let tokens = route.tokens();
                let fees = route.fees();
                if fees.len() != tokens.len() - 1 {
                    return Err(QuoteError::NoLiquidity(format!(
                        "route without fee tiers on {}",
                        v.name
                    )));
                }
                if tokens.len() == 2 {
                    client
                        .quote_exact_input_single(v.quoter, tokens[0], tokens[1], fees[0], amount_in)
                        .await
                } else {
                    let path = encode_path(tokens, fees).map_err(|e| QuoteError::NoLiquidity(e.to_string()))?;
                    client.quote_exact_input(v.quoter, path, amount_in).await
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::mock::MockChain;

    fn addr(b: u8) -> Address {
        Address::repeat_byte(b)
    }

    fn cp(max_hops: usize) -> Venue {
        Venue::ConstantProduct(ConstantProductVenue {
            name: "QuickSwapV2".to_string(),
            router: addr(0x10),
            factory: addr(0x11),
            max_hops,
        })
    }

    fn cl(max_hops: usize) -> Venue {
        Venue::ConcentratedLiquidity(ConcentratedLiquidityVenue {
            name: "UniswapV3".to_string(),
            router: addr(0x20),
            quoter: addr(0x21),
            max_hops,
        })
    }

    #[test]
    fn test_cp_candidates() {
        let routes = cp(1).route_candidates(addr(1), addr(2), &[addr(3), addr(4)]);
        assert_eq!(routes.len(), 3);
        assert!(routes.iter().all(|r| r.fees().is_empty()));
        assert_eq!(routes[0].tokens(), &[addr(1), addr(2)]);
    }

    #[test]
    fn test_cl_candidates_carry_fees() {
        let direct = cl(0).route_candidates(addr(1), addr(2), &[addr(3)]);
        assert_eq!(direct.len(), 4);

        let routes = cl(1).route_candidates(addr(1), addr(2), &[addr(3)]);
        // 4 single-hop tiers + 16 two-hop tier pairs
        assert_eq!(routes.len(), 20);
        for r in &routes {
            assert_eq!(r.fees().len(), r.tokens().len() - 1);
        }
    }

    #[tokio::test]
    async fn test_quote_route_dispatch() {
        let chain = MockChain::new("https://a.example");
        chain.add_cp_pool(addr(0x10), addr(0x11), addr(1), addr(2), 1_000_000, 2_000_000);
        chain.add_cl_pool(addr(0x21), addr(1), addr(3), 500, 1_000_000, 1_000_000);
        chain.add_cl_pool(addr(0x21), addr(3), addr(2), 3000, 1_000_000, 2_000_000);

        let direct = Route::constant_product(vec![addr(1), addr(2)]).unwrap();
        let out = cp(0).quote_route(&chain, &direct, U256::from(1000)).await.unwrap();
        assert_eq!(out, U256::from(1992));

        let multi = Route::concentrated(vec![addr(1), addr(3), addr(2)], vec![500, 3000]).unwrap();
        let out = cl(1).quote_route(&chain, &multi, U256::from(1000)).await.unwrap();
        assert!(out > U256::ZERO);
        assert_eq!(chain.quote_calls(), 2);

        let missing = Route::concentrated(vec![addr(1), addr(2)], vec![100]).unwrap();
        assert!(matches!(
            cl(0).quote_route(&chain, &missing, U256::from(1000)).await,
            Err(QuoteError::NoLiquidity(_))
        ));
    }
}

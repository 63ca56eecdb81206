//! Hub-token route candidates
//!
//! Candidates are the direct pair plus every route that crosses one or two
//! hub tokens between source and destination, bounded by the venue's
//! max intermediate-hop count. Order is deterministic: direct first, then
//! one-hub routes in hub order, then two-hub routes.

use alloy::primitives::Address;

/// Concentrated-liquidity fee tiers (hundredths of a bip).
pub const FEE_TIERS: [u32; 4] = [100, 500, 3000, 10000];

/// Routes are at most 4 tokens long.
pub const MAX_INTERMEDIATE_HOPS: usize = 2;

/// Token sequences from `from` to `to` through at most `max_intermediate` hubs.
pub fn hub_paths(
    from: Address,
    to: Address,
    hubs: &[Address],
    max_intermediate: usize,
) -> Vec<Vec<Address>> {
    if from == to {
        return Vec::new();
    }
    let max_intermediate = max_intermediate.min(MAX_INTERMEDIATE_HOPS);

    // Usable hubs: unique, never the endpoints themselves
    let mut usable: Vec<Address> = Vec::with_capacity(hubs.len());
    for hub in hubs {
        if *hub != from && *hub != to && !usable.contains(hub) {
            usable.push(*hub);
        }
    }

    let mut paths = vec![vec![from, to]];
    if max_intermediate >= 1 {
        for hub in &usable {
            paths.push(vec![from, *hub, to]);
        }
    }
    if max_intermediate >= 2 {
        for first in &usable {
            for second in &usable {
                if first != second {
                    paths.push(vec![from, *first, *second, to]);
                }
            }
        }
    }
    paths
}

/// Every fee-tier assignment for a route with `hops` hops.
pub fn fee_combinations(hops: usize) -> Vec<Vec<u32>> {
    let mut combos: Vec<Vec<u32>> = vec![Vec::new()];
    for _ in 0..hops {
        combos = combos
            .into_iter()
            .flat_map(|prefix| {
                FEE_TIERS.iter().map(move |fee| {
                    let mut next = prefix.clone();
                    next.push(*fee);
                    next
                })
            })
            .collect();
    }
    combos
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn addr(b: u8) -> Address {
        Address::repeat_byte(b)
    }

    #[test]
    fn test_direct_only_when_no_intermediate() {
        let paths = hub_paths(addr(1), addr(2), &[addr(3), addr(4)], 0);
        assert_eq!(paths, vec![vec![addr(1), addr(2)]]);
    }

    #[test]
    fn test_one_hub_skips_endpoints_and_duplicates() {
        let hubs = [addr(3), addr(1), addr(3), addr(2), addr(4)];
        let paths = hub_paths(addr(1), addr(2), &hubs, 1);
        assert_eq!(
            paths,
            vec![
                vec![addr(1), addr(2)],
                vec![addr(1), addr(3), addr(2)],
                vec![addr(1), addr(4), addr(2)],
            ]
        );
    }

    #[test]
    fn test_routes_well_formed() {
        let hubs = [addr(3), addr(4), addr(5), addr(1)];
        for max in 0..=3 {
            let paths = hub_paths(addr(1), addr(2), &hubs, max);
            let unique: HashSet<_> = paths.iter().collect();
            assert_eq!(unique.len(), paths.len(), "duplicate route at max={}", max);
            for p in &paths {
                assert!((2..=4).contains(&p.len()), "bad length {:?}", p);
                assert!(p.windows(2).all(|w| w[0] != w[1]), "adjacent duplicate {:?}", p);
                assert_eq!(p.first(), Some(&addr(1)));
                assert_eq!(p.last(), Some(&addr(2)));
            }
        }
        // 1 direct + 3 one-hub + 6 two-hub
        assert_eq!(hub_paths(addr(1), addr(2), &hubs, 2).len(), 10);
    }

    #[test]
    fn test_same_endpoints_yield_nothing() {
        assert!(hub_paths(addr(1), addr(1), &[addr(2)], 2).is_empty());
    }

    #[test]
    fn test_fee_combinations() {
        assert_eq!(fee_combinations(1).len(), 4);
        let two = fee_combinations(2);
        assert_eq!(two.len(), 16);
        assert_eq!(two[0], vec![100, 100]);
        assert_eq!(two[15], vec![10000, 10000]);
        assert!(two.iter().all(|c| c.len() == 2));
    }
}

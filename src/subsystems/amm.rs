//! AMM sub-engine, spec.md §4.3.4 ("AMM family").
//!
//! A constant-product pool (`reserve_a * reserve_b = k`), matching the
//! manager-boundary shape spec.md calls for: `create_pool`, `deposit`,
//! `withdraw`, `vote`, `bid`, `delete_pool`, each returning `(ok, msg, ...)`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pool {
    pub id: String,
    pub asset_a: (String, String),
    pub asset_b: (String, String),
    pub reserve_a: i128,
    pub reserve_b: i128,
    pub lp_total: i128,
    pub trading_fee_bps: u16,
    pub lp_balances: BTreeMap<String, i128>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AmmManager {
    pools: BTreeMap<String, Pool>,
}

impl AmmManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_pool(
        &mut self,
        id: String,
        creator: &str,
        asset_a: (String, String),
        asset_b: (String, String),
        reserve_a: i128,
        reserve_b: i128,
        trading_fee_bps: u16,
    ) -> Result<i128, String> {
        if self.pools.contains_key(&id) {
            return Err("pool already exists".to_string());
        }
        if reserve_a <= 0 || reserve_b <= 0 {
            return Err("initial reserves must be positive".to_string());
        }
        let lp_minted = isqrt(reserve_a * reserve_b);
        let mut lp_balances = BTreeMap::new();
        lp_balances.insert(creator.to_string(), lp_minted);
        self.pools.insert(
            id.clone(),
            Pool {
                id,
                asset_a,
                asset_b,
                reserve_a,
                reserve_b,
                lp_total: lp_minted,
                trading_fee_bps,
                lp_balances,
            },
        );
        Ok(lp_minted)
    }

    pub fn deposit(&mut self, id: &str, depositor: &str, amount_a: i128, amount_b: i128) -> Result<i128, String> {
        let pool = self.pools.get_mut(id).ok_or_else(|| "no such pool".to_string())?;
        if pool.reserve_a == 0 || pool.reserve_b == 0 {
            return Err("empty pool".to_string());
        }
        // Proportional deposit: LP tokens minted proportional to the
        // smaller of the two contributed ratios, to avoid diluting the pool.
        let ratio_a = (amount_a * pool.lp_total) / pool.reserve_a;
        let ratio_b = (amount_b * pool.lp_total) / pool.reserve_b;
        let minted = ratio_a.min(ratio_b);
        if minted <= 0 {
            return Err("deposit too small".to_string());
        }
        pool.reserve_a += amount_a;
        pool.reserve_b += amount_b;
        pool.lp_total += minted;
        *pool.lp_balances.entry(depositor.to_string()).or_insert(0) += minted;
        Ok(minted)
    }

    pub fn withdraw(&mut self, id: &str, withdrawer: &str, lp_tokens: i128) -> Result<(i128, i128), String> {
        let pool = self.pools.get_mut(id).ok_or_else(|| "no such pool".to_string())?;
        let balance = pool.lp_balances.get(withdrawer).copied().unwrap_or(0);
        if lp_tokens <= 0 || lp_tokens > balance {
            return Err("insufficient LP balance".to_string());
        }
        let out_a = (pool.reserve_a * lp_tokens) / pool.lp_total;
        let out_b = (pool.reserve_b * lp_tokens) / pool.lp_total;
        pool.reserve_a -= out_a;
        pool.reserve_b -= out_b;
        pool.lp_total -= lp_tokens;
        *pool.lp_balances.get_mut(withdrawer).unwrap() -= lp_tokens;
        Ok((out_a, out_b))
    }

    pub fn vote(&mut self, id: &str, voter: &str, trading_fee_bps: u16) -> Result<(), String> {
        let pool = self.pools.get_mut(id).ok_or_else(|| "no such pool".to_string())?;
        if pool.lp_balances.get(voter).copied().unwrap_or(0) <= 0 {
            return Err("not an LP holder".to_string());
        }
        if trading_fee_bps > 1000 {
            return Err("fee vote out of range".to_string());
        }
        pool.trading_fee_bps = trading_fee_bps;
        Ok(())
    }

    /// Auction-slot bid for reduced trading fees; modelled minimally as
    /// burning `bid_amount` of LP tokens from the bidder.
    pub fn bid(&mut self, id: &str, bidder: &str, bid_amount: i128) -> Result<(), String> {
        let pool = self.pools.get_mut(id).ok_or_else(|| "no such pool".to_string())?;
        let balance = pool.lp_balances.get(bidder).copied().unwrap_or(0);
        if bid_amount <= 0 || bid_amount > balance {
            return Err("insufficient LP balance to bid".to_string());
        }
        *pool.lp_balances.get_mut(bidder).unwrap() -= bid_amount;
        pool.lp_total -= bid_amount;
        Ok(())
    }

    pub fn delete_pool(&mut self, id: &str) -> Result<(), String> {
        let pool = self.pools.get(id).ok_or_else(|| "no such pool".to_string())?;
        if pool.lp_total > 0 {
            return Err("pool still has liquidity".to_string());
        }
        self.pools.remove(id);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Pool> {
        self.pools.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pool> {
        self.pools.values()
    }
}

fn isqrt(value: i128) -> i128 {
    if value < 2 {
        return value.max(0);
    }
    let mut x = value;
    let mut y = (x + 1) / 2;
    while y < x {
        x = y;
        y = (x + value / x) / 2;
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deposit_mints_proportional_lp_tokens() {
        let mut mgr = AmmManager::new();
        mgr.create_pool(
            "p1".to_string(),
            "rCreator",
            ("XRP".to_string(), "".to_string()),
            ("USD".to_string(), "rIssuer".to_string()),
            1000,
            1000,
            30,
        )
        .unwrap();
        let minted = mgr.deposit("p1", "rLp", 100, 100).unwrap();
        assert!(minted > 0);
        let pool = mgr.get("p1").unwrap();
        assert_eq!(pool.reserve_a, 1100);
        assert_eq!(pool.reserve_b, 1100);
    }

    #[test]
    fn withdraw_returns_proportional_reserves() {
        let mut mgr = AmmManager::new();
        let lp = mgr
            .create_pool("p1".to_string(), "rCreator", ("XRP".to_string(), "".to_string()), ("USD".to_string(), "rIssuer".to_string()), 1000, 1000, 30)
            .unwrap();
        let (out_a, out_b) = mgr.withdraw("p1", "rCreator", lp).unwrap();
        assert_eq!(out_a, 1000);
        assert_eq!(out_b, 1000);
    }

    #[test]
    fn delete_requires_empty_pool() {
        let mut mgr = AmmManager::new();
        mgr.create_pool("p1".to_string(), "rCreator", ("XRP".to_string(), "".to_string()), ("USD".to_string(), "rIssuer".to_string()), 1000, 1000, 30)
            .unwrap();
        assert!(mgr.delete_pool("p1").is_err());
    }
}

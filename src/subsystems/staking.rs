//! Staking pool sub-engine, spec.md §4.3.4/§4.4/§8.
//!
//! Grounded on the same manager-boundary shape as the other sub-engines
//! (`Result<T, String>`), holding no back-reference to accounts — the state
//! machine and ledger closer pass in whatever account data they need and
//! apply the returned payouts themselves.

use crate::model::amount::RATE_ONE;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Four staking tiers with increasing lock duration and total return.
pub const TIER_DURATIONS_SECS: [i64; 4] = [
    30 * 86_400,   // tier 0: 30 days
    90 * 86_400,   // tier 1: 90 days
    180 * 86_400,  // tier 2: 180 days
    365 * 86_400,  // tier 3: 365 days
];

/// Total interest paid out over the full term, in billionths of principal
/// (e.g. `50_000_000` = 5% total, not annualized).
pub const TIER_TOTAL_RETURN_BILLIONTHS: [u32; 4] = [10_000_000, 35_000_000, 80_000_000, 180_000_000];

/// Maximum early-unstake penalty (fraction of principal) at `t = 0`,
/// decaying linearly to zero at maturity.
pub const MAX_EARLY_PENALTY_BILLIONTHS: u32 = 200_000_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakeRecord {
    pub tx_id: String,
    pub address: String,
    pub amount: i128,
    pub tier: u8,
    pub start_time: i64,
    pub circulating_supply_at_start: i128,
}

impl StakeRecord {
    pub fn duration(&self) -> i64 {
        TIER_DURATIONS_SECS[self.tier as usize % TIER_DURATIONS_SECS.len()]
    }

    pub fn maturity_time(&self) -> i64 {
        self.start_time + self.duration()
    }

    pub fn full_interest(&self) -> i128 {
        let rate = TIER_TOTAL_RETURN_BILLIONTHS[self.tier as usize % TIER_TOTAL_RETURN_BILLIONTHS.len()];
        (self.amount * rate as i128) / RATE_ONE as i128
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StakingPool {
    records: BTreeMap<String, StakeRecord>,
}

impl StakingPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stake(&mut self, record: StakeRecord) -> Result<(), String> {
        if self.records.contains_key(&record.tx_id) {
            return Err("duplicate stake tx_id".to_string());
        }
        self.records.insert(record.tx_id.clone(), record);
        Ok(())
    }

    pub fn get(&self, stake_tx_id: &str) -> Option<&StakeRecord> {
        self.records.get(stake_tx_id)
    }

    /// Early (or post-maturity, penalty-free) unstake. Returns
    /// `(payout, burned_principal_penalty, forfeited_interest)`.
    pub fn unstake(&mut self, stake_tx_id: &str, now: i64) -> Result<(i128, i128, i128), String> {
        let record = self
            .records
            .remove(stake_tx_id)
            .ok_or_else(|| "no such stake".to_string())?;

        let elapsed = (now - record.start_time).max(0);
        let duration = record.duration();
        if elapsed >= duration {
            // Matured: no penalty, full interest.
            return Ok((record.amount + record.full_interest(), 0, 0));
        }

        // Penalty decays linearly from MAX at t=0 to 0 at maturity.
        let remaining_fraction_num = (duration - elapsed) as i128;
        let penalty_rate = (MAX_EARLY_PENALTY_BILLIONTHS as i128 * remaining_fraction_num) / duration as i128;
        let burned_principal = (record.amount * penalty_rate) / RATE_ONE as i128;
        let payout_principal = record.amount - burned_principal;
        let forfeited_interest = record.full_interest();
        Ok((payout_principal, burned_principal, forfeited_interest))
    }

    /// Drains and returns every record matured as of `close_time`, per
    /// spec.md §4.4 step 3 ("start_time + tier_duration <= close_time").
    pub fn mature_at(&mut self, close_time: i64) -> Vec<StakeRecord> {
        let matured_ids: Vec<String> = self
            .records
            .values()
            .filter(|r| r.maturity_time() <= close_time)
            .map(|r| r.tx_id.clone())
            .collect();
        matured_ids
            .into_iter()
            .filter_map(|id| self.records.remove(&id))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StakeRecord> {
        self.records.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(tier: u8, start_time: i64) -> StakeRecord {
        StakeRecord {
            tx_id: "tx1".to_string(),
            address: "rAlice".to_string(),
            amount: 1_000_000_000,
            tier,
            start_time,
            circulating_supply_at_start: 100_000_000_000,
        }
    }

    #[test]
    fn early_unstake_at_t_zero_burns_max_penalty() {
        let mut pool = StakingPool::new();
        pool.stake(sample(0, 0)).unwrap();
        let (payout, burned, forfeited) = pool.unstake("tx1", 0).unwrap();
        let expected_burn = (1_000_000_000i128 * MAX_EARLY_PENALTY_BILLIONTHS as i128) / RATE_ONE as i128;
        assert_eq!(burned, expected_burn);
        assert_eq!(payout, 1_000_000_000 - expected_burn);
        assert!(forfeited > 0);
    }

    #[test]
    fn unstake_at_maturity_burns_nothing() {
        let mut pool = StakingPool::new();
        let rec = sample(0, 0);
        let maturity = rec.maturity_time();
        pool.stake(rec).unwrap();
        let (payout, burned, forfeited) = pool.unstake("tx1", maturity).unwrap();
        assert_eq!(burned, 0);
        assert_eq!(forfeited, 0);
        assert!(payout > 1_000_000_000);
    }

    #[test]
    fn mature_at_drains_matching_records_only() {
        let mut pool = StakingPool::new();
        let mut rec_a = sample(0, 0);
        rec_a.tx_id = "a".to_string();
        let mut rec_b = sample(0, 1_000_000);
        rec_b.tx_id = "b".to_string();
        pool.stake(rec_a.clone()).unwrap();
        pool.stake(rec_b).unwrap();

        let matured = pool.mature_at(rec_a.maturity_time());
        assert_eq!(matured.len(), 1);
        assert_eq!(matured[0].tx_id, "a");
        assert_eq!(pool.len(), 1);
    }
}

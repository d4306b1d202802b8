//! Basis-point splits for routing raised capital and the token supply.
//!
//! Each split group must sum to exactly 10,000. Rounding dust from the
//! per-destination floors is assigned to one designated destination per
//! group (the project fund for capital, the DAO lock for tokens), so the
//! routed amounts always add up to the input.

use std::collections::BTreeMap;

use lid_core::constants::BPS_PRECISION;
use lid_core::error::{ConfigError, PresaleError};
use lid_core::math::{apply_bps, checked_add, checked_sub};
use lid_core::types::Address;
use serde::{Deserialize, Serialize};

/// Split of the raised base asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundSplit {
    /// Seeded into the liquidity pool.
    pub liquidity_bps: u64,
    /// Protocol treasury fee.
    pub treasury_bps: u64,
    /// Referral pool; unreferred remainder goes to the treasury.
    pub referral_bps: u64,
    /// Project fund.
    pub project_bps: u64,
}

impl FundSplit {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sum = self
            .liquidity_bps
            .saturating_add(self.treasury_bps)
            .saturating_add(self.referral_bps)
            .saturating_add(self.project_bps);
        if sum != BPS_PRECISION {
            return Err(ConfigError::SplitSum { group: "base asset", sum });
        }
        Ok(())
    }
}

/// Split of the token supply held by the presale at settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSplit {
    /// Budget for the liquidity pool.
    pub liquidity_bps: u64,
    /// Redeemable by contributors.
    pub presale_bps: u64,
    pub dao_bps: u64,
    pub team_bps: u64,
    pub marketing_bps: u64,
}

impl TokenSplit {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sum = [
            self.liquidity_bps,
            self.presale_bps,
            self.dao_bps,
            self.team_bps,
            self.marketing_bps,
        ]
        .iter()
        .fold(0u64, |acc, bps| acc.saturating_add(*bps));
        if sum != BPS_PRECISION {
            return Err(ConfigError::SplitSum { group: "token", sum });
        }
        Ok(())
    }
}

/// Destinations of the treasury token allocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasuryLocks {
    pub dao: Address,
    pub team: Address,
    pub marketing: Address,
}

impl TreasuryLocks {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, addr) in [("dao lock", self.dao), ("team lock", self.team), ("marketing", self.marketing)] {
            if addr.is_zero() {
                return Err(ConfigError::ZeroAddress(name));
            }
        }
        Ok(())
    }
}

/// How the raised base asset is routed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BaseAssetDistribution {
    pub liquidity: u128,
    /// Treasury fee plus the unpaid referral remainder.
    pub treasury: u128,
    pub referral_payouts: Vec<(Address, u128)>,
    /// Project share plus rounding dust.
    pub project: u128,
}

impl BaseAssetDistribution {
    pub fn referral_total(&self) -> u128 {
        self.referral_payouts.iter().fold(0u128, |acc, (_, v)| acc.saturating_add(*v))
    }

    pub fn total(&self) -> u128 {
        self.liquidity
            .saturating_add(self.treasury)
            .saturating_add(self.referral_total())
            .saturating_add(self.project)
    }
}

/// Split `total` raised according to `split`, paying each referrer its
/// accrued earnings out of the referral pool.
pub fn split_base_asset(
    total: u128,
    split: &FundSplit,
    referral_earnings: &BTreeMap<Address, u128>,
) -> Result<BaseAssetDistribution, PresaleError> {
    let liquidity = apply_bps(total, split.liquidity_bps)?;
    let treasury_fee = apply_bps(total, split.treasury_bps)?;
    let referral_pool = apply_bps(total, split.referral_bps)?;

    let mut paid: u128 = 0;
    let mut referral_payouts = Vec::with_capacity(referral_earnings.len());
    for (referrer, earned) in referral_earnings {
        if *earned == 0 {
            continue;
        }
        paid = checked_add(paid, *earned)?;
        referral_payouts.push((*referrer, *earned));
    }
    // Each earning is floor(deposit * bps), so their sum never exceeds the pool.
    let referral_remainder = checked_sub(referral_pool, paid)?;
    let treasury = checked_add(treasury_fee, referral_remainder)?;

    let routed = checked_add(checked_add(liquidity, treasury)?, paid)?;
    let project = checked_sub(total, routed)?;

    Ok(BaseAssetDistribution { liquidity, treasury, referral_payouts, project })
}

/// How the presale's token balance is routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenDistribution {
    /// Tokens actually seeded into the pool.
    pub liquidity: u128,
    /// Liquidity budget left unused by the pool, forwarded to the DAO lock.
    pub unused_liquidity: u128,
    /// Kept by the presale for contributor redemption.
    pub contributors: u128,
    /// DAO allocation, including rounding dust and `unused_liquidity`.
    pub dao: u128,
    pub team: u128,
    pub marketing: u128,
}

impl TokenDistribution {
    pub fn total(&self) -> u128 {
        self.liquidity
            .saturating_add(self.contributors)
            .saturating_add(self.dao)
            .saturating_add(self.team)
            .saturating_add(self.marketing)
    }
}

/// Split `total` tokens by `split`. `liquidity_needed` caps how much of the
/// liquidity budget the pool actually takes.
pub fn split_tokens(
    total: u128,
    split: &TokenSplit,
    liquidity_needed: impl FnOnce(u128) -> Result<u128, PresaleError>,
) -> Result<TokenDistribution, PresaleError> {
    let budget = apply_bps(total, split.liquidity_bps)?;
    let contributors = apply_bps(total, split.presale_bps)?;
    let team = apply_bps(total, split.team_bps)?;
    let marketing = apply_bps(total, split.marketing_bps)?;

    let liquidity = liquidity_needed(contributors)?.min(budget);
    let unused_liquidity = budget - liquidity;

    let allocated = [budget, contributors, team, marketing]
        .iter()
        .try_fold(0u128, |acc, v| checked_add(acc, *v))?;
    // dao_bps share plus rounding dust, plus whatever the pool did not take.
    let dao = checked_add(checked_sub(total, allocated)?, unused_liquidity)?;

    Ok(TokenDistribution { liquidity, unused_liquidity, contributors, dao, team, marketing })
}

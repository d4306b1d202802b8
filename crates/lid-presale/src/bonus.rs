//! Bonus tiers and the bonus-weighted rate curve.
//!
//! A tier table partitions cumulative raised capital into ranges, each with a
//! bonus in basis points. A deposit's share is its amount inflated by the
//! bonus of the range holding the raised total *before* the deposit.
//!
//! The rate curve divides a fixed token supply over the maximum number of
//! shares the sale can mint, i.e. the bonus weighting integrated over
//! `[0, hardcap]`:
//!
//! ```text
//! max_shares(h)      = Σ width_i · (10000 + bp_i) / 10000     (clipped at h)
//! tokens_per_share   = supply · ONE / max_shares(h)
//! rate(raised)       = tokens_per_share · (10000 + bp(raised)) / 10000
//! ```
//!
//! Because bonuses never increase from one tier to the next, `rate` is
//! non-increasing in `raised`.

use lid_core::constants::{BPS_PRECISION, ONE};
use lid_core::error::{ArithmeticError, ConfigError, PresaleError};
use lid_core::math::{checked_add, checked_sub, mul_div, with_bonus};
use serde::{Deserialize, Serialize};

/// One bonus range: deposits landing while raised ≥ `range_start` (and below
/// the next tier's start) earn `bonus_bps`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusTier {
    pub range_start: u128,
    pub bonus_bps: u64,
}

/// Validated, ordered bonus tier table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BonusSchedule {
    tiers: Vec<BonusTier>,
}

impl BonusSchedule {
    /// Build a schedule from parallel start/bonus arrays.
    ///
    /// Starts must begin at zero and strictly increase; bonuses must not
    /// increase from one tier to the next.
    pub fn new(range_starts: &[u128], bonus_bps: &[u64]) -> Result<Self, ConfigError> {
        if range_starts.is_empty() {
            return Err(ConfigError::EmptyBonusTiers);
        }
        if range_starts.len() != bonus_bps.len() {
            return Err(ConfigError::BonusLengthMismatch {
                starts: range_starts.len(),
                bps: bonus_bps.len(),
            });
        }
        if range_starts[0] != 0 {
            return Err(ConfigError::FirstTierNotZero);
        }
        for i in 1..range_starts.len() {
            if range_starts[i] <= range_starts[i - 1] {
                return Err(ConfigError::TiersNotIncreasing { index: i });
            }
            if bonus_bps[i] > bonus_bps[i - 1] {
                return Err(ConfigError::BonusNotDecreasing { index: i });
            }
        }
        let tiers = range_starts
            .iter()
            .zip(bonus_bps)
            .map(|(&range_start, &bonus_bps)| BonusTier { range_start, bonus_bps })
            .collect();
        Ok(Self { tiers })
    }

    pub fn tiers(&self) -> &[BonusTier] {
        &self.tiers
    }

    /// Start of the last (open-ended) tier.
    pub fn last_start(&self) -> u128 {
        self.tiers.last().map(|t| t.range_start).unwrap_or(0)
    }

    /// Bonus in basis points for a deposit made when `raised` has already
    /// been collected.
    pub fn bonus_bps_at(&self, raised: u128) -> u64 {
        self.tiers
            .iter()
            .rev()
            .find(|t| raised >= t.range_start)
            .map(|t| t.bonus_bps)
            .unwrap_or(0)
    }

    /// Shares minted for `amount` deposited on top of `prior_raised`.
    pub fn shares_for(&self, amount: u128, prior_raised: u128) -> Result<u128, ArithmeticError> {
        with_bonus(amount, self.bonus_bps_at(prior_raised))
    }

    /// Total shares the sale could mint if filled to `hardcap`, tier by tier.
    pub fn max_shares(&self, hardcap: u128) -> Result<u128, ArithmeticError> {
        let mut total: u128 = 0;
        for (i, tier) in self.tiers.iter().enumerate() {
            if tier.range_start >= hardcap {
                break;
            }
            let end = match self.tiers.get(i + 1) {
                Some(next) => next.range_start.min(hardcap),
                None => hardcap,
            };
            let width = checked_sub(end, tier.range_start)?;
            total = checked_add(total, with_bonus(width, tier.bonus_bps)?)?;
        }
        Ok(total)
    }

    /// Tokens distributable per whole unit of capital (scaled by `ONE`) for
    /// capital arriving once `total_raised` has been collected.
    pub fn rate_per_eth(
        &self,
        presale_token_supply: u128,
        total_raised: u128,
        hardcap: u128,
    ) -> Result<u128, PresaleError> {
        let max_shares = self.max_shares(hardcap)?;
        let tokens_per_share = mul_div(presale_token_supply, ONE, max_shares)?;
        let factor = BPS_PRECISION as u128 + self.bonus_bps_at(total_raised) as u128;
        Ok(mul_div(tokens_per_share, factor, BPS_PRECISION as u128)?)
    }
}

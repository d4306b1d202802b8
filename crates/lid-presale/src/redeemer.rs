//! Contributor share ledger, rate curve and time-sliced redemption.
//!
//! The redeemer is the accounting core of the sale. It records each
//! contributor's deposit and bonus-weighted shares, prices the token supply
//! through [`BonusSchedule`], and, once the presale settles, releases each
//! account's entitlement linearly over fixed intervals.
//!
//! Every mutating entry point is gated on the registered presale address.
//! All values are committed only after every check and computation has
//! succeeded, so a failed call leaves the ledger untouched.

use std::collections::BTreeMap;

use lid_core::constants::BPS_PRECISION;
use lid_core::error::{
    ArithmeticError, AuthError, ConfigError, LimitError, PhaseError, PresaleError,
};
use lid_core::math::{checked_add, mul_div};
use lid_core::types::{Address, Call};
use serde::Serialize;
use tracing::{debug, info};

use crate::bonus::BonusSchedule;

/// Per-address ledger entry, created lazily on the first deposit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ContributorAccount {
    /// Cumulative base asset contributed.
    pub deposited: u128,
    /// Cumulative bonus-weighted shares.
    pub shares: u128,
    /// Cumulative tokens already released.
    pub claimed_tokens: u128,
}

/// Linear unlock parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RedeemSchedule {
    /// Fraction of the entitlement unlocked per interval, in basis points.
    pub redeem_bps: u64,
    /// Interval length in seconds.
    pub redeem_interval: u64,
}

impl RedeemSchedule {
    pub fn new(redeem_bps: u64, redeem_interval: u64) -> Result<Self, ConfigError> {
        if redeem_bps == 0 || redeem_bps > BPS_PRECISION {
            return Err(ConfigError::InvalidRedeemBp(redeem_bps));
        }
        if redeem_interval == 0 {
            return Err(ConfigError::ZeroRedeemInterval);
        }
        Ok(Self { redeem_bps, redeem_interval })
    }

    /// Unlocked fraction in basis points, `elapsed` seconds after the clock
    /// started. Capped at 100%.
    pub fn unlocked_bps(&self, elapsed: u64) -> u64 {
        let intervals = elapsed / self.redeem_interval;
        intervals.saturating_mul(self.redeem_bps).min(BPS_PRECISION)
    }
}

/// The single, settlement-anchored redemption clock shared by all accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RedemptionClock {
    /// Unix time the unlock schedule counts from.
    pub start: u64,
    /// Tokens divided among contributors pro rata to shares.
    pub redeemable_tokens: u128,
}

#[derive(Debug, Clone)]
pub struct Redeemer {
    deployer: Address,
    owner: Address,
    presale: Address,
    schedule: RedeemSchedule,
    bonus: Option<BonusSchedule>,
    accounts: BTreeMap<Address, ContributorAccount>,
    total_depositors: u64,
    total_deposits: u128,
    total_shares: u128,
    redemption: Option<RedemptionClock>,
}

impl Redeemer {
    /// An uninitialized redeemer that only `deployer` may initialize.
    pub fn new(deployer: Address) -> Self {
        Self {
            deployer,
            owner: Address::ZERO,
            presale: Address::ZERO,
            schedule: RedeemSchedule::default(),
            bonus: None,
            accounts: BTreeMap::new(),
            total_depositors: 0,
            total_deposits: 0,
            total_shares: 0,
            redemption: None,
        }
    }

    /// One-time setup of the unlock schedule, the bonus tier table and the
    /// authorized presale.
    #[allow(clippy::too_many_arguments)]
    pub fn initialize(
        &mut self,
        call: &Call,
        redeem_bps: u64,
        redeem_interval: u64,
        bonus_range_start: &[u128],
        bonus_range_bps: &[u64],
        presale: Address,
        owner: Address,
    ) -> Result<(), PresaleError> {
        if call.sender != self.deployer {
            return Err(AuthError::NotDeployer { caller: call.sender }.into());
        }
        if self.bonus.is_some() {
            return Err(PhaseError::AlreadyInitialized.into());
        }
        let schedule = RedeemSchedule::new(redeem_bps, redeem_interval)?;
        let bonus = BonusSchedule::new(bonus_range_start, bonus_range_bps)?;
        if presale.is_zero() {
            return Err(ConfigError::ZeroAddress("presale").into());
        }
        if owner.is_zero() {
            return Err(ConfigError::ZeroAddress("owner").into());
        }

        info!(
            redeem_bps,
            redeem_interval,
            tiers = bonus.tiers().len(),
            "redeemer initialized"
        );
        self.schedule = schedule;
        self.bonus = Some(bonus);
        self.presale = presale;
        self.owner = owner;
        Ok(())
    }

    fn bonus(&self) -> Result<&BonusSchedule, PhaseError> {
        self.bonus.as_ref().ok_or(PhaseError::NotInitialized)
    }

    fn require_presale(&self, call: &Call) -> Result<(), PresaleError> {
        if self.bonus.is_none() {
            return Err(PhaseError::NotInitialized.into());
        }
        if call.sender != self.presale {
            return Err(AuthError::NotPresale { caller: call.sender }.into());
        }
        Ok(())
    }

    // --- pricing ---

    /// Tokens per whole unit of capital (scaled by `ONE`) for capital arriving
    /// once `total_raised` has been collected.
    pub fn calculate_rate_per_eth(
        &self,
        presale_token_supply: u128,
        total_raised: u128,
        hardcap: u128,
    ) -> Result<u128, PresaleError> {
        self.bonus()?.rate_per_eth(presale_token_supply, total_raised, hardcap)
    }

    /// Shares the sale would mint if filled exactly to `hardcap`.
    pub fn max_shares(&self, hardcap: u128) -> Result<u128, PresaleError> {
        Ok(self.bonus()?.max_shares(hardcap)?)
    }

    pub fn bonus_bps_at(&self, raised: u128) -> Result<u64, PresaleError> {
        Ok(self.bonus()?.bonus_bps_at(raised))
    }

    // --- presale-only mutations ---

    /// Record a deposit of `amount` made when `prior_raised` had already been
    /// collected. Returns the shares minted.
    pub fn set_deposit(
        &mut self,
        call: &Call,
        account: &Address,
        amount: u128,
        prior_raised: u128,
    ) -> Result<u128, PresaleError> {
        self.require_presale(call)?;
        if self.redemption.is_some() {
            return Err(PhaseError::RedemptionAlreadyStarted.into());
        }

        let shares = self.bonus()?.shares_for(amount, prior_raised)?;
        let existing = self.accounts.get(account).copied();
        let mut entry = existing.unwrap_or_default();
        entry.deposited = checked_add(entry.deposited, amount)?;
        entry.shares = checked_add(entry.shares, shares)?;
        let total_deposits = checked_add(self.total_deposits, amount)?;
        let total_shares = checked_add(self.total_shares, shares)?;
        let total_depositors = if existing.is_none() {
            self.total_depositors
                .checked_add(1)
                .ok_or(ArithmeticError::Overflow)?
        } else {
            self.total_depositors
        };

        self.accounts.insert(*account, entry);
        self.total_deposits = total_deposits;
        self.total_shares = total_shares;
        self.total_depositors = total_depositors;
        debug!(%account, amount, prior_raised, shares, "deposit recorded");
        Ok(shares)
    }

    /// Start the shared redemption clock. One-shot.
    pub fn start_redemption(
        &mut self,
        call: &Call,
        clock_start: u64,
        redeemable_tokens: u128,
    ) -> Result<(), PresaleError> {
        self.require_presale(call)?;
        if self.redemption.is_some() {
            return Err(PhaseError::RedemptionAlreadyStarted.into());
        }
        self.redemption = Some(RedemptionClock { start: clock_start, redeemable_tokens });
        info!(clock_start, redeemable_tokens, "redemption clock started");
        Ok(())
    }

    /// Record `amount` tokens released to `account`. Fails if that would put
    /// the account past its unlocked entitlement at `call.now`.
    pub fn set_claimed(
        &mut self,
        call: &Call,
        account: &Address,
        amount: u128,
    ) -> Result<(), PresaleError> {
        self.require_presale(call)?;
        let available = self.calculate_redeemable(account, call.now)?;
        if amount > available {
            return Err(LimitError::ClaimExceedsUnlocked { requested: amount, available }.into());
        }
        let mut entry = self.accounts.get(account).copied().unwrap_or_default();
        entry.claimed_tokens = checked_add(entry.claimed_tokens, amount)?;
        self.accounts.insert(*account, entry);
        debug!(%account, amount, claimed = entry.claimed_tokens, "claim recorded");
        Ok(())
    }

    // --- redemption math ---

    /// Total tokens `account` is owed once fully unlocked.
    pub fn entitlement(&self, account: &Address) -> Result<u128, PresaleError> {
        let clock = self.redemption.ok_or(PhaseError::RedemptionNotStarted)?;
        let shares = self.account_shares(account);
        if shares == 0 {
            return Ok(0);
        }
        Ok(mul_div(shares, clock.redeemable_tokens, self.total_shares)?)
    }

    /// Portion of the entitlement unlocked at `now`.
    pub fn unlocked_tokens(&self, account: &Address, now: u64) -> Result<u128, PresaleError> {
        let clock = self.redemption.ok_or(PhaseError::RedemptionNotStarted)?;
        let entitlement = self.entitlement(account)?;
        let elapsed = now.saturating_sub(clock.start);
        let bps = self.schedule.unlocked_bps(elapsed);
        Ok(mul_div(entitlement, bps as u128, BPS_PRECISION as u128)?)
    }

    /// Tokens `account` may claim at `now`: unlocked minus already claimed.
    /// A `now` earlier than a previous claim yields zero.
    pub fn calculate_redeemable(&self, account: &Address, now: u64) -> Result<u128, PresaleError> {
        let unlocked = self.unlocked_tokens(account, now)?;
        Ok(unlocked.saturating_sub(self.account_claimed_tokens(account)))
    }

    // --- queries ---

    pub fn total_depositors(&self) -> u64 {
        self.total_depositors
    }

    pub fn total_deposits(&self) -> u128 {
        self.total_deposits
    }

    pub fn total_shares(&self) -> u128 {
        self.total_shares
    }

    pub fn account(&self, account: &Address) -> Option<&ContributorAccount> {
        self.accounts.get(account)
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &ContributorAccount)> {
        self.accounts.iter()
    }

    pub fn account_deposits(&self, account: &Address) -> u128 {
        self.accounts.get(account).map(|a| a.deposited).unwrap_or(0)
    }

    pub fn account_shares(&self, account: &Address) -> u128 {
        self.accounts.get(account).map(|a| a.shares).unwrap_or(0)
    }

    pub fn account_claimed_tokens(&self, account: &Address) -> u128 {
        self.accounts.get(account).map(|a| a.claimed_tokens).unwrap_or(0)
    }

    pub fn redemption(&self) -> Option<RedemptionClock> {
        self.redemption
    }

    /// When the unlock schedule started counting, if settlement happened.
    pub fn redemption_start(&self) -> Option<u64> {
        self.redemption.map(|c| c.start)
    }

    pub fn schedule(&self) -> RedeemSchedule {
        self.schedule
    }

    pub fn bonus_schedule(&self) -> Option<&BonusSchedule> {
        self.bonus.as_ref()
    }

    pub fn presale(&self) -> Address {
        self.presale
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn is_initialized(&self) -> bool {
        self.bonus.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lid_core::constants::ONE;
    use proptest::prelude::*;

    const HOUR: u64 = 3_600;

    fn eth(n: u128) -> u128 {
        n * ONE
    }
    fn addr(seed: u8) -> Address {
        Address::repeat_byte(seed)
    }
    fn deployer() -> Address {
        addr(0xd0)
    }
    fn owner() -> Address {
        addr(0x01)
    }
    fn presale() -> Address {
        addr(0x02)
    }
    fn depositor(i: u8) -> Address {
        addr(0x10 + i)
    }
    fn as_presale(now: u64) -> Call {
        Call::new(presale(), now)
    }

    fn redeemer() -> Redeemer {
        let mut r = Redeemer::new(deployer());
        r.initialize(
            &Call::new(deployer(), 0),
            200,
            HOUR,
            &[eth(0), eth(1_000), eth(2_000), eth(3_000)],
            &[3_500, 2_500, 1_000, 0],
            presale(),
            owner(),
        )
        .unwrap();
        r
    }

    // --- initialization ---

    #[test]
    fn initialize_only_once() {
        let mut r = redeemer();
        let err = r
            .initialize(&Call::new(deployer(), 0), 100, HOUR, &[0], &[0], presale(), owner())
            .unwrap_err();
        assert_eq!(err, PresaleError::Phase(PhaseError::AlreadyInitialized));
        assert_eq!(r.schedule().redeem_bps, 200);
    }

    #[test]
    fn initialize_validates_schedule() {
        let mut r = Redeemer::new(deployer());
        let call = Call::new(deployer(), 0);
        assert_eq!(
            r.initialize(&call, 0, HOUR, &[0], &[0], presale(), owner()).unwrap_err(),
            PresaleError::Config(ConfigError::InvalidRedeemBp(0))
        );
        assert_eq!(
            r.initialize(&call, 10_001, HOUR, &[0], &[0], presale(), owner()).unwrap_err(),
            PresaleError::Config(ConfigError::InvalidRedeemBp(10_001))
        );
        assert_eq!(
            r.initialize(&call, 200, 0, &[0], &[0], presale(), owner()).unwrap_err(),
            PresaleError::Config(ConfigError::ZeroRedeemInterval)
        );
        assert_eq!(
            r.initialize(&call, 200, HOUR, &[0, 5], &[10, 20], presale(), owner()).unwrap_err(),
            PresaleError::Config(ConfigError::BonusNotDecreasing { index: 1 })
        );
        assert!(!r.is_initialized());
    }

    // --- calculate_rate_per_eth ---

    #[test]
    fn rate_requires_initialization() {
        let r = Redeemer::new(deployer());
        assert_eq!(
            r.calculate_rate_per_eth(eth(1), 0, eth(1)).unwrap_err(),
            PresaleError::Phase(PhaseError::NotInitialized)
        );
    }

    #[test]
    fn reference_curve() {
        let mut r = Redeemer::new(deployer());
        r.initialize(
            &Call::new(deployer(), 0),
            200,
            HOUR,
            &[eth(0), eth(100), eth(500), eth(900)],
            &[1_000, 500, 250, 0],
            presale(),
            owner(),
        )
        .unwrap();
        let supply = eth(430_000_000);
        let rate = |raised| r.calculate_rate_per_eth(supply, eth(raised), eth(1_000)).unwrap() / ONE;
        assert_eq!(rate(0), 454_807);
        assert_eq!(rate(100), 434_134);
        assert_eq!(rate(500), 423_798);
        assert_eq!(rate(900), 413_461);
        assert_eq!(rate(999), 413_461);
    }

    // --- set_deposit ---

    #[test]
    fn set_deposit_rejects_non_presale() {
        let mut r = redeemer();
        let err = r
            .set_deposit(&Call::new(depositor(0), 0), &depositor(0), eth(1), eth(1))
            .unwrap_err();
        assert_eq!(err, PresaleError::Auth(AuthError::NotPresale { caller: depositor(0) }));
        assert_eq!(r.total_depositors(), 0);
        assert_eq!(r.account_deposits(&depositor(0)), 0);
    }

    #[test]
    fn first_deposit() {
        let mut r = redeemer();
        let shares = r.set_deposit(&as_presale(0), &depositor(0), eth(1), 0).unwrap();
        assert_eq!(r.total_depositors(), 1);
        assert_eq!(r.account_deposits(&depositor(0)), eth(1));
        assert_eq!(shares, eth(1) * 13_500 / 10_000);
        assert_eq!(r.account_shares(&depositor(0)), shares);
    }

    #[test]
    fn second_deposit_same_account() {
        let mut r = redeemer();
        r.set_deposit(&as_presale(0), &depositor(0), eth(1), 0).unwrap();
        r.set_deposit(&as_presale(0), &depositor(0), eth(1), 0).unwrap();
        assert_eq!(r.total_depositors(), 1);
        assert_eq!(r.account_deposits(&depositor(0)), eth(2));
        assert_eq!(r.account_shares(&depositor(0)), eth(1) * 13_500 * 2 / 10_000);
        assert_eq!(r.total_deposits(), eth(2));
    }

    #[test]
    fn later_deposits_earn_smaller_bonus() {
        let mut r = redeemer();
        r.set_deposit(&as_presale(0), &depositor(0), eth(1), eth(999)).unwrap();
        r.set_deposit(&as_presale(0), &depositor(1), eth(1), eth(1_000)).unwrap();
        r.set_deposit(&as_presale(0), &depositor(2), eth(1), eth(3_500)).unwrap();
        assert_eq!(r.account_shares(&depositor(0)), eth(135) / 100);
        assert_eq!(r.account_shares(&depositor(1)), eth(125) / 100);
        assert_eq!(r.account_shares(&depositor(2)), eth(1));
        assert_eq!(r.total_depositors(), 3);
    }

    #[test]
    fn set_deposit_overflow_leaves_state() {
        let mut r = redeemer();
        r.set_deposit(&as_presale(0), &depositor(0), eth(1), eth(3_000)).unwrap();
        let err = r
            .set_deposit(&as_presale(0), &depositor(0), u128::MAX - 10, eth(3_000))
            .unwrap_err();
        assert!(matches!(err, PresaleError::Arithmetic(_)));
        assert_eq!(r.account_deposits(&depositor(0)), eth(1));
        assert_eq!(r.total_shares(), eth(1));
    }

    #[test]
    fn deposits_closed_after_redemption() {
        let mut r = redeemer();
        r.start_redemption(&as_presale(0), 0, eth(100)).unwrap();
        let err = r.set_deposit(&as_presale(0), &depositor(0), eth(1), 0).unwrap_err();
        assert_eq!(err, PresaleError::Phase(PhaseError::RedemptionAlreadyStarted));
    }

    // --- redemption ---

    #[test]
    fn start_redemption_is_one_shot() {
        let mut r = redeemer();
        r.start_redemption(&as_presale(10), 10, eth(100)).unwrap();
        let err = r.start_redemption(&as_presale(20), 20, eth(200)).unwrap_err();
        assert_eq!(err, PresaleError::Phase(PhaseError::RedemptionAlreadyStarted));
        assert_eq!(r.redemption_start(), Some(10));
    }

    #[test]
    fn entitlement_is_pro_rata() {
        let mut r = redeemer();
        r.set_deposit(&as_presale(0), &depositor(0), eth(1), 0).unwrap();
        r.set_deposit(&as_presale(0), &depositor(1), eth(3), 0).unwrap();
        r.start_redemption(&as_presale(0), 0, eth(1_000)).unwrap();
        assert_eq!(r.entitlement(&depositor(0)).unwrap(), eth(250));
        assert_eq!(r.entitlement(&depositor(1)).unwrap(), eth(750));
        assert_eq!(r.entitlement(&depositor(9)).unwrap(), 0);
    }

    #[test]
    fn unlock_is_linear_per_interval() {
        let mut r = redeemer();
        r.set_deposit(&as_presale(0), &depositor(0), eth(1), 0).unwrap();
        let start = 1_000;
        r.start_redemption(&as_presale(start), start, eth(10_000)).unwrap();
        assert_eq!(r.unlocked_tokens(&depositor(0), start).unwrap(), 0);
        assert_eq!(r.unlocked_tokens(&depositor(0), start + HOUR - 1).unwrap(), 0);
        assert_eq!(r.unlocked_tokens(&depositor(0), start + HOUR).unwrap(), eth(200));
        assert_eq!(r.unlocked_tokens(&depositor(0), start + 10 * HOUR).unwrap(), eth(2_000));
        assert_eq!(r.unlocked_tokens(&depositor(0), start + 50 * HOUR).unwrap(), eth(10_000));
        assert_eq!(r.unlocked_tokens(&depositor(0), start + 500 * HOUR).unwrap(), eth(10_000));
    }

    #[test]
    fn set_claimed_rejects_non_presale() {
        let mut r = redeemer();
        let err = r.set_claimed(&Call::new(depositor(0), 0), &depositor(0), eth(1)).unwrap_err();
        assert_eq!(err, PresaleError::Auth(AuthError::NotPresale { caller: depositor(0) }));
    }

    #[test]
    fn set_claimed_increases_claimed_tokens() {
        let mut r = redeemer();
        r.set_deposit(&as_presale(0), &depositor(0), eth(1), 0).unwrap();
        r.start_redemption(&as_presale(0), 0, eth(100)).unwrap();
        r.set_claimed(&as_presale(HOUR), &depositor(0), eth(1)).unwrap();
        assert_eq!(r.account_claimed_tokens(&depositor(0)), eth(1));
        assert_eq!(r.calculate_redeemable(&depositor(0), HOUR).unwrap(), eth(1));
    }

    #[test]
    fn set_claimed_cannot_exceed_unlocked() {
        let mut r = redeemer();
        r.set_deposit(&as_presale(0), &depositor(0), eth(1), 0).unwrap();
        r.start_redemption(&as_presale(0), 0, eth(100)).unwrap();
        let err = r.set_claimed(&as_presale(HOUR), &depositor(0), eth(2) + 1).unwrap_err();
        assert_eq!(
            err,
            PresaleError::Limit(LimitError::ClaimExceedsUnlocked { requested: eth(2) + 1, available: eth(2) })
        );
        assert_eq!(r.account_claimed_tokens(&depositor(0)), 0);
    }

    #[test]
    fn set_claimed_before_redemption_fails() {
        let mut r = redeemer();
        r.set_deposit(&as_presale(0), &depositor(0), eth(1), 0).unwrap();
        let err = r.set_claimed(&as_presale(0), &depositor(0), 1).unwrap_err();
        assert_eq!(err, PresaleError::Phase(PhaseError::RedemptionNotStarted));
    }

    proptest! {
        #[test]
        fn claims_never_exceed_unlocked(
            claims in proptest::collection::vec((0u64..80, 0u128..eth(40)), 1..20)
        ) {
            let mut r = redeemer();
            r.set_deposit(&as_presale(0), &depositor(0), eth(3), 0).unwrap();
            r.set_deposit(&as_presale(0), &depositor(1), eth(5), eth(1_500)).unwrap();
            r.start_redemption(&as_presale(0), 0, eth(1_000)).unwrap();
            let mut hours = 0u64;
            for (step, amount) in claims {
                hours += step;
                let now = hours * HOUR;
                let _ = r.set_claimed(&as_presale(now), &depositor(0), amount);
                prop_assert!(
                    r.account_claimed_tokens(&depositor(0)) <= r.unlocked_tokens(&depositor(0), now).unwrap()
                );
                prop_assert!(
                    r.account_claimed_tokens(&depositor(0)) <= r.entitlement(&depositor(0)).unwrap()
                );
            }
        }

        #[test]
        fn total_depositors_counts_distinct(seq in proptest::collection::vec(0u8..5, 1..30)) {
            let mut r = redeemer();
            for i in &seq {
                r.set_deposit(&as_presale(0), &depositor(*i), eth(1), 0).unwrap();
            }
            let mut distinct = seq.clone();
            distinct.sort();
            distinct.dedup();
            prop_assert_eq!(r.total_depositors(), distinct.len() as u64);
        }
    }
}

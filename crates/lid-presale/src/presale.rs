//! Presale orchestrator: deposit gating, whitelist caps, settlement and
//! redemption.
//!
//! State machine: `Pending → Active → Ended → Settled`, none reversible.
//! Phases come from the [`Timer`] and the raised total, evaluated on every
//! call. The presale owns its [`Timer`] and [`Redeemer`] and talks to them
//! under its own address, which both verify.
//!
//! Settlement is one-shot. The latch, the redemption clock and the report
//! are committed before any collaborator is called, so a repeated call fails
//! even if the host retries after a collaborator error.

use std::collections::{BTreeMap, BTreeSet};

use lid_core::constants::{MIN_CONTRIBUTION, ONE};
use lid_core::error::{
    ArithmeticError, AuthError, CollaboratorError, ConfigError, LimitError, PhaseError,
    PresaleError,
};
use lid_core::math::{apply_bps, checked_add, checked_sub, mul_div};
use lid_core::traits::{BaseAssetBank, LiquidityRouter, TokenLedger};
use lid_core::types::{Address, Call};
use serde::Serialize;
use tracing::{info, warn};

use crate::redeemer::{ContributorAccount, Redeemer};
use crate::split::{
    split_base_asset, split_tokens, BaseAssetDistribution, FundSplit, TokenDistribution,
    TokenSplit, TreasuryLocks,
};
use crate::timer::{SalePhase, Timer};

/// Lifecycle state of the presale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PresaleState {
    Pending,
    Active,
    Ended,
    Settled,
}

/// Initialization parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresaleParams {
    /// Ceiling for whitelisted addresses at zero raised.
    pub max_buy_per_address: u128,
    /// Ceiling for addresses not on the whitelist.
    pub max_buy_without_whitelisting: u128,
    /// Maximum capital accepted; reaching it ends the sale.
    pub hardcap: u128,
    pub fund_split: FundSplit,
    pub owner: Address,
    /// Liquidity router the settlement must be routed through.
    pub router: Address,
    /// Protocol treasury receiving the fee and unpaid referral remainder.
    pub treasury: Address,
    pub project_fund: Address,
}

impl PresaleParams {
    fn validate(&self) -> Result<(), ConfigError> {
        self.fund_split.validate()?;
        if self.max_buy_without_whitelisting > self.max_buy_per_address {
            return Err(ConfigError::CapOrder {
                without: self.max_buy_without_whitelisting,
                per_address: self.max_buy_per_address,
            });
        }
        for (name, addr) in [
            ("owner", self.owner),
            ("router", self.router),
            ("treasury", self.treasury),
            ("project fund", self.project_fund),
        ] {
            if addr.is_zero() {
                return Err(ConfigError::ZeroAddress(name));
            }
        }
        Ok(())
    }
}

/// Token split plus its treasury destinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenPools {
    pub split: TokenSplit,
    pub locks: TreasuryLocks,
}

/// Outcome of a successful deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DepositReceipt {
    pub shares: u128,
    pub bonus_bps: u64,
    pub total_raised: u128,
}

/// Everything the settlement routed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementReport {
    pub settled_at: u64,
    pub total_raised: u128,
    pub soft_cap_reached: bool,
    /// Tokens per whole unit of capital at the final raised total.
    pub final_rate: u128,
    pub base_asset: BaseAssetDistribution,
    pub tokens: TokenDistribution,
}

/// Read-only view of one contributor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountView {
    pub address: Address,
    pub whitelisted: bool,
    #[serde(flatten)]
    pub ledger: ContributorAccount,
}

/// Serializable view of the whole presale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresaleSnapshot {
    pub address: Address,
    pub state: PresaleState,
    pub start_time: u64,
    pub end_time: u64,
    pub hardcap: u128,
    pub total_raised: u128,
    pub total_depositors: u64,
    pub total_shares: u128,
    pub accounts: Vec<AccountView>,
    pub whitelist: Vec<Address>,
    pub referral_earnings: BTreeMap<Address, u128>,
    pub settlement: Option<SettlementReport>,
}

#[derive(Debug, Clone)]
pub struct Presale {
    address: Address,
    deployer: Address,
    params: Option<PresaleParams>,
    timer: Timer,
    redeemer: Redeemer,
    whitelist: BTreeSet<Address>,
    token_pools: Option<TokenPools>,
    total_raised: u128,
    referral_earnings: BTreeMap<Address, u128>,
    settlement: Option<SettlementReport>,
}

impl Presale {
    /// An uninitialized presale living at `address`. `timer` and `redeemer`
    /// must already be initialized with `address` as their presale.
    pub fn new(address: Address, deployer: Address, timer: Timer, redeemer: Redeemer) -> Self {
        Self {
            address,
            deployer,
            params: None,
            timer,
            redeemer,
            whitelist: BTreeSet::new(),
            token_pools: None,
            total_raised: 0,
            referral_earnings: BTreeMap::new(),
            settlement: None,
        }
    }

    /// One-time setup. Rejects splits that do not sum to 10,000, inverted
    /// caps, a hardcap inside the bonus range and mis-wired components.
    pub fn initialize(&mut self, call: &Call, params: PresaleParams) -> Result<(), PresaleError> {
        if call.sender != self.deployer {
            return Err(AuthError::NotDeployer { caller: call.sender }.into());
        }
        if self.params.is_some() {
            return Err(PhaseError::AlreadyInitialized.into());
        }
        params.validate()?;
        if !self.timer.is_initialized() || self.timer.presale() != self.address {
            return Err(ConfigError::ComponentMismatch("timer").into());
        }
        let bonus = self
            .redeemer
            .bonus_schedule()
            .filter(|_| self.redeemer.presale() == self.address)
            .ok_or(ConfigError::ComponentMismatch("redeemer"))?;
        if params.hardcap <= bonus.last_start() {
            return Err(ConfigError::HardcapBelowBonusRange {
                hardcap: params.hardcap,
                last_start: bonus.last_start(),
            }
            .into());
        }

        info!(
            presale = %self.address,
            hardcap = params.hardcap,
            max_buy_per_address = params.max_buy_per_address,
            max_buy_without_whitelisting = params.max_buy_without_whitelisting,
            "presale initialized"
        );
        self.params = Some(params);
        Ok(())
    }

    fn params(&self) -> Result<&PresaleParams, PhaseError> {
        self.params.as_ref().ok_or(PhaseError::NotInitialized)
    }

    fn require_owner(&self, call: &Call) -> Result<&PresaleParams, PresaleError> {
        let params = self.params()?;
        if call.sender != params.owner {
            return Err(AuthError::NotOwner { caller: call.sender }.into());
        }
        Ok(params)
    }

    /// Call context the presale uses towards its own components.
    fn internal_call(&self, now: u64) -> Call {
        Call::new(self.address, now)
    }

    // --- owner configuration ---

    /// Configure how the token balance is split at settlement.
    pub fn set_token_pools(
        &mut self,
        call: &Call,
        split: TokenSplit,
        locks: TreasuryLocks,
    ) -> Result<(), PresaleError> {
        self.require_owner(call)?;
        if self.settlement.is_some() {
            return Err(PhaseError::AlreadySettled.into());
        }
        split.validate()?;
        locks.validate()?;
        self.token_pools = Some(TokenPools { split, locks });
        info!(?split, "token pools configured");
        Ok(())
    }

    pub fn set_whitelist(&mut self, call: &Call, account: &Address, listed: bool) -> Result<(), PresaleError> {
        self.require_owner(call)?;
        if listed {
            self.whitelist.insert(*account);
        } else {
            self.whitelist.remove(account);
        }
        info!(%account, listed, "whitelist updated");
        Ok(())
    }

    pub fn set_whitelist_many(
        &mut self,
        call: &Call,
        accounts: &[Address],
        listed: bool,
    ) -> Result<(), PresaleError> {
        self.require_owner(call)?;
        for account in accounts {
            if listed {
                self.whitelist.insert(*account);
            } else {
                self.whitelist.remove(account);
            }
        }
        info!(count = accounts.len(), listed, "whitelist batch updated");
        Ok(())
    }

    /// Owner reschedules the sale through the timer.
    pub fn set_start_time(&mut self, call: &Call, start_time: u64) -> Result<(), PresaleError> {
        self.timer.set_start_time(call, start_time)
    }

    // --- caps ---

    /// Per-address ceiling for whitelisted accounts once `total_raised` has
    /// been collected. Tapers linearly from `max_buy_per_address` at zero
    /// raised to half of it at the hardcap, never below the non-whitelisted
    /// ceiling.
    pub fn get_max_whitelisted_deposit(&self, total_raised: u128) -> Result<u128, PresaleError> {
        let params = self.params()?;
        let max = params.max_buy_per_address;
        let raised = total_raised.min(params.hardcap);
        let span = params
            .hardcap
            .checked_mul(2)
            .ok_or(ArithmeticError::Overflow)?;
        let taper = mul_div(max, raised, span)?;
        let tapered = checked_sub(max, taper)?;
        Ok(tapered.max(params.max_buy_without_whitelisting))
    }

    /// Ceiling that applies to `account` right now.
    pub fn max_deposit_for(&self, account: &Address) -> Result<u128, PresaleError> {
        if self.is_whitelisted(account) {
            self.get_max_whitelisted_deposit(self.total_raised)
        } else {
            Ok(self.params()?.max_buy_without_whitelisting)
        }
    }

    // --- deposits ---

    /// Contribute `amount` of the base asset, optionally crediting a referrer.
    ///
    /// The host is expected to have credited `amount` to the presale's
    /// address on the base-asset rail as part of the same call.
    pub fn deposit(
        &mut self,
        call: &Call,
        amount: u128,
        referrer: Option<Address>,
    ) -> Result<DepositReceipt, PresaleError> {
        let params = self.params()?;
        match self.timer.phase(call.now, self.total_raised, params.hardcap) {
            SalePhase::NotStarted => return Err(PhaseError::NotStarted.into()),
            SalePhase::Ended => return Err(PhaseError::Ended.into()),
            SalePhase::Active => {}
        }
        if self.settlement.is_some() {
            return Err(PhaseError::AlreadySettled.into());
        }
        if amount == 0 {
            return Err(LimitError::ZeroDeposit.into());
        }
        if amount < MIN_CONTRIBUTION {
            return Err(LimitError::BelowMinimum { amount, min: MIN_CONTRIBUTION }.into());
        }
        let referrer = referrer.filter(|r| !r.is_zero());
        if referrer == Some(call.sender) {
            return Err(LimitError::SelfReferral.into());
        }

        let depositor = call.sender;
        let attempted = checked_add(self.redeemer.account_deposits(&depositor), amount)?;
        if self.is_whitelisted(&depositor) {
            let max = self.get_max_whitelisted_deposit(self.total_raised)?;
            if attempted > max {
                return Err(LimitError::WhitelistedCap { attempted, max }.into());
            }
        } else if attempted > params.max_buy_without_whitelisting {
            return Err(LimitError::NonWhitelistedCap {
                attempted,
                max: params.max_buy_without_whitelisting,
            }
            .into());
        }
        let remaining = checked_sub(params.hardcap, self.total_raised)?;
        if amount > remaining {
            return Err(LimitError::HardcapExceeded { attempted: amount, remaining }.into());
        }

        let prior_raised = self.total_raised;
        let total_raised = checked_add(prior_raised, amount)?;
        let referral = match referrer {
            Some(r) => {
                let reward = apply_bps(amount, params.fund_split.referral_bps)?;
                let earned = checked_add(self.referral_earnings.get(&r).copied().unwrap_or(0), reward)?;
                Some((r, earned))
            }
            None => None,
        };
        let bonus_bps = self.redeemer.bonus_bps_at(prior_raised)?;

        // All checks passed; commit.
        let internal = self.internal_call(call.now);
        let shares = self.redeemer.set_deposit(&internal, &depositor, amount, prior_raised)?;
        if !self.timer.is_start_frozen() {
            self.timer.freeze_start_time(&internal)?;
        }
        self.total_raised = total_raised;
        if let Some((r, earned)) = referral {
            self.referral_earnings.insert(r, earned);
        }

        info!(%depositor, amount, shares, bonus_bps, total_raised, "deposit accepted");
        Ok(DepositReceipt { shares, bonus_bps, total_raised })
    }

    // --- settlement ---

    /// Route raised capital and tokens once the sale has ended, and start
    /// the redemption clock. Callable by anyone, exactly once.
    pub fn send_to_uniswap<L, R, B>(
        &mut self,
        call: &Call,
        ledger: &mut L,
        router: &mut R,
        bank: &mut B,
    ) -> Result<SettlementReport, PresaleError>
    where
        L: TokenLedger + ?Sized,
        R: LiquidityRouter + ?Sized,
        B: BaseAssetBank + ?Sized,
    {
        let params = self.params()?.clone();
        if self.settlement.is_some() {
            return Err(PhaseError::AlreadySettled.into());
        }
        match self.timer.phase(call.now, self.total_raised, params.hardcap) {
            SalePhase::NotStarted => return Err(PhaseError::NotStarted.into()),
            SalePhase::Active => return Err(PhaseError::NotEnded.into()),
            SalePhase::Ended => {}
        }
        let pools = self.token_pools.ok_or(ConfigError::TokenPoolsNotSet)?;
        if router.address() != params.router {
            return Err(ConfigError::ComponentMismatch("router").into());
        }

        let total_raised = self.total_raised;
        let held = bank.balance_of(&self.address);
        if held < total_raised {
            return Err(CollaboratorError::InsufficientBalance {
                owner: self.address,
                have: held,
                need: total_raised,
            }
            .into());
        }

        let base_asset = split_base_asset(total_raised, &params.fund_split, &self.referral_earnings)?;
        let token_balance = ledger.balance_of(&self.address);
        let mut final_rate = 0;
        let tokens = split_tokens(token_balance, &pools.split, |contributors| {
            final_rate = self
                .redeemer
                .calculate_rate_per_eth(contributors, total_raised, params.hardcap)?;
            Ok(mul_div(base_asset.liquidity, final_rate, ONE)?)
        })?;

        let report = SettlementReport {
            settled_at: call.now,
            total_raised,
            soft_cap_reached: self.timer.soft_cap_reached(total_raised),
            final_rate,
            base_asset,
            tokens,
        };
        if !report.soft_cap_reached {
            warn!(total_raised, soft_cap = self.timer.window().soft_cap, "settling below soft cap");
        }

        // Effects before interactions: latch, redemption clock, report.
        self.redeemer
            .start_redemption(&self.internal_call(call.now), call.now, tokens.contributors)?;
        self.settlement = Some(report.clone());

        let me = self.address;
        let pool = router.address();
        bank.transfer(&me, &pool, report.base_asset.liquidity)?;
        ledger.transfer(&me, &pool, tokens.liquidity)?;
        router.add_liquidity(tokens.liquidity, report.base_asset.liquidity, &me)?;

        bank.transfer(&me, &params.treasury, report.base_asset.treasury)?;
        for (referrer, payout) in &report.base_asset.referral_payouts {
            bank.transfer(&me, referrer, *payout)?;
        }
        bank.transfer(&me, &params.project_fund, report.base_asset.project)?;

        ledger.transfer(&me, &pools.locks.dao, tokens.dao)?;
        ledger.transfer(&me, &pools.locks.team, tokens.team)?;
        ledger.transfer(&me, &pools.locks.marketing, tokens.marketing)?;

        info!(
            total_raised,
            final_rate,
            liquidity_base = report.base_asset.liquidity,
            liquidity_tokens = tokens.liquidity,
            contributor_tokens = tokens.contributors,
            referrers = report.base_asset.referral_payouts.len(),
            "presale settled"
        );
        Ok(report)
    }

    // --- redemption ---

    /// Release every token unlocked for the caller so far.
    pub fn redeem<L>(&mut self, call: &Call, ledger: &mut L) -> Result<u128, PresaleError>
    where
        L: TokenLedger + ?Sized,
    {
        self.params()?;
        if self.settlement.is_none() {
            return Err(PhaseError::NotSettled.into());
        }
        let account = call.sender;
        let amount = self.redeemer.calculate_redeemable(&account, call.now)?;
        if amount == 0 {
            return Err(LimitError::NothingToRedeem.into());
        }
        let held = ledger.balance_of(&self.address);
        if held < amount {
            return Err(CollaboratorError::InsufficientBalance { owner: self.address, have: held, need: amount }.into());
        }

        self.redeemer
            .set_claimed(&self.internal_call(call.now), &account, amount)?;
        ledger.transfer(&self.address, &account, amount)?;
        info!(%account, amount, "tokens redeemed");
        Ok(amount)
    }

    // --- queries ---

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn state(&self, now: u64) -> PresaleState {
        if self.settlement.is_some() {
            return PresaleState::Settled;
        }
        let Some(params) = self.params.as_ref() else {
            return PresaleState::Pending;
        };
        match self.timer.phase(now, self.total_raised, params.hardcap) {
            SalePhase::NotStarted => PresaleState::Pending,
            SalePhase::Active => PresaleState::Active,
            SalePhase::Ended => PresaleState::Ended,
        }
    }

    pub fn is_whitelisted(&self, account: &Address) -> bool {
        self.whitelist.contains(account)
    }

    pub fn total_raised(&self) -> u128 {
        self.total_raised
    }

    pub fn hardcap(&self) -> Option<u128> {
        self.params.as_ref().map(|p| p.hardcap)
    }

    pub fn referral_earnings(&self, referrer: &Address) -> u128 {
        self.referral_earnings.get(referrer).copied().unwrap_or(0)
    }

    pub fn is_settled(&self) -> bool {
        self.settlement.is_some()
    }

    pub fn settlement(&self) -> Option<&SettlementReport> {
        self.settlement.as_ref()
    }

    pub fn token_pools(&self) -> Option<&TokenPools> {
        self.token_pools.as_ref()
    }

    pub fn parameters(&self) -> Option<&PresaleParams> {
        self.params.as_ref()
    }

    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    pub fn redeemer(&self) -> &Redeemer {
        &self.redeemer
    }

    /// Full read-only view at `now`, for off-chain verification and display.
    pub fn snapshot(&self, now: u64) -> PresaleSnapshot {
        let accounts = self
            .redeemer
            .accounts()
            .map(|(address, ledger)| AccountView {
                address: *address,
                whitelisted: self.is_whitelisted(address),
                ledger: *ledger,
            })
            .collect();
        PresaleSnapshot {
            address: self.address,
            state: self.state(now),
            start_time: self.timer.start_time(),
            end_time: self.timer.end_time(),
            hardcap: self.hardcap().unwrap_or(0),
            total_raised: self.total_raised,
            total_depositors: self.redeemer.total_depositors(),
            total_shares: self.redeemer.total_shares(),
            accounts,
            whitelist: self.whitelist.iter().copied().collect(),
            referral_earnings: self.referral_earnings.clone(),
            settlement: self.settlement.clone(),
        }
    }
}

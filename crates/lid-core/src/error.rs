//! Error types for the LID presale engine.
//!
//! Every rejected call maps to one distinct variant. Entry points validate
//! before they mutate, so an error always leaves state untouched.
use thiserror::Error;

use crate::types::Address;

/// Wrong caller for an owner-, deployer- or presale-gated entry point.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("caller {caller} is not the owner")] NotOwner { caller: Address },
    #[error("caller {caller} is not the presale")] NotPresale { caller: Address },
    #[error("caller {caller} is not the deployer")] NotDeployer { caller: Address },
}

/// Operation is invalid in the current lifecycle phase.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PhaseError {
    #[error("not initialized")] NotInitialized,
    #[error("already initialized")] AlreadyInitialized,
    #[error("presale not yet started")] NotStarted,
    #[error("presale has ended")] Ended,
    #[error("presale has not ended")] NotEnded,
    #[error("presale already settled")] AlreadySettled,
    #[error("presale not settled")] NotSettled,
    #[error("redemption already started")] RedemptionAlreadyStarted,
    #[error("redemption not started")] RedemptionNotStarted,
}

/// Per-address or global limit violated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LimitError {
    #[error("deposit amount is zero")] ZeroDeposit,
    #[error("must purchase at least {min}, got {amount}")] BelowMinimum { amount: u128, min: u128 },
    #[error("deposit exceeds max buy per address for non-whitelisted addresses: {attempted} > {max}")] NonWhitelistedCap { attempted: u128, max: u128 },
    #[error("deposit exceeds max buy per address for whitelisted addresses: {attempted} > {max}")] WhitelistedCap { attempted: u128, max: u128 },
    #[error("deposit exceeds hardcap: {attempted} > remaining {remaining}")] HardcapExceeded { attempted: u128, remaining: u128 },
    #[error("claim exceeds unlocked tokens: {requested} > {available}")] ClaimExceedsUnlocked { requested: u128, available: u128 },
    #[error("nothing to redeem")] NothingToRedeem,
    #[error("depositor cannot refer itself")] SelfReferral,
}

/// Invalid initialization or reconfiguration parameters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{group} basis points sum to {sum}, expected 10000")] SplitSum { group: &'static str, sum: u64 },
    #[error("bonus tier table is empty")] EmptyBonusTiers,
    #[error("bonus tier lengths differ: {starts} starts, {bps} bps")] BonusLengthMismatch { starts: usize, bps: usize },
    #[error("first bonus tier must start at zero")] FirstTierNotZero,
    #[error("bonus tier {index} does not start after the previous tier")] TiersNotIncreasing { index: usize },
    #[error("bonus tier {index} grants more than the previous tier")] BonusNotDecreasing { index: usize },
    #[error("redeem basis points must be in 1..=10000, got {0}")] InvalidRedeemBp(u64),
    #[error("redeem interval must be non-zero")] ZeroRedeemInterval,
    #[error("hard-cap duration must be non-zero")] ZeroDuration,
    #[error("start time is frozen after the first deposit")] StartTimeFrozen,
    #[error("start time {start} lies too far before now ({now})")] StartTimeInPast { start: u64, now: u64 },
    #[error("presale already started")] SaleAlreadyStarted,
    #[error("max buy without whitelisting {without} exceeds max buy per address {per_address}")] CapOrder { without: u128, per_address: u128 },
    #[error("hardcap {hardcap} does not extend past the last bonus tier start {last_start}")] HardcapBelowBonusRange { hardcap: u128, last_start: u128 },
    #[error("{0} is not wired to this presale")] ComponentMismatch(&'static str),
    #[error("token pools not configured")] TokenPoolsNotSet,
    #[error("{0} must not be the zero address")] ZeroAddress(&'static str),
    #[error("invalid amount: {0}")] InvalidAmount(String),
    #[error("invalid setting: {0}")] Invalid(String),
}

/// Checked-arithmetic failure. Always fatal, never masked.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArithmeticError {
    #[error("arithmetic overflow")] Overflow,
    #[error("arithmetic underflow")] Underflow,
    #[error("division by zero")] DivisionByZero,
}

/// Failure reported by an external collaborator (token ledger, router, bank).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("insufficient balance for {owner}: have {have}, need {need}")] InsufficientBalance { owner: Address, have: u128, need: u128 },
    #[error("rejected: {0}")] Rejected(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PresaleError {
    #[error(transparent)] Auth(#[from] AuthError),
    #[error(transparent)] Phase(#[from] PhaseError),
    #[error(transparent)] Limit(#[from] LimitError),
    #[error(transparent)] Config(#[from] ConfigError),
    #[error(transparent)] Arithmetic(#[from] ArithmeticError),
    #[error(transparent)] Collaborator(#[from] CollaboratorError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitelist_caps_are_distinguishable() {
        let a = PresaleError::from(LimitError::NonWhitelistedCap { attempted: 2, max: 1 });
        let b = PresaleError::from(LimitError::WhitelistedCap { attempted: 2, max: 1 });
        assert_ne!(a, b);
        assert!(a.to_string().contains("non-whitelisted"));
        assert!(b.to_string().contains("for whitelisted"));
    }

    #[test]
    fn transparent_messages() {
        let e = PresaleError::from(PhaseError::NotStarted);
        assert_eq!(e.to_string(), "presale not yet started");
        let e = PresaleError::from(ConfigError::SplitSum { group: "eth", sum: 8250 });
        assert_eq!(e.to_string(), "eth basis points sum to 8250, expected 10000");
    }
}

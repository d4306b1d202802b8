//! Trait interfaces for the presale's external collaborators.
//!
//! The engine owns none of their state. It only calls into them during
//! settlement and redemption:
//! - [`TokenLedger`]: the sale token's balances
//! - [`BaseAssetBank`]: the base asset raised by the sale
//! - [`LiquidityRouter`]: the pool-creation service that seeds liquidity

use crate::error::CollaboratorError;
use crate::types::Address;

/// Fungible token ledger holding the sale token.
pub trait TokenLedger {
    /// Token balance of `owner` in the smallest unit.
    fn balance_of(&self, owner: &Address) -> u128;

    /// Move `amount` tokens from `from` to `to`.
    fn transfer(&mut self, from: &Address, to: &Address, amount: u128)
        -> Result<(), CollaboratorError>;
}

/// Transfer rail for the base asset (the currency contributions are made in).
pub trait BaseAssetBank {
    /// Base-asset balance of `owner` in the smallest unit.
    fn balance_of(&self, owner: &Address) -> u128;

    /// Move `amount` of the base asset from `from` to `to`.
    fn transfer(&mut self, from: &Address, to: &Address, amount: u128)
        -> Result<(), CollaboratorError>;
}

/// Liquidity-pool creation service.
///
/// The presale first transfers the pool's tokens and base asset to
/// [`address`](Self::address), then calls [`add_liquidity`](Self::add_liquidity).
pub trait LiquidityRouter {
    /// Address that receives the pool's funding before `add_liquidity`.
    fn address(&self) -> Address;

    /// Create or top up the pool from funds already held by the router.
    /// Pool shares are credited to `lp_recipient`.
    fn add_liquidity(
        &mut self,
        token_amount: u128,
        base_amount: u128,
        lp_recipient: &Address,
    ) -> Result<(), CollaboratorError>;
}

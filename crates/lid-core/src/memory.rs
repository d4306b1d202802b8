//! In-memory collaborators for tests and simulation.
//!
//! [`MemoryLedger`] backs both [`TokenLedger`] and [`BaseAssetBank`];
//! [`MemoryRouter`] records seeded pools. Production hosts supply their own
//! implementations of the traits.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::error::CollaboratorError;
use crate::traits::{BaseAssetBank, LiquidityRouter, TokenLedger};
use crate::types::Address;

/// Balance map with checked transfers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MemoryLedger {
    balances: BTreeMap<Address, u128>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` to `owner` out of thin air (genesis mint / test funding).
    pub fn mint(&mut self, owner: &Address, amount: u128) -> Result<(), CollaboratorError> {
        let balance = self.balances.entry(*owner).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| CollaboratorError::Rejected("balance overflow".into()))?;
        Ok(())
    }

    pub fn balance(&self, owner: &Address) -> u128 {
        self.balances.get(owner).copied().unwrap_or(0)
    }

    /// Sum of all balances.
    pub fn total(&self) -> u128 {
        self.balances.values().fold(0u128, |acc, b| acc.saturating_add(*b))
    }

    fn move_funds(&mut self, from: &Address, to: &Address, amount: u128) -> Result<(), CollaboratorError> {
        let have = self.balance(from);
        if have < amount {
            return Err(CollaboratorError::InsufficientBalance { owner: *from, have, need: amount });
        }
        if from == to || amount == 0 {
            return Ok(());
        }
        let to_balance = self
            .balance(to)
            .checked_add(amount)
            .ok_or_else(|| CollaboratorError::Rejected("balance overflow".into()))?;
        self.balances.insert(*from, have - amount);
        self.balances.insert(*to, to_balance);
        debug!(%from, %to, amount, "transfer");
        Ok(())
    }
}

impl TokenLedger for MemoryLedger {
    fn balance_of(&self, owner: &Address) -> u128 {
        self.balance(owner)
    }

    fn transfer(&mut self, from: &Address, to: &Address, amount: u128) -> Result<(), CollaboratorError> {
        self.move_funds(from, to, amount)
    }
}

impl BaseAssetBank for MemoryLedger {
    fn balance_of(&self, owner: &Address) -> u128 {
        self.balance(owner)
    }

    fn transfer(&mut self, from: &Address, to: &Address, amount: u128) -> Result<(), CollaboratorError> {
        self.move_funds(from, to, amount)
    }
}

/// One `add_liquidity` call observed by [`MemoryRouter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolSeed {
    pub token_amount: u128,
    pub base_amount: u128,
    pub lp_recipient: Address,
}

/// Router that records seeded pools.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryRouter {
    address: Address,
    pub seeds: Vec<PoolSeed>,
    /// When set, `add_liquidity` fails with this reason.
    pub reject_with: Option<String>,
}

impl MemoryRouter {
    pub fn new(address: Address) -> Self {
        Self { address, seeds: Vec::new(), reject_with: None }
    }
}

impl LiquidityRouter for MemoryRouter {
    fn address(&self) -> Address {
        self.address
    }

    fn add_liquidity(
        &mut self,
        token_amount: u128,
        base_amount: u128,
        lp_recipient: &Address,
    ) -> Result<(), CollaboratorError> {
        if let Some(reason) = &self.reject_with {
            return Err(CollaboratorError::Rejected(reason.clone()));
        }
        self.seeds.push(PoolSeed { token_amount, base_amount, lp_recipient: *lp_recipient });
        Ok(())
    }
}

//! LID simplified presale: sale timer, contributor ledger with bonus-weighted
//! shares, and the presale state machine that settles into a liquidity pool.

pub mod bonus;
pub mod config;
pub mod presale;
pub mod redeemer;
pub mod split;
pub mod timer;

pub use bonus::{BonusSchedule, BonusTier};
pub use config::{SaleConfig, SettingsError};
pub use presale::{
    DepositReceipt, Presale, PresaleParams, PresaleSnapshot, PresaleState, SettlementReport,
};
pub use redeemer::{ContributorAccount, RedeemSchedule, Redeemer};
pub use split::{FundSplit, TokenSplit, TreasuryLocks};
pub use timer::{SalePhase, SaleWindow, Timer};

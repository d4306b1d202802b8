//! Sale configuration.
//!
//! Loaded with the `config` crate: built-in defaults (the reference mainnet
//! deployment), then an optional TOML file, then `LID__`-prefixed environment
//! variables (`LID__PRESALE__HARDCAP=5000` sets `presale.hardcap`). Amounts
//! are decimal strings in whole units because TOML integers cannot hold
//! 18-decimal values.

use std::path::Path;

use lid_core::error::{ConfigError, PresaleError};
use lid_core::types::{Address, Call};
use lid_core::units::parse_units;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::bonus::BonusSchedule;
use crate::presale::{Presale, PresaleParams};
use crate::redeemer::Redeemer;
use crate::split::{FundSplit, TokenSplit, TreasuryLocks};
use crate::timer::{SaleWindow, Timer};

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "LID";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("config source: {0}")]
    Source(#[from] config::ConfigError),
    #[error(transparent)]
    Invalid(#[from] ConfigError),
    #[error("deployment failed: {0}")]
    Deploy(#[from] PresaleError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    pub start_time: u64,
    /// Sale duration in seconds.
    pub hard_cap_timer: u64,
    pub soft_cap: String,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self { start_time: 1_598_327_940, hard_cap_timer: 172_800, soft_cap: "2000".into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedeemerConfig {
    pub redeem_bp: u64,
    pub redeem_interval: u64,
    pub bonus_range_start: Vec<String>,
    pub bonus_range_bp: Vec<u64>,
}

impl Default for RedeemerConfig {
    fn default() -> Self {
        Self {
            redeem_bp: 200,
            redeem_interval: 3_600,
            bonus_range_start: ["0", "1000", "2000", "3000"].map(String::from).to_vec(),
            bonus_range_bp: vec![3_500, 2_500, 1_000, 0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresaleConfig {
    pub max_buy_per_address: String,
    pub max_buy_without_whitelisting: String,
    pub hardcap: String,
    pub fund_split: FundSplit,
    pub token_split: TokenSplit,
}

impl Default for PresaleConfig {
    fn default() -> Self {
        Self {
            max_buy_per_address: "20".into(),
            max_buy_without_whitelisting: "20".into(),
            hardcap: "4000".into(),
            fund_split: FundSplit {
                liquidity_bps: 7_500,
                treasury_bps: 500,
                referral_bps: 250,
                project_bps: 1_750,
            },
            token_split: TokenSplit {
                liquidity_bps: 1_700,
                presale_bps: 5_000,
                dao_bps: 2_000,
                team_bps: 900,
                marketing_bps: 400,
            },
        }
    }
}

/// Every party the deployment wires together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountsConfig {
    /// Deployer and owner of all three components.
    pub owner: Address,
    pub presale: Address,
    pub router: Address,
    pub treasury: Address,
    pub project_fund: Address,
    pub dao_lock: Address,
    pub team_lock: Address,
    pub marketing: Address,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        let known = |s: &str| s.parse().unwrap_or(Address::ZERO);
        Self {
            owner: Address::repeat_byte(0x01),
            presale: Address::repeat_byte(0x02),
            router: known("0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D"),
            treasury: known("0xb63c4F8eCBd1ab926Ed9Cb90c936dffC0eb02cE2"),
            project_fund: Address::repeat_byte(0x05),
            dao_lock: Address::repeat_byte(0x06),
            team_lock: Address::repeat_byte(0x07),
            marketing: Address::repeat_byte(0x08),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaleConfig {
    pub timer: TimerConfig,
    pub redeemer: RedeemerConfig,
    pub presale: PresaleConfig,
    pub accounts: AccountsConfig,
}

impl SaleConfig {
    /// Defaults, then `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        Self::load_from(path, None)
    }

    fn load_from(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, SettingsError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .source(env),
        );
        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse every amount and check the tables without deploying anything.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.window()?;
        self.bonus_table()?;
        self.presale_params()?;
        self.presale.token_split.validate()?;
        self.treasury_locks().validate()?;
        Ok(())
    }

    pub fn window(&self) -> Result<SaleWindow, ConfigError> {
        if self.timer.hard_cap_timer == 0 {
            return Err(ConfigError::ZeroDuration);
        }
        Ok(SaleWindow {
            start_time: self.timer.start_time,
            hard_cap_duration: self.timer.hard_cap_timer,
            soft_cap: parse_units(&self.timer.soft_cap)?,
        })
    }

    /// Tier starts in the smallest unit alongside their bonuses.
    pub fn bonus_table(&self) -> Result<(Vec<u128>, Vec<u64>), ConfigError> {
        let starts = self
            .redeemer
            .bonus_range_start
            .iter()
            .map(|s| parse_units(s))
            .collect::<Result<Vec<_>, _>>()?;
        BonusSchedule::new(&starts, &self.redeemer.bonus_range_bp)?;
        Ok((starts, self.redeemer.bonus_range_bp.clone()))
    }

    pub fn presale_params(&self) -> Result<PresaleParams, ConfigError> {
        let accounts = &self.accounts;
        let params = PresaleParams {
            max_buy_per_address: parse_units(&self.presale.max_buy_per_address)?,
            max_buy_without_whitelisting: parse_units(&self.presale.max_buy_without_whitelisting)?,
            hardcap: parse_units(&self.presale.hardcap)?,
            fund_split: self.presale.fund_split,
            owner: accounts.owner,
            router: accounts.router,
            treasury: accounts.treasury,
            project_fund: accounts.project_fund,
        };
        self.presale.fund_split.validate()?;
        if params.max_buy_without_whitelisting > params.max_buy_per_address {
            return Err(ConfigError::CapOrder {
                without: params.max_buy_without_whitelisting,
                per_address: params.max_buy_per_address,
            });
        }
        Ok(params)
    }

    pub fn treasury_locks(&self) -> TreasuryLocks {
        TreasuryLocks {
            dao: self.accounts.dao_lock,
            team: self.accounts.team_lock,
            marketing: self.accounts.marketing,
        }
    }

    /// Deploy and wire Timer, Redeemer and Presale with `accounts.owner` as
    /// deployer, then configure the token pools.
    pub fn deploy(&self, now: u64) -> Result<Presale, SettingsError> {
        let owner = self.accounts.owner;
        let presale_addr = self.accounts.presale;
        let call = Call::new(owner, now);

        let mut timer = Timer::new(owner);
        timer.initialize(&call, self.window()?, presale_addr, owner)?;

        let (starts, bps) = self.bonus_table()?;
        let mut redeemer = Redeemer::new(owner);
        redeemer.initialize(
            &call,
            self.redeemer.redeem_bp,
            self.redeemer.redeem_interval,
            &starts,
            &bps,
            presale_addr,
            owner,
        )?;

        let mut presale = Presale::new(presale_addr, owner, timer, redeemer);
        presale.initialize(&call, self.presale_params()?)?;
        presale.set_token_pools(&call, self.presale.token_split, self.treasury_locks())?;
        info!(presale = %presale_addr, %owner, "sale deployed");
        Ok(presale)
    }
}

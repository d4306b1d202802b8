//! Scenario replay against in-memory collaborators.
//!
//! A scenario is a JSON document naming the token supply handed to the
//! presale and an ordered list of timestamped calls. Each step runs against
//! the deployed presale; failures are recorded per step and, unless
//! `fail_fast` is set, the replay carries on.

use lid_core::error::PresaleError;
use lid_core::memory::{MemoryLedger, MemoryRouter, PoolSeed};
use lid_core::types::{Address, Call};
use lid_core::units::{format_units, parse_units};
use lid_presale::{Presale, PresaleSnapshot, SaleConfig};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

fn listed_default() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    SetWhitelist {
        accounts: Vec<Address>,
        #[serde(default = "listed_default")]
        listed: bool,
        at: u64,
    },
    SetStartTime {
        start_time: u64,
        at: u64,
    },
    Deposit {
        from: Address,
        amount: String,
        #[serde(default)]
        referrer: Option<Address>,
        at: u64,
    },
    Settle {
        at: u64,
        #[serde(default)]
        caller: Option<Address>,
    },
    Redeem {
        from: Address,
        at: u64,
    },
}

impl Step {
    pub fn at(&self) -> u64 {
        match self {
            Step::SetWhitelist { at, .. }
            | Step::SetStartTime { at, .. }
            | Step::Deposit { at, .. }
            | Step::Settle { at, .. }
            | Step::Redeem { at, .. } => *at,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Step::SetWhitelist { .. } => "set_whitelist",
            Step::SetStartTime { .. } => "set_start_time",
            Step::Deposit { .. } => "deposit",
            Step::Settle { .. } => "settle",
            Step::Redeem { .. } => "redeem",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Sale tokens minted to the presale before the first step, in whole units.
    pub token_supply: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub index: usize,
    pub action: &'static str,
    pub at: u64,
    pub ok: bool,
    pub detail: String,
}

/// Everything printed at the end of a replay.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub outcomes: Vec<StepOutcome>,
    pub presale: PresaleSnapshot,
    pub token_balances: MemoryLedger,
    pub base_asset_balances: MemoryLedger,
    pub pool_seeds: Vec<PoolSeed>,
}

pub struct Simulation {
    owner: Address,
    presale: Presale,
    tokens: MemoryLedger,
    bank: MemoryLedger,
    router: MemoryRouter,
    clock: u64,
}

impl Simulation {
    /// Deploy the sale described by `cfg` and fund it with `token_supply`.
    pub fn new(cfg: &SaleConfig, token_supply: u128) -> anyhow::Result<Self> {
        let presale = cfg.deploy(0)?;
        let mut tokens = MemoryLedger::new();
        tokens.mint(&presale.address(), token_supply)?;
        Ok(Self {
            owner: cfg.accounts.owner,
            presale,
            tokens,
            bank: MemoryLedger::new(),
            router: MemoryRouter::new(cfg.accounts.router),
            clock: 0,
        })
    }

    /// Apply one step, returning a short description of its effect.
    pub fn apply(&mut self, step: &Step) -> Result<String, PresaleError> {
        self.clock = self.clock.max(step.at());
        match step {
            Step::SetWhitelist { accounts, listed, at } => {
                self.presale
                    .set_whitelist_many(&Call::new(self.owner, *at), accounts, *listed)?;
                Ok(format!("{} accounts listed={listed}", accounts.len()))
            }
            Step::SetStartTime { start_time, at } => {
                self.presale.set_start_time(&Call::new(self.owner, *at), *start_time)?;
                Ok(format!("start_time={start_time}"))
            }
            Step::Deposit { from, amount, referrer, at } => {
                let amount = parse_units(amount)?;
                let receipt = self.presale.deposit(&Call::new(*from, *at), amount, *referrer)?;
                // The base asset arrives with the call.
                self.bank.mint(&self.presale.address(), amount)?;
                Ok(format!(
                    "shares={} total_raised={}",
                    format_units(receipt.shares),
                    format_units(receipt.total_raised)
                ))
            }
            Step::Settle { at, caller } => {
                let caller = caller.unwrap_or(self.owner);
                let report = self.presale.send_to_uniswap(
                    &Call::new(caller, *at),
                    &mut self.tokens,
                    &mut self.router,
                    &mut self.bank,
                )?;
                Ok(format!(
                    "final_rate={} liquidity_tokens={}",
                    format_units(report.final_rate),
                    format_units(report.tokens.liquidity)
                ))
            }
            Step::Redeem { from, at } => {
                let amount = self.presale.redeem(&Call::new(*from, *at), &mut self.tokens)?;
                Ok(format!("redeemed={}", format_units(amount)))
            }
        }
    }

    /// Replay every step in order.
    pub fn run(&mut self, steps: &[Step], fail_fast: bool) -> Vec<StepOutcome> {
        let mut outcomes = Vec::with_capacity(steps.len());
        for (index, step) in steps.iter().enumerate() {
            let result = self.apply(step);
            let ok = result.is_ok();
            let detail = match result {
                Ok(detail) => {
                    info!(index, action = step.name(), %detail, "step applied");
                    detail
                }
                Err(e) => {
                    warn!(index, action = step.name(), error = %e, "step rejected");
                    e.to_string()
                }
            };
            outcomes.push(StepOutcome { index, action: step.name(), at: step.at(), ok, detail });
            if fail_fast && !ok {
                break;
            }
        }
        outcomes
    }

    pub fn report(&self, outcomes: Vec<StepOutcome>) -> SimulationReport {
        SimulationReport {
            outcomes,
            presale: self.presale.snapshot(self.clock),
            token_balances: self.tokens.clone(),
            base_asset_balances: self.bank.clone(),
            pool_seeds: self.router.seeds.clone(),
        }
    }
}

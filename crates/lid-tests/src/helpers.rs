//! Shared harness for E2E and adversarial tests.

use lid_core::constants::ONE;
use lid_core::error::PresaleError;
use lid_core::memory::{MemoryLedger, MemoryRouter};
use lid_core::types::{Address, Call};
use lid_presale::{DepositReceipt, Presale, SaleConfig, SettlementReport};

/// `n` whole units in the smallest unit.
pub fn eth(n: u128) -> u128 {
    n * ONE
}

/// Deterministic address from a seed byte.
pub fn addr(seed: u8) -> Address {
    Address::repeat_byte(seed)
}

/// Contributor `i`, kept clear of the addresses the config reserves.
pub fn user(i: u8) -> Address {
    addr(0x40u8.wrapping_add(i))
}

/// Default config with caps wide enough for a handful of accounts to walk
/// the whole bonus table.
pub fn wide_config() -> SaleConfig {
    let mut cfg = SaleConfig::default();
    cfg.presale.max_buy_per_address = "4000".into();
    cfg.presale.max_buy_without_whitelisting = "4000".into();
    cfg
}

/// The 1,000-unit window whose rate curve is the published reference
/// (454,807 → 413,461 tokens per unit over 430M contributor tokens).
pub fn reference_config() -> SaleConfig {
    let mut cfg = wide_config();
    cfg.presale.hardcap = "1000".into();
    cfg.presale.max_buy_per_address = "1000".into();
    cfg.presale.max_buy_without_whitelisting = "1000".into();
    cfg.redeemer.bonus_range_start = ["0", "100", "500", "900"].map(String::from).to_vec();
    cfg.redeemer.bonus_range_bp = vec![1_000, 500, 250, 0];
    cfg
}

/// A deployed presale plus the in-memory rails it settles through.
pub struct Harness {
    pub cfg: SaleConfig,
    pub presale: Presale,
    pub tokens: MemoryLedger,
    pub bank: MemoryLedger,
    pub router: MemoryRouter,
}

impl Harness {
    /// Deploy `cfg` and mint `token_supply` to the presale.
    pub fn new(cfg: SaleConfig, token_supply: u128) -> Self {
        let presale = cfg.deploy(0).unwrap();
        let mut tokens = MemoryLedger::new();
        tokens.mint(&presale.address(), token_supply).unwrap();
        let router = MemoryRouter::new(cfg.accounts.router);
        Self { cfg, presale, tokens, bank: MemoryLedger::new(), router }
    }

    pub fn start(&self) -> u64 {
        self.presale.timer().start_time()
    }

    pub fn end(&self) -> u64 {
        self.presale.timer().end_time()
    }

    pub fn owner(&self) -> Call {
        Call::new(self.cfg.accounts.owner, 0)
    }

    /// Deposit and, on success, credit the base asset to the presale.
    pub fn deposit(
        &mut self,
        who: Address,
        amount: u128,
        referrer: Option<Address>,
        at: u64,
    ) -> Result<DepositReceipt, PresaleError> {
        let receipt = self.presale.deposit(&Call::new(who, at), amount, referrer)?;
        self.bank.mint(&self.presale.address(), amount).unwrap();
        Ok(receipt)
    }

    pub fn settle(&mut self, at: u64) -> Result<SettlementReport, PresaleError> {
        self.presale.send_to_uniswap(
            &Call::new(addr(0xee), at),
            &mut self.tokens,
            &mut self.router,
            &mut self.bank,
        )
    }

    pub fn redeem(&mut self, who: Address, at: u64) -> Result<u128, PresaleError> {
        self.presale.redeem(&Call::new(who, at), &mut self.tokens)
    }
}

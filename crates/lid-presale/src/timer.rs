//! Sale window and phase oracle.
//!
//! The timer never schedules anything: every phase question is answered
//! lazily from the caller's `now` and the raised total the presale passes in.

use lid_core::constants::START_TIME_GRACE;
use lid_core::error::{AuthError, ConfigError, PhaseError, PresaleError};
use lid_core::types::{Address, Call};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Phase of the sale window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalePhase {
    NotStarted,
    Active,
    Ended,
}

/// Start time, duration and soft cap of the sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SaleWindow {
    /// Unix time at which deposits open.
    pub start_time: u64,
    /// Seconds after `start_time` at which the sale closes.
    pub hard_cap_duration: u64,
    /// Raised total below which the sale counts as unsuccessful.
    pub soft_cap: u128,
}

#[derive(Debug, Clone)]
pub struct Timer {
    deployer: Address,
    owner: Address,
    presale: Address,
    window: SaleWindow,
    initialized: bool,
    start_frozen: bool,
}

impl Timer {
    /// An uninitialized timer that only `deployer` may initialize.
    pub fn new(deployer: Address) -> Self {
        Self {
            deployer,
            owner: Address::ZERO,
            presale: Address::ZERO,
            window: SaleWindow::default(),
            initialized: false,
            start_frozen: false,
        }
    }

    /// One-time setup. `presale` is the only caller allowed to freeze the
    /// start time; `owner` may reschedule it until then.
    pub fn initialize(
        &mut self,
        call: &Call,
        window: SaleWindow,
        presale: Address,
        owner: Address,
    ) -> Result<(), PresaleError> {
        if call.sender != self.deployer {
            return Err(AuthError::NotDeployer { caller: call.sender }.into());
        }
        if self.initialized {
            return Err(PhaseError::AlreadyInitialized.into());
        }
        if window.hard_cap_duration == 0 {
            return Err(ConfigError::ZeroDuration.into());
        }
        if presale.is_zero() {
            return Err(ConfigError::ZeroAddress("presale").into());
        }
        if owner.is_zero() {
            return Err(ConfigError::ZeroAddress("owner").into());
        }

        self.window = window;
        self.presale = presale;
        self.owner = owner;
        self.initialized = true;
        info!(
            start_time = window.start_time,
            hard_cap_duration = window.hard_cap_duration,
            soft_cap = window.soft_cap,
            "timer initialized"
        );
        Ok(())
    }

    /// Move the start time. Owner-only, and only while no deposit has been
    /// made and the current start has not yet passed.
    pub fn set_start_time(&mut self, call: &Call, start_time: u64) -> Result<(), PresaleError> {
        if !self.initialized {
            return Err(PhaseError::NotInitialized.into());
        }
        if call.sender != self.owner {
            return Err(AuthError::NotOwner { caller: call.sender }.into());
        }
        if self.start_frozen {
            return Err(ConfigError::StartTimeFrozen.into());
        }
        if self.is_started(call.now) {
            return Err(ConfigError::SaleAlreadyStarted.into());
        }
        if start_time.saturating_add(START_TIME_GRACE) < call.now {
            return Err(ConfigError::StartTimeInPast { start: start_time, now: call.now }.into());
        }

        info!(old = self.window.start_time, new = start_time, "start time rescheduled");
        self.window.start_time = start_time;
        Ok(())
    }

    /// Lock the start time. Called by the presale on the first deposit.
    pub fn freeze_start_time(&mut self, call: &Call) -> Result<(), PresaleError> {
        if !self.initialized {
            return Err(PhaseError::NotInitialized.into());
        }
        if call.sender != self.presale {
            return Err(AuthError::NotPresale { caller: call.sender }.into());
        }
        self.start_frozen = true;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_start_frozen(&self) -> bool {
        self.start_frozen
    }

    pub fn window(&self) -> &SaleWindow {
        &self.window
    }

    pub fn presale(&self) -> Address {
        self.presale
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn start_time(&self) -> u64 {
        self.window.start_time
    }

    /// Time at which the window closes regardless of capital raised.
    pub fn end_time(&self) -> u64 {
        self.window.start_time.saturating_add(self.window.hard_cap_duration)
    }

    pub fn is_started(&self, now: u64) -> bool {
        self.initialized && now >= self.window.start_time
    }

    /// Phase at `now` given the capital raised so far. Reaching `hardcap`
    /// ends the sale early.
    pub fn phase(&self, now: u64, raised: u128, hardcap: u128) -> SalePhase {
        if !self.is_started(now) {
            SalePhase::NotStarted
        } else if now >= self.end_time() || raised >= hardcap {
            SalePhase::Ended
        } else {
            SalePhase::Active
        }
    }

    pub fn is_active(&self, now: u64, raised: u128, hardcap: u128) -> bool {
        self.phase(now, raised, hardcap) == SalePhase::Active
    }

    pub fn is_ended(&self, now: u64, raised: u128, hardcap: u128) -> bool {
        self.phase(now, raised, hardcap) == SalePhase::Ended
    }

    pub fn soft_cap_reached(&self, raised: u128) -> bool {
        raised >= self.window.soft_cap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: u64 = 1_598_327_940;
    const DURATION: u64 = 172_800;
    const HARDCAP: u128 = 4_000;

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

    fn timer() -> Timer {
        let mut t = Timer::new(deployer());
        let window = SaleWindow { start_time: START, hard_cap_duration: DURATION, soft_cap: 2_000 };
        t.initialize(&Call::new(deployer(), START - 10_000), window, presale(), owner())
            .unwrap();
        t
    }

    // --- initialization ---

    #[test]
    fn initialize_only_once() {
        let mut t = timer();
        let err = t
            .initialize(&Call::new(deployer(), 0), SaleWindow::default(), presale(), owner())
            .unwrap_err();
        assert_eq!(err, PresaleError::Phase(PhaseError::AlreadyInitialized));
        assert_eq!(t.start_time(), START);
    }

    #[test]
    fn initialize_requires_deployer() {
        let mut t = Timer::new(deployer());
        let err = t
            .initialize(&Call::new(owner(), 0), SaleWindow::default(), presale(), owner())
            .unwrap_err();
        assert_eq!(err, PresaleError::Auth(AuthError::NotDeployer { caller: owner() }));
        assert!(!t.is_initialized());
    }

    #[test]
    fn initialize_rejects_zero_duration() {
        let mut t = Timer::new(deployer());
        let window = SaleWindow { start_time: START, hard_cap_duration: 0, soft_cap: 0 };
        let err = t.initialize(&Call::new(deployer(), 0), window, presale(), owner()).unwrap_err();
        assert_eq!(err, PresaleError::Config(ConfigError::ZeroDuration));
    }

    // --- phases ---

    #[test]
    fn phase_progression() {
        let t = timer();
        assert_eq!(t.phase(START - 1, 0, HARDCAP), SalePhase::NotStarted);
        assert_eq!(t.phase(START, 0, HARDCAP), SalePhase::Active);
        assert_eq!(t.phase(START + DURATION - 1, 0, HARDCAP), SalePhase::Active);
        assert_eq!(t.phase(START + DURATION, 0, HARDCAP), SalePhase::Ended);
    }

    #[test]
    fn hardcap_ends_early() {
        let t = timer();
        assert!(t.is_active(START + 1, HARDCAP - 1, HARDCAP));
        assert!(t.is_ended(START + 1, HARDCAP, HARDCAP));
    }

    #[test]
    fn uninitialized_never_starts() {
        let t = Timer::new(deployer());
        assert_eq!(t.phase(u64::MAX, 0, HARDCAP), SalePhase::NotStarted);
    }

    #[test]
    fn soft_cap() {
        let t = timer();
        assert!(!t.soft_cap_reached(1_999));
        assert!(t.soft_cap_reached(2_000));
    }

    // --- set_start_time ---

    #[test]
    fn owner_can_reschedule_before_start() {
        let mut t = timer();
        t.set_start_time(&Call::new(owner(), START - 100), START + 500).unwrap();
        assert_eq!(t.start_time(), START + 500);
        assert_eq!(t.end_time(), START + 500 + DURATION);
    }

    #[test]
    fn start_within_grace_window_is_allowed() {
        let mut t = timer();
        let now = START - 100;
        t.set_start_time(&Call::new(owner(), now), now - 60).unwrap();
        assert!(t.is_started(now));
    }

    #[test]
    fn reschedule_rejects_non_owner() {
        let mut t = timer();
        let err = t.set_start_time(&Call::new(addr(9), START - 100), START).unwrap_err();
        assert_eq!(err, PresaleError::Auth(AuthError::NotOwner { caller: addr(9) }));
    }

    #[test]
    fn reschedule_rejects_far_past() {
        let mut t = timer();
        let now = START - 100;
        let err = t
            .set_start_time(&Call::new(owner(), now), now - START_TIME_GRACE - 1)
            .unwrap_err();
        assert!(matches!(err, PresaleError::Config(ConfigError::StartTimeInPast { .. })));
        assert_eq!(t.start_time(), START);
    }

    #[test]
    fn reschedule_rejects_active_sale() {
        let mut t = timer();
        let err = t.set_start_time(&Call::new(owner(), START + 1), START + 1_000).unwrap_err();
        assert_eq!(err, PresaleError::Config(ConfigError::SaleAlreadyStarted));
    }

    #[test]
    fn frozen_start_cannot_move() {
        let mut t = timer();
        t.freeze_start_time(&Call::new(presale(), START)).unwrap();
        let err = t.set_start_time(&Call::new(owner(), START - 10), START + 10).unwrap_err();
        assert_eq!(err, PresaleError::Config(ConfigError::StartTimeFrozen));
    }

    #[test]
    fn only_presale_freezes() {
        let mut t = timer();
        let err = t.freeze_start_time(&Call::new(owner(), START)).unwrap_err();
        assert_eq!(err, PresaleError::Auth(AuthError::NotPresale { caller: owner() }));
        assert!(!t.is_start_frozen());
    }

    #[test]
    fn uninitialized_timer_cannot_freeze() {
        let mut t = Timer::new(deployer());
        let err = t.freeze_start_time(&Call::new(Address::ZERO, START)).unwrap_err();
        assert_eq!(err, PresaleError::Phase(PhaseError::NotInitialized));
        assert!(!t.is_start_frozen());
    }
}

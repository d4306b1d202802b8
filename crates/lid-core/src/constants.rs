//! Protocol constants. All amounts in the smallest unit (18 decimals).

/// One whole unit of the base asset or the sale token.
pub const ONE: u128 = 1_000_000_000_000_000_000;

/// Number of decimals carried by [`ONE`].
pub const DECIMALS: u32 = 18;

/// Basis-point denominator (10,000 = 100%).
pub const BPS_PRECISION: u64 = 10_000;

/// Smallest accepted deposit: 0.01 of the base asset.
pub const MIN_CONTRIBUTION: u128 = ONE / 100;

/// How far in the past (seconds) a new start time may lie when the owner
/// reschedules the sale.
pub const START_TIME_GRACE: u64 = 3_600;

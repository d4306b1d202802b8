//! Integration test suite for the LID presale.
//!
//! Drives Timer, Redeemer and Presale together through full sale lifecycles
//! and checks the ledger invariants under adversarial inputs.

pub mod helpers;

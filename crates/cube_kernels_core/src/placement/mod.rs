//! Card-placement state machine.
//!
//! # Responsibility
//! - Keep the client's kernels and candidate pool consistent with the
//!   remote store under optimistic edits.
//! - Translate drag gestures into placement operations.
//!
//! # Invariants
//! - Every card is in the pool or in exactly one kernel.
//! - Only `PlacementEngine` mutates the board.

pub mod board;
pub mod drag;
pub mod engine;
mod ledger;

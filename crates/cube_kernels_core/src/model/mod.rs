//! Catalog and placement records shared by the engine and the gateway.
//!
//! # Responsibility
//! - Define the wire-compatible shapes of cards, kernels, and pool records.
//! - Keep display-only helpers next to the catalog record they read.
//!
//! # Invariants
//! - `Card` values are read-only copies of the remote catalog.
//! - A membership wrapper (`KernelCard`/`CandidateCard`) with `id == None`
//!   is an optimistic local record that has not been confirmed yet.

pub mod card;
pub mod kernel;

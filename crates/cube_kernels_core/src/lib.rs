//! Core logic for grouping cube cards into kernels.
//! The placement engine is the single owner of local board state.

pub mod config;
pub mod gateway;
pub mod logging;
pub mod model;
pub mod placement;

pub use config::{ClientConfig, ConfigError};
pub use gateway::fixture::{Fixture, FixtureError, FixtureKernel, SeedSummary};
pub use gateway::memory::InMemoryRemoteStore;
pub use gateway::{GatewayError, GatewayResult, RemoteStore, Resource};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status, LoggingError};
pub use model::card::{Card, CardFace, CardId, ImageUris};
pub use model::kernel::{CandidateCard, CandidateCardId, Kernel, KernelCard, KernelCardId, KernelId};
pub use placement::board::{Board, BoardViolation, CardLocation};
pub use placement::drag::{
    resolve_drop, DragSession, DragSource, DropTarget, DropTargetKind, KernelRef,
    PlacementCommand,
};
pub use placement::engine::{
    Direction, PlacementEngine, PlacementError, PlacementResult, Reconciliation,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

//! Remote store gateway contract.
//!
//! # Responsibility
//! - Define the request/response contract the placement engine consumes.
//! - Keep transport details outside the core; callers plug in a backend.
//!
//! # Invariants
//! - Every call resolves to success or a typed `GatewayError`; there is no
//!   partial success.
//! - `list_kernels` returns kernels in their persisted order.

use crate::model::card::{Card, CardId};
use crate::model::kernel::{CandidateCard, Kernel, KernelId};
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod fixture;
pub mod memory;
pub mod wire;

/// Result type used by remote store calls.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Remote resource kinds, used in not-found reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Card,
    Kernel,
}

impl Display for Resource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Card => write!(f, "card"),
            Self::Kernel => write!(f, "kernel"),
        }
    }
}

/// Failure of one remote store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Transport failure; the call may or may not have reached the store.
    Unavailable(String),
    /// Referenced entity does not exist on the store.
    NotFound { resource: Resource, id: i64 },
    /// Store refused the request (missing or invalid fields).
    Rejected(String),
    /// Store answered with a payload that cannot be decoded.
    InvalidResponse(String),
}

impl Display for GatewayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(message) => write!(f, "remote store unavailable: {message}"),
            Self::NotFound { resource, id } => write!(f, "remote {resource} not found: {id}"),
            Self::Rejected(message) => write!(f, "remote store rejected request: {message}"),
            Self::InvalidResponse(message) => {
                write!(f, "invalid remote store response: {message}")
            }
        }
    }
}

impl Error for GatewayError {}

impl From<serde_json::Error> for GatewayError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidResponse(value.to_string())
    }
}

/// Typed request functions for the cards, kernels, and candidates resources.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Lists the whole card catalog.
    async fn list_cards(&self) -> GatewayResult<Vec<Card>>;
    /// Loads one catalog card.
    async fn get_card(&self, card_id: CardId) -> GatewayResult<Card>;
    /// Lists kernels in persisted order with nested members.
    async fn list_kernels(&self) -> GatewayResult<Vec<Kernel>>;
    /// Lists cards currently in the unassigned pool.
    async fn list_candidates(&self) -> GatewayResult<Vec<CandidateCard>>;
    /// Creates one kernel; the store assigns identity and position.
    async fn create_kernel(&self, name: &str) -> GatewayResult<Kernel>;
    /// Renames one kernel.
    async fn update_kernel(&self, kernel_id: KernelId, name: &str) -> GatewayResult<Kernel>;
    /// Deletes one kernel, returning its members to the pool.
    async fn delete_kernel(&self, kernel_id: KernelId) -> GatewayResult<()>;
    /// Adds a card to a kernel, detaching it from wherever it was.
    async fn add_card(&self, kernel_id: KernelId, card_id: CardId) -> GatewayResult<()>;
    /// Removes a card from a kernel and returns it to the pool.
    async fn remove_card(&self, kernel_id: KernelId, card_id: CardId) -> GatewayResult<()>;
    /// Persists the full kernel order.
    async fn reorder_kernels(&self, kernel_ids: &[KernelId]) -> GatewayResult<()>;
    /// Moves a card (candidate or member elsewhere) into a kernel.
    async fn move_to_kernel(&self, card_id: CardId, kernel_id: KernelId) -> GatewayResult<()>;
}

#[async_trait]
impl<T: RemoteStore + ?Sized> RemoteStore for std::sync::Arc<T> {
    async fn list_cards(&self) -> GatewayResult<Vec<Card>> {
        (**self).list_cards().await
    }

    async fn get_card(&self, card_id: CardId) -> GatewayResult<Card> {
        (**self).get_card(card_id).await
    }

    async fn list_kernels(&self) -> GatewayResult<Vec<Kernel>> {
        (**self).list_kernels().await
    }

    async fn list_candidates(&self) -> GatewayResult<Vec<CandidateCard>> {
        (**self).list_candidates().await
    }

    async fn create_kernel(&self, name: &str) -> GatewayResult<Kernel> {
        (**self).create_kernel(name).await
    }

    async fn update_kernel(&self, kernel_id: KernelId, name: &str) -> GatewayResult<Kernel> {
        (**self).update_kernel(kernel_id, name).await
    }

    async fn delete_kernel(&self, kernel_id: KernelId) -> GatewayResult<()> {
        (**self).delete_kernel(kernel_id).await
    }

    async fn add_card(&self, kernel_id: KernelId, card_id: CardId) -> GatewayResult<()> {
        (**self).add_card(kernel_id, card_id).await
    }

    async fn remove_card(&self, kernel_id: KernelId, card_id: CardId) -> GatewayResult<()> {
        (**self).remove_card(kernel_id, card_id).await
    }

    async fn reorder_kernels(&self, kernel_ids: &[KernelId]) -> GatewayResult<()> {
        (**self).reorder_kernels(kernel_ids).await
    }

    async fn move_to_kernel(&self, card_id: CardId, kernel_id: KernelId) -> GatewayResult<()> {
        (**self).move_to_kernel(card_id, kernel_id).await
    }
}

//! JSON fixtures for seeding the in-memory backend.
//!
//! # Responsibility
//! - Parse a catalog + kernel layout document.
//! - Seed an `InMemoryRemoteStore` through its public contract.
//!
//! # Invariants
//! - Cards not listed in any fixture kernel end up in the candidate pool.
//! - Seeding goes through `RemoteStore` calls, so store rules still apply.
//! - Seeded cards keep their fixture ids.

use crate::gateway::memory::InMemoryRemoteStore;
use crate::gateway::{GatewayError, RemoteStore};
use crate::model::card::{Card, CardId};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Errors from fixture loading and seeding.
#[derive(Debug)]
pub enum FixtureError {
    /// Fixture file cannot be read.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Fixture content is not valid fixture JSON.
    Parse(serde_json::Error),
    /// A fixture card id is not a positive store id.
    InvalidCardId(CardId),
    /// Store refused part of the fixture.
    Seed(GatewayError),
}

impl Display for FixtureError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read fixture `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid fixture: {err}"),
            Self::InvalidCardId(card_id) => {
                write!(f, "fixture card id {card_id} must be positive")
            }
            Self::Seed(err) => write!(f, "failed to seed fixture: {err}"),
        }
    }
}

impl Error for FixtureError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::InvalidCardId(_) => None,
            Self::Seed(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for FixtureError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

impl From<GatewayError> for FixtureError {
    fn from(value: GatewayError) -> Self {
        Self::Seed(value)
    }
}

/// One kernel in a fixture, listing member card ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureKernel {
    pub name: String,
    #[serde(default)]
    pub cards: Vec<CardId>,
}

/// Catalog plus initial kernel layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    pub cards: Vec<Card>,
    #[serde(default)]
    pub kernels: Vec<FixtureKernel>,
}

/// Counts reported after seeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub cards: usize,
    pub kernels: usize,
    pub placed: usize,
}

impl Fixture {
    pub fn parse(body: &str) -> Result<Self, FixtureError> {
        Ok(serde_json::from_str(body)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let path = path.as_ref();
        let body = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&body)
    }

    /// Writes cards and kernels into `store`.
    ///
    /// Kernel members refer to fixture card ids, so every card must carry a
    /// positive id; nothing is written otherwise.
    pub async fn seed(&self, store: &InMemoryRemoteStore) -> Result<SeedSummary, FixtureError> {
        if let Some(card) = self.cards.iter().find(|card| card.id <= 0) {
            return Err(FixtureError::InvalidCardId(card.id));
        }
        for card in &self.cards {
            store.insert_candidate(card.clone())?;
        }

        let mut placed = 0;
        for kernel in &self.kernels {
            let created = store.create_kernel(&kernel.name).await?;
            for card_id in &kernel.cards {
                store.move_to_kernel(*card_id, created.id).await?;
                placed += 1;
            }
        }

        Ok(SeedSummary {
            cards: self.cards.len(),
            kernels: self.kernels.len(),
            placed,
        })
    }
}

//! Kernel and membership records.
//!
//! # Responsibility
//! - Define the ordered kernel container and its membership wrappers.
//! - Provide local helpers that keep derived fields (`card_count`) in step.
//!
//! # Invariants
//! - `card_count == cards.len()` after every local mutation.
//! - A card appears at most once in `cards`.

use crate::model::card::{Card, CardId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Remote-store identity of one kernel.
pub type KernelId = i64;
/// Remote-store identity of one kernel membership record.
pub type KernelCardId = i64;
/// Remote-store identity of one candidate pool record.
pub type CandidateCardId = i64;

/// Membership of one card in one kernel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelCard {
    /// `None` while the membership only exists locally.
    pub id: Option<KernelCardId>,
    pub card: Card,
    pub added_at: DateTime<Utc>,
}

impl KernelCard {
    /// Local membership record awaiting server confirmation.
    pub fn provisional(card: Card) -> Self {
        Self {
            id: None,
            card,
            added_at: Utc::now(),
        }
    }

    pub fn is_provisional(&self) -> bool {
        self.id.is_none()
    }
}

/// A card sitting in the unassigned pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateCard {
    /// `None` while the pool record only exists locally.
    pub id: Option<CandidateCardId>,
    pub card: Card,
}

impl CandidateCard {
    /// Local pool record awaiting server confirmation.
    pub fn provisional(card: Card) -> Self {
        Self { id: None, card }
    }

    pub fn is_provisional(&self) -> bool {
        self.id.is_none()
    }
}

/// Named, ordered group of cards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kernel {
    pub id: KernelId,
    pub name: String,
    /// Position among all kernels; dense `0..n` after a reorder.
    pub order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub cards: Vec<KernelCard>,
    #[serde(default)]
    pub card_count: usize,
}

impl Kernel {
    /// Creates an empty kernel record.
    pub fn new(id: KernelId, name: impl Into<String>, order: i64) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            order,
            created_at: now,
            updated_at: now,
            cards: Vec::new(),
            card_count: 0,
        }
    }

    pub fn contains(&self, card_id: CardId) -> bool {
        self.position_of(card_id).is_some()
    }

    pub fn position_of(&self, card_id: CardId) -> Option<usize> {
        self.cards
            .iter()
            .position(|member| member.card.id == card_id)
    }

    pub fn card_ids(&self) -> Vec<CardId> {
        self.cards.iter().map(|member| member.card.id).collect()
    }

    /// Inserts a member at `index` (clamped) and recounts.
    pub fn insert_member(&mut self, index: usize, member: KernelCard) {
        let index = index.min(self.cards.len());
        self.cards.insert(index, member);
        self.recount();
    }

    /// Removes a member by card id and recounts.
    pub fn take_member(&mut self, card_id: CardId) -> Option<(usize, KernelCard)> {
        let index = self.position_of(card_id)?;
        let member = self.cards.remove(index);
        self.recount();
        Some((index, member))
    }

    /// Removes every member and recounts.
    pub fn drain_members(&mut self) -> Vec<KernelCard> {
        let members = std::mem::take(&mut self.cards);
        self.recount();
        members
    }

    fn recount(&mut self) {
        self.card_count = self.cards.len();
    }
}

#[cfg(test)]
mod tests {
    use super::{Kernel, KernelCard};
    use crate::model::card::Card;
    use uuid::Uuid;

    #[test]
    fn member_helpers_keep_card_count_in_step() {
        let mut kernel = Kernel::new(1, "Aggro", 0);
        kernel.insert_member(5, KernelCard::provisional(Card::new(10, Uuid::nil(), "A")));
        kernel.insert_member(0, KernelCard::provisional(Card::new(11, Uuid::nil(), "B")));
        assert_eq!(kernel.card_ids(), vec![11, 10]);
        assert_eq!(kernel.card_count, 2);

        let (index, member) = kernel.take_member(10).unwrap();
        assert_eq!(index, 1);
        assert!(member.is_provisional());
        assert_eq!(kernel.card_count, 1);
        assert!(kernel.take_member(10).is_none());

        assert_eq!(kernel.drain_members().len(), 1);
        assert_eq!(kernel.card_count, 0);
    }
}

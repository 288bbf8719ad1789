//! In-process remote store backend.
//!
//! # Responsibility
//! - Implement the remote store contract with the backend's placement rules.
//! - Serve as the reference backend for the CLI and for engine tests.
//!
//! # Invariants
//! - A card has at most one membership row; a card with a membership row is
//!   never listed as a candidate.
//! - Moving a card into a kernel detaches it from the pool and every other
//!   kernel before attaching it.
//! - Deleting a kernel returns every member to the pool before the kernel
//!   row disappears.
//! - Every mutation validates all referenced ids before touching any row.

use crate::gateway::{GatewayError, GatewayResult, RemoteStore, Resource};
use crate::model::card::{Card, CardId};
use crate::model::kernel::{
    CandidateCard, CandidateCardId, Kernel, KernelCard, KernelCardId, KernelId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

struct KernelRow {
    id: KernelId,
    name: String,
    order: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

struct MembershipRow {
    id: KernelCardId,
    kernel_id: KernelId,
    card_id: CardId,
    added_at: DateTime<Utc>,
}

struct CandidateRow {
    id: CandidateCardId,
    card_id: CardId,
}

#[derive(Default)]
struct Tables {
    cards: BTreeMap<CardId, Card>,
    kernels: Vec<KernelRow>,
    memberships: Vec<MembershipRow>,
    candidates: Vec<CandidateRow>,
    next_card_id: CardId,
    next_kernel_id: KernelId,
    next_membership_id: KernelCardId,
    next_candidate_id: CandidateCardId,
}

impl Tables {
    fn ensure_card(&self, card_id: CardId) -> GatewayResult<()> {
        if self.cards.contains_key(&card_id) {
            Ok(())
        } else {
            Err(GatewayError::NotFound {
                resource: Resource::Card,
                id: card_id,
            })
        }
    }

    fn kernel_index(&self, kernel_id: KernelId) -> GatewayResult<usize> {
        self.kernels
            .iter()
            .position(|row| row.id == kernel_id)
            .ok_or(GatewayError::NotFound {
                resource: Resource::Kernel,
                id: kernel_id,
            })
    }

    fn candidate_get_or_create(&mut self, card_id: CardId) {
        if self.candidates.iter().any(|row| row.card_id == card_id) {
            return;
        }
        self.next_candidate_id += 1;
        self.candidates.push(CandidateRow {
            id: self.next_candidate_id,
            card_id,
        });
    }

    fn attach(&mut self, kernel_id: KernelId, card_id: CardId) {
        self.candidates.retain(|row| row.card_id != card_id);
        self.memberships.retain(|row| row.card_id != card_id);
        self.next_membership_id += 1;
        self.memberships.push(MembershipRow {
            id: self.next_membership_id,
            kernel_id,
            card_id,
            added_at: Utc::now(),
        });
        self.touch_kernel(kernel_id);
    }

    fn touch_kernel(&mut self, kernel_id: KernelId) {
        if let Some(row) = self.kernels.iter_mut().find(|row| row.id == kernel_id) {
            row.updated_at = Utc::now();
        }
    }

    fn card(&self, card_id: CardId) -> GatewayResult<Card> {
        self.cards
            .get(&card_id)
            .cloned()
            .ok_or_else(|| GatewayError::InvalidResponse(format!("dangling card reference {card_id}")))
    }

    fn project_kernel(&self, row: &KernelRow) -> GatewayResult<Kernel> {
        let mut members = self
            .memberships
            .iter()
            .filter(|membership| membership.kernel_id == row.id)
            .collect::<Vec<_>>();
        members.sort_by(|left, right| {
            left.added_at
                .cmp(&right.added_at)
                .then(left.id.cmp(&right.id))
        });

        let cards = members
            .into_iter()
            .map(|membership| {
                Ok(KernelCard {
                    id: Some(membership.id),
                    card: self.card(membership.card_id)?,
                    added_at: membership.added_at,
                })
            })
            .collect::<GatewayResult<Vec<_>>>()?;

        Ok(Kernel {
            id: row.id,
            name: row.name.clone(),
            order: row.order,
            created_at: row.created_at,
            updated_at: row.updated_at,
            card_count: cards.len(),
            cards,
        })
    }
}

/// Remote store kept entirely in process memory.
#[derive(Default)]
pub struct InMemoryRemoteStore {
    tables: RwLock<Tables>,
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a catalog card and places it in the candidate pool.
    ///
    /// A non-positive `card.id` is replaced with a store-assigned id. Derived
    /// color fields are recomputed from the color identity.
    pub fn insert_candidate(&self, card: Card) -> GatewayResult<CardId> {
        let mut tables = self.write()?;
        let card_id = insert_card(&mut tables, card)?;
        tables.candidate_get_or_create(card_id);
        Ok(card_id)
    }

    /// Adds a catalog card that is neither a candidate nor a kernel member.
    pub fn insert_card(&self, card: Card) -> GatewayResult<CardId> {
        let mut tables = self.write()?;
        insert_card(&mut tables, card)
    }

    /// Number of catalog cards.
    pub fn card_count(&self) -> GatewayResult<usize> {
        Ok(self.read()?.cards.len())
    }

    fn read(&self) -> GatewayResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| GatewayError::Unavailable("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> GatewayResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| GatewayError::Unavailable("in-memory store lock poisoned".to_string()))
    }
}

fn insert_card(tables: &mut Tables, mut card: Card) -> GatewayResult<CardId> {
    let card_id = if card.id <= 0 {
        tables.next_card_id + 1
    } else {
        card.id
    };
    if tables.cards.contains_key(&card_id) {
        return Err(GatewayError::Rejected(format!("card id {card_id} already exists")));
    }
    if tables
        .cards
        .values()
        .any(|existing| existing.name == card.name || existing.scryfall_id == card.scryfall_id)
    {
        return Err(GatewayError::Rejected(format!(
            "card {card_id} duplicates an existing name or scryfall id"
        )));
    }

    // Only an accepted card moves the id counter.
    tables.next_card_id = tables.next_card_id.max(card_id);
    card.id = card_id;
    card.num_colors = Some(card.derived_num_colors());
    card.color_sort_key = Some(card.derived_color_sort_key());
    let now = Utc::now();
    card.created_at.get_or_insert(now);
    card.updated_at.get_or_insert(now);

    tables.cards.insert(card_id, card);
    Ok(card_id)
}

fn compare_candidates(left: &Card, right: &Card) -> Ordering {
    left.num_colors
        .cmp(&right.num_colors)
        .then_with(|| left.color_sort_key.cmp(&right.color_sort_key))
        .then_with(|| {
            left.cmc
                .unwrap_or_default()
                .total_cmp(&right.cmc.unwrap_or_default())
        })
        .then_with(|| left.name.cmp(&right.name))
}

fn normalize_name(name: &str) -> GatewayResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(GatewayError::Rejected("name is required".to_string()));
    }
    Ok(trimmed.to_string())
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn list_cards(&self) -> GatewayResult<Vec<Card>> {
        Ok(self.read()?.cards.values().cloned().collect())
    }

    async fn get_card(&self, card_id: CardId) -> GatewayResult<Card> {
        let tables = self.read()?;
        tables.ensure_card(card_id)?;
        tables.card(card_id)
    }

    async fn list_kernels(&self) -> GatewayResult<Vec<Kernel>> {
        let tables = self.read()?;
        let mut rows = tables.kernels.iter().collect::<Vec<_>>();
        rows.sort_by(|left, right| left.order.cmp(&right.order).then(left.id.cmp(&right.id)));
        rows.into_iter()
            .map(|row| tables.project_kernel(row))
            .collect()
    }

    async fn list_candidates(&self) -> GatewayResult<Vec<CandidateCard>> {
        let tables = self.read()?;
        let members = tables
            .memberships
            .iter()
            .map(|row| row.card_id)
            .collect::<HashSet<_>>();

        let mut candidates = tables
            .candidates
            .iter()
            .filter(|row| !members.contains(&row.card_id))
            .map(|row| {
                Ok(CandidateCard {
                    id: Some(row.id),
                    card: tables.card(row.card_id)?,
                })
            })
            .collect::<GatewayResult<Vec<_>>>()?;
        candidates.sort_by(|left, right| compare_candidates(&left.card, &right.card));
        Ok(candidates)
    }

    async fn create_kernel(&self, name: &str) -> GatewayResult<Kernel> {
        let name = normalize_name(name)?;
        let mut tables = self.write()?;
        let order = tables
            .kernels
            .iter()
            .map(|row| row.order + 1)
            .max()
            .unwrap_or(0);
        tables.next_kernel_id += 1;
        let now = Utc::now();
        let row = KernelRow {
            id: tables.next_kernel_id,
            name,
            order,
            created_at: now,
            updated_at: now,
        };
        let kernel = tables.project_kernel(&row)?;
        tables.kernels.push(row);
        debug!(
            "event=store_kernel_create module=memory_store status=ok kernel_id={}",
            kernel.id
        );
        Ok(kernel)
    }

    async fn update_kernel(&self, kernel_id: KernelId, name: &str) -> GatewayResult<Kernel> {
        let name = normalize_name(name)?;
        let mut tables = self.write()?;
        let index = tables.kernel_index(kernel_id)?;
        tables.kernels[index].name = name;
        tables.kernels[index].updated_at = Utc::now();
        tables.project_kernel(&tables.kernels[index])
    }

    async fn delete_kernel(&self, kernel_id: KernelId) -> GatewayResult<()> {
        let mut tables = self.write()?;
        let index = tables.kernel_index(kernel_id)?;
        let returned = tables
            .memberships
            .iter()
            .filter(|row| row.kernel_id == kernel_id)
            .map(|row| row.card_id)
            .collect::<Vec<_>>();
        for card_id in &returned {
            tables.candidate_get_or_create(*card_id);
        }
        tables.memberships.retain(|row| row.kernel_id != kernel_id);
        tables.kernels.remove(index);
        debug!(
            "event=store_kernel_delete module=memory_store status=ok kernel_id={} returned={}",
            kernel_id,
            returned.len()
        );
        Ok(())
    }

    async fn add_card(&self, kernel_id: KernelId, card_id: CardId) -> GatewayResult<()> {
        let mut tables = self.write()?;
        tables.kernel_index(kernel_id)?;
        tables.ensure_card(card_id)?;
        tables.attach(kernel_id, card_id);
        Ok(())
    }

    async fn remove_card(&self, kernel_id: KernelId, card_id: CardId) -> GatewayResult<()> {
        let mut tables = self.write()?;
        tables.kernel_index(kernel_id)?;
        tables.ensure_card(card_id)?;
        tables
            .memberships
            .retain(|row| !(row.kernel_id == kernel_id && row.card_id == card_id));
        tables.candidate_get_or_create(card_id);
        tables.touch_kernel(kernel_id);
        Ok(())
    }

    async fn reorder_kernels(&self, kernel_ids: &[KernelId]) -> GatewayResult<()> {
        if kernel_ids.is_empty() {
            return Err(GatewayError::Rejected(
                "kernel_ids list is required".to_string(),
            ));
        }
        let mut tables = self.write()?;
        let indexes = kernel_ids
            .iter()
            .map(|kernel_id| tables.kernel_index(*kernel_id))
            .collect::<GatewayResult<Vec<_>>>()?;
        for (order, index) in indexes.into_iter().enumerate() {
            tables.kernels[index].order = order as i64;
        }
        Ok(())
    }

    async fn move_to_kernel(&self, card_id: CardId, kernel_id: KernelId) -> GatewayResult<()> {
        let mut tables = self.write()?;
        tables.ensure_card(card_id)?;
        tables.kernel_index(kernel_id)?;
        tables.attach(kernel_id, card_id);
        debug!(
            "event=store_move_to_kernel module=memory_store status=ok card_id={} kernel_id={}",
            card_id, kernel_id
        );
        Ok(())
    }
}

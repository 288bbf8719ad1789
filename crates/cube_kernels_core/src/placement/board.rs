//! Client-side board: the kernels and candidate pool the UI renders.
//!
//! # Responsibility
//! - Hold the single in-memory copy of kernels and candidates.
//! - Answer placement queries by scanning membership lists.
//! - Offer the primitive edits the engine composes into operations.
//!
//! # Invariants
//! - A card is in the pool or in exactly one kernel, never both.
//! - The owning kernel of a card is always derived, never stored.
//! - Only `PlacementEngine` mutates a board; readers get clones.

use crate::model::card::{Card, CardId};
use crate::model::kernel::{CandidateCard, Kernel, KernelCard, KernelId};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Where a card currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardLocation {
    Candidate,
    Kernel(KernelId),
}

/// A broken board invariant, usually found in a server payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardViolation {
    DuplicateKernel(KernelId),
    DuplicateCandidate(CardId),
    CardInMultipleKernels {
        card_id: CardId,
        first: KernelId,
        second: KernelId,
    },
    CardInPoolAndKernel {
        card_id: CardId,
        kernel_id: KernelId,
    },
    CardCountMismatch {
        kernel_id: KernelId,
        reported: usize,
        actual: usize,
    },
}

impl Display for BoardViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateKernel(id) => write!(f, "kernel {id} listed more than once"),
            Self::DuplicateCandidate(id) => write!(f, "card {id} listed twice in the pool"),
            Self::CardInMultipleKernels {
                card_id,
                first,
                second,
            } => write!(f, "card {card_id} is a member of kernels {first} and {second}"),
            Self::CardInPoolAndKernel { card_id, kernel_id } => {
                write!(f, "card {card_id} is both a candidate and a member of kernel {kernel_id}")
            }
            Self::CardCountMismatch {
                kernel_id,
                reported,
                actual,
            } => write!(
                f,
                "kernel {kernel_id} reports {reported} cards but has {actual} members"
            ),
        }
    }
}

impl Error for BoardViolation {}

/// Prior location of a card, captured before an optimistic move.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Placement {
    Candidate {
        index: usize,
        record: CandidateCard,
    },
    Member {
        kernel_id: KernelId,
        index: usize,
        record: KernelCard,
    },
}

impl Placement {
    pub(crate) fn card(&self) -> &Card {
        match self {
            Self::Candidate { record, .. } => &record.card,
            Self::Member { record, .. } => &record.card,
        }
    }
}

/// Kernels and candidates as currently known to the client.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Board {
    kernels: Vec<Kernel>,
    candidates: Vec<CandidateCard>,
    open_kernel: Option<KernelId>,
    loaded: bool,
}

impl Board {
    /// Empty board, not yet populated by a refresh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether at least one refresh has been applied.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Kernels in display order.
    pub fn kernels(&self) -> &[Kernel] {
        &self.kernels
    }

    /// Candidate pool in display order.
    pub fn candidates(&self) -> &[CandidateCard] {
        &self.candidates
    }

    pub fn kernel(&self, kernel_id: KernelId) -> Option<&Kernel> {
        self.kernels.iter().find(|kernel| kernel.id == kernel_id)
    }

    pub fn kernel_index(&self, kernel_id: KernelId) -> Option<usize> {
        self.kernels.iter().position(|kernel| kernel.id == kernel_id)
    }

    /// Kernel ids in display order.
    pub fn kernel_ids(&self) -> Vec<KernelId> {
        self.kernels.iter().map(|kernel| kernel.id).collect()
    }

    /// Kernel currently opened for detail viewing, if any.
    pub fn open_kernel_id(&self) -> Option<KernelId> {
        self.open_kernel
    }

    /// Finds the kernel holding `card_id` by scanning every membership list.
    pub fn owning_kernel(&self, card_id: CardId) -> Option<KernelId> {
        self.kernels
            .iter()
            .find(|kernel| kernel.contains(card_id))
            .map(|kernel| kernel.id)
    }

    pub fn is_candidate(&self, card_id: CardId) -> bool {
        self.candidate_index(card_id).is_some()
    }

    pub fn location(&self, card_id: CardId) -> Option<CardLocation> {
        if let Some(kernel_id) = self.owning_kernel(card_id) {
            return Some(CardLocation::Kernel(kernel_id));
        }
        self.is_candidate(card_id).then_some(CardLocation::Candidate)
    }

    /// Looks up a card wherever it currently sits.
    pub fn find_card(&self, card_id: CardId) -> Option<&Card> {
        self.kernels
            .iter()
            .flat_map(|kernel| kernel.cards.iter().map(|member| &member.card))
            .chain(self.candidates.iter().map(|record| &record.card))
            .find(|card| card.id == card_id)
    }

    /// Whether kernel positions are exactly `0..n` in display order.
    pub fn has_dense_order(&self) -> bool {
        self.kernels
            .iter()
            .enumerate()
            .all(|(index, kernel)| kernel.order == index as i64)
    }

    /// Checks the placement invariants over this board.
    pub fn validate(&self) -> Result<(), BoardViolation> {
        validate_parts(&self.kernels, &self.candidates)
    }

    fn candidate_index(&self, card_id: CardId) -> Option<usize> {
        self.candidates
            .iter()
            .position(|record| record.card.id == card_id)
    }

    pub(crate) fn replace(&mut self, kernels: Vec<Kernel>, candidates: Vec<CandidateCard>) {
        self.kernels = kernels;
        self.candidates = candidates;
        self.loaded = true;
        if let Some(open) = self.open_kernel {
            if self.kernel(open).is_none() {
                self.open_kernel = None;
            }
        }
    }

    pub(crate) fn set_open_kernel(&mut self, kernel_id: Option<KernelId>) {
        self.open_kernel = kernel_id;
    }

    /// Detaches a card from its current location.
    pub(crate) fn take_card(&mut self, card_id: CardId) -> Option<Placement> {
        for kernel in &mut self.kernels {
            if let Some((index, record)) = kernel.take_member(card_id) {
                return Some(Placement::Member {
                    kernel_id: kernel.id,
                    index,
                    record,
                });
            }
        }
        let index = self.candidate_index(card_id)?;
        let record = self.candidates.remove(index);
        Some(Placement::Candidate { index, record })
    }

    /// Appends a member to a kernel; returns `false` when the kernel is gone.
    pub(crate) fn push_member(&mut self, kernel_id: KernelId, record: KernelCard) -> bool {
        match self.kernels.iter_mut().find(|kernel| kernel.id == kernel_id) {
            Some(kernel) => {
                let end = kernel.cards.len();
                kernel.insert_member(end, record);
                true
            }
            None => false,
        }
    }

    pub(crate) fn push_candidate(&mut self, record: CandidateCard) {
        self.candidates.push(record);
    }

    /// Puts a card back where `placement` says it was.
    ///
    /// Returns `false` when the previous kernel no longer exists. The card then
    /// joins the pool as a provisional candidate, as members of a deleted
    /// kernel do on the server.
    pub(crate) fn restore_placement(&mut self, placement: Placement) -> bool {
        let card_id = placement.card().id;
        self.take_card(card_id);
        match placement {
            Placement::Candidate { index, record } => {
                let index = index.min(self.candidates.len());
                self.candidates.insert(index, record);
                true
            }
            Placement::Member {
                kernel_id,
                index,
                record,
            } => match self.kernels.iter_mut().find(|kernel| kernel.id == kernel_id) {
                Some(kernel) => {
                    kernel.insert_member(index, record);
                    true
                }
                None => {
                    self.candidates.push(CandidateCard::provisional(record.card));
                    false
                }
            },
        }
    }

    /// Current `(id, order)` sequence.
    pub(crate) fn order_snapshot(&self) -> Vec<(KernelId, i64)> {
        self.kernels
            .iter()
            .map(|kernel| (kernel.id, kernel.order))
            .collect()
    }

    /// Rearranges kernels to follow `ordered_ids` and assigns dense positions.
    ///
    /// Kernels missing from `ordered_ids` keep their relative order after the
    /// listed ones.
    pub(crate) fn apply_order(&mut self, ordered_ids: &[KernelId]) {
        let rank = ordered_ids
            .iter()
            .enumerate()
            .map(|(index, id)| (*id, index))
            .collect::<HashMap<_, _>>();
        self.kernels
            .sort_by_key(|kernel| rank.get(&kernel.id).copied().unwrap_or(usize::MAX));
        for (index, kernel) in self.kernels.iter_mut().enumerate() {
            kernel.order = index as i64;
        }
    }

    /// Restores a sequence captured by `order_snapshot`.
    pub(crate) fn restore_order(&mut self, snapshot: &[(KernelId, i64)]) {
        let ids = snapshot.iter().map(|(id, _)| *id).collect::<Vec<_>>();
        self.apply_order(&ids);
        let positions = snapshot.iter().copied().collect::<HashMap<_, _>>();
        for kernel in &mut self.kernels {
            if let Some(order) = positions.get(&kernel.id) {
                kernel.order = *order;
            }
        }
    }

    /// Adds a kernel unless one with the same id is already present.
    pub(crate) fn push_kernel(&mut self, kernel: Kernel) {
        if self.kernel(kernel.id).is_none() {
            self.kernels.push(kernel);
        }
    }

    pub(crate) fn rename_kernel(&mut self, kernel_id: KernelId, name: String) -> bool {
        match self.kernels.iter_mut().find(|kernel| kernel.id == kernel_id) {
            Some(kernel) => {
                kernel.name = name;
                true
            }
            None => false,
        }
    }

    /// Removes a kernel and returns its members to the pool as provisional
    /// candidates. Returns how many cards were returned.
    pub(crate) fn dissolve_kernel(&mut self, kernel_id: KernelId) -> Option<usize> {
        let index = self.kernel_index(kernel_id)?;
        let mut kernel = self.kernels.remove(index);
        let members = kernel.drain_members();
        let returned = members.len();
        for member in members {
            if !self.is_candidate(member.card.id) {
                self.candidates.push(CandidateCard::provisional(member.card));
            }
        }
        if self.open_kernel == Some(kernel_id) {
            self.open_kernel = None;
        }
        Some(returned)
    }
}

/// Checks placement invariants over a kernel list and a pool.
pub fn validate_parts(
    kernels: &[Kernel],
    candidates: &[CandidateCard],
) -> Result<(), BoardViolation> {
    let mut kernel_ids = HashSet::new();
    let mut owners: HashMap<CardId, KernelId> = HashMap::new();
    for kernel in kernels {
        if !kernel_ids.insert(kernel.id) {
            return Err(BoardViolation::DuplicateKernel(kernel.id));
        }
        if kernel.card_count != kernel.cards.len() {
            return Err(BoardViolation::CardCountMismatch {
                kernel_id: kernel.id,
                reported: kernel.card_count,
                actual: kernel.cards.len(),
            });
        }
        for member in &kernel.cards {
            if let Some(first) = owners.insert(member.card.id, kernel.id) {
                return Err(BoardViolation::CardInMultipleKernels {
                    card_id: member.card.id,
                    first,
                    second: kernel.id,
                });
            }
        }
    }

    let mut pooled = HashSet::new();
    for record in candidates {
        let card_id = record.card.id;
        if !pooled.insert(card_id) {
            return Err(BoardViolation::DuplicateCandidate(card_id));
        }
        if let Some(kernel_id) = owners.get(&card_id) {
            return Err(BoardViolation::CardInPoolAndKernel {
                card_id,
                kernel_id: *kernel_id,
            });
        }
    }
    Ok(())
}

//! Bookkeeping for in-flight mutations.
//!
//! # Responsibility
//! - Issue ordered tickets to every mutating operation.
//! - Hold the checkpoint an optimistic edit must be undone to.
//! - Decide whether a late response is still allowed to touch the board.
//!
//! # Invariants
//! - Ticket sequence numbers strictly increase.
//! - A rollback is applied only by the latest ticket of its scope.
//! - A refresh is applied only if no mutation was issued after it started
//!   and none is still awaiting its remote response.

use crate::model::card::CardId;
use crate::model::kernel::KernelId;
use crate::placement::board::{Board, Placement};
use std::collections::HashMap;

/// Entity a mutation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Scope {
    Card(CardId),
    Kernel(KernelId),
    KernelOrder,
    KernelSet,
}

/// Minimal prior state slice captured before an optimistic edit.
#[derive(Debug, Clone)]
pub(crate) enum Checkpoint {
    Order(Vec<(KernelId, i64)>),
    Placement(Placement),
}

/// Receipt for one issued mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Ticket {
    seq: u64,
    scope: Scope,
}

#[derive(Debug)]
struct InFlight {
    scope: Scope,
    checkpoint: Option<Checkpoint>,
}

/// Result of settling a failed mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Rollback {
    /// The checkpoint was restored exactly.
    Restored,
    /// Nothing to restore; the mutation never touched the board.
    NotNeeded,
    /// A newer mutation owns the scope, or the restore target is gone.
    Skipped,
}

#[derive(Debug, Default)]
pub(crate) struct MutationLedger {
    last_issued: u64,
    latest: HashMap<Scope, u64>,
    in_flight: HashMap<u64, InFlight>,
    stale: bool,
}

impl MutationLedger {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a mutation that is about to call the remote store.
    pub(crate) fn begin(&mut self, scope: Scope, checkpoint: Option<Checkpoint>) -> Ticket {
        self.last_issued += 1;
        let seq = self.last_issued;
        self.latest.insert(scope, seq);
        self.in_flight.insert(seq, InFlight { scope, checkpoint });
        Ticket { seq, scope }
    }

    /// Sequence number of the most recently issued mutation.
    pub(crate) fn watermark(&self) -> u64 {
        self.last_issued
    }

    pub(crate) fn is_current(&self, ticket: Ticket) -> bool {
        self.latest.get(&ticket.scope) == Some(&ticket.seq)
    }

    /// Whether a refresh started at `watermark` may replace the board.
    pub(crate) fn can_apply_refresh(&self, watermark: u64) -> bool {
        self.last_issued == watermark && self.in_flight.is_empty()
    }

    pub(crate) fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Drops the checkpoint of a mutation the store accepted.
    pub(crate) fn confirm(&mut self, ticket: Ticket) {
        self.in_flight.remove(&ticket.seq);
        self.forget_scope_if_current(ticket);
    }

    /// Undoes a mutation the store refused, unless a newer one owns the scope.
    pub(crate) fn roll_back(&mut self, ticket: Ticket, board: &mut Board) -> Rollback {
        let Some(entry) = self.in_flight.remove(&ticket.seq) else {
            return Rollback::NotNeeded;
        };
        let current = self.is_current(ticket);
        self.forget_scope_if_current(ticket);

        let Some(checkpoint) = entry.checkpoint else {
            return Rollback::NotNeeded;
        };
        if !current {
            self.stale = true;
            return Rollback::Skipped;
        }

        match checkpoint {
            Checkpoint::Order(snapshot) => {
                board.restore_order(&snapshot);
                Rollback::Restored
            }
            Checkpoint::Placement(placement) => {
                if board.restore_placement(placement) {
                    Rollback::Restored
                } else {
                    self.stale = true;
                    Rollback::Skipped
                }
            }
        }
    }

    pub(crate) fn mark_stale(&mut self) {
        self.stale = true;
    }

    pub(crate) fn clear_stale(&mut self) {
        self.stale = false;
    }

    pub(crate) fn is_stale(&self) -> bool {
        self.stale
    }

    fn forget_scope_if_current(&mut self, ticket: Ticket) {
        if self.is_current(ticket) && !self.scope_in_flight(ticket.scope) {
            self.latest.remove(&ticket.scope);
        }
    }

    fn scope_in_flight(&self, scope: Scope) -> bool {
        self.in_flight.values().any(|entry| entry.scope == scope)
    }
}

#[cfg(test)]
mod tests {
    use super::{Checkpoint, MutationLedger, Rollback, Scope};
    use crate::placement::board::Board;

    #[test]
    fn newer_ticket_wins_the_scope() {
        let mut ledger = MutationLedger::new();
        let mut board = Board::new();
        let first = ledger.begin(Scope::KernelOrder, Some(Checkpoint::Order(Vec::new())));
        let second = ledger.begin(Scope::KernelOrder, Some(Checkpoint::Order(Vec::new())));

        assert!(!ledger.is_current(first));
        assert!(ledger.is_current(second));
        assert_eq!(ledger.roll_back(first, &mut board), Rollback::Skipped);
        assert!(ledger.is_stale());
        assert_eq!(ledger.roll_back(second, &mut board), Rollback::Restored);
        assert_eq!(ledger.in_flight_count(), 0);
    }

    #[test]
    fn refresh_is_blocked_while_mutations_are_in_flight() {
        let mut ledger = MutationLedger::new();
        let watermark = ledger.watermark();
        assert!(ledger.can_apply_refresh(watermark));

        let ticket = ledger.begin(Scope::Card(7), None);
        assert!(!ledger.can_apply_refresh(watermark));
        assert!(!ledger.can_apply_refresh(ledger.watermark()));

        ledger.confirm(ticket);
        assert!(!ledger.can_apply_refresh(watermark));
        assert!(ledger.can_apply_refresh(ledger.watermark()));
    }

    #[test]
    fn roll_back_without_checkpoint_is_not_needed() {
        let mut ledger = MutationLedger::new();
        let mut board = Board::new();
        let ticket = ledger.begin(Scope::Kernel(3), None);
        assert_eq!(ledger.roll_back(ticket, &mut board), Rollback::NotNeeded);
        assert!(!ledger.is_stale());
    }
}

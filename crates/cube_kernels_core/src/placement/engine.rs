//! Placement engine: optimistic card and kernel operations.
//!
//! # Responsibility
//! - Own the board and apply every user-level placement operation.
//! - Call the remote store and reconcile: refresh on success, roll back on
//!   failure.
//! - Discard late responses that would overwrite newer local state.
//!
//! # Invariants
//! - Validation failures never reach the remote store.
//! - The board lock is never held across an `.await`.
//! - A failed mutation leaves the board as it was before the mutation,
//!   unless a newer mutation on the same entity has been issued since.
//! - A refresh payload that breaks placement invariants is not applied.

use crate::gateway::{GatewayError, GatewayResult, RemoteStore, Resource};
use crate::model::card::CardId;
use crate::model::kernel::{CandidateCard, Kernel, KernelCard, KernelId};
use crate::placement::board::{validate_parts, Board, BoardViolation, CardLocation};
use crate::placement::drag::PlacementCommand;
use crate::placement::ledger::{Checkpoint, MutationLedger, Rollback, Scope, Ticket};
use log::{info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Result type used by placement operations.
pub type PlacementResult<T> = Result<T, PlacementError>;

/// Errors from placement operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementError {
    /// Kernel name is blank after trim.
    InvalidName,
    /// Requested order is not a permutation of the known kernels.
    InvalidOrder,
    /// Kernel is unknown locally or on the remote store.
    KernelNotFound(KernelId),
    /// Card is unknown locally or on the remote store.
    CardNotFound(CardId),
    /// Remote store could not be reached; local state was rolled back.
    Unavailable(String),
    /// Remote store refused the request; local state was rolled back.
    Rejected(String),
    /// Remote store answered with unusable data; nothing was applied.
    InvalidResponse(String),
}

impl Display for PlacementError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName => write!(f, "kernel name must not be blank"),
            Self::InvalidOrder => {
                write!(f, "kernel order must list every known kernel exactly once")
            }
            Self::KernelNotFound(id) => write!(f, "kernel not found: {id}"),
            Self::CardNotFound(id) => write!(f, "card not found: {id}"),
            Self::Unavailable(message) => write!(f, "remote store unavailable: {message}"),
            Self::Rejected(message) => write!(f, "remote store rejected request: {message}"),
            Self::InvalidResponse(message) => {
                write!(f, "invalid remote store response: {message}")
            }
        }
    }
}

impl Error for PlacementError {}

impl From<GatewayError> for PlacementError {
    fn from(value: GatewayError) -> Self {
        match value {
            GatewayError::Unavailable(message) => Self::Unavailable(message),
            GatewayError::NotFound {
                resource: Resource::Card,
                id,
            } => Self::CardNotFound(id),
            GatewayError::NotFound {
                resource: Resource::Kernel,
                id,
            } => Self::KernelNotFound(id),
            GatewayError::Rejected(message) => Self::Rejected(message),
            GatewayError::InvalidResponse(message) => Self::InvalidResponse(message),
        }
    }
}

impl From<BoardViolation> for PlacementError {
    fn from(value: BoardViolation) -> Self {
        Self::InvalidResponse(value.to_string())
    }
}

/// How a successful operation ended up reconciled with the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Authoritative state replaced the local board.
    Refreshed,
    /// The store accepted the change; the local board already reflects it.
    Confirmed,
    /// A newer operation was issued meanwhile; this result was discarded.
    Superseded,
    /// The change was accepted but the follow-up refresh failed; the board
    /// keeps the optimistic state and is flagged stale.
    RefreshFailed,
    /// Nothing needed to change.
    NoOp,
}

/// Direction for single-step kernel moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    fn offset(self) -> isize {
        match self {
            Self::Left => -1,
            Self::Right => 1,
        }
    }
}

/// What follows a confirmed mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Followup {
    Refresh,
    Confirm,
}

struct EngineState {
    board: Board,
    ledger: MutationLedger,
}

/// Owns the board and mediates every placement change.
pub struct PlacementEngine<S: RemoteStore> {
    store: S,
    state: Mutex<EngineState>,
}

impl<S: RemoteStore> PlacementEngine<S> {
    /// Creates an engine with an empty, not yet loaded board.
    pub fn new(store: S) -> Self {
        Self {
            store,
            state: Mutex::new(EngineState {
                board: Board::new(),
                ledger: MutationLedger::new(),
            }),
        }
    }

    /// Remote store this engine talks to.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Clone of the current board for rendering.
    pub fn board(&self) -> Board {
        self.lock().board.clone()
    }

    /// Whether a discarded or failed reconciliation left the board behind
    /// the remote store.
    pub fn is_stale(&self) -> bool {
        self.lock().ledger.is_stale()
    }

    /// Number of mutations still waiting for the remote store.
    pub fn in_flight(&self) -> usize {
        self.lock().ledger.in_flight_count()
    }

    /// Replaces the board with authoritative remote state.
    ///
    /// Returns `Superseded` without touching the board when a mutation was
    /// issued or is still in flight while the lists were being fetched.
    ///
    /// # Errors
    /// - `Unavailable` when either list call fails.
    /// - `InvalidResponse` when the payload breaks placement invariants.
    pub async fn refresh(&self) -> PlacementResult<Reconciliation> {
        let started_at = Instant::now();
        let watermark = self.lock().ledger.watermark();

        let fetched = self.fetch_lists().await;
        let (kernels, candidates) = match fetched {
            Ok(lists) => lists,
            Err(err) => {
                warn!(
                    "event=board_refresh module=placement status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err);
            }
        };

        let mut state = self.lock();
        if !state.ledger.can_apply_refresh(watermark) {
            state.ledger.mark_stale();
            info!(
                "event=board_refresh module=placement status=superseded duration_ms={}",
                started_at.elapsed().as_millis()
            );
            return Ok(Reconciliation::Superseded);
        }
        state.board.replace(kernels, candidates);
        state.ledger.clear_stale();
        info!(
            "event=board_refresh module=placement status=ok duration_ms={} kernels={} candidates={}",
            started_at.elapsed().as_millis(),
            state.board.kernels().len(),
            state.board.candidates().len()
        );
        Ok(Reconciliation::Refreshed)
    }

    /// Moves a card from the pool or another kernel into `kernel_id`.
    ///
    /// # Errors
    /// - `KernelNotFound` / `CardNotFound` for unknown ids (no remote call).
    /// - Remote failures after the optimistic move was rolled back.
    pub async fn move_to_kernel(
        &self,
        card_id: CardId,
        kernel_id: KernelId,
    ) -> PlacementResult<Reconciliation> {
        let started_at = Instant::now();
        let ticket = {
            let mut state = self.lock();
            if state.board.kernel(kernel_id).is_none() {
                return Err(PlacementError::KernelNotFound(kernel_id));
            }
            match state.board.location(card_id) {
                None => return Err(PlacementError::CardNotFound(card_id)),
                Some(CardLocation::Kernel(current)) if current == kernel_id => {
                    return Ok(Reconciliation::NoOp);
                }
                Some(_) => {}
            }

            let prior = state
                .board
                .take_card(card_id)
                .ok_or(PlacementError::CardNotFound(card_id))?;
            let card = prior.card().clone();
            state
                .board
                .push_member(kernel_id, KernelCard::provisional(card));
            state
                .ledger
                .begin(Scope::Card(card_id), Some(Checkpoint::Placement(prior)))
        };

        let result = self.store.move_to_kernel(card_id, kernel_id).await;
        let outcome = self.settle(ticket, result, Followup::Refresh).await;
        log_outcome("card_move", started_at, &outcome, card_id, kernel_id);
        outcome
    }

    /// Returns a kernel member to the candidate pool.
    ///
    /// A card that is not a member of any kernel is left alone.
    pub async fn return_to_candidates(&self, card_id: CardId) -> PlacementResult<Reconciliation> {
        let started_at = Instant::now();
        let (ticket, kernel_id) = {
            let mut state = self.lock();
            let Some(kernel_id) = state.board.owning_kernel(card_id) else {
                return Ok(Reconciliation::NoOp);
            };

            let prior = state
                .board
                .take_card(card_id)
                .ok_or(PlacementError::CardNotFound(card_id))?;
            let card = prior.card().clone();
            state.board.push_candidate(CandidateCard::provisional(card));
            let ticket = state
                .ledger
                .begin(Scope::Card(card_id), Some(Checkpoint::Placement(prior)));
            (ticket, kernel_id)
        };

        let result = self.store.remove_card(kernel_id, card_id).await;
        let outcome = self.settle(ticket, result, Followup::Refresh).await;
        log_outcome("card_return", started_at, &outcome, card_id, kernel_id);
        outcome
    }

    /// Applies a full kernel order locally, then persists it.
    ///
    /// # Errors
    /// - `InvalidOrder` when `ordered_ids` is not a permutation of the
    ///   current kernel ids (no remote call).
    /// - Remote failures after the previous order was restored.
    pub async fn reorder_kernels(
        &self,
        ordered_ids: &[KernelId],
    ) -> PlacementResult<Reconciliation> {
        let started_at = Instant::now();
        let ticket = {
            let mut state = self.lock();
            if !is_permutation(&state.board.kernel_ids(), ordered_ids) {
                return Err(PlacementError::InvalidOrder);
            }
            if ordered_ids.is_empty() {
                return Ok(Reconciliation::NoOp);
            }

            let snapshot = state.board.order_snapshot();
            state.board.apply_order(ordered_ids);
            state
                .ledger
                .begin(Scope::KernelOrder, Some(Checkpoint::Order(snapshot)))
        };

        let result = self.store.reorder_kernels(ordered_ids).await;
        let outcome = self.settle(ticket, result, Followup::Confirm).await;
        match &outcome {
            Ok(reconciliation) => info!(
                "event=kernel_reorder module=placement status=ok duration_ms={} kernels={} reconciliation={:?}",
                started_at.elapsed().as_millis(),
                ordered_ids.len(),
                reconciliation
            ),
            Err(err) => warn!(
                "event=kernel_reorder module=placement status=error duration_ms={} kernels={} error={}",
                started_at.elapsed().as_millis(),
                ordered_ids.len(),
                err
            ),
        }
        outcome
    }

    /// Swaps a kernel with its neighbour in `direction`.
    ///
    /// Does nothing when the kernel already sits at that boundary.
    pub async fn move_kernel(
        &self,
        kernel_id: KernelId,
        direction: Direction,
    ) -> PlacementResult<Reconciliation> {
        let ordered_ids = {
            let state = self.lock();
            let mut ids = state.board.kernel_ids();
            let current = state
                .board
                .kernel_index(kernel_id)
                .ok_or(PlacementError::KernelNotFound(kernel_id))?;
            let Some(target) = current
                .checked_add_signed(direction.offset())
                .filter(|target| *target < ids.len())
            else {
                return Ok(Reconciliation::NoOp);
            };
            ids.swap(current, target);
            ids
        };
        self.reorder_kernels(&ordered_ids).await
    }

    /// Creates a kernel and appends it to the board.
    ///
    /// # Errors
    /// - `InvalidName` for blank names (no remote call).
    pub async fn create_kernel(&self, name: &str) -> PlacementResult<Kernel> {
        let started_at = Instant::now();
        let name = normalize_kernel_name(name)?;
        let ticket = self.lock().ledger.begin(Scope::KernelSet, None);

        let result = self.store.create_kernel(&name).await;
        let mut state = self.lock();
        state.ledger.confirm(ticket);
        match result {
            Ok(kernel) => {
                state.board.push_kernel(kernel.clone());
                info!(
                    "event=kernel_create module=placement status=ok duration_ms={} kernel_id={}",
                    started_at.elapsed().as_millis(),
                    kernel.id
                );
                Ok(kernel)
            }
            Err(err) => {
                warn!(
                    "event=kernel_create module=placement status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err.into())
            }
        }
    }

    /// Renames a kernel once the remote store accepts the new name.
    ///
    /// If a newer rename or a delete of the same kernel was issued meanwhile,
    /// this one's name is not applied, the board is flagged stale and
    /// `Superseded` is returned.
    pub async fn rename_kernel(
        &self,
        kernel_id: KernelId,
        name: &str,
    ) -> PlacementResult<Reconciliation> {
        let started_at = Instant::now();
        let name = normalize_kernel_name(name)?;
        let ticket = {
            let mut state = self.lock();
            if state.board.kernel(kernel_id).is_none() {
                return Err(PlacementError::KernelNotFound(kernel_id));
            }
            state.ledger.begin(Scope::Kernel(kernel_id), None)
        };

        let result = self.store.update_kernel(kernel_id, &name).await;
        let mut state = self.lock();
        let current = state.ledger.is_current(ticket);
        state.ledger.confirm(ticket);
        let outcome = match result {
            Ok(updated) => {
                if current && state.board.rename_kernel(kernel_id, updated.name) {
                    Ok(Reconciliation::Confirmed)
                } else {
                    // The store holds a name the board did not take.
                    state.ledger.mark_stale();
                    Ok(Reconciliation::Superseded)
                }
            }
            Err(err) => {
                if matches!(err, GatewayError::NotFound { .. }) {
                    state.ledger.mark_stale();
                }
                Err(err.into())
            }
        };
        drop(state);
        log_kernel_outcome("kernel_rename", started_at, &outcome, kernel_id);
        outcome
    }

    /// Deletes a kernel; its members go back to the candidate pool.
    ///
    /// The members are returned locally right away, then the board is
    /// refreshed so the pool picks up the store's records and ordering.
    pub async fn delete_kernel(&self, kernel_id: KernelId) -> PlacementResult<Reconciliation> {
        let started_at = Instant::now();
        let ticket = {
            let mut state = self.lock();
            if state.board.kernel(kernel_id).is_none() {
                return Err(PlacementError::KernelNotFound(kernel_id));
            }
            state.ledger.begin(Scope::Kernel(kernel_id), None)
        };

        let result = self.store.delete_kernel(kernel_id).await;
        if result.is_ok() {
            let mut state = self.lock();
            if let Some(returned) = state.board.dissolve_kernel(kernel_id) {
                info!(
                    "event=kernel_delete module=placement status=applied kernel_id={} returned={}",
                    kernel_id, returned
                );
            }
        }
        let outcome = self.settle(ticket, result, Followup::Refresh).await;
        log_kernel_outcome("kernel_delete", started_at, &outcome, kernel_id);
        outcome
    }

    /// Marks a kernel as opened for detail viewing.
    pub fn open_kernel(&self, kernel_id: KernelId) -> PlacementResult<()> {
        let mut state = self.lock();
        if state.board.kernel(kernel_id).is_none() {
            return Err(PlacementError::KernelNotFound(kernel_id));
        }
        state.board.set_open_kernel(Some(kernel_id));
        Ok(())
    }

    pub fn close_kernel(&self) {
        self.lock().board.set_open_kernel(None);
    }

    pub fn open_kernel_id(&self) -> Option<KernelId> {
        self.lock().board.open_kernel_id()
    }

    /// Runs a command produced by the drag resolver.
    pub async fn dispatch(&self, command: PlacementCommand) -> PlacementResult<Reconciliation> {
        match command {
            PlacementCommand::MoveToKernel { card_id, kernel_id } => {
                self.move_to_kernel(card_id, kernel_id).await
            }
            PlacementCommand::ReturnToCandidates { card_id } => {
                self.return_to_candidates(card_id).await
            }
        }
    }

    async fn fetch_lists(&self) -> PlacementResult<(Vec<Kernel>, Vec<CandidateCard>)> {
        let kernels = self.store.list_kernels().await?;
        let candidates = self.store.list_candidates().await?;
        validate_parts(&kernels, &candidates)?;
        Ok((kernels, candidates))
    }

    /// Confirms or rolls back one mutation after its remote call returned.
    async fn settle(
        &self,
        ticket: Ticket,
        result: GatewayResult<()>,
        followup: Followup,
    ) -> PlacementResult<Reconciliation> {
        match result {
            Ok(()) => {
                let stale = {
                    let mut state = self.lock();
                    state.ledger.confirm(ticket);
                    state.ledger.is_stale()
                };
                if followup == Followup::Refresh || stale {
                    Ok(self.reconcile_after_success().await)
                } else {
                    Ok(Reconciliation::Confirmed)
                }
            }
            Err(err) => {
                let needs_refresh = {
                    let mut state = self.lock();
                    let EngineState { board, ledger } = &mut *state;
                    let rollback = ledger.roll_back(ticket, board);
                    if matches!(err, GatewayError::NotFound { .. }) {
                        ledger.mark_stale();
                    }
                    rollback == Rollback::Skipped || ledger.is_stale()
                };
                if needs_refresh {
                    if let Err(refresh_err) = self.refresh().await {
                        warn!(
                            "event=rollback_refresh module=placement status=error error={}",
                            refresh_err
                        );
                    }
                }
                Err(err.into())
            }
        }
    }

    async fn reconcile_after_success(&self) -> Reconciliation {
        match self.refresh().await {
            Ok(reconciliation) => reconciliation,
            Err(err) => {
                self.lock().ledger.mark_stale();
                warn!(
                    "event=reconcile_refresh module=placement status=error error={}",
                    err
                );
                Reconciliation::RefreshFailed
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn normalize_kernel_name(name: &str) -> PlacementResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(PlacementError::InvalidName);
    }
    Ok(trimmed.to_string())
}

fn is_permutation(current: &[KernelId], requested: &[KernelId]) -> bool {
    if current.len() != requested.len() {
        return false;
    }
    let known = current.iter().copied().collect::<HashSet<_>>();
    let mut seen = HashSet::new();
    requested
        .iter()
        .all(|id| known.contains(id) && seen.insert(*id))
}

fn log_outcome(
    event: &str,
    started_at: Instant,
    outcome: &PlacementResult<Reconciliation>,
    card_id: CardId,
    kernel_id: KernelId,
) {
    match outcome {
        Ok(reconciliation) => info!(
            "event={} module=placement status=ok duration_ms={} card_id={} kernel_id={} reconciliation={:?}",
            event,
            started_at.elapsed().as_millis(),
            card_id,
            kernel_id,
            reconciliation
        ),
        Err(err) => warn!(
            "event={} module=placement status=error duration_ms={} card_id={} kernel_id={} error={}",
            event,
            started_at.elapsed().as_millis(),
            card_id,
            kernel_id,
            err
        ),
    }
}

fn log_kernel_outcome(
    event: &str,
    started_at: Instant,
    outcome: &PlacementResult<Reconciliation>,
    kernel_id: KernelId,
) {
    match outcome {
        Ok(reconciliation) => info!(
            "event={} module=placement status=ok duration_ms={} kernel_id={} reconciliation={:?}",
            event,
            started_at.elapsed().as_millis(),
            kernel_id,
            reconciliation
        ),
        Err(err) => warn!(
            "event={} module=placement status=error duration_ms={} kernel_id={} error={}",
            event,
            started_at.elapsed().as_millis(),
            kernel_id,
            err
        ),
    }
}

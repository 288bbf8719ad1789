#![allow(dead_code)]

use async_trait::async_trait;
use cube_kernels_core::gateway::wire::{decode_candidates, decode_kernels};
use cube_kernels_core::{
    CandidateCard, Card, CardId, Fixture, FixtureKernel, GatewayError, GatewayResult,
    InMemoryRemoteStore, Kernel, KernelId, PlacementEngine, RemoteStore,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use uuid::Uuid;

/// One remote call as seen by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListCards,
    GetCard(CardId),
    ListKernels,
    ListCandidates,
    CreateKernel(String),
    UpdateKernel(KernelId, String),
    DeleteKernel(KernelId),
    AddCard(KernelId, CardId),
    RemoveCard(KernelId, CardId),
    ReorderKernels(Vec<KernelId>),
    MoveToKernel(CardId, KernelId),
}

impl Call {
    pub fn op(&self) -> &'static str {
        match self {
            Self::ListCards => "list_cards",
            Self::GetCard(_) => "get_card",
            Self::ListKernels => "list_kernels",
            Self::ListCandidates => "list_candidates",
            Self::CreateKernel(_) => "create_kernel",
            Self::UpdateKernel(..) => "update_kernel",
            Self::DeleteKernel(_) => "delete_kernel",
            Self::AddCard(..) => "add_card",
            Self::RemoveCard(..) => "remove_card",
            Self::ReorderKernels(_) => "reorder_kernels",
            Self::MoveToKernel(..) => "move_to_kernel",
        }
    }

    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            Self::ListCards | Self::GetCard(_) | Self::ListKernels | Self::ListCandidates
        )
    }
}

/// Releases a held call when sent or dropped.
pub struct Gate(oneshot::Sender<()>);

impl Gate {
    pub fn release(self) {
        let _ = self.0.send(());
    }
}

/// In-memory store with a call log, one-shot failures, and call gates.
///
/// A call records itself and claims the next queued gate and failure for its
/// op, waits on the gate, then either fails or reaches the inner store. A
/// response gate holds the reply after the inner store has applied the call.
/// Scripted list bodies are JSON and go through the wire decoders.
#[derive(Default)]
pub struct ScriptedStore {
    inner: InMemoryRemoteStore,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<HashMap<&'static str, Vec<GatewayError>>>,
    gates: Mutex<HashMap<&'static str, Vec<oneshot::Receiver<()>>>>,
    response_gates: Mutex<HashMap<&'static str, Vec<oneshot::Receiver<()>>>>,
    bodies: Mutex<HashMap<&'static str, Vec<String>>>,
}

impl ScriptedStore {
    pub fn new(inner: InMemoryRemoteStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn inner(&self) -> &InMemoryRemoteStore {
        &self.inner
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(Call::is_mutation)
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Queues a failure for the next call of `op`.
    pub fn fail_next(&self, op: &'static str, err: GatewayError) {
        self.failures.lock().unwrap().entry(op).or_default().push(err);
    }

    /// Holds the next call of `op` until the returned gate is released.
    pub fn hold_next(&self, op: &'static str) -> Gate {
        let (sender, receiver) = oneshot::channel();
        self.gates.lock().unwrap().entry(op).or_default().push(receiver);
        Gate(sender)
    }

    /// Lets the next call of `op` reach the store, then holds its reply.
    pub fn delay_response_next(&self, op: &'static str) -> Gate {
        let (sender, receiver) = oneshot::channel();
        self.response_gates
            .lock()
            .unwrap()
            .entry(op)
            .or_default()
            .push(receiver);
        Gate(sender)
    }

    /// Answers the next `list_kernels` or `list_candidates` with a JSON body.
    pub fn answer_next(&self, op: &'static str, body: impl Into<String>) {
        self.bodies
            .lock()
            .unwrap()
            .entry(op)
            .or_default()
            .push(body.into());
    }

    async fn enter(&self, call: Call) -> GatewayResult<&'static str> {
        let op = call.op();
        self.calls.lock().unwrap().push(call);

        let gate = take_first(&mut self.gates.lock().unwrap(), op);
        let failure = take_first(&mut self.failures.lock().unwrap(), op);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(op),
        }
    }

    async fn reply<T>(&self, op: &'static str, result: GatewayResult<T>) -> GatewayResult<T> {
        let gate = take_first(&mut self.response_gates.lock().unwrap(), op);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        result
    }

    fn scripted_body(&self, op: &'static str) -> Option<String> {
        take_first(&mut self.bodies.lock().unwrap(), op)
    }
}

fn take_first<T>(queues: &mut HashMap<&'static str, Vec<T>>, op: &'static str) -> Option<T> {
    let queue = queues.get_mut(op)?;
    if queue.is_empty() {
        None
    } else {
        Some(queue.remove(0))
    }
}

#[async_trait]
impl RemoteStore for ScriptedStore {
    async fn list_cards(&self) -> GatewayResult<Vec<Card>> {
        let op = self.enter(Call::ListCards).await?;
        self.reply(op, self.inner.list_cards().await).await
    }

    async fn get_card(&self, card_id: CardId) -> GatewayResult<Card> {
        let op = self.enter(Call::GetCard(card_id)).await?;
        self.reply(op, self.inner.get_card(card_id).await).await
    }

    async fn list_kernels(&self) -> GatewayResult<Vec<Kernel>> {
        let op = self.enter(Call::ListKernels).await?;
        let result = match self.scripted_body(op) {
            Some(body) => decode_kernels(&body),
            None => self.inner.list_kernels().await,
        };
        self.reply(op, result).await
    }

    async fn list_candidates(&self) -> GatewayResult<Vec<CandidateCard>> {
        let op = self.enter(Call::ListCandidates).await?;
        let result = match self.scripted_body(op) {
            Some(body) => decode_candidates(&body),
            None => self.inner.list_candidates().await,
        };
        self.reply(op, result).await
    }

    async fn create_kernel(&self, name: &str) -> GatewayResult<Kernel> {
        let op = self.enter(Call::CreateKernel(name.to_string())).await?;
        self.reply(op, self.inner.create_kernel(name).await).await
    }

    async fn update_kernel(&self, kernel_id: KernelId, name: &str) -> GatewayResult<Kernel> {
        let op = self
            .enter(Call::UpdateKernel(kernel_id, name.to_string()))
            .await?;
        self.reply(op, self.inner.update_kernel(kernel_id, name).await)
            .await
    }

    async fn delete_kernel(&self, kernel_id: KernelId) -> GatewayResult<()> {
        let op = self.enter(Call::DeleteKernel(kernel_id)).await?;
        self.reply(op, self.inner.delete_kernel(kernel_id).await).await
    }

    async fn add_card(&self, kernel_id: KernelId, card_id: CardId) -> GatewayResult<()> {
        let op = self.enter(Call::AddCard(kernel_id, card_id)).await?;
        self.reply(op, self.inner.add_card(kernel_id, card_id).await)
            .await
    }

    async fn remove_card(&self, kernel_id: KernelId, card_id: CardId) -> GatewayResult<()> {
        let op = self.enter(Call::RemoveCard(kernel_id, card_id)).await?;
        self.reply(op, self.inner.remove_card(kernel_id, card_id).await)
            .await
    }

    async fn reorder_kernels(&self, kernel_ids: &[KernelId]) -> GatewayResult<()> {
        let op = self.enter(Call::ReorderKernels(kernel_ids.to_vec())).await?;
        self.reply(op, self.inner.reorder_kernels(kernel_ids).await)
            .await
    }

    async fn move_to_kernel(&self, card_id: CardId, kernel_id: KernelId) -> GatewayResult<()> {
        let op = self.enter(Call::MoveToKernel(card_id, kernel_id)).await?;
        self.reply(op, self.inner.move_to_kernel(card_id, kernel_id).await)
            .await
    }
}

pub type TestEngine = PlacementEngine<Arc<ScriptedStore>>;

pub fn card(id: CardId) -> Card {
    Card::new(id, Uuid::new_v4(), format!("Card {id}"))
}

/// Fixture with cards `1..=card_count` and kernels `(name, members)`.
///
/// Kernel ids follow creation order starting at 1.
pub fn fixture(card_count: i64, kernels: &[(&str, &[CardId])]) -> Fixture {
    Fixture {
        cards: (1..=card_count).map(card).collect(),
        kernels: kernels
            .iter()
            .map(|(name, cards)| FixtureKernel {
                name: name.to_string(),
                cards: cards.to_vec(),
            })
            .collect(),
    }
}

/// Seeds a store, loads an engine from it, and clears the call log.
pub async fn loaded_engine(
    card_count: i64,
    kernels: &[(&str, &[CardId])],
) -> (TestEngine, Arc<ScriptedStore>) {
    let inner = InMemoryRemoteStore::new();
    fixture(card_count, kernels).seed(&inner).await.unwrap();
    let store = Arc::new(ScriptedStore::new(inner));
    let engine = PlacementEngine::new(Arc::clone(&store));
    engine.refresh().await.unwrap();
    store.clear_calls();
    (engine, store)
}

pub fn kernel_ids(engine: &TestEngine) -> Vec<KernelId> {
    engine.board().kernel_ids()
}

pub fn member_ids(engine: &TestEngine, kernel_id: KernelId) -> Vec<CardId> {
    engine
        .board()
        .kernel(kernel_id)
        .map(Kernel::card_ids)
        .unwrap_or_default()
}

pub fn candidate_ids(engine: &TestEngine) -> Vec<CardId> {
    let mut ids = engine
        .board()
        .candidates()
        .iter()
        .map(|candidate| candidate.card.id)
        .collect::<Vec<_>>();
    ids.sort_unstable();
    ids
}

/// Every card id appears exactly once across the pool and all kernels.
pub fn assert_single_location(engine: &TestEngine, card_count: i64) {
    let board = engine.board();
    board.validate().unwrap();
    let mut seen = board
        .candidates()
        .iter()
        .map(|candidate| candidate.card.id)
        .chain(
            board
                .kernels()
                .iter()
                .flat_map(|kernel| kernel.cards.iter().map(|member| member.card.id)),
        )
        .collect::<Vec<_>>();
    seen.sort_unstable();
    assert_eq!(seen, (1..=card_count).collect::<Vec<_>>());
}

/// Yields to sibling futures until `condition` holds.
pub async fn yield_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition was not reached");
}

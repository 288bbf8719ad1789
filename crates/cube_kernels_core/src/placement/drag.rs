//! Drag gesture interpretation.
//!
//! # Responsibility
//! - Track the dragged card for the drag preview.
//! - Turn a finished gesture into at most one placement command.
//!
//! # Invariants
//! - Ending a gesture always clears the preview, whatever the outcome.
//! - Classification is pure: it reads the board and never mutates it.
//! - Malformed or unrelated drops resolve to no command.

use crate::model::card::{Card, CardId};
use crate::model::kernel::KernelId;
use crate::placement::board::Board;
use serde::{Deserialize, Serialize};

/// Semantic type of a drop target element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropTargetKind {
    /// Kernel thumbnail in the kernel bank.
    Kernel,
    /// Opened kernel detail view.
    KernelModal,
    /// Unassigned pool.
    CandidateBank,
}

impl DropTargetKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "kernel" => Some(Self::Kernel),
            "kernel-modal" => Some(Self::KernelModal),
            "candidate-bank" => Some(Self::CandidateBank),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Kernel => "kernel",
            Self::KernelModal => "kernel-modal",
            Self::CandidateBank => "candidate-bank",
        }
    }
}

/// Kernel reference carried by a drop target; extra fields are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelRef {
    pub id: KernelId,
}

/// Payload of the element a card was released onto.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropTarget {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub kernel: Option<KernelRef>,
}

impl DropTarget {
    pub fn kernel(kernel_id: KernelId) -> Self {
        Self {
            kind: Some(DropTargetKind::Kernel.as_str().to_string()),
            kernel: Some(KernelRef { id: kernel_id }),
        }
    }

    pub fn kernel_modal(kernel_id: KernelId) -> Self {
        Self {
            kind: Some(DropTargetKind::KernelModal.as_str().to_string()),
            kernel: Some(KernelRef { id: kernel_id }),
        }
    }

    pub fn candidate_bank() -> Self {
        Self {
            kind: Some(DropTargetKind::CandidateBank.as_str().to_string()),
            kernel: None,
        }
    }

    pub fn target_kind(&self) -> Option<DropTargetKind> {
        self.kind.as_deref().and_then(DropTargetKind::parse)
    }
}

/// Payload of the dragged element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DragSource {
    #[serde(default)]
    pub card: Option<Card>,
}

/// Placement operation requested by a finished gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementCommand {
    MoveToKernel { card_id: CardId, kernel_id: KernelId },
    ReturnToCandidates { card_id: CardId },
}

/// Classifies a drop into at most one placement command.
///
/// Dropping on the pool only yields a command when the card is currently a
/// kernel member; the membership is found by scanning `board`.
pub fn resolve_drop(
    board: &Board,
    card_id: CardId,
    target: Option<&DropTarget>,
) -> Option<PlacementCommand> {
    let target = target?;
    match target.target_kind()? {
        DropTargetKind::Kernel | DropTargetKind::KernelModal => {
            let kernel = target.kernel?;
            Some(PlacementCommand::MoveToKernel {
                card_id,
                kernel_id: kernel.id,
            })
        }
        DropTargetKind::CandidateBank => board
            .owning_kernel(card_id)
            .map(|_| PlacementCommand::ReturnToCandidates { card_id }),
    }
}

/// One drag gesture: `idle -> dragging -> idle`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DragSession {
    active: Option<Card>,
}

impl DragSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters `dragging` when the source carries a card.
    pub fn start(&mut self, source: &DragSource) {
        if let Some(card) = &source.card {
            self.active = Some(card.clone());
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.active.is_some()
    }

    /// Card to render in the drag preview.
    pub fn preview(&self) -> Option<&Card> {
        self.active.as_ref()
    }

    /// Ends the gesture and returns the command to dispatch, if any.
    ///
    /// The preview is cleared before classification, so the command is
    /// always issued from the idle state.
    pub fn finish(&mut self, board: &Board, target: Option<&DropTarget>) -> Option<PlacementCommand> {
        let card = self.active.take()?;
        resolve_drop(board, card.id, target)
    }

    /// Abandons the gesture.
    pub fn cancel(&mut self) {
        self.active = None;
    }
}

//! Event types for turn processing notifications.
//!
//! The orchestrator reports what it is doing through these events so a host
//! can show progress and surface diagnostics without inspecting reports.
//! Tests use [`EventCollector`] to check event ordering.

use std::sync::{Arc, Mutex};

use crate::chat::TurnIndex;
use crate::edit::Diagnostic;
use crate::sheet::SheetUid;
use crate::turn::{SkipReason, TurnPhase};

/// Events emitted by the orchestrator while it processes turns.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    /// The orchestrator entered a new phase.
    PhaseChanged(PhaseChangedEvent),

    /// A call or action was dropped.
    Diagnostic(DiagnosticEvent),

    /// A turn's piece was written. Emitted once per processed turn.
    PiecePersisted(PiecePersistedEvent),

    /// A turn was not processed.
    TurnSkipped(TurnSkippedEvent),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhaseChangedEvent {
    /// Turn being processed, `None` when returning to idle.
    pub turn: Option<TurnIndex>,
    pub phase: TurnPhase,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticEvent {
    pub turn: TurnIndex,
    pub diagnostic: Diagnostic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PiecePersistedEvent {
    pub turn: TurnIndex,
    /// Sheets whose state differs from the previous piece.
    pub touched: Vec<SheetUid>,
    /// Whether the turn's piece differs from what it held before.
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnSkippedEvent {
    pub turn: TurnIndex,
    pub reason: SkipReason,
}

/// Callback type for receiving turn events.
pub type EventCallback = Box<dyn FnMut(TurnEvent) + Send>;

/// Simple event collector for testing.
#[derive(Debug, Default)]
pub struct EventCollector {
    events: Vec<TurnEvent>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// A collector behind a lock, and a callback feeding it.
    pub fn shared() -> (Arc<Mutex<EventCollector>>, EventCallback) {
        let collector = Arc::new(Mutex::new(EventCollector::new()));
        let sink = Arc::clone(&collector);
        let callback: EventCallback = Box::new(move |event| {
            if let Ok(mut c) = sink.lock() {
                c.push(event);
            }
        });
        (collector, callback)
    }

    pub fn push(&mut self, event: TurnEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[TurnEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Phases entered, in order.
    pub fn phases(&self) -> Vec<TurnPhase> {
        self.events
            .iter()
            .filter_map(|e| match e {
                TurnEvent::PhaseChanged(p) => Some(p.phase),
                _ => None,
            })
            .collect()
    }

    /// Filter to only Diagnostic events.
    pub fn diagnostics(&self) -> Vec<&DiagnosticEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                TurnEvent::Diagnostic(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    /// Filter to only PiecePersisted events.
    pub fn persisted(&self) -> Vec<&PiecePersistedEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                TurnEvent::PiecePersisted(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn skipped(&self) -> Vec<&TurnSkippedEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                TurnEvent::TurnSkipped(s) => Some(s),
                _ => None,
            })
            .collect()
    }
}

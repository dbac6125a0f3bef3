//! Per-turn edit processing.
//!
//! The [`Orchestrator`] runs one turn at a time through
//! `Detecting -> Extracting -> Parsing -> Scheduling -> Executing -> Persisting`
//! and back to `Idle`. Editing a turn that is not the latest one replays every
//! later AI turn in order, each against the state its predecessor produced.

use serde::Serialize;

use crate::book::SheetBook;
use crate::chat::{ChatStore, TurnIndex};
use crate::edit::{
    build_actions, execute, extract_edit_spans, parse_calls, schedule, strip_comment_markers,
    Diagnostic, EditAction,
};
use crate::error::EngineError;
use crate::events::{
    DiagnosticEvent, EventCallback, PhaseChangedEvent, PiecePersistedEvent, TurnEvent,
    TurnSkippedEvent,
};
use crate::rebuild::RebuildPlan;
use crate::sheet::SheetUid;
use crate::snapshot::Piece;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    Idle,
    Detecting,
    Extracting,
    Parsing,
    Scheduling,
    Executing,
    Persisting,
    /// Re-running a later turn after an earlier one changed.
    ReplayForHistoricalTurn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Table processing is switched off.
    Disabled,
    /// AI writes to tables are switched off.
    WriteDisabled,
    /// Edits are applied by a separate summarisation pass, not inline.
    StepByStep,
    UserTurn,
    /// Edit text identical to the last processed text.
    Unchanged,
}

/// Switches that gate edit processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditOptions {
    pub enabled: bool,
    /// Name of the tag delimiting the edit region.
    pub edit_tag: String,
    pub write_enabled: bool,
    /// Apply edits as messages arrive. Off in step-by-step mode.
    pub inline_edits: bool,
}

impl Default for EditOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            edit_tag: "tableEdit".to_string(),
            write_enabled: true,
            inline_edits: true,
        }
    }
}

/// Notifications from the host conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatEvent {
    MessageReceived(TurnIndex),
    MessageEdited(TurnIndex),
    MessageSwiped(TurnIndex),
    MessageDeleted,
    ChatChanged,
}

/// Outcome of processing one turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TurnReport {
    pub turn: TurnIndex,
    /// The turn's piece differs from what it held before processing.
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<SkipReason>,
    /// Actions scheduled.
    pub actions: usize,
    /// Actions that executed.
    pub applied: usize,
    /// Sheets whose state differs from the previous piece.
    pub touched: Vec<SheetUid>,
    pub diagnostics: Vec<Diagnostic>,
    /// Later turns re-run because this one changed history.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub replayed: Vec<TurnReport>,
}

impl TurnReport {
    fn skipped(turn: TurnIndex, reason: SkipReason) -> Self {
        Self { turn, skipped: Some(reason), ..Default::default() }
    }

    /// True if this turn or any replayed turn changed.
    pub fn any_change(&self) -> bool {
        self.changed || self.replayed.iter().any(TurnReport::any_change)
    }
}

/// State of one turn's processing. Built when the turn starts, dropped when
/// it ends.
struct TurnContext {
    turn: TurnIndex,
    sheets: Vec<SheetUid>,
    previous: Option<Piece>,
    diagnostics: Vec<Diagnostic>,
    actions: usize,
    applied: usize,
}

pub struct Orchestrator {
    options: EditOptions,
    phase: TurnPhase,
    on_event: Option<EventCallback>,
}

impl Orchestrator {
    pub fn new(options: EditOptions) -> Self {
        Self { options, phase: TurnPhase::Idle, on_event: None }
    }

    pub fn with_event_callback(mut self, callback: EventCallback) -> Self {
        self.on_event = Some(callback);
        self
    }

    pub fn set_event_callback(&mut self, callback: Option<EventCallback>) {
        self.on_event = callback;
    }

    pub fn options(&self) -> &EditOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut EditOptions {
        &mut self.options
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    fn emit(&mut self, event: TurnEvent) {
        if let Some(callback) = self.on_event.as_mut() {
            callback(event);
        }
    }

    fn set_phase(&mut self, turn: Option<TurnIndex>, phase: TurnPhase) {
        self.phase = phase;
        log::debug!("turn {:?}: {:?}", turn, phase);
        self.emit(TurnEvent::PhaseChanged(PhaseChangedEvent { turn, phase }));
    }

    fn skip(&mut self, turn: TurnIndex, reason: SkipReason) -> TurnReport {
        log::debug!("turn {} skipped: {:?}", turn, reason);
        self.emit(TurnEvent::TurnSkipped(TurnSkippedEvent { turn, reason }));
        TurnReport::skipped(turn, reason)
    }

    fn diagnose(&mut self, ctx: &mut TurnContext, diagnostic: Diagnostic) {
        log::warn!("turn {}: {}", ctx.turn, diagnostic);
        self.emit(TurnEvent::Diagnostic(DiagnosticEvent {
            turn: ctx.turn,
            diagnostic: diagnostic.clone(),
        }));
        ctx.diagnostics.push(diagnostic);
    }

    /// Dispatch a host notification, honouring the edit options. Returns
    /// `None` when the event does not process a turn.
    pub fn handle<C: ChatStore + ?Sized>(
        &mut self,
        book: &mut SheetBook,
        chat: &mut C,
        event: ChatEvent,
    ) -> Result<Option<TurnReport>, EngineError> {
        if !self.options.enabled {
            log::debug!("ignoring {:?}: table processing disabled", event);
            let turn = match event {
                ChatEvent::MessageReceived(t) | ChatEvent::MessageEdited(t) | ChatEvent::MessageSwiped(t) => Some(t),
                ChatEvent::MessageDeleted | ChatEvent::ChatChanged => None,
            };
            return Ok(turn.map(|t| self.skip(t, SkipReason::Disabled)));
        }

        match event {
            ChatEvent::MessageReceived(turn) | ChatEvent::MessageSwiped(turn) => {
                if !self.options.inline_edits && matches!(event, ChatEvent::MessageReceived(_)) {
                    return Ok(Some(self.skip(turn, SkipReason::StepByStep)));
                }
                if !self.options.write_enabled {
                    return Ok(Some(self.skip(turn, SkipReason::WriteDisabled)));
                }
                self.apply_message(book, chat, turn, false).map(Some)
            }
            ChatEvent::MessageEdited(turn) => {
                if !self.options.inline_edits {
                    return Ok(Some(self.skip(turn, SkipReason::StepByStep)));
                }
                if !self.options.write_enabled {
                    return Ok(Some(self.skip(turn, SkipReason::WriteDisabled)));
                }
                self.apply_message(book, chat, turn, false).map(Some)
            }
            ChatEvent::MessageDeleted | ChatEvent::ChatChanged => self.chat_changed(book, chat),
        }
    }

    /// Process the edit text of `turn`. Unless `ignore_check` is set, a turn
    /// whose edit text is byte-identical to the last processed text is
    /// skipped. When `turn` is not the latest turn, every later AI turn is
    /// replayed afterwards.
    pub fn apply_message<C: ChatStore + ?Sized>(
        &mut self,
        book: &mut SheetBook,
        chat: &mut C,
        turn: TurnIndex,
        ignore_check: bool,
    ) -> Result<TurnReport, EngineError> {
        let len = chat.turn_count();
        if turn >= len {
            return Err(EngineError::TurnOutOfRange { turn, len });
        }

        let result = self.apply_with_replay(book, chat, turn, ignore_check);
        self.set_phase(None, TurnPhase::Idle);
        result
    }

    fn apply_with_replay<C: ChatStore + ?Sized>(
        &mut self,
        book: &mut SheetBook,
        chat: &mut C,
        turn: TurnIndex,
        ignore_check: bool,
    ) -> Result<TurnReport, EngineError> {
        let mut report = self.process_turn(book, chat, turn, ignore_check)?;
        if report.skipped.is_some() {
            return Ok(report);
        }

        for later in chat.later_ai_turns(turn) {
            self.set_phase(Some(later), TurnPhase::ReplayForHistoricalTurn);
            let replayed = self.process_turn(book, chat, later, true)?;
            report.replayed.push(replayed);
        }
        if !report.replayed.is_empty() {
            log::info!("turn {} replayed {} later turns", turn, report.replayed.len());
        }
        Ok(report)
    }

    /// Run the pipeline for a single turn.
    fn process_turn<C: ChatStore + ?Sized>(
        &mut self,
        book: &mut SheetBook,
        chat: &mut C,
        turn: TurnIndex,
        ignore_check: bool,
    ) -> Result<TurnReport, EngineError> {
        let len = chat.turn_count();
        self.set_phase(Some(turn), TurnPhase::Detecting);
        let record = chat.turn(turn).ok_or(EngineError::TurnOutOfRange { turn, len })?;
        if record.is_user {
            return Ok(self.skip(turn, SkipReason::UserTurn));
        }

        self.set_phase(Some(turn), TurnPhase::Extracting);
        let spans = extract_edit_spans(&record.text, &self.options.edit_tag);
        let unchanged = record
            .edit_record
            .as_ref()
            .is_some_and(|prev| prev.concat() == spans.concat());
        if unchanged && !ignore_check {
            return Ok(self.skip(turn, SkipReason::Unchanged));
        }

        let previous = chat
            .previous_piece_index(turn)
            .and_then(|i| chat.turn(i))
            .and_then(|t| t.piece.clone());
        let mut ctx = TurnContext {
            turn,
            sheets: Vec::new(),
            previous,
            diagnostics: Vec::new(),
            actions: 0,
            applied: 0,
        };

        let actions = self.parse_spans(&mut ctx, &spans);

        // Resolve the enabled-sheet list before anything is written.
        ctx.sheets = book.load_enabled(ctx.previous.as_ref());
        if ctx.sheets.is_empty() {
            return Err(EngineError::NoEnabledSheets { turn });
        }
        if let Some(record) = chat.turn_mut(turn) {
            record.edit_record = Some(spans);
        }

        self.execute_actions(book, &mut ctx, &actions);
        self.persist(book, chat, ctx)
    }

    /// Parse, build and schedule the calls in a turn's spans.
    fn parse_spans(&mut self, ctx: &mut TurnContext, spans: &[String]) -> Vec<EditAction> {
        self.set_phase(Some(ctx.turn), TurnPhase::Parsing);
        let mut calls = Vec::new();
        let mut markers_missing = false;
        let mut base = 0;
        for span in spans {
            let (inner, wrapped) = strip_comment_markers(span);
            markers_missing |= !wrapped;
            let lead = (inner.as_ptr() as usize).saturating_sub(span.as_ptr() as usize);
            let (mut found, diagnostics) = parse_calls(inner, base + lead);
            calls.append(&mut found);
            for diagnostic in diagnostics {
                self.diagnose(ctx, diagnostic);
            }
            base += span.len();
        }
        if markers_missing {
            self.diagnose(ctx, Diagnostic::MissingCommentMarkers);
        }

        let (actions, diagnostics) = build_actions(&calls);
        for diagnostic in diagnostics {
            self.diagnose(ctx, diagnostic);
        }

        self.set_phase(Some(ctx.turn), TurnPhase::Scheduling);
        let actions = schedule(actions);
        ctx.actions = actions.len();
        actions
    }

    fn execute_actions(&mut self, book: &mut SheetBook, ctx: &mut TurnContext, actions: &[EditAction]) {
        self.set_phase(Some(ctx.turn), TurnPhase::Executing);
        for action in actions {
            match execute(book, &ctx.sheets, action) {
                Ok(applied) => {
                    log::debug!("turn {}: {} row {} on {}", ctx.turn, applied.op, applied.row.0, applied.sheet);
                    ctx.applied += 1;
                }
                Err(diagnostic) => self.diagnose(ctx, diagnostic),
            }
        }
    }

    /// Store every enabled sheet's working grid into the turn's piece and
    /// save the chat.
    fn persist<C: ChatStore + ?Sized>(
        &mut self,
        book: &mut SheetBook,
        chat: &mut C,
        ctx: TurnContext,
    ) -> Result<TurnReport, EngineError> {
        let turn = ctx.turn;
        self.set_phase(Some(turn), TurnPhase::Persisting);

        let piece = book.persist_all(&ctx.sheets);
        let touched: Vec<SheetUid> = ctx
            .sheets
            .iter()
            .copied()
            .filter(|&uid| piece.get(uid) != book.state_of(ctx.previous.as_ref(), uid))
            .collect();

        let len = chat.turn_count();
        let record = chat.turn_mut(turn).ok_or(EngineError::TurnOutOfRange { turn, len })?;
        let changed = record.piece.as_ref() != Some(&piece);
        record.piece = Some(piece);
        chat.save(book)?;

        log::info!(
            "turn {}: {}/{} actions applied, {} sheets touched",
            turn,
            ctx.applied,
            ctx.actions,
            touched.len()
        );
        self.emit(TurnEvent::PiecePersisted(PiecePersistedEvent {
            turn,
            touched: touched.clone(),
            changed,
        }));

        Ok(TurnReport {
            turn,
            changed,
            skipped: None,
            actions: ctx.actions,
            applied: ctx.applied,
            touched,
            diagnostics: ctx.diagnostics,
            replayed: Vec::new(),
        })
    }

    /// Apply already-extracted edit spans to the live sheets and store the
    /// result in the latest AI turn's piece.
    pub fn apply_calls<C: ChatStore + ?Sized>(
        &mut self,
        book: &mut SheetBook,
        chat: &mut C,
        spans: &[String],
    ) -> Result<TurnReport, EngineError> {
        let result = self.apply_calls_inner(book, chat, spans);
        self.set_phase(None, TurnPhase::Idle);
        result
    }

    fn apply_calls_inner<C: ChatStore + ?Sized>(
        &mut self,
        book: &mut SheetBook,
        chat: &mut C,
        spans: &[String],
    ) -> Result<TurnReport, EngineError> {
        let len = chat.turn_count();
        let turn = chat
            .latest_ai_index()
            .ok_or(EngineError::TurnOutOfRange { turn: len, len })?;
        self.set_phase(Some(turn), TurnPhase::Detecting);

        let previous = chat.turn(turn).and_then(|t| t.piece.clone());
        let mut ctx = TurnContext {
            turn,
            sheets: Vec::new(),
            previous,
            diagnostics: Vec::new(),
            actions: 0,
            applied: 0,
        };
        let actions = self.parse_spans(&mut ctx, spans);

        ctx.sheets = book.begin_batch();
        if ctx.sheets.is_empty() {
            return Err(EngineError::NoEnabledSheets { turn });
        }
        self.execute_actions(book, &mut ctx, &actions);
        self.persist(book, chat, ctx)
    }

    /// Re-run the `depth`-th most recent piece-bearing turn (0 is the
    /// latest) against its previous state, leaving the live sheets at that
    /// turn's state. Returns `None` when no such turn exists.
    pub fn undo<C: ChatStore + ?Sized>(
        &mut self,
        book: &mut SheetBook,
        chat: &mut C,
        depth: usize,
    ) -> Result<Option<TurnReport>, EngineError> {
        let Some(turn) = chat.nth_latest_piece_index(depth) else {
            log::info!("nothing to undo at depth {}", depth);
            return Ok(None);
        };
        let result = self.process_turn(book, chat, turn, true);
        self.set_phase(None, TurnPhase::Idle);
        result.map(Some)
    }

    /// Store the live working grids of every enabled sheet into the latest
    /// AI turn's piece.
    pub fn persist_live<C: ChatStore + ?Sized>(
        &mut self,
        book: &mut SheetBook,
        chat: &mut C,
    ) -> Result<TurnReport, EngineError> {
        let len = chat.turn_count();
        let turn = chat
            .latest_ai_index()
            .ok_or(EngineError::TurnOutOfRange { turn: len, len })?;
        let sheets = book.enabled_uids();
        if sheets.is_empty() {
            return Err(EngineError::NoEnabledSheets { turn });
        }
        let previous = chat.turn(turn).and_then(|t| t.piece.clone());
        let ctx = TurnContext { turn, sheets, previous, diagnostics: Vec::new(), actions: 0, applied: 0 };
        let result = self.persist(book, chat, ctx);
        self.set_phase(None, TurnPhase::Idle);
        result
    }

    /// Apply a staged rebuild to the live sheets and persist it into the
    /// latest AI turn. Every table is resolved before any sheet is written.
    pub fn commit_rebuild<C: ChatStore + ?Sized>(
        &mut self,
        book: &mut SheetBook,
        chat: &mut C,
        plan: RebuildPlan,
    ) -> Result<TurnReport, EngineError> {
        let len = chat.turn_count();
        let turn = chat
            .latest_ai_index()
            .ok_or(EngineError::TurnOutOfRange { turn: len, len })?;
        let current = chat.turn(turn).and_then(|t| t.piece.clone());
        let sheets = book.load_enabled(current.as_ref());
        if sheets.is_empty() {
            return Err(EngineError::NoEnabledSheets { turn });
        }

        let resolved = plan.resolve(book, &sheets)?;
        for (uid, table) in resolved {
            if let Some(sheet) = book.sheet_mut(uid) {
                let headers = (!table.columns.is_empty()).then_some(table.columns.as_slice());
                sheet.rebuild_from_values(headers, &table.rows);
                let removed = sheet.clear_empty_rows();
                log::info!("rebuilt {} ({} rows, {} empty dropped)", sheet.name, sheet.data_row_count(), removed);
            }
        }
        self.persist_live(book, chat)
    }

    /// Resync the live sheets with the latest piece. A chat whose latest
    /// piece holds no data rows is re-seeded with base states.
    fn chat_changed<C: ChatStore + ?Sized>(
        &mut self,
        book: &mut SheetBook,
        chat: &mut C,
    ) -> Result<Option<TurnReport>, EngineError> {
        let latest = chat.latest_piece_index().and_then(|i| chat.turn(i)).and_then(|t| t.piece.clone());
        let empty = book.views_at(latest.as_ref()).iter().all(|v| v.data_row_count() == 0);
        book.load_enabled(latest.as_ref());

        if !empty || chat.latest_ai_index().is_none() {
            return Ok(None);
        }
        if latest.as_ref() == Some(&book.base_piece()) {
            return Ok(None);
        }
        log::info!("chat has no table data; seeding base states");
        book.load_enabled(None);
        self.persist_live(book, chat).map(Some)
    }
}

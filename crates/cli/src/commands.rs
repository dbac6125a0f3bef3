// Command implementations

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use sheetmem_config::Settings;
use sheetmem_engine::edit::{
    build_actions, extract_edit_spans, parse_calls, render_edit_region, replace_edit_region, schedule,
    strip_comment_markers, Diagnostic,
};
use sheetmem_engine::legacy::{convert_legacy_tables, LegacyTable};
use sheetmem_engine::macros::resolve_table_macros;
use sheetmem_engine::prompt::{injection_position, render_tables, TableParts};
use sheetmem_engine::rebuild::RebuildPlan;
use sheetmem_engine::turn::SkipReason;
use sheetmem_engine::{
    ChatEvent, ChatStore, EngineError, Orchestrator, Piece, SheetBook, TurnIndex, TurnReport,
};
use sheetmem_io::export::{export_tables, list_tables};
use sheetmem_io::{ChatFile, ChatFileError};

use crate::exit_codes::EXIT_DIAGNOSTICS;
use crate::CliError;

// ============================================================================
// helpers
// ============================================================================

fn load_settings(config: Option<&Path>) -> Result<Settings, CliError> {
    match config {
        Some(path) => Settings::load_from(path).map_err(|e| CliError::config(e.to_string())),
        None => Ok(Settings::load()),
    }
}

fn open_chat(path: &Path) -> Result<(ChatFile, SheetBook), CliError> {
    ChatFile::open(path).map_err(|e| match &e {
        ChatFileError::Io { .. } => {
            CliError::io(e.to_string()).with_hint("create the chat with `smem init <chat>`")
        }
        ChatFileError::Json { .. } | ChatFileError::Version { .. } => CliError::parse(e.to_string()),
    })
}

fn write_chat(chat: &ChatFile, book: &SheetBook) -> Result<(), CliError> {
    chat.write(book).map_err(|e| CliError::io(e.to_string()))
}

fn read_input(path: &Path) -> Result<String, CliError> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .map_err(|e| CliError::io(format!("stdin: {}", e)))?;
        return Ok(text);
    }
    fs::read_to_string(path).map_err(|e| CliError::io(format!("{}: {}", path.display(), e)))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| CliError::other(e.to_string()))?;
    println!("{}", json);
    Ok(())
}

fn latest_ai(chat: &ChatFile) -> Result<TurnIndex, CliError> {
    let len = chat.turn_count();
    chat.latest_ai_index()
        .ok_or(CliError::engine(EngineError::TurnOutOfRange { turn: len, len }))
}

/// Piece in effect at `turn`: the nearest piece-bearing turn at or before it.
fn piece_at(chat: &ChatFile, turn: Option<TurnIndex>) -> Result<Option<Piece>, CliError> {
    let len = chat.turn_count();
    let index = match turn {
        Some(t) if t >= len => return Err(CliError::engine(EngineError::TurnOutOfRange { turn: t, len })),
        Some(t) => chat.previous_piece_index(t + 1),
        None => chat.latest_piece_index(),
    };
    Ok(index.and_then(|i| chat.turn(i)).and_then(|t| t.piece.clone()))
}

fn skip_label(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::Disabled => "table processing disabled",
        SkipReason::WriteDisabled => "table writes disabled",
        SkipReason::StepByStep => "step-by-step mode",
        SkipReason::UserTurn => "user turn",
        SkipReason::Unchanged => "edit text unchanged",
    }
}

fn print_report(report: &TurnReport, json: bool) -> Result<(), CliError> {
    if json {
        return print_json(report);
    }
    print_report_text(report, "");
    Ok(())
}

fn print_report_text(report: &TurnReport, indent: &str) {
    if let Some(reason) = report.skipped {
        println!("{}turn {}: skipped ({})", indent, report.turn, skip_label(reason));
        return;
    }
    println!(
        "{}turn {}: {}/{} actions applied, {} table(s) changed{}",
        indent,
        report.turn,
        report.applied,
        report.actions,
        report.touched.len(),
        if report.changed { "" } else { " (no new state)" }
    );
    for diagnostic in &report.diagnostics {
        println!("{}  warning: {}", indent, diagnostic);
    }
    for replayed in &report.replayed {
        print_report_text(replayed, "  replayed ");
    }
}

// ============================================================================
// init
// ============================================================================

pub fn cmd_init(config: Option<&Path>, path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::args(format!("{} already exists", path.display()))
            .with_hint("pass --force to overwrite"));
    }
    let settings = load_settings(config)?;
    let book = SheetBook::from_templates(&settings.tables);
    write_chat(&ChatFile::create(path), &book)?;
    println!("created {} with {} table(s)", path.display(), book.len());
    Ok(())
}

// ============================================================================
// append / apply / replay / undo
// ============================================================================

pub fn cmd_append(
    config: Option<&Path>,
    path: &Path,
    text: Option<String>,
    file: Option<PathBuf>,
    user: bool,
    json: bool,
) -> Result<(), CliError> {
    let text = match (text, file) {
        (Some(text), _) => text,
        (None, Some(file)) => read_input(&file)?,
        (None, None) => return Err(CliError::args("either --text or --file is required")),
    };
    let settings = load_settings(config)?;
    let (mut chat, mut book) = open_chat(path)?;

    if user {
        let turn = chat.push_user(text);
        write_chat(&chat, &book)?;
        if json {
            return print_json(&serde_json::json!({ "turn": turn, "user": true }));
        }
        println!("turn {}: user message appended", turn);
        return Ok(());
    }

    let turn = chat.push_ai(text);
    let mut orch = Orchestrator::new(settings.edit_options());
    let result = orch.handle(&mut book, &mut chat, ChatEvent::MessageReceived(turn));
    // The message is kept even when processing skipped or failed the turn.
    write_chat(&chat, &book)?;
    match result? {
        Some(report) => print_report(&report, json),
        None => Ok(()),
    }
}

pub fn cmd_apply(
    config: Option<&Path>,
    path: &Path,
    turn: Option<usize>,
    force: bool,
    json: bool,
) -> Result<(), CliError> {
    let settings = load_settings(config)?;
    let (mut chat, mut book) = open_chat(path)?;
    let turn = match turn {
        Some(t) => t,
        None => latest_ai(&chat)?,
    };
    let mut orch = Orchestrator::new(settings.edit_options());
    let report = orch.apply_message(&mut book, &mut chat, turn, force)?;
    print_report(&report, json)
}

pub fn cmd_replay(config: Option<&Path>, path: &Path, json: bool) -> Result<(), CliError> {
    let settings = load_settings(config)?;
    let (mut chat, mut book) = open_chat(path)?;
    let len = chat.turn_count();
    let first = (0..len)
        .find(|&i| chat.turn(i).is_some_and(|t| !t.is_user))
        .ok_or(CliError::engine(EngineError::TurnOutOfRange { turn: 0, len }))?;

    let mut orch = Orchestrator::new(settings.edit_options());
    let report = orch.apply_message(&mut book, &mut chat, first, true)?;
    print_report(&report, json)
}

pub fn cmd_undo(config: Option<&Path>, path: &Path, depth: usize, json: bool) -> Result<(), CliError> {
    let settings = load_settings(config)?;
    let (mut chat, mut book) = open_chat(path)?;
    let mut orch = Orchestrator::new(settings.edit_options());
    match orch.undo(&mut book, &mut chat, depth)? {
        Some(report) => print_report(&report, json),
        None => Err(CliError::args(format!("nothing to undo at depth {}", depth))),
    }
}

// ============================================================================
// show / export / resolve
// ============================================================================

pub fn cmd_show(
    config: Option<&Path>,
    path: &Path,
    turn: Option<usize>,
    pure: bool,
    context: bool,
    json: bool,
) -> Result<(), CliError> {
    let settings = load_settings(config)?;
    let (chat, book) = open_chat(path)?;
    let piece = piece_at(&chat, turn)?;

    let text = if settings.ai_read_table {
        let parts = if pure { TableParts::pure_data() } else { TableParts::full() };
        render_tables(&book, piece.as_ref(), parts)
    } else {
        log::info!("table reading is disabled; no tables are sent to the model");
        String::new()
    };

    if json {
        if !settings.ai_read_table {
            return print_json(&Vec::<serde_json::Value>::new());
        }
        return print_json(&list_tables(&book, piece.as_ref()));
    }
    if context {
        print_context(&chat, turn, settings.injection_depth, &text);
        return Ok(());
    }
    if text.is_empty() {
        println!("{}", if settings.ai_read_table { "(no tables)" } else { "(table reading disabled)" });
    } else {
        println!("{}", text);
    }
    Ok(())
}

/// Print the turns up to `turn` with the table block placed `depth`
/// messages from the end.
fn print_context(chat: &ChatFile, turn: Option<TurnIndex>, depth: usize, tables: &str) {
    let shown = turn.map_or(chat.turn_count(), |t| t + 1).min(chat.turn_count());
    let at = injection_position(shown, depth);
    for (index, record) in chat.turns.iter().take(shown).enumerate() {
        if index == at && !tables.is_empty() {
            println!("[tables]\n{}", tables);
        }
        println!("[{}:{}] {}", index, if record.is_user { "user" } else { "ai" }, record.text);
    }
    if at == shown && !tables.is_empty() {
        println!("[tables]\n{}", tables);
    }
}

pub fn cmd_export(path: &Path, list: bool, output: Option<PathBuf>) -> Result<(), CliError> {
    let (chat, book) = open_chat(path)?;
    let piece = piece_at(&chat, None)?;
    let json = if list {
        serde_json::to_string_pretty(&list_tables(&book, piece.as_ref()))
    } else {
        serde_json::to_string_pretty(&export_tables(&book, piece.as_ref()))
    }
    .map_err(|e| CliError::other(e.to_string()))?;

    match output {
        Some(out) => fs::write(&out, json).map_err(|e| CliError::io(format!("{}: {}", out.display(), e))),
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{}", json).map_err(|e| CliError::io(e.to_string()))
        }
    }
}

/// Lookups read the live tables as last saved, which after `undo` is the
/// restored state rather than the latest turn's.
pub fn cmd_resolve(path: &Path, text: &str) -> Result<(), CliError> {
    let (_chat, book) = open_chat(path)?;
    println!("{}", resolve_table_macros(text, &book));
    Ok(())
}

// ============================================================================
// check
// ============================================================================

#[derive(Serialize)]
struct CheckOutput {
    regions: usize,
    actions: Vec<String>,
    diagnostics: Vec<Diagnostic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rewritten: Option<String>,
}

pub fn cmd_check(
    config: Option<&Path>,
    file: &Path,
    strict: bool,
    rewrite: bool,
    json: bool,
) -> Result<(), CliError> {
    let settings = load_settings(config)?;
    let text = read_input(file)?;

    // A file without an edit region is treated as bare call text.
    let spans = extract_edit_spans(&text, &settings.edit_tag);
    let regions = spans.len();
    let spans = if spans.is_empty() { vec![text.clone()] } else { spans };

    let mut calls = Vec::new();
    let mut diagnostics = Vec::new();
    let mut base = 0;
    for span in &spans {
        let (inner, wrapped) = if regions > 0 { strip_comment_markers(span) } else { (span.as_str(), true) };
        if !wrapped {
            diagnostics.push(Diagnostic::MissingCommentMarkers);
        }
        let (mut found, mut dropped) = parse_calls(inner, base);
        calls.append(&mut found);
        diagnostics.append(&mut dropped);
        base += span.len();
    }
    let (actions, mut dropped) = build_actions(&calls);
    diagnostics.append(&mut dropped);
    let scheduled = schedule(actions);

    let rewritten = rewrite.then(|| {
        let body = render_edit_region(&scheduled);
        if regions > 0 {
            replace_edit_region(&text, &settings.edit_tag, &body)
        } else {
            replace_edit_region("", &settings.edit_tag, &body).trim_start().to_string()
        }
    });
    let actions: Vec<String> = scheduled.iter().map(|a| a.to_call()).collect();

    if json {
        print_json(&CheckOutput { regions, actions, diagnostics: diagnostics.clone(), rewritten })?;
    } else {
        match &rewritten {
            Some(message) => println!("{}", message),
            None => {
                for call in &actions {
                    println!("{}", call);
                }
            }
        }
        for diagnostic in &diagnostics {
            eprintln!("warning: {}", diagnostic);
        }
    }

    if strict && !diagnostics.is_empty() {
        return Err(CliError {
            code: EXIT_DIAGNOSTICS,
            message: format!("{} call(s) or value(s) dropped", diagnostics.len()),
            hint: None,
        });
    }
    Ok(())
}

// ============================================================================
// rebuild / import
// ============================================================================

pub fn cmd_rebuild(config: Option<&Path>, path: &Path, reply: &Path, json: bool) -> Result<(), CliError> {
    let settings = load_settings(config)?;
    let (mut chat, mut book) = open_chat(path)?;
    let plan = RebuildPlan::parse(&read_input(reply)?)?;
    let mut orch = Orchestrator::new(settings.edit_options());
    let report = orch.commit_rebuild(&mut book, &mut chat, plan)?;
    print_report(&report, json)
}

pub fn cmd_import(config: Option<&Path>, path: &Path, tables: &Path, json: bool) -> Result<(), CliError> {
    let settings = load_settings(config)?;
    let (mut chat, mut book) = open_chat(path)?;
    let legacy: Vec<LegacyTable> = serde_json::from_str(&read_input(tables)?)
        .map_err(|e| CliError::parse(format!("{}: {}", tables.display(), e)))?;

    // Work on top of the latest state so untouched tables carry forward.
    let piece = piece_at(&chat, Some(latest_ai(&chat)?))?;
    book.load_enabled(piece.as_ref());
    let uids = convert_legacy_tables(&mut book, &legacy);
    log::info!("imported {} legacy table(s)", uids.len());

    let mut orch = Orchestrator::new(settings.edit_options());
    let report = orch.persist_live(&mut book, &mut chat)?;
    print_report(&report, json)
}

//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain     | Description                              |
//! |---------|------------|------------------------------------------|
//! | 0       | Universal  | Success                                  |
//! | 1       | Universal  | General error (unspecified)              |
//! | 2       | Universal  | CLI usage error (bad args, missing file) |
//! | 3-9     | files      | Chat file and settings file codes        |
//! | 10-19   | turn       | Turn processing codes                    |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use sheetmem_engine::EngineError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Files (3-9)
// =============================================================================

/// Chat file or input file could not be read or written.
pub const EXIT_IO: u8 = 3;

/// Chat file or input is not valid JSON, or has an unknown version.
pub const EXIT_PARSE: u8 = 4;

/// Settings file is invalid.
pub const EXIT_CONFIG: u8 = 5;

// =============================================================================
// Turn (10-19)
// =============================================================================

/// No enabled sheet to apply edits to.
pub const EXIT_NO_SHEETS: u8 = 10;

/// Turn index does not exist, or the chat has no AI turn.
pub const EXIT_TURN_RANGE: u8 = 11;

/// Rebuild reply could not be parsed or matched no table.
pub const EXIT_REBUILD: u8 = 12;

/// `check --strict` found diagnostics.
pub const EXIT_DIAGNOSTICS: u8 = 13;

/// Map an engine error to its exit code.
pub fn engine_exit_code(err: &EngineError) -> u8 {
    match err {
        EngineError::NoEnabledSheets { .. } => EXIT_NO_SHEETS,
        EngineError::TurnOutOfRange { .. } => EXIT_TURN_RANGE,
        EngineError::Transport(_) => EXIT_IO,
        EngineError::Rebuild(_) => EXIT_REBUILD,
    }
}

// sheetmem CLI - apply AI table edits to chat logs, headless

mod commands;
mod exit_codes;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use sheetmem_engine::EngineError;

use exit_codes::{engine_exit_code, EXIT_CONFIG, EXIT_ERROR, EXIT_IO, EXIT_PARSE, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "smem")]
#[command(about = "Versioned tables edited by AI turns (CLI mode, headless)")]
#[command(version)]
struct Cli {
    /// Settings file (default: platform config dir)
    #[arg(long, global = true, env = "SHEETMEM_CONFIG")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
pub struct Output {
    /// Print machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a chat file with the configured table templates
    Init {
        chat: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Append a message and process it
    #[command(after_help = "\
Examples:
  smem append chat.json --text '<tableEdit><!-- insertRow(0, {0: \"Day1\"}) --></tableEdit>'
  smem append chat.json --file reply.txt
  smem append chat.json --user --text 'What happened next?'")]
    Append {
        chat: PathBuf,

        /// Message text
        #[arg(long, short = 't', conflicts_with = "file", required_unless_present = "file")]
        text: Option<String>,

        /// Read message text from a file
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,

        /// Append as a user message (not processed)
        #[arg(long)]
        user: bool,

        #[command(flatten)]
        output: Output,
    },

    /// Process the edit region of one turn
    Apply {
        chat: PathBuf,

        /// Turn index (default: latest AI turn)
        #[arg(long)]
        turn: Option<usize>,

        /// Re-run even if the edit text is unchanged
        #[arg(long)]
        force: bool,

        #[command(flatten)]
        output: Output,
    },

    /// Recompute every turn from the first AI turn forward
    Replay {
        chat: PathBuf,

        #[command(flatten)]
        output: Output,
    },

    /// Restore the live tables to an earlier turn
    Undo {
        chat: PathBuf,

        /// How many piece-bearing turns back (0 = latest)
        #[arg(long, default_value_t = 0)]
        depth: usize,

        #[command(flatten)]
        output: Output,
    },

    /// Print tables as the model sees them
    Show {
        chat: PathBuf,

        /// Turn whose state to show (default: latest)
        #[arg(long)]
        turn: Option<usize>,

        /// Data only, no notes or edit rules
        #[arg(long)]
        pure: bool,

        /// Print the conversation with the tables placed at the configured
        /// injection depth
        #[arg(long, conflicts_with = "json")]
        context: bool,

        #[command(flatten)]
        output: Output,
    },

    /// Export tables at the latest turn as JSON
    Export {
        chat: PathBuf,

        /// List form: [{name, data}]
        #[arg(long)]
        list: bool,

        /// Output file (omit for stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Parse edit text without applying it
    Check {
        /// File holding a message (use - for stdin)
        file: PathBuf,

        /// Exit non-zero if any call was dropped
        #[arg(long)]
        strict: bool,

        /// Print the message with its edit region replaced by the scheduled calls
        #[arg(long)]
        rewrite: bool,

        #[command(flatten)]
        output: Output,
    },

    /// Replace tables from a model's full-table JSON reply
    Rebuild {
        chat: PathBuf,

        /// File holding the model reply
        reply: PathBuf,

        #[command(flatten)]
        output: Output,
    },

    /// Import tables stored in the old flat format into the latest turn
    Import {
        chat: PathBuf,

        /// JSON array of legacy tables
        tables: PathBuf,

        #[command(flatten)]
        output: Output,
    },

    /// Expand {{GET::Table:A1}} lookups against the live tables
    Resolve {
        chat: PathBuf,

        /// Text containing lookups
        text: String,
    },
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self { code: EXIT_PARSE, message: msg.into(), hint: None }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self { code: EXIT_CONFIG, message: msg.into(), hint: None }
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    /// Create error from an engine error with the matching exit code.
    pub fn engine(err: EngineError) -> Self {
        let code = engine_exit_code(&err);
        let hint = match &err {
            EngineError::NoEnabledSheets { .. } => {
                Some("enable at least one table in the settings file".to_string())
            }
            EngineError::TurnOutOfRange { len: 0, .. } => {
                Some("the chat is empty; append a message first".to_string())
            }
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<EngineError> for CliError {
    fn from(err: EngineError) -> Self {
        Self::engine(err)
    }
}

fn init_logging(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // Logs go to stderr so --json stdout stays clean.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Init { chat, force } => commands::cmd_init(config, &chat, force),
        Commands::Append { chat, text, file, user, output } => {
            commands::cmd_append(config, &chat, text, file, user, output.json)
        }
        Commands::Apply { chat, turn, force, output } => {
            commands::cmd_apply(config, &chat, turn, force, output.json)
        }
        Commands::Replay { chat, output } => commands::cmd_replay(config, &chat, output.json),
        Commands::Undo { chat, depth, output } => commands::cmd_undo(config, &chat, depth, output.json),
        Commands::Show { chat, turn, pure, context, output } => {
            commands::cmd_show(config, &chat, turn, pure, context, output.json)
        }
        Commands::Export { chat, list, output } => commands::cmd_export(&chat, list, output),
        Commands::Check { file, strict, rewrite, output } => {
            commands::cmd_check(config, &file, strict, rewrite, output.json)
        }
        Commands::Rebuild { chat, reply, output } => {
            commands::cmd_rebuild(config, &chat, &reply, output.json)
        }
        Commands::Import { chat, tables, output } => {
            commands::cmd_import(config, &chat, &tables, output.json)
        }
        Commands::Resolve { chat, text } => commands::cmd_resolve(&chat, &text),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

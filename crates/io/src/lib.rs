// File I/O operations

pub mod chat_file;
pub mod export;

pub use chat_file::{ChatFile, ChatFileError};

/// Chat file format version
/// Increment when schema changes in a way that old versions can't read
pub const CHAT_FORMAT_VERSION: u32 = 1;

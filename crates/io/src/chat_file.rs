// Chat log stored as a single JSON document
//
// Layout: { "version": 1, "book": <SheetBook>, "turns": [<Turn>...] }
// Writes go to a sibling temp file first and are renamed into place.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sheetmem_engine::{ChatStore, SaveError, SheetBook, Turn, TurnIndex};

use crate::CHAT_FORMAT_VERSION;

#[derive(Debug, thiserror::Error)]
pub enum ChatFileError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid chat file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("chat file {path} has version {found}, this build reads up to {supported}")]
    Version {
        path: PathBuf,
        found: u32,
        supported: u32,
    },
}

#[derive(Deserialize)]
struct ChatDocument {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    book: SheetBook,
    #[serde(default)]
    turns: Vec<Turn>,
}

fn default_version() -> u32 {
    CHAT_FORMAT_VERSION
}

#[derive(Serialize)]
struct ChatDocumentRef<'a> {
    version: u32,
    book: &'a SheetBook,
    turns: &'a [Turn],
}

/// A conversation backed by a JSON file.
///
/// The turns live here; the sheet book is returned separately by [`open`]
/// and handed back on every save.
///
/// [`open`]: ChatFile::open
#[derive(Debug, Clone)]
pub struct ChatFile {
    path: PathBuf,
    pub turns: Vec<Turn>,
}

impl ChatFile {
    /// An empty chat that will be written to `path`.
    pub fn create(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), turns: Vec::new() }
    }

    pub fn open(path: impl Into<PathBuf>) -> Result<(Self, SheetBook), ChatFileError> {
        let path = path.into();
        let text = fs::read_to_string(&path).map_err(|source| ChatFileError::Io {
            path: path.clone(),
            source,
        })?;
        let doc: ChatDocument = serde_json::from_str(&text).map_err(|source| ChatFileError::Json {
            path: path.clone(),
            source,
        })?;
        if doc.version > CHAT_FORMAT_VERSION {
            return Err(ChatFileError::Version {
                path,
                found: doc.version,
                supported: CHAT_FORMAT_VERSION,
            });
        }
        log::debug!("opened {} ({} turns, {} sheets)", path.display(), doc.turns.len(), doc.book.len());
        Ok((Self { path, turns: doc.turns }, doc.book))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn push_user(&mut self, text: impl Into<String>) -> TurnIndex {
        self.turns.push(Turn::user(text));
        self.turns.len() - 1
    }

    pub fn push_ai(&mut self, text: impl Into<String>) -> TurnIndex {
        self.turns.push(Turn::ai(text));
        self.turns.len() - 1
    }

    /// Write the document atomically.
    pub fn write(&self, book: &SheetBook) -> Result<(), ChatFileError> {
        let doc = ChatDocumentRef { version: CHAT_FORMAT_VERSION, book, turns: &self.turns };
        let json = serde_json::to_string_pretty(&doc).map_err(|source| ChatFileError::Json {
            path: self.path.clone(),
            source,
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ChatFileError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|source| ChatFileError::Io { path: tmp.clone(), source })?;
        fs::rename(&tmp, &self.path).map_err(|source| ChatFileError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl ChatStore for ChatFile {
    fn turn_count(&self) -> usize {
        self.turns.len()
    }

    fn turn(&self, index: TurnIndex) -> Option<&Turn> {
        self.turns.get(index)
    }

    fn turn_mut(&mut self, index: TurnIndex) -> Option<&mut Turn> {
        self.turns.get_mut(index)
    }

    fn save(&mut self, book: &SheetBook) -> Result<(), SaveError> {
        self.write(book).map_err(|e| SaveError(e.to_string()))
    }
}

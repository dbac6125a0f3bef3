pub mod book;
pub mod cell;
pub mod cell_id;
pub mod chat;
pub mod edit;
pub mod error;
pub mod events;
pub mod legacy;
pub mod macros;
pub mod prompt;
pub mod rebuild;
pub mod sheet;
pub mod snapshot;
pub mod turn;

#[cfg(test)]
pub mod harness;

pub use book::SheetBook;
pub use cell::{Cell, CellKind, CellUid, CellValue};
pub use cell_id::{CellPos, DataCol, DataRow, GridCol, GridRow};
pub use chat::{ChatStore, MemoryChat, SaveError, Turn, TurnIndex};
pub use error::EngineError;
pub use sheet::{Sheet, SheetDomain, SheetKind, SheetPrompts, SheetTemplate, SheetUid, SheetView};
pub use snapshot::{Piece, SnapshotStore, StructuralHash};
pub use turn::{ChatEvent, EditOptions, Orchestrator, TurnPhase, TurnReport};

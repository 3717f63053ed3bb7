pub mod frontmatter;
pub mod locator;
pub mod notes;
pub mod section;
pub mod store;

pub use locator::{DailyNoteFactory, Document, DocumentLocator, NoteKind, TemplateDailyNote};
pub use notes::{Vault, WriteOutcome};
pub use store::{DocumentStore, FsDocumentStore, MemoryDocumentStore};

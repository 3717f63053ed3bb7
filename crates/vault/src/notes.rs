//! Store-backed metadata and section writes for one date's note.

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use vitalnote_config::NotesConfig;

use crate::frontmatter;
use crate::locator::{DailyNoteFactory, Document, DocumentLocator, NoteKind, TemplateDailyNote};
use crate::section;
use crate::store::DocumentStore;

/// What a write did to the vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Updated,
    /// The note already held exactly this content; nothing was written.
    Unchanged,
    /// The note is missing and auto-creation is disabled.
    NoDocument,
    /// The heading is not present in the note.
    NoSection,
    /// Empty field or heading name.
    Disabled,
}

impl WriteOutcome {
    /// Whether the note reflects the requested value after the call.
    pub fn applied(self) -> bool {
        matches!(self, Self::Updated | Self::Unchanged)
    }
}

pub struct Vault {
    store: Arc<dyn DocumentStore>,
    locator: DocumentLocator,
}

impl Vault {
    pub fn new(store: Arc<dyn DocumentStore>, locator: DocumentLocator) -> Self {
        Self { store, locator }
    }

    /// Vault with the template-based daily-note constructor from `notes`.
    pub fn from_config(notes: &NotesConfig, store: Arc<dyn DocumentStore>) -> Self {
        let daily: Arc<dyn DailyNoteFactory> =
            Arc::new(TemplateDailyNote::new(notes.daily_template.clone()));
        let locator = DocumentLocator::new(store.clone(), daily, notes);
        Self::new(store, locator)
    }

    pub fn locator(&self) -> &DocumentLocator {
        &self.locator
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Set one frontmatter field on the daily note for `date`.
    pub async fn set_field(&self, date: &str, field: &str, value: &str) -> Result<WriteOutcome> {
        if field.is_empty() {
            return Ok(WriteOutcome::Disabled);
        }
        let Some(doc) = self.locator.locate(date, NoteKind::Daily).await? else {
            return Ok(WriteOutcome::NoDocument);
        };
        let updated = frontmatter::set_field(&doc.content, field, value);
        self.persist(&doc, updated).await
    }

    /// Replace the body under `heading`.  `table_folder` selects the
    /// table-only companion note instead of the daily note.
    pub async fn rewrite_section(
        &self,
        date: &str,
        heading: &str,
        body: &str,
        table_folder: Option<&str>,
    ) -> Result<WriteOutcome> {
        if heading.is_empty() {
            return Ok(WriteOutcome::Disabled);
        }
        let kind = match table_folder {
            Some(folder) => NoteKind::Table { folder, heading },
            None => NoteKind::Daily,
        };
        let Some(doc) = self.locator.locate(date, kind).await? else {
            return Ok(WriteOutcome::NoDocument);
        };
        let Some(updated) = section::rewrite_section(&doc.content, heading, body) else {
            debug!(date, heading, path = %doc.path, "section heading not found; leaving note as is");
            return Ok(WriteOutcome::NoSection);
        };
        self.persist(&doc, updated).await
    }

    async fn persist(&self, doc: &Document, updated: String) -> Result<WriteOutcome> {
        if updated == doc.content {
            return Ok(WriteOutcome::Unchanged);
        }
        self.store.write(&doc.path, &updated).await?;
        Ok(WriteOutcome::Updated)
    }
}

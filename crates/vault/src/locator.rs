//! Resolve a calendar date to its note, creating the note on demand.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use vitalnote_config::NotesConfig;

use crate::store::DocumentStore;

/// Which note a write targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteKind<'a> {
    Daily,
    /// Table-only companion note in `{table_folder}/{folder}/`.  New notes
    /// are seeded with `heading` so the section rewrite has a target.
    Table { folder: &'a str, heading: &'a str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub path: String,
    pub content: String,
    pub created: bool,
}

/// Builds the initial content of a daily note that does not exist yet.
#[async_trait]
pub trait DailyNoteFactory: Send + Sync {
    async fn daily_note(&self, date: &str, store: &dyn DocumentStore) -> Result<String>;
}

/// Renders an optional template file, replacing `{{date}}`.  Without a
/// template, or when it cannot be read, the note is just a title.
#[derive(Debug, Clone, Default)]
pub struct TemplateDailyNote {
    template_path: String,
}

impl TemplateDailyNote {
    pub fn new(template_path: impl Into<String>) -> Self {
        Self {
            template_path: template_path.into(),
        }
    }
}

#[async_trait]
impl DailyNoteFactory for TemplateDailyNote {
    async fn daily_note(&self, date: &str, store: &dyn DocumentStore) -> Result<String> {
        if self.template_path.is_empty() {
            return Ok(format!("# {date}\n"));
        }
        match store.read(&self.template_path).await {
            Ok(template) => Ok(template.replace("{{date}}", date)),
            Err(err) => {
                warn!(template = %self.template_path, %err, "daily template unreadable; using bare title");
                Ok(format!("# {date}\n"))
            }
        }
    }
}

pub struct DocumentLocator {
    store: Arc<dyn DocumentStore>,
    daily: Arc<dyn DailyNoteFactory>,
    daily_path: String,
    table_folder: String,
    auto_create: bool,
}

impl DocumentLocator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        daily: Arc<dyn DailyNoteFactory>,
        notes: &NotesConfig,
    ) -> Self {
        Self {
            store,
            daily,
            daily_path: notes.daily_path.clone(),
            table_folder: notes.table_folder.trim_matches('/').to_string(),
            auto_create: notes.auto_create,
        }
    }

    /// Table notes collapse onto the daily note when no table folder is set.
    fn effective_kind<'a>(&self, kind: NoteKind<'a>) -> NoteKind<'a> {
        match kind {
            NoteKind::Table { .. } if self.table_folder.is_empty() => NoteKind::Daily,
            other => other,
        }
    }

    pub fn path_for(&self, date: &str, kind: NoteKind<'_>) -> String {
        match self.effective_kind(kind) {
            NoteKind::Daily => self.daily_path.replace("{date}", date),
            NoteKind::Table { folder, .. } => {
                format!("{}/{}/{date}.md", self.table_folder, folder)
            }
        }
    }

    /// Return the note for `date`, creating it when allowed.
    ///
    /// `Ok(None)` means the note is absent and auto-creation is off; callers
    /// skip the date.  An `Err` is scoped to this date only.
    pub async fn locate(&self, date: &str, kind: NoteKind<'_>) -> Result<Option<Document>> {
        let kind = self.effective_kind(kind);
        let path = self.path_for(date, kind);

        if self.store.exists(&path).await? {
            let content = self.store.read(&path).await?;
            return Ok(Some(Document {
                path,
                content,
                created: false,
            }));
        }

        if !self.auto_create {
            debug!(date, path = %path, "note missing and auto-create disabled; skipping");
            return Ok(None);
        }

        let content = match kind {
            NoteKind::Daily => self.daily.daily_note(date, self.store.as_ref()).await?,
            NoteKind::Table { heading, .. } => format!("## {heading}\n"),
        };

        if let Some((parent, _)) = path.rsplit_once('/') {
            self.store.create_dir_all(parent).await?;
        }
        self.store
            .create(&path, &content)
            .await
            .with_context(|| format!("creating note for {date}"))?;
        info!(date, path = %path, "created note");

        Ok(Some(Document {
            path,
            content,
            created: true,
        }))
    }
}

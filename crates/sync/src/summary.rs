//! Same-run accumulation of every metadata write, flushed once at the end.

use std::collections::BTreeMap;

use tracing::debug;

use crate::context::RunContext;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    days: BTreeMap<String, BTreeMap<String, String>>,
}

impl RunSummary {
    /// Later writes of the same field replace earlier ones.
    pub fn record(&mut self, date: &str, field: &str, value: &str) {
        self.days
            .entry(date.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
    }

    pub fn get(&self, date: &str, field: &str) -> Option<&str> {
        self.days.get(date)?.get(field).map(String::as_str)
    }

    pub fn fields(&self, date: &str) -> Option<&BTreeMap<String, String>> {
        self.days.get(date)
    }

    pub fn dates(&self) -> impl Iterator<Item = &str> {
        self.days.keys().map(String::as_str)
    }

    /// Number of dates with at least one recorded field.
    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// `- **field**: value` lines for one date.
    pub fn render(&self, date: &str) -> Option<String> {
        let fields = self.days.get(date)?;
        Some(
            fields
                .iter()
                .map(|(field, value)| format!("- **{field}**: {value}"))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }

    /// Rewrite the `heading` section of each date's daily note with its
    /// rendered summary.  An empty heading disables the flush.
    pub(crate) async fn flush(&self, ctx: &mut RunContext<'_>, heading: &str) {
        if heading.is_empty() || self.is_empty() {
            return;
        }
        debug!(dates = self.len(), heading, "flushing run summary");
        for date in self.days.keys() {
            if let Some(body) = self.render(date) {
                ctx.rewrite_section(date, heading, &body, None).await;
            }
        }
    }
}

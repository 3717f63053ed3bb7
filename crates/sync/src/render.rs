//! Display formatting for metadata values, lists and tables.

use chrono::{TimeZone, Utc};
use chrono_tz::Tz;
use tracing::warn;

use vitalnote_config::{SyncConfig, TimeFormat};
use vitalnote_sensor::model::ExerciseSession;

// ── Numbers ──────────────────────────────────────────────────────────────────

/// Nearest whole unit, or `None` for NaN/infinite input.
pub fn round_whole(value: f64) -> Option<String> {
    value.is_finite().then(|| format!("{}", value.round() as i64))
}

/// At most two decimals, trailing zeros trimmed: `72.40` → `72.4`, `60.0` → `60`.
pub fn format_number(value: f64) -> String {
    let fixed = format!("{value:.2}");
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Whole minutes in a duration given in seconds (fraction truncated).
pub fn whole_minutes(seconds: f64) -> Option<i64> {
    (seconds.is_finite() && seconds >= 0.0).then(|| seconds as i64 / 60)
}

// ── Clock ────────────────────────────────────────────────────────────────────

/// Renders epoch seconds as a wall-clock time in the configured zone.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    tz: Tz,
    format: TimeFormat,
}

impl Clock {
    pub fn new(tz: Tz, format: TimeFormat) -> Self {
        Self { tz, format }
    }

    pub fn from_config(sync: &SyncConfig) -> Self {
        let tz = sync.timezone.parse::<Tz>().unwrap_or_else(|_| {
            warn!(timezone = %sync.timezone, "unrecognised timezone; falling back to UTC");
            Tz::UTC
        });
        Self::new(tz, sync.time_format)
    }

    pub fn format(&self, timestamp: i64) -> String {
        let Some(utc) = Utc.timestamp_opt(timestamp, 0).single() else {
            return timestamp.to_string();
        };
        let local = utc.with_timezone(&self.tz);
        match self.format {
            TimeFormat::TwentyFourHour => local.format("%H:%M").to_string(),
            TimeFormat::TwelveHour => local.format("%-I:%M %p").to_string(),
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(Tz::UTC, TimeFormat::TwentyFourHour)
    }
}

// ── Tables ───────────────────────────────────────────────────────────────────

/// Block id placed under a table so charts can reference it.
pub fn anchor_id(slug: &str, date: &str) -> String {
    let date: String = date
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '-' })
        .collect();
    format!("^{slug}-{date}")
}

/// Two-column `Time | value` Markdown table with a right-aligned value column
/// and a trailing block-id line.
pub fn render_time_table(value_header: &str, rows: &[(String, String)], anchor: &str) -> String {
    let time_width = rows
        .iter()
        .map(|(time, _)| time.chars().count())
        .chain(std::iter::once("Time".len()))
        .max()
        .unwrap_or(4);
    let value_width = rows
        .iter()
        .map(|(_, value)| value.chars().count())
        .chain(std::iter::once(value_header.chars().count()))
        .max()
        .unwrap_or(3)
        .max(2);

    let mut table = String::new();
    table.push_str(&format!("| {:<time_width$} | {:>value_width$} |\n", "Time", value_header));
    table.push_str(&format!(
        "| {} | {}: |\n",
        "-".repeat(time_width),
        "-".repeat(value_width - 1)
    ));
    for (time, value) in rows {
        table.push_str(&format!("| {time:<time_width$} | {value:>value_width$} |\n"));
    }
    table.push('\n');
    table.push_str(anchor);
    table.push('\n');
    table
}

// ── Exercise ─────────────────────────────────────────────────────────────────

/// Provider labels that do not read well when merely humanised.
const EXERCISE_LABELS: &[(&str, &str)] = &[
    ("walking_treadmill", "Treadmill walk"),
    ("running_treadmill", "Treadmill run"),
    ("strength_training", "Strength training"),
    ("weightlifting", "Strength training"),
    ("other_workout", "Workout"),
    ("biking", "Cycling"),
    ("biking_stationary", "Indoor cycling"),
    ("high_intensity_interval_training", "HIIT"),
    ("swimming_pool", "Pool swim"),
    ("swimming_open_water", "Open water swim"),
];

pub fn exercise_label(raw: &str) -> String {
    let key = raw.trim().to_ascii_lowercase();
    let key = key.strip_prefix("exercise_type_").unwrap_or(&key);
    if let Some((_, label)) = EXERCISE_LABELS.iter().find(|(name, _)| *name == key) {
        return (*label).to_string();
    }

    let words = key.replace(['_', '-'], " ");
    let words = words.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut chars = words.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "Workout".to_string(),
    }
}

/// `- 30 min — Running`, or just the label when the duration is unknown.
pub fn exercise_line(session: &ExerciseSession) -> String {
    let label = exercise_label(session.label.as_deref().unwrap_or_default());
    match session.duration.and_then(whole_minutes) {
        Some(minutes) => format!("- {minutes} min — {label}"),
        None => format!("- {label}"),
    }
}

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

// ── Time format ──────────────────────────────────────────────────────────────

/// Clock style used for the time column of intraday tables.
///
/// | Value | Rendering  |
/// |-------|------------|
/// | `24h` | `14:05`    |
/// | `12h` | `2:05 PM`  |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeFormat {
    #[default]
    #[serde(rename = "24h")]
    TwentyFourHour,
    #[serde(rename = "12h")]
    TwelveHour,
}

// ── Sensor ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Base URI of the Home Assistant instance.  Overridden at runtime by the
    /// `VITALNOTE_BASE_URI` environment variable when set.
    pub base_uri: String,
    /// Long-lived access token sent as a bearer token.  `VITALNOTE_TOKEN`
    /// takes precedence over the file value.
    pub token: String,
    /// Entity id of the sensor whose `attributes` carry the readings.
    pub sensor_id: String,
    pub timeout_secs: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            base_uri: "http://homeassistant.local:8123".to_string(),
            token: String::new(),
            sensor_id: "sensor.health_connect".to_string(),
            timeout_secs: 30,
        }
    }
}

// ── Notes ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotesConfig {
    /// Root folder of the Markdown vault.
    pub vault_path: String,
    /// Path of a daily note relative to the vault.  `{date}` is replaced by
    /// the calendar date key exactly as the sensor reports it.
    pub daily_path: String,
    /// Optional template file (relative to the vault) used when a daily note
    /// has to be created.  `{{date}}` inside it is replaced by the date.
    pub daily_template: String,
    /// Create missing notes instead of skipping their dates.
    pub auto_create: bool,
    /// Folder for table-only companion notes.  Empty keeps tables in the
    /// daily note.
    pub table_folder: String,
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            vault_path: ".".to_string(),
            daily_path: "Daily/{date}.md".to_string(),
            daily_template: String::new(),
            auto_create: true,
            table_folder: "Health".to_string(),
        }
    }
}

// ── Field and section names ──────────────────────────────────────────────────

/// Frontmatter keys written for scalar readings.  An empty name disables the
/// corresponding write.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldsConfig {
    pub calories: String,
    pub exercise_minutes: String,
    pub hydration: String,
    pub steps: String,
    pub weight: String,
    pub sleep_total: String,
    /// Sleep stage key (as reported by the sensor) → frontmatter key.
    /// Stages missing from the map are written under their raw key.
    pub sleep_stages: BTreeMap<String, String>,
}

impl Default for FieldsConfig {
    fn default() -> Self {
        let sleep_stages = [
            ("deep", "sleep_deep"),
            ("light", "sleep_light"),
            ("rem", "sleep_rem"),
            ("sleeping", "sleep_unspecified"),
        ]
        .into_iter()
        .map(|(stage, field)| (stage.to_string(), field.to_string()))
        .collect();

        Self {
            calories: "calories".to_string(),
            exercise_minutes: "exercise_minutes".to_string(),
            hydration: "water_ml".to_string(),
            steps: "steps".to_string(),
            weight: "weight".to_string(),
            sleep_total: "sleep_total".to_string(),
            sleep_stages,
        }
    }
}

/// Section headings regenerated from list or table data.  An empty heading
/// disables the rewrite.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionsConfig {
    pub exercise: String,
    pub heart_rate: String,
    pub oxygen: String,
    /// Heading of the end-of-run summary.  Empty (the default) disables the
    /// summary flush.
    pub summary: String,
}

impl Default for SectionsConfig {
    fn default() -> Self {
        Self {
            exercise: "Exercise".to_string(),
            heart_rate: "Heart rate".to_string(),
            oxygen: "Blood oxygen".to_string(),
            summary: String::new(),
        }
    }
}

// ── Sync ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Minutes between scheduled runs in `watch` mode.  `0` disables the
    /// schedule; manual runs still work.
    pub refresh_minutes: u64,
    pub time_format: TimeFormat,
    /// IANA timezone name used to render intraday timestamps.  Falls back to
    /// UTC when the name is unrecognised.
    pub timezone: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            refresh_minutes: 60,
            time_format: TimeFormat::TwentyFourHour,
            timezone: "UTC".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub sensor: SensorConfig,
    pub notes: NotesConfig,
    pub fields: FieldsConfig,
    pub sections: SectionsConfig,
    pub sync: SyncConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)?;
        }

        // Secrets and endpoints from the environment win over the file.
        if let Ok(token) = env::var("VITALNOTE_TOKEN") {
            if !token.is_empty() {
                config.sensor.token = token;
            }
        }
        if let Ok(uri) = env::var("VITALNOTE_BASE_URI") {
            if !uri.is_empty() {
                config.sensor.base_uri = uri;
            }
        }

        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Frontmatter key for a sleep stage, falling back to the raw stage key.
    pub fn sleep_stage_field<'a>(&'a self, stage: &'a str) -> &'a str {
        self.fields
            .sleep_stages
            .get(stage)
            .map(String::as_str)
            .unwrap_or(stage)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

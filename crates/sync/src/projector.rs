//! Category projectors: one raw collection in, metadata and section writes out.

use async_trait::async_trait;
use tracing::{debug, info};

use vitalnote_sensor::model::{
    CountReading, EnergyReading, ExerciseDay, HeartRateSample, OxygenSample, SleepDay,
    TimedSample, VolumeReading, WeightSample, latest_sample, ordered_samples,
};
use vitalnote_sensor::{Category, RawCollection};

use crate::context::RunContext;
use crate::render::{
    anchor_id, exercise_line, format_number, render_time_table, round_whole, whole_minutes,
};

/// Sleep stages that never count towards any stage field or the total.
pub const EXCLUDED_SLEEP_STAGES: &[&str] = &["awake", "out_of_bed"];

/// Companion-note folder (and anchor slug) for each table category.
pub const HEART_RATE_FOLDER: &str = "heart-rate";
pub const OXYGEN_FOLDER: &str = "blood-oxygen";

pub fn is_excluded_stage(stage: &str) -> bool {
    EXCLUDED_SLEEP_STAGES
        .iter()
        .any(|excluded| excluded.eq_ignore_ascii_case(stage))
}

#[async_trait]
pub trait Projector {
    /// Apply one category's collection to the vault.
    async fn project(&self, collection: &RawCollection, ctx: &mut RunContext<'_>);
}

#[async_trait]
impl Projector for Category {
    async fn project(&self, collection: &RawCollection, ctx: &mut RunContext<'_>) {
        debug!(category = %self, entries = collection.len(), "projecting category");
        let config = ctx.config;
        match self {
            Category::Calories => {
                let values = collection
                    .entries::<EnergyReading>()
                    .into_iter()
                    .map(|(date, r)| (date, r.energy.and_then(round_whole)));
                project_scalars(ctx, &config.fields.calories, values).await;
            }
            Category::Hydration => {
                let values = collection
                    .entries::<VolumeReading>()
                    .into_iter()
                    .map(|(date, r)| (date, r.volume.and_then(round_whole)));
                project_scalars(ctx, &config.fields.hydration, values).await;
            }
            Category::Steps => {
                let values = collection
                    .entries::<CountReading>()
                    .into_iter()
                    .map(|(date, r)| (date, r.count.and_then(round_whole)));
                project_scalars(ctx, &config.fields.steps, values).await;
            }
            Category::Weight => {
                let values = collection
                    .series::<WeightSample>()
                    .into_iter()
                    .map(|(date, series)| {
                        (date, latest_sample(&series).map(|(_, kg)| format_number(kg)))
                    });
                project_scalars(ctx, &config.fields.weight, values).await;
            }
            Category::Exercise => project_exercise(collection, ctx).await,
            Category::HeartRate => {
                let heading = &config.sections.heart_rate;
                project_series::<HeartRateSample>(collection, ctx, heading, "BPM", HEART_RATE_FOLDER)
                    .await;
            }
            Category::Oxygen => {
                let heading = &config.sections.oxygen;
                project_series::<OxygenSample>(collection, ctx, heading, "SpO2", OXYGEN_FOLDER).await;
            }
            Category::Sleep => project_sleep(collection, ctx).await,
        }
    }
}

/// One field per date.  Dates whose value could not be computed are skipped
/// so no placeholder ever reaches a note.
async fn project_scalars<'d>(
    ctx: &mut RunContext<'_>,
    field: &str,
    values: impl Iterator<Item = (&'d str, Option<String>)> + Send,
) {
    let values: Vec<_> = values.collect();
    for (date, value) in values {
        match value {
            Some(value) => ctx.set_field(date, field, &value).await,
            None => debug!(date, field, "no value for date; skipping"),
        }
    }
}

async fn project_exercise(collection: &RawCollection, ctx: &mut RunContext<'_>) {
    let config = ctx.config;
    let heading = &config.sections.exercise;
    let field = &config.fields.exercise_minutes;

    for (date, mut day) in collection.entries::<ExerciseDay>() {
        day.sessions.sort_by(|a, b| {
            let a = a.start.unwrap_or(f64::MAX);
            let b = b.start.unwrap_or(f64::MAX);
            a.total_cmp(&b)
        });
        let body = day
            .sessions
            .iter()
            .map(exercise_line)
            .collect::<Vec<_>>()
            .join("\n");
        ctx.rewrite_section(date, heading, &body, None).await;

        // Provider total, not a re-sum of the listed sessions.
        if let Some(minutes) = day.total_duration.and_then(whole_minutes) {
            ctx.set_field(date, field, &minutes.to_string()).await;
        }
    }
}

async fn project_series<T>(
    collection: &RawCollection,
    ctx: &mut RunContext<'_>,
    heading: &str,
    value_header: &str,
    folder: &str,
) where
    T: TimedSample + serde::de::DeserializeOwned + Send + Sync,
{
    for (date, series) in collection.series::<T>() {
        let samples = ordered_samples(&series);
        if samples.is_empty() {
            debug!(date, folder, "no samples for date; skipping table");
            continue;
        }
        let rows: Vec<(String, String)> = samples
            .iter()
            .map(|(ts, value)| (ctx.clock.format(*ts), format_number(*value)))
            .collect();
        let table = render_time_table(value_header, &rows, &anchor_id(folder, date));
        ctx.rewrite_section(date, heading, &table, Some(folder)).await;
    }
}

async fn project_sleep(collection: &RawCollection, ctx: &mut RunContext<'_>) {
    let config = ctx.config;
    for (date, day) in collection.entries::<SleepDay>() {
        let mut total = 0;
        for (stage, sessions) in day.stages() {
            if is_excluded_stage(stage) {
                debug!(date, stage, "excluded sleep stage");
                continue;
            }
            let seconds: f64 = sessions
                .iter()
                .filter_map(|session| session.duration)
                .filter(|duration| duration.is_finite())
                .sum();
            let Some(minutes) = whole_minutes(seconds) else {
                continue;
            };
            ctx.set_field(date, config.sleep_stage_field(stage), &minutes.to_string())
                .await;
            total += minutes;
        }
        ctx.set_field(date, &config.fields.sleep_total, &total.to_string())
            .await;
        info!(date, total_minutes = total, "sleep projected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;
    use vitalnote_config::{AppConfig, TimeFormat};
    use vitalnote_vault::{MemoryDocumentStore, Vault};

    const DAILY: &str = "Daily/2024-01-20.md";
    const NOTE: &str = "# 2024-01-20\n\n## Exercise\n- stale\n\n## Journal\nKeep me.\n";

    fn collection(value: serde_json::Value) -> RawCollection {
        serde_json::from_value(value).unwrap()
    }

    fn store_with_note() -> Arc<MemoryDocumentStore> {
        Arc::new(MemoryDocumentStore::new().with_document(DAILY, NOTE))
    }

    async fn project(
        store: Arc<MemoryDocumentStore>,
        config: &AppConfig,
        category: Category,
        raw: &RawCollection,
    ) -> crate::summary::RunSummary {
        let vault = Vault::from_config(&config.notes, store);
        let mut ctx = RunContext::new(&vault, config);
        category.project(raw, &mut ctx).await;
        ctx.summary
    }

    #[tokio::test]
    async fn scalars_are_rounded() {
        let store = store_with_note();
        let config = AppConfig::default();
        let calories = collection(json!({ "2024-01-20": { "energy": 2143.6 } }));
        let steps = collection(json!({ "2024-01-20": { "count": 8123 } }));
        let water = collection(json!({ "2024-01-20": { "volume": 1499.4 } }));

        project(store.clone(), &config, Category::Calories, &calories).await;
        project(store.clone(), &config, Category::Steps, &steps).await;
        project(store.clone(), &config, Category::Hydration, &water).await;

        let note = store.get(DAILY).unwrap();
        assert!(note.starts_with("---\ncalories: 2144\nsteps: 8123\nwater_ml: 1499\n---\n"));
        assert!(note.ends_with(NOTE));
    }

    #[tokio::test]
    async fn missing_value_never_writes() {
        let store = store_with_note();
        let config = AppConfig::default();
        let calories = collection(json!({
            "2024-01-20": { "energy": null },
            "2024-01-21": {},
        }));
        let summary = project(store.clone(), &config, Category::Calories, &calories).await;

        assert!(summary.is_empty());
        assert_eq!(store.get(DAILY).as_deref(), Some(NOTE));
        assert!(store.get("Daily/2024-01-21.md").is_none());
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn weight_takes_latest_reading() {
        let store = store_with_note();
        let config = AppConfig::default();
        let weight = collection(json!({
            "2024-01-20": {
                "1705741200": { "weight": 72.9, "time": 1705741200 },
                "1705780800": { "weight": 72.4, "time": 1705780800 },
                "1705760000": { "weight": 73.0, "time": 1705760000 },
            },
            "2024-01-21": {},
        }));
        let summary = project(store.clone(), &config, Category::Weight, &weight).await;

        assert_eq!(summary.get("2024-01-20", "weight"), Some("72.4"));
        assert!(store.get(DAILY).unwrap().starts_with("---\nweight: 72.4\n---\n"));
        assert!(store.get("Daily/2024-01-21.md").is_none());
    }

    #[tokio::test]
    async fn stray_samples_do_not_hide_the_day() {
        let store = Arc::new(MemoryDocumentStore::new());
        let config = AppConfig::default();
        let heart = collection(json!({
            "2024-01-20": {
                "100": { "bpm": 60, "time": 100 },
                "150": null,
                "200": { "bpm": 65, "time": 200 },
            },
        }));
        let weight = collection(json!({
            "2024-01-20": { "unit": "kg", "10": { "weight": 71.5, "time": 10 } },
        }));
        let summary = project(store.clone(), &config, Category::Weight, &weight).await;
        project(store.clone(), &config, Category::HeartRate, &heart).await;

        assert_eq!(summary.get("2024-01-20", "weight"), Some("71.5"));
        let table = store.get("Health/heart-rate/2024-01-20.md").unwrap();
        assert!(table.contains("| 00:01 |  60 |\n| 00:03 |  65 |\n"));
    }

    #[tokio::test]
    async fn exercise_rewrites_list_and_total() {
        let store = store_with_note();
        let config = AppConfig::default();
        let exercise = collection(json!({
            "2024-01-20": {
                "totalDuration": 4500,
                "sessions": [
                    { "duration": 1800, "type": "walking_treadmill", "start": 5000 },
                    { "duration": 1830, "type": "EXERCISE_TYPE_RUNNING", "start": 1000 },
                ],
            },
        }));
        project(store.clone(), &config, Category::Exercise, &exercise).await;

        assert_eq!(
            store.get(DAILY).unwrap(),
            "---\nexercise_minutes: 75\n---\n# 2024-01-20\n\n## Exercise\n- 30 min — Running\n- 30 min — Treadmill walk\n\n## Journal\nKeep me.\n"
        );
    }

    #[tokio::test]
    async fn heart_rate_table_for_example_day() {
        let store = Arc::new(MemoryDocumentStore::new());
        let config = AppConfig::default();
        let heart = collection(json!({
            "2024-01-20": {
                "200": { "bpm": 65, "time": 200 },
                "100": { "bpm": 60, "time": 100 },
            },
        }));
        project(store.clone(), &config, Category::HeartRate, &heart).await;

        assert_eq!(
            store.get("Health/heart-rate/2024-01-20.md").unwrap(),
            "## Heart rate\n| Time  | BPM |\n| ----- | --: |\n| 00:01 |  60 |\n| 00:03 |  65 |\n\n^heart-rate-2024-01-20\n"
        );
        assert!(store.get(DAILY).is_none());
    }

    #[tokio::test]
    async fn oxygen_table_uses_configured_clock() {
        let store = Arc::new(MemoryDocumentStore::new());
        let mut config = AppConfig::default();
        config.sync.time_format = TimeFormat::TwelveHour;
        let oxygen = collection(json!({
            "2024-01-20": { "50400": { "percentage": 97.5, "time": 50400 } },
        }));
        let vault = Vault::from_config(&config.notes, store.clone());
        let mut ctx = RunContext::new(&vault, &config);
        Category::Oxygen.project(&oxygen, &mut ctx).await;

        let note = store.get("Health/blood-oxygen/2024-01-20.md").unwrap();
        assert!(note.starts_with("## Blood oxygen\n| Time    | SpO2 |\n"));
        assert!(note.contains("| 2:00 PM | 97.5 |\n"));
        assert!(note.ends_with("\n^blood-oxygen-2024-01-20\n"));
    }

    #[tokio::test]
    async fn tables_land_in_daily_note_without_table_folder() {
        let store = Arc::new(MemoryDocumentStore::new().with_document(
            DAILY,
            "# 2024-01-20\n\n## Heart rate\n\n## Journal\n",
        ));
        let mut config = AppConfig::default();
        config.notes.table_folder = String::new();
        let heart = collection(json!({ "2024-01-20": { "60": { "bpm": 58, "time": 60 } } }));
        project(store.clone(), &config, Category::HeartRate, &heart).await;

        let note = store.get(DAILY).unwrap();
        assert!(note.contains("## Heart rate\n| Time  | BPM |\n"));
        assert!(note.ends_with("^heart-rate-2024-01-20\n\n## Journal\n"));
        assert!(store.paths().iter().all(|p| !p.starts_with("Health/")));
    }

    #[tokio::test]
    async fn sleep_excludes_sentinels_and_awake_stages() {
        let store = store_with_note();
        let config = AppConfig::default();
        let sleep = collection(json!({
            "2024-01-20": {
                "deep": [ { "duration": 3600 }, { "duration": 1830 } ],
                "rem": [ { "duration": 2400 } ],
                "Awake": [ { "duration": 900 } ],
                "out_of_bed": [ { "duration": 600 } ],
                "nap": [ { "duration": 1200 } ],
            },
            "lastSleep": { "deep": [ { "duration": 60 } ] },
        }));
        let summary = project(store.clone(), &config, Category::Sleep, &sleep).await;

        let fields = summary.fields("2024-01-20").unwrap();
        assert_eq!(fields.get("sleep_deep").map(String::as_str), Some("90"));
        assert_eq!(fields.get("sleep_rem").map(String::as_str), Some("40"));
        assert_eq!(fields.get("nap").map(String::as_str), Some("20"));
        assert_eq!(fields.get("sleep_total").map(String::as_str), Some("150"));
        assert!(!fields.contains_key("Awake"));
        assert!(!fields.contains_key("out_of_bed"));
        assert_eq!(summary.len(), 1);
        assert!(store.paths().iter().all(|p| !p.contains("lastSleep")));
    }

    #[tokio::test]
    async fn projecting_twice_is_idempotent() {
        let config = AppConfig::default();
        let exercise = collection(json!({
            "2024-01-20": { "totalDuration": 600, "sessions": [ { "duration": 600, "type": "yoga" } ] },
        }));
        let steps = collection(json!({ "2024-01-20": { "count": 4000 } }));

        let store = store_with_note();
        for _ in 0..2 {
            project(store.clone(), &config, Category::Exercise, &exercise).await;
            project(store.clone(), &config, Category::Steps, &steps).await;
        }
        let twice = store.get(DAILY).unwrap();

        let once_store = store_with_note();
        project(once_store.clone(), &config, Category::Exercise, &exercise).await;
        project(once_store.clone(), &config, Category::Steps, &steps).await;
        assert_eq!(once_store.get(DAILY).unwrap(), twice);
    }

    #[tokio::test]
    async fn date_order_does_not_change_results() {
        let config = AppConfig::default();
        let first: RawCollection = [
            ("2024-01-20".to_string(), json!({ "count": 1 })),
            ("2024-01-21".to_string(), json!({ "count": 2 })),
        ]
        .into_iter()
        .collect();
        let second: RawCollection = [
            ("2024-01-21".to_string(), json!({ "count": 2 })),
            ("2024-01-20".to_string(), json!({ "count": 1 })),
        ]
        .into_iter()
        .collect();

        let a = Arc::new(MemoryDocumentStore::new());
        let b = Arc::new(MemoryDocumentStore::new());
        project(a.clone(), &config, Category::Steps, &first).await;
        project(b.clone(), &config, Category::Steps, &second).await;
        assert_eq!(a.snapshot(), b.snapshot());
        assert_eq!(a.paths().len(), 2);
    }

    #[tokio::test]
    async fn summary_holds_calories_then_weight() {
        let store = store_with_note();
        let config = AppConfig::default();
        let vault = Vault::from_config(&config.notes, store.clone());
        let mut ctx = RunContext::new(&vault, &config);

        let calories = collection(json!({ "2024-01-20": { "energy": 1999.5 } }));
        let weight = collection(json!({ "2024-01-20": { "10": { "weight": 70.25, "time": 10 } } }));
        Category::Calories.project(&calories, &mut ctx).await;
        Category::Weight.project(&weight, &mut ctx).await;

        assert_eq!(ctx.summary.get("2024-01-20", "calories"), Some("2000"));
        assert_eq!(ctx.summary.get("2024-01-20", "weight"), Some("70.25"));
        assert_eq!(ctx.stats.fields_written, 2);
    }

    #[test]
    fn stage_exclusion_ignores_case() {
        assert!(is_excluded_stage("awake"));
        assert!(is_excluded_stage("OUT_OF_BED"));
        assert!(!is_excluded_stage("light"));
    }
}

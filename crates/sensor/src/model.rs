//! Reading model: the shapes each measurement category arrives in.
//!
//! Collections are kept as raw JSON per date and decoded entry by entry, so a
//! malformed day (or a sentinel key with a different shape) never prevents the
//! other days of the same category from being projected.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Keys that share a collection with calendar dates but are not dates.
pub const RESERVED_KEYS: &[&str] = &["lastSleep", "lastUpdated"];

pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

// ── Categories ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Calories,
    Exercise,
    HeartRate,
    Hydration,
    Oxygen,
    Sleep,
    Steps,
    Weight,
}

impl Category {
    /// Projection order of every run.
    pub const ALL: [Category; 8] = [
        Category::Calories,
        Category::Exercise,
        Category::HeartRate,
        Category::Hydration,
        Category::Oxygen,
        Category::Sleep,
        Category::Steps,
        Category::Weight,
    ];

    /// Attribute key in the sensor payload.
    pub fn key(self) -> &'static str {
        match self {
            Self::Calories => "calories",
            Self::Exercise => "exercise",
            Self::HeartRate => "heartRate",
            Self::Hydration => "hydration",
            Self::Oxygen => "oxygen",
            Self::Sleep => "sleep",
            Self::Steps => "steps",
            Self::Weight => "weight",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// ── Collections ──────────────────────────────────────────────────────────────

/// Date (or sentinel) → raw record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawCollection(BTreeMap<String, Value>);

impl RawCollection {
    pub fn new(entries: BTreeMap<String, Value>) -> Self {
        Self(entries)
    }

    /// Calendar dates in iteration order, sentinels excluded.
    pub fn dates(&self) -> impl Iterator<Item = &str> {
        self.0
            .keys()
            .map(String::as_str)
            .filter(|key| !is_reserved_key(key))
    }

    /// Decode every date entry as `T`.  Sentinels are excluded and entries
    /// that do not decode are logged and skipped.
    pub fn entries<T: DeserializeOwned>(&self) -> Vec<(&str, T)> {
        let mut decoded = Vec::with_capacity(self.0.len());
        for (date, raw) in &self.0 {
            if is_reserved_key(date) {
                debug!(key = %date, "skipping reserved collection key");
                continue;
            }
            match T::deserialize(raw) {
                Ok(record) => decoded.push((date.as_str(), record)),
                Err(err) => warn!(date = %date, %err, "skipping undecodable reading"),
            }
        }
        decoded
    }

    /// Decode every date entry as a sample series.  Samples are decoded one by
    /// one, so a `null` sample or a stray non-sample key only drops itself.
    pub fn series<T: DeserializeOwned>(&self) -> Vec<(&str, SampleSeries<T>)> {
        self.entries::<BTreeMap<String, Value>>()
            .into_iter()
            .map(|(date, raw)| {
                let series = raw
                    .into_iter()
                    .filter_map(|(key, sample)| match T::deserialize(&sample) {
                        Ok(sample) => Some((key, sample)),
                        Err(err) => {
                            debug!(date = %date, key = %key, %err, "skipping undecodable sample");
                            None
                        }
                    })
                    .collect();
                (date, series)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for RawCollection {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The `attributes` object of the sensor state.  Each category may be absent
/// or `null`, which means "no data for this category".  A category that is
/// not an object is treated the same way, so it cannot fail the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct SensorSnapshot {
    #[serde(default)]
    pub calories: Option<RawCollection>,
    #[serde(default)]
    pub exercise: Option<RawCollection>,
    #[serde(default, rename = "heartRate")]
    pub heart_rate: Option<RawCollection>,
    #[serde(default)]
    pub hydration: Option<RawCollection>,
    #[serde(default)]
    pub oxygen: Option<RawCollection>,
    #[serde(default)]
    pub sleep: Option<RawCollection>,
    #[serde(default)]
    pub steps: Option<RawCollection>,
    #[serde(default)]
    pub weight: Option<RawCollection>,
}

impl SensorSnapshot {
    pub fn collection(&self, category: Category) -> Option<&RawCollection> {
        match category {
            Category::Calories => self.calories.as_ref(),
            Category::Exercise => self.exercise.as_ref(),
            Category::HeartRate => self.heart_rate.as_ref(),
            Category::Hydration => self.hydration.as_ref(),
            Category::Oxygen => self.oxygen.as_ref(),
            Category::Sleep => self.sleep.as_ref(),
            Category::Steps => self.steps.as_ref(),
            Category::Weight => self.weight.as_ref(),
        }
    }

    fn slot_mut(&mut self, category: Category) -> &mut Option<RawCollection> {
        match category {
            Category::Calories => &mut self.calories,
            Category::Exercise => &mut self.exercise,
            Category::HeartRate => &mut self.heart_rate,
            Category::Hydration => &mut self.hydration,
            Category::Oxygen => &mut self.oxygen,
            Category::Sleep => &mut self.sleep,
            Category::Steps => &mut self.steps,
            Category::Weight => &mut self.weight,
        }
    }

    pub fn is_empty(&self) -> bool {
        Category::ALL
            .iter()
            .all(|category| self.collection(*category).is_none())
    }
}

impl From<Map<String, Value>> for SensorSnapshot {
    fn from(mut attributes: Map<String, Value>) -> Self {
        let mut snapshot = Self::default();
        for category in Category::ALL {
            let collection = match attributes.remove(category.key()) {
                None | Some(Value::Null) => None,
                Some(Value::Object(entries)) => Some(entries.into_iter().collect()),
                Some(other) => {
                    warn!(%category, value = %other, "ignoring category that is not a collection");
                    None
                }
            };
            *snapshot.slot_mut(category) = collection;
        }
        snapshot
    }
}

// ── Scalar records ───────────────────────────────────────────────────────────

/// Daily energy burned, in kilocalories.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EnergyReading {
    #[serde(default)]
    pub energy: Option<f64>,
}

/// Daily water intake, in millilitres.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct VolumeReading {
    #[serde(default)]
    pub volume: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CountReading {
    #[serde(default)]
    pub count: Option<f64>,
}

// ── Sessions ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExerciseSession {
    /// Seconds.
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default, rename = "type")]
    pub label: Option<String>,
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub end: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExerciseDay {
    /// Seconds, as totalled by the provider.
    #[serde(default, rename = "totalDuration")]
    pub total_duration: Option<f64>,
    #[serde(default)]
    pub sessions: Vec<ExerciseSession>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SleepSession {
    /// Seconds.
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub end: Option<f64>,
}

/// Stage name → sessions spent in that stage.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct SleepDay(BTreeMap<String, Value>);

impl SleepDay {
    /// Stages whose value is a list of sessions; anything else is ignored.
    pub fn stages(&self) -> Vec<(&str, Vec<SleepSession>)> {
        self.0
            .iter()
            .filter_map(|(stage, raw)| match Vec::<SleepSession>::deserialize(raw) {
                Ok(sessions) => Some((stage.as_str(), sessions)),
                Err(err) => {
                    debug!(stage = %stage, %err, "ignoring non-session sleep entry");
                    None
                }
            })
            .collect()
    }
}

// ── Sample series ────────────────────────────────────────────────────────────

/// One intraday sample keyed by timestamp.
pub trait TimedSample {
    fn time(&self) -> Option<f64>;
    fn value(&self) -> Option<f64>;
}

/// Timestamp key (seconds, as a decimal string) → sample.
pub type SampleSeries<T> = BTreeMap<String, T>;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HeartRateSample {
    #[serde(default)]
    pub bpm: Option<f64>,
    #[serde(default)]
    pub time: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OxygenSample {
    #[serde(default)]
    pub percentage: Option<f64>,
    #[serde(default)]
    pub time: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WeightSample {
    /// Kilograms.
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub time: Option<f64>,
}

impl TimedSample for HeartRateSample {
    fn time(&self) -> Option<f64> {
        self.time
    }
    fn value(&self) -> Option<f64> {
        self.bpm
    }
}

impl TimedSample for OxygenSample {
    fn time(&self) -> Option<f64> {
        self.time
    }
    fn value(&self) -> Option<f64> {
        self.percentage
    }
}

impl TimedSample for WeightSample {
    fn time(&self) -> Option<f64> {
        self.time
    }
    fn value(&self) -> Option<f64> {
        self.weight
    }
}

/// `(timestamp, value)` pairs sorted by ascending timestamp.
///
/// The sample's own `time` wins over its key; samples with neither a usable
/// timestamp nor a finite value are dropped.
pub fn ordered_samples<T: TimedSample>(series: &SampleSeries<T>) -> Vec<(i64, f64)> {
    let mut samples: Vec<(i64, f64)> = series
        .iter()
        .filter_map(|(key, sample)| {
            let ts = sample.time().or_else(|| key.trim().parse::<f64>().ok())?;
            let value = sample.value()?;
            (ts.is_finite() && value.is_finite()).then_some((ts as i64, value))
        })
        .collect();
    samples.sort_by_key(|(ts, _)| *ts);
    samples
}

/// The latest sample of the series by timestamp.
pub fn latest_sample<T: TimedSample>(series: &SampleSeries<T>) -> Option<(i64, f64)> {
    ordered_samples(series).pop()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snapshot_decodes_present_null_and_absent_categories() {
        let snapshot: SensorSnapshot = serde_json::from_value(json!({
            "calories": { "2024-01-20": { "energy": 2143.6 } },
            "heartRate": null,
            "unrelated": 5,
        }))
        .unwrap();
        assert!(snapshot.collection(Category::Calories).is_some());
        assert!(snapshot.collection(Category::HeartRate).is_none());
        assert!(snapshot.collection(Category::Weight).is_none());
        assert!(!snapshot.is_empty());
        assert!(SensorSnapshot::default().is_empty());
    }

    #[test]
    fn malformed_category_counts_as_absent() {
        let snapshot: SensorSnapshot = serde_json::from_value(json!({
            "steps": { "2024-01-20": { "count": 5 } },
            "calories": [],
            "sleep": "unavailable",
        }))
        .unwrap();
        assert!(snapshot.collection(Category::Steps).is_some());
        assert!(snapshot.collection(Category::Calories).is_none());
        assert!(snapshot.collection(Category::Sleep).is_none());
    }

    #[test]
    fn bad_sample_only_drops_itself() {
        let collection: RawCollection = serde_json::from_value(json!({
            "2024-01-20": {
                "100": { "bpm": 60, "time": 100 },
                "150": null,
                "unit": "bpm",
                "200": { "bpm": 65, "time": 200 },
            },
            "2024-01-21": "unavailable",
        }))
        .unwrap();
        let days = collection.series::<HeartRateSample>();
        assert_eq!(days.len(), 1);
        let (date, series) = &days[0];
        assert_eq!(*date, "2024-01-20");
        assert_eq!(ordered_samples(series), vec![(100, 60.0), (200, 65.0)]);
    }

    #[test]
    fn entries_skip_sentinels_and_bad_records() {
        let collection: RawCollection = serde_json::from_value(json!({
            "2024-01-20": { "energy": 2000.0 },
            "2024-01-21": "not an object",
            "lastUpdated": { "energy": 1.0 },
        }))
        .unwrap();
        let entries = collection.entries::<EnergyReading>();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "2024-01-20");
        assert_eq!(entries[0].1.energy, Some(2000.0));
        assert_eq!(collection.dates().collect::<Vec<_>>(), vec!["2024-01-20", "2024-01-21"]);
    }

    #[test]
    fn date_keys_are_not_normalised() {
        let collection: RawCollection = serde_json::from_value(json!({
            "2024-01-20": { "count": 1 },
            "20/01/2024": { "count": 2 },
        }))
        .unwrap();
        let dates: Vec<_> = collection.dates().collect();
        assert_eq!(dates.len(), 2);
        assert!(dates.contains(&"20/01/2024"));
    }

    #[test]
    fn samples_are_ordered_numerically() {
        let series: SampleSeries<HeartRateSample> = serde_json::from_value(json!({
            "1000": { "bpm": 70, "time": 1000 },
            "200": { "bpm": 65, "time": 200 },
            "30": { "bpm": 60 },
            "x": { "bpm": 99 },
            "400": { "time": 400 },
        }))
        .unwrap();
        assert_eq!(ordered_samples(&series), vec![(30, 60.0), (200, 65.0), (1000, 70.0)]);
    }

    #[test]
    fn latest_weight_wins_regardless_of_key_order() {
        let series: SampleSeries<WeightSample> = serde_json::from_value(json!({
            "900": { "weight": 72.4, "time": 900 },
            "1000": { "weight": 72.9, "time": 100 },
        }))
        .unwrap();
        assert_eq!(latest_sample(&series), Some((900, 72.4)));
        assert_eq!(latest_sample(&SampleSeries::<WeightSample>::new()), None);
    }

    #[test]
    fn sleep_day_ignores_non_session_entries() {
        let day: SleepDay = serde_json::from_value(json!({
            "deep": [ { "duration": 3600 }, { "duration": 1800 } ],
            "awake": [ { "duration": 600 } ],
            "score": 82,
        }))
        .unwrap();
        let stages = day.stages();
        assert_eq!(stages.len(), 2);
        assert!(stages.iter().any(|(name, sessions)| *name == "deep" && sessions.len() == 2));
    }

    #[test]
    fn exercise_day_decodes_sessions() {
        let day: ExerciseDay = serde_json::from_value(json!({
            "totalDuration": 2700,
            "sessions": [ { "duration": 1800, "type": "running", "start": 10, "end": 1810 } ],
        }))
        .unwrap();
        assert_eq!(day.total_duration, Some(2700.0));
        assert_eq!(day.sessions[0].label.as_deref(), Some("running"));
    }

    #[test]
    fn category_order_is_fixed() {
        let keys: Vec<_> = Category::ALL.iter().map(|c| c.key()).collect();
        assert_eq!(
            keys,
            vec!["calories", "exercise", "heartRate", "hydration", "oxygen", "sleep", "steps", "weight"]
        );
    }
}

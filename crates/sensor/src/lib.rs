pub mod client;
pub mod model;

pub use client::{FetchOutcome, FileSource, HomeAssistantClient, SensorError, SensorSource, parse_state};
pub use model::{Category, RawCollection, SensorSnapshot};

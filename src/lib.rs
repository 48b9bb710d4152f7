//! Airwatch Library
//!
//! Client-side core of the weather and air-quality monitor: the REST client,
//! the coordinated refresh loop, unit and AQI helpers, preferences and CSV
//! export.

pub mod aqi;
pub mod api;
pub mod config;
pub mod dashboard;
pub mod export;
pub mod format;
pub mod history;
pub mod models;
pub mod preferences;
pub mod refresh;
pub mod traits;
pub mod units;

// Re-export commonly used types
pub use api::{ApiClient, FetchError, HistoryQuery};
pub use aqi::{AqiLevel, classify};
pub use config::AppConfig;
pub use dashboard::Dashboard;
pub use export::{ExportKind, ExportOptions, Quoting, to_delimited_text, write_export};
pub use history::{HistoryView, PageRequest, PageSize};
pub use models::{
    AirQualityReading, Location, Measurement, MetricKey, StatsPeriod, WeatherReading,
};
pub use preferences::{Preference, PreferenceStore, PreferenceUpdate, Theme};
pub use refresh::{
    CoordinatorStatus, FetchState, RefreshCoordinator, RefreshParams, SeriesHandle,
};
pub use traits::{Clock, MockClock, SystemClock};
pub use units::{TemperatureUnit, convert, unit_label};

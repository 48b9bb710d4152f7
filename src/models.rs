//! Wire and domain types for the weather and air-quality API.
//!
//! Every endpoint answers with the same envelope (`status`, `data`, optional
//! `message` and `pagination`). Row types mirror the columns the service
//! returns; numeric columns are optional because sensors drop readings.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};

/// Response envelope shared by every endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub status: Option<String>,
    pub data: T,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

/// Body shape of a failed request; only the message is of interest.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
    pub total: u64,
    #[serde(default)]
    pub pages: Option<u32>,
}

/// One page of rows plus the total row count reported by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: Option<Pagination>,
}

impl<T> Page<T> {
    pub fn total(&self) -> u64 {
        self.pagination.map_or(0, |p| p.total)
    }
}

/// `/…/current` returns an object for a single location and a list otherwise.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

/// Aggregation bucket size for the stats endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsPeriod {
    Hourly,
    #[default]
    Daily,
}

impl StatsPeriod {
    pub fn as_str(self) -> &'static str {
        match self {
            StatsPeriod::Hourly => "hourly",
            StatsPeriod::Daily => "daily",
        }
    }
}

impl fmt::Display for StatsPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatsPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hourly" => Ok(StatsPeriod::Hourly),
            "daily" => Ok(StatsPeriod::Daily),
            other => Err(format!("unknown period '{other}', expected hourly or daily")),
        }
    }
}

/// The service emits naive ISO timestamps (`2025-01-15T10:00:00`) or RFC 3339
/// with an offset depending on the column type; accept both.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, String> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.naive_utc());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .or_else(|_| {
            chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(|d| d.and_time(NaiveTime::MIN))
        })
        .map_err(|e| format!("invalid timestamp '{raw}': {e}"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub location_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: NaiveDateTime,
    pub location_id: String,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub pressure: Option<f64>,
    #[serde(default)]
    pub wind_speed: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQualityReading {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: NaiveDateTime,
    pub location_id: String,
    #[serde(default)]
    pub aqi: Option<f64>,
    #[serde(default)]
    pub aqi_category: Option<String>,
    #[serde(default)]
    pub pm25: Option<f64>,
    #[serde(default)]
    pub pm10: Option<f64>,
    #[serde(default)]
    pub o3: Option<f64>,
    #[serde(default)]
    pub no2: Option<f64>,
    #[serde(default)]
    pub so2: Option<f64>,
    #[serde(default)]
    pub co: Option<f64>,
    #[serde(default)]
    pub dominant_pollutant: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherStats {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub bucket: NaiveDateTime,
    pub location_id: String,
    #[serde(default)]
    pub period_type: Option<StatsPeriod>,
    #[serde(default)]
    pub avg_temperature: Option<f64>,
    #[serde(default)]
    pub min_temperature: Option<f64>,
    #[serde(default)]
    pub max_temperature: Option<f64>,
    #[serde(default)]
    pub avg_humidity: Option<f64>,
    #[serde(default)]
    pub min_humidity: Option<f64>,
    #[serde(default)]
    pub max_humidity: Option<f64>,
    #[serde(default)]
    pub avg_pressure: Option<f64>,
    #[serde(default)]
    pub avg_wind_speed: Option<f64>,
    #[serde(default)]
    pub max_wind_speed: Option<f64>,
    #[serde(default)]
    pub sample_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQualityStats {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub bucket: NaiveDateTime,
    pub location_id: String,
    #[serde(default)]
    pub period_type: Option<StatsPeriod>,
    #[serde(default)]
    pub avg_aqi: Option<f64>,
    #[serde(default)]
    pub min_aqi: Option<f64>,
    #[serde(default)]
    pub max_aqi: Option<f64>,
    #[serde(default)]
    pub avg_pm25: Option<f64>,
    #[serde(default)]
    pub max_pm25: Option<f64>,
    #[serde(default)]
    pub avg_pm10: Option<f64>,
    #[serde(default)]
    pub max_pm10: Option<f64>,
    #[serde(default)]
    pub avg_o3: Option<f64>,
    #[serde(default)]
    pub avg_no2: Option<f64>,
    #[serde(default)]
    pub avg_so2: Option<f64>,
    #[serde(default)]
    pub avg_co: Option<f64>,
    #[serde(default)]
    pub sample_count: Option<u64>,
    #[serde(default)]
    pub dominant_pollutant: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherTrend {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub date: NaiveDateTime,
    pub location_id: String,
    #[serde(default)]
    pub avg_temperature: Option<f64>,
    #[serde(default)]
    pub min_temperature: Option<f64>,
    #[serde(default)]
    pub max_temperature: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQualityTrend {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub date: NaiveDateTime,
    pub location_id: String,
    #[serde(default)]
    pub avg_aqi: Option<f64>,
    #[serde(default)]
    pub max_aqi: Option<f64>,
    #[serde(default)]
    pub avg_pm25: Option<f64>,
    #[serde(default)]
    pub avg_pm10: Option<f64>,
}

/// Metrics carried by a [`Measurement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    Temperature,
    Humidity,
    WindSpeed,
    Pressure,
    Aqi,
    Pm25,
    Pm10,
    O3,
    No2,
    So2,
    Co,
}

/// Source-agnostic view of one reading, keyed by metric.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub timestamp: NaiveDateTime,
    pub location_id: String,
    pub values: BTreeMap<MetricKey, Option<f64>>,
}

impl Measurement {
    pub fn value(&self, key: MetricKey) -> Option<f64> {
        self.values.get(&key).copied().flatten()
    }
}

impl From<&WeatherReading> for Measurement {
    fn from(r: &WeatherReading) -> Self {
        let values = BTreeMap::from([
            (MetricKey::Temperature, r.temperature),
            (MetricKey::Humidity, r.humidity),
            (MetricKey::WindSpeed, r.wind_speed),
            (MetricKey::Pressure, r.pressure),
        ]);
        Self {
            timestamp: r.timestamp,
            location_id: r.location_id.clone(),
            values,
        }
    }
}

impl From<&AirQualityReading> for Measurement {
    fn from(r: &AirQualityReading) -> Self {
        let values = BTreeMap::from([
            (MetricKey::Aqi, r.aqi),
            (MetricKey::Pm25, r.pm25),
            (MetricKey::Pm10, r.pm10),
            (MetricKey::O3, r.o3),
            (MetricKey::No2, r.no2),
            (MetricKey::So2, r.so2),
            (MetricKey::Co, r.co),
        ]);
        Self {
            timestamp: r.timestamp,
            location_id: r.location_id.clone(),
            values,
        }
    }
}

/// Convert rows into measurements, sorted chronologically ascending.
///
/// The historical endpoints page newest-first; series consumers expect the
/// opposite order.
pub fn to_series<'a, R>(rows: impl IntoIterator<Item = &'a R>) -> Vec<Measurement>
where
    R: 'a,
    &'a R: Into<Measurement>,
{
    let mut series: Vec<Measurement> = rows.into_iter().map(Into::into).collect();
    series.sort_by_key(|m| m.timestamp);
    series
}

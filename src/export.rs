//! CSV export of historical rows.
//!
//! By default fields are joined with commas as-is. Values containing commas or
//! quotes are not escaped; the exported columns are numeric or identifiers.
//! [`Quoting::Rfc4180`] quotes fields that need it.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

pub const CSV_MIME_TYPE: &str = "text/csv";

/// A column in the exported file: the row field to read and its header text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub key: String,
    pub header: String,
}

impl Column {
    /// Column whose header is the key itself.
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            header: key.to_string(),
        }
    }

    pub fn with_header(key: &str, header: &str) -> Self {
        Self {
            key: key.to_string(),
            header: header.to_string(),
        }
    }
}

pub fn weather_columns() -> Vec<Column> {
    vec![
        Column::with_header("timestamp", "Timestamp"),
        Column::with_header("location_id", "Location"),
        Column::with_header("temperature", "Temperature (C)"),
        Column::with_header("humidity", "Humidity (%)"),
        Column::with_header("pressure", "Pressure (hPa)"),
        Column::with_header("wind_speed", "Wind Speed (m/s)"),
    ]
}

pub fn air_quality_columns() -> Vec<Column> {
    vec![
        Column::with_header("timestamp", "Timestamp"),
        Column::with_header("location_id", "Location"),
        Column::with_header("aqi", "AQI"),
        Column::with_header("aqi_category", "Category"),
        Column::with_header("pm25", "PM2.5"),
        Column::with_header("pm10", "PM10"),
        Column::with_header("o3", "O3"),
        Column::with_header("no2", "NO2"),
        Column::with_header("so2", "SO2"),
        Column::with_header("co", "CO"),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quoting {
    /// Plain join, no escaping.
    #[default]
    None,
    /// Quote fields containing delimiters, quotes or newlines.
    Rfc4180,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExportOptions {
    pub quoting: Quoting,
}

/// Which historical dataset an export holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Weather,
    AirQuality,
}

impl ExportKind {
    pub fn file_name(self) -> &'static str {
        match self {
            ExportKind::Weather => "weather_data.csv",
            ExportKind::AirQuality => "air_quality_data.csv",
        }
    }

    pub fn columns(self) -> Vec<Column> {
        match self {
            ExportKind::Weather => weather_columns(),
            ExportKind::AirQuality => air_quality_columns(),
        }
    }
}

/// Raw field text: numbers as JSON renders them, strings verbatim, null or
/// missing as empty.
fn raw_field(row: &Value, key: &str) -> String {
    match row.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn row_fields<T: Serialize>(rows: &[T], columns: &[Column]) -> Result<Vec<Vec<String>>> {
    rows.iter()
        .map(|row| -> Result<Vec<String>> {
            let value = serde_json::to_value(row).context("Failed to serialize export row")?;
            Ok(columns.iter().map(|c| raw_field(&value, &c.key)).collect())
        })
        .collect()
}

/// Header line plus one line per row, joined by `\n`.
///
/// Returns `Ok(None)` for empty `rows`; the caller writes nothing in that case.
pub fn to_delimited_text<T: Serialize>(
    rows: &[T],
    columns: &[Column],
    options: ExportOptions,
) -> Result<Option<String>> {
    if rows.is_empty() {
        return Ok(None);
    }
    let headers: Vec<&str> = columns.iter().map(|c| c.header.as_str()).collect();
    let records = row_fields(rows, columns)?;

    let quote_style = match options.quoting {
        Quoting::None => csv::QuoteStyle::Never,
        Quoting::Rfc4180 => csv::QuoteStyle::Necessary,
    };
    let mut writer = csv::WriterBuilder::new()
        .quote_style(quote_style)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(&headers)?;
    for record in &records {
        writer.write_record(record)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV writer: {}", e.error()))?;

    let mut text = String::from_utf8(bytes).context("CSV output is not UTF-8")?;
    if text.ends_with('\n') {
        text.pop();
    }
    Ok(Some(text))
}

/// Serialize `rows` and write them to `dir/<kind file name>`.
///
/// Returns the written path, or `None` without touching the filesystem when
/// there is nothing to export.
pub fn write_export<T: Serialize>(
    dir: &Path,
    kind: ExportKind,
    rows: &[T],
    options: ExportOptions,
) -> Result<Option<PathBuf>> {
    let Some(text) = to_delimited_text(rows, &kind.columns(), options)? else {
        tracing::debug!("Nothing to export for {}", kind.file_name());
        return Ok(None);
    };

    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory {}", dir.display()))?;
    let path = dir.join(kind.file_name());
    fs::write(&path, text.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;

    tracing::info!("Exported {} rows to {}", rows.len(), path.display());
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::tempdir;

    use super::*;

    fn ab_columns() -> Vec<Column> {
        vec![Column::new("a"), Column::new("b")]
    }

    #[test]
    fn test_empty_rows_produce_nothing() {
        let rows: Vec<Value> = Vec::new();
        let text = to_delimited_text(&rows, &ab_columns(), ExportOptions::default()).unwrap();
        assert_eq!(text, None);
    }

    #[test]
    fn test_single_row_two_lines() {
        let rows = vec![json!({"a": 1, "b": 2})];
        let text = to_delimited_text(&rows, &ab_columns(), ExportOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(text, "a,b\n1,2");
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn test_rows_keep_input_order_and_column_order() {
        let rows = vec![
            json!({"b": "x", "a": 3}),
            json!({"a": 1.5, "b": "y", "ignored": true}),
        ];
        let columns = vec![Column::with_header("b", "B"), Column::with_header("a", "A")];
        let text = to_delimited_text(&rows, &columns, ExportOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(text, "B,A\nx,3\ny,1.5");
    }

    #[test]
    fn test_missing_and_null_fields_are_empty() {
        let rows = vec![json!({"a": null})];
        let text = to_delimited_text(&rows, &ab_columns(), ExportOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(text, "a,b\n,");
    }

    #[test]
    fn test_unquoted_mode_does_not_escape() {
        let rows = vec![json!({"a": "x,y", "b": "say \"hi\""})];
        let text = to_delimited_text(&rows, &ab_columns(), ExportOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(text, "a,b\nx,y,say \"hi\"");
    }

    #[test]
    fn test_rfc4180_mode_quotes() {
        let rows = vec![json!({"a": "x,y", "b": "say \"hi\""})];
        let options = ExportOptions {
            quoting: Quoting::Rfc4180,
        };
        let text = to_delimited_text(&rows, &ab_columns(), options).unwrap().unwrap();
        assert_eq!(text, "a,b\n\"x,y\",\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_weather_rows_use_raw_values() {
        let rows = vec![json!({
            "timestamp": "2025-01-15T10:00:00",
            "location_id": "LOC001",
            "temperature": 22.5,
            "humidity": 65,
            "pressure": null,
            "wind_speed": 3.2,
        })];
        let text = to_delimited_text(&rows, &weather_columns(), ExportOptions::default())
            .unwrap()
            .unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "Timestamp,Location,Temperature (C),Humidity (%),Pressure (hPa),Wind Speed (m/s)"
        );
        assert_eq!(lines[1], "2025-01-15T10:00:00,LOC001,22.5,65,,3.2");
    }

    #[test]
    fn test_offsets_and_integers_are_kept() {
        let rows = vec![json!({
            "timestamp": "2025-01-15T10:00:00+05:30",
            "location_id": "LOC001",
            "aqi": 42,
            "pm25": 8,
        })];
        let text = to_delimited_text(&rows, &air_quality_columns(), ExportOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(
            text.lines().nth(1),
            Some("2025-01-15T10:00:00+05:30,LOC001,42,,8,,,,,")
        );
    }

    #[test]
    fn test_write_export_skips_empty() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("out");
        let rows: Vec<Value> = Vec::new();

        let written =
            write_export(&target, ExportKind::Weather, &rows, ExportOptions::default()).unwrap();

        assert_eq!(written, None);
        assert!(!target.exists());
    }

    #[test]
    fn test_write_export_writes_named_file() {
        let dir = tempdir().unwrap();
        let rows = vec![json!({"timestamp": "t", "location_id": "LOC001", "aqi": 42})];

        let written = write_export(dir.path(), ExportKind::AirQuality, &rows, ExportOptions::default())
            .unwrap()
            .unwrap();

        assert_eq!(written.file_name().unwrap(), "air_quality_data.csv");
        let content = fs::read_to_string(&written).unwrap();
        assert!(content.starts_with("Timestamp,Location,AQI,Category,"));
        assert!(content.ends_with("t,LOC001,42,,,,,,,"));
    }
}

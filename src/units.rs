//! Temperature unit conversion.
//!
//! The service reports every temperature in Celsius. Conversion happens at
//! display time and never rounds; formatting helpers round for presentation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TemperatureUnit {
    #[default]
    #[serde(rename = "C")]
    Celsius,
    #[serde(rename = "F")]
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn toggled(self) -> Self {
        match self {
            TemperatureUnit::Celsius => TemperatureUnit::Fahrenheit,
            TemperatureUnit::Fahrenheit => TemperatureUnit::Celsius,
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemperatureUnit::Celsius => f.write_str("C"),
            TemperatureUnit::Fahrenheit => f.write_str("F"),
        }
    }
}

impl FromStr for TemperatureUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "C" | "c" => Ok(TemperatureUnit::Celsius),
            "F" | "f" => Ok(TemperatureUnit::Fahrenheit),
            other => Err(format!("unknown temperature unit '{other}', expected C or F")),
        }
    }
}

/// Convert a Celsius value into `unit`. `None` passes through.
pub fn convert(value: Option<f64>, unit: TemperatureUnit) -> Option<f64> {
    let celsius = value?;
    Some(match unit {
        TemperatureUnit::Celsius => celsius,
        TemperatureUnit::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
    })
}

pub fn unit_label(unit: TemperatureUnit) -> &'static str {
    match unit {
        TemperatureUnit::Celsius => "°C",
        TemperatureUnit::Fahrenheit => "°F",
    }
}

/// Converted value with `decimals` places and the unit symbol, or `--`.
pub fn format_temperature(value: Option<f64>, unit: TemperatureUnit, decimals: usize) -> String {
    match convert(value, unit) {
        Some(v) => format!("{v:.decimals$} {}", unit_label(unit)),
        None => "--".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freezing_and_boiling_points() {
        assert_eq!(convert(Some(0.0), TemperatureUnit::Fahrenheit), Some(32.0));
        assert_eq!(convert(Some(100.0), TemperatureUnit::Fahrenheit), Some(212.0));
        assert_eq!(convert(Some(-40.0), TemperatureUnit::Fahrenheit), Some(-40.0));
    }

    #[test]
    fn test_celsius_is_identity() {
        assert_eq!(convert(Some(22.5), TemperatureUnit::Celsius), Some(22.5));
    }

    #[test]
    fn test_none_passes_through() {
        assert_eq!(convert(None, TemperatureUnit::Celsius), None);
        assert_eq!(convert(None, TemperatureUnit::Fahrenheit), None);
    }

    #[test]
    fn test_no_rounding() {
        assert_eq!(convert(Some(22.5), TemperatureUnit::Fahrenheit), Some(72.5));
        assert_eq!(convert(Some(0.1), TemperatureUnit::Fahrenheit), Some(0.1 * 9.0 / 5.0 + 32.0));
    }

    #[test]
    fn test_unit_labels() {
        assert_eq!(unit_label(TemperatureUnit::Celsius), "°C");
        assert_eq!(unit_label(TemperatureUnit::Fahrenheit), "°F");
    }

    #[test]
    fn test_format_temperature() {
        assert_eq!(format_temperature(Some(22.0), TemperatureUnit::Fahrenheit, 1), "71.6 °F");
        assert_eq!(format_temperature(Some(22.04), TemperatureUnit::Celsius, 1), "22.0 °C");
        assert_eq!(format_temperature(None, TemperatureUnit::Celsius, 1), "--");
    }

    #[test]
    fn test_parse_and_serialize() {
        assert_eq!("f".parse::<TemperatureUnit>().unwrap(), TemperatureUnit::Fahrenheit);
        assert!("K".parse::<TemperatureUnit>().is_err());
        assert_eq!(serde_json::to_string(&TemperatureUnit::Celsius).unwrap(), "\"C\"");
        assert_eq!(TemperatureUnit::Celsius.toggled(), TemperatureUnit::Fahrenheit);
    }

    mod proptest_tests {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn celsius_never_changes_value(x in -1.0e6f64..1.0e6) {
                prop_assert_eq!(convert(Some(x), TemperatureUnit::Celsius), Some(x));
            }

            #[test]
            fn fahrenheit_is_monotonic(a in -500.0f64..500.0, b in -500.0f64..500.0) {
                let fa = convert(Some(a), TemperatureUnit::Fahrenheit).unwrap();
                let fb = convert(Some(b), TemperatureUnit::Fahrenheit).unwrap();
                if a < b {
                    prop_assert!(fa < fb);
                }
            }
        }
    }
}

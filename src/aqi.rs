//! Air Quality Index classification.
//!
//! Maps a raw AQI value onto the EPA category bands. The lookup is total: a
//! missing value reads as the lowest band, anything above the table (or NaN)
//! as the highest.

/// One EPA category band. A value belongs to the first band whose
/// `upper_bound` is greater than or equal to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AqiLevel {
    pub upper_bound: f64,
    pub color: &'static str,
    pub category: &'static str,
    pub description: &'static str,
}

/// Ascending by `upper_bound`, covering 0..=500.
pub const AQI_LEVELS: [AqiLevel; 6] = [
    AqiLevel {
        upper_bound: 50.0,
        color: "#00e400",
        category: "Good",
        description: "Air quality is satisfactory",
    },
    AqiLevel {
        upper_bound: 100.0,
        color: "#ffff00",
        category: "Moderate",
        description: "Acceptable air quality",
    },
    AqiLevel {
        upper_bound: 150.0,
        color: "#ff7e00",
        category: "Unhealthy for Sensitive Groups",
        description: "Sensitive groups may experience effects",
    },
    AqiLevel {
        upper_bound: 200.0,
        color: "#ff0000",
        category: "Unhealthy",
        description: "Everyone may experience health effects",
    },
    AqiLevel {
        upper_bound: 300.0,
        color: "#8f3f97",
        category: "Very Unhealthy",
        description: "Health alert: significant risk",
    },
    AqiLevel {
        upper_bound: 500.0,
        color: "#7e0023",
        category: "Hazardous",
        description: "Emergency conditions",
    },
];

pub fn classify(index: Option<f64>) -> &'static AqiLevel {
    let Some(index) = index else {
        return &AQI_LEVELS[0];
    };
    AQI_LEVELS
        .iter()
        .find(|level| index <= level.upper_bound)
        .unwrap_or(&AQI_LEVELS[AQI_LEVELS.len() - 1])
}

pub fn aqi_color(index: Option<f64>) -> &'static str {
    classify(index).color
}

pub fn aqi_category(index: Option<f64>) -> &'static str {
    classify(index).category
}

pub fn aqi_description(index: Option<f64>) -> &'static str {
    classify(index).description
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_upper_bound_is_inclusive() {
        assert_eq!(classify(Some(0.0)).category, classify(Some(50.0)).category);
        assert_ne!(classify(Some(51.0)).category, classify(Some(50.0)).category);
        assert_eq!(classify(Some(50.5)).category, "Moderate");
    }

    #[test]
    fn test_each_band() {
        assert_eq!(aqi_category(Some(25.0)), "Good");
        assert_eq!(aqi_category(Some(100.0)), "Moderate");
        assert_eq!(aqi_category(Some(101.0)), "Unhealthy for Sensitive Groups");
        assert_eq!(aqi_category(Some(175.0)), "Unhealthy");
        assert_eq!(aqi_category(Some(300.0)), "Very Unhealthy");
        assert_eq!(aqi_category(Some(450.0)), "Hazardous");
    }

    #[test]
    fn test_none_is_lowest_band() {
        assert_eq!(classify(None), &AQI_LEVELS[0]);
        assert_eq!(aqi_color(None), "#00e400");
    }

    #[test]
    fn test_out_of_range_high_is_highest_band() {
        assert_eq!(aqi_category(Some(501.0)), "Hazardous");
        assert_eq!(aqi_category(Some(f64::INFINITY)), "Hazardous");
        assert_eq!(aqi_category(Some(f64::NAN)), "Hazardous");
    }

    #[test]
    fn test_negative_is_lowest_band() {
        assert_eq!(aqi_category(Some(-3.0)), "Good");
    }

    #[test]
    fn test_table_is_ascending() {
        for pair in AQI_LEVELS.windows(2) {
            assert!(pair[0].upper_bound < pair[1].upper_bound);
        }
        assert_eq!(AQI_LEVELS[AQI_LEVELS.len() - 1].upper_bound, 500.0);
    }

    #[test]
    fn test_description_and_color() {
        assert_eq!(aqi_description(Some(160.0)), "Everyone may experience health effects");
        assert_eq!(aqi_color(Some(250.0)), "#8f3f97");
    }

    mod proptest_tests {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn every_value_maps_to_a_known_level(x in proptest::num::f64::ANY) {
                let level = classify(Some(x));
                prop_assert!(AQI_LEVELS.iter().any(|l| l == level));
            }

            #[test]
            fn in_range_values_fit_their_band(x in 0.0f64..=500.0) {
                let level = classify(Some(x));
                prop_assert!(x <= level.upper_bound);
                let idx = AQI_LEVELS.iter().position(|l| l == level).unwrap();
                if idx > 0 {
                    prop_assert!(x > AQI_LEVELS[idx - 1].upper_bound);
                }
            }
        }
    }
}

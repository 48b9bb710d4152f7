//! The live dashboard: current conditions, trends and aggregates for one
//! location, refreshed together on a fixed interval.

use std::time::Duration;

use crate::api::{ApiClient, FetchError};
use crate::config::RefreshConfig;
use crate::models::{
    AirQualityReading, AirQualityTrend, Location, StatsPeriod, WeatherReading, WeatherStats,
    WeatherTrend,
};
use crate::refresh::{
    CoordinatorStatus, RefreshCoordinator, RefreshCycle, RefreshParams, SeriesHandle,
};

pub struct Dashboard {
    client: ApiClient,
    coordinator: RefreshCoordinator,
    current_weather: SeriesHandle<Option<WeatherReading>>,
    weather_trends: SeriesHandle<Vec<WeatherTrend>>,
    weather_stats: SeriesHandle<Vec<WeatherStats>>,
    current_air_quality: SeriesHandle<Option<AirQualityReading>>,
    air_quality_trends: SeriesHandle<Vec<AirQualityTrend>>,
}

impl Dashboard {
    pub fn new(client: ApiClient, config: &RefreshConfig) -> Self {
        let params = RefreshParams {
            location_id: None,
            period: config.period,
            trend_days: config.trend_days,
        };
        let mut builder =
            RefreshCoordinator::builder(Duration::from_secs(config.interval_secs)).params(params);

        let c = client.clone();
        let current_weather = builder.series("current_weather", move |p: RefreshParams| {
            let c = c.clone();
            async move {
                let rows = c.current_weather(p.location_id.as_deref()).await?;
                Ok::<_, FetchError>(rows.into_iter().next())
            }
        });

        let c = client.clone();
        let weather_trends = builder.series("weather_trends", move |p: RefreshParams| {
            let c = c.clone();
            async move { c.weather_trends(p.location_id.as_deref(), p.trend_days).await }
        });

        let c = client.clone();
        let weather_stats = builder.series("weather_stats", move |p: RefreshParams| {
            let c = c.clone();
            async move { c.weather_stats(p.location_id.as_deref(), p.period).await }
        });

        let c = client.clone();
        let current_air_quality = builder.series("current_air_quality", move |p: RefreshParams| {
            let c = c.clone();
            async move {
                let rows = c.current_air_quality(p.location_id.as_deref()).await?;
                Ok::<_, FetchError>(rows.into_iter().next())
            }
        });

        let c = client.clone();
        let air_quality_trends = builder.series("air_quality_trends", move |p: RefreshParams| {
            let c = c.clone();
            async move { c.air_quality_trends(p.location_id.as_deref(), p.trend_days).await }
        });

        Self {
            client,
            coordinator: builder.build(),
            current_weather,
            weather_trends,
            weather_stats,
            current_air_quality,
            air_quality_trends,
        }
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    pub fn start(&self) {
        self.coordinator.start();
    }

    pub fn stop(&self) {
        self.coordinator.stop();
    }

    pub fn refresh_now(&self) -> RefreshCycle {
        self.coordinator.refresh_now()
    }

    pub fn status(&self) -> CoordinatorStatus {
        self.coordinator.status()
    }

    pub fn take_error_notice(&self) -> Option<String> {
        self.coordinator.take_error_notice()
    }

    /// Switch location; `None` shows every location.
    pub fn set_location(&self, location_id: Option<String>) -> bool {
        self.coordinator.set_params(RefreshParams {
            location_id,
            ..self.coordinator.params()
        })
    }

    pub fn set_period(&self, period: StatsPeriod) -> bool {
        self.coordinator.set_params(RefreshParams {
            period,
            ..self.coordinator.params()
        })
    }

    /// Locations for the selector. A failure is reported through the error
    /// notice and yields an empty list.
    pub async fn load_locations(&self) -> Vec<Location> {
        match self.client.locations().await {
            Ok(locations) => locations,
            Err(e) => {
                tracing::warn!("Failed to load locations: {}", e);
                self.coordinator.post_error_notice(e.to_string());
                Vec::new()
            }
        }
    }

    pub fn current_weather(&self) -> &SeriesHandle<Option<WeatherReading>> {
        &self.current_weather
    }

    pub fn weather_trends(&self) -> &SeriesHandle<Vec<WeatherTrend>> {
        &self.weather_trends
    }

    pub fn weather_stats(&self) -> &SeriesHandle<Vec<WeatherStats>> {
        &self.weather_stats
    }

    pub fn current_air_quality(&self) -> &SeriesHandle<Option<AirQualityReading>> {
        &self.current_air_quality
    }

    pub fn air_quality_trends(&self) -> &SeriesHandle<Vec<AirQualityTrend>> {
        &self.air_quality_trends
    }
}

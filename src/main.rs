use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use airwatch::aqi;
use airwatch::config::AppConfig;
use airwatch::format::{format_date, format_date_time, format_value};
use airwatch::history::HistoricalRow;
use airwatch::preferences::{PreferenceStore, PreferenceUpdate, Theme};
use airwatch::refresh::CoordinatorStatus;
use airwatch::units::{TemperatureUnit, format_temperature, unit_label};
use airwatch::{
    AirQualityReading, ApiClient, Dashboard, ExportOptions, HistoryView, PageRequest, PageSize,
    Quoting, StatsPeriod, SystemClock, WeatherReading,
};

#[derive(Parser, Debug)]
#[command(name = "airwatch")]
#[command(about = "Weather and air-quality monitor client")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll current conditions, trends and stats until interrupted
    Watch {
        /// Location to show (default: all locations)
        #[arg(long)]
        location: Option<String>,
        /// Aggregation period for stats (hourly or daily)
        #[arg(long)]
        period: Option<StatsPeriod>,
        /// Fetch a single cycle and exit
        #[arg(long)]
        once: bool,
    },
    /// Show one page of historical readings
    History {
        dataset: Dataset,
        #[command(flatten)]
        filters: Filters,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Rows per page: 10, 20 or 50
        #[arg(long, default_value_t = 20)]
        page_size: u32,
    },
    /// Export historical readings matching the filters to CSV
    Export {
        dataset: Dataset,
        #[command(flatten)]
        filters: Filters,
        /// Output directory (default: export.directory from config)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Quote fields containing commas or quotes
        #[arg(long)]
        quote: bool,
    },
    /// Show or change display preferences
    Prefs {
        #[command(subcommand)]
        action: PrefsAction,
    },
}

#[derive(clap::Args, Debug)]
struct Filters {
    #[arg(long)]
    location: Option<String>,
    /// First day of the range, YYYY-MM-DD (default: 30 days ago)
    #[arg(long)]
    start: Option<NaiveDate>,
    /// Last day of the range, YYYY-MM-DD (default: today)
    #[arg(long)]
    end: Option<NaiveDate>,
}

impl Filters {
    fn to_request(&self) -> PageRequest {
        let mut request = PageRequest::new(&SystemClock);
        let start = self.start.unwrap_or(request.start());
        let end = self.end.unwrap_or(request.end());
        request.set_range(start, end);
        request.set_location(self.location.clone());
        request
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Dataset {
    Weather,
    AirQuality,
}

#[derive(Subcommand, Debug)]
enum PrefsAction {
    Show,
    Set {
        /// C or F
        #[arg(long)]
        unit: Option<TemperatureUnit>,
        /// light or dark
        #[arg(long)]
        theme: Option<Theme>,
    },
    ToggleUnit,
    ToggleTheme,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
        .parse_lossy("airwatch=debug");

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    if let Command::Prefs { action } = &args.command {
        return run_prefs(&config, action);
    }

    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    rt.block_on(async {
        let client = ApiClient::new(&config.api.base_url, &config.network)?;
        tracing::debug!("API client initialized for {}", client.base_url());

        match args.command {
            Command::Watch {
                location,
                period,
                once,
            } => run_watch(client, &config, location, period, once).await,
            Command::History {
                dataset,
                filters,
                page,
                page_size,
            } => {
                let page_size = PageSize::try_from(page_size).map_err(anyhow::Error::msg)?;
                let mut request = filters.to_request();
                request.set_page_size(page_size);
                request.set_page(page);

                let unit = PreferenceStore::open(&config.preferences.path).get().unit;
                match dataset {
                    Dataset::Weather => {
                        show_history(client, request, |r: &WeatherReading| weather_line(r, unit))
                            .await
                    }
                    Dataset::AirQuality => {
                        show_history(client, request, air_quality_line).await
                    }
                }
                Ok(())
            }
            Command::Export {
                dataset,
                filters,
                out,
                quote,
            } => {
                let dir = out.unwrap_or_else(|| config.export.directory.clone());
                let options = ExportOptions {
                    quoting: if quote { Quoting::Rfc4180 } else { Quoting::None },
                };
                let request = filters.to_request();
                let written = match dataset {
                    Dataset::Weather => {
                        HistoryView::<WeatherReading>::new(client, request)
                            .export(&dir, options)
                            .await
                    }
                    Dataset::AirQuality => {
                        HistoryView::<AirQualityReading>::new(client, request)
                            .export(&dir, options)
                            .await
                    }
                };
                match written {
                    Some(path) => println!("Wrote {}", path.display()),
                    None => println!("Nothing exported"),
                }
                Ok(())
            }
            Command::Prefs { .. } => Ok(()),
        }
    })
}

/// Run the dashboard until Ctrl-C, printing each settled cycle.
async fn run_watch(
    client: ApiClient,
    config: &AppConfig,
    location: Option<String>,
    period: Option<StatsPeriod>,
    once: bool,
) -> Result<()> {
    let prefs = PreferenceStore::open(&config.preferences.path);
    let dashboard = Dashboard::new(client, &config.refresh);

    let locations = dashboard.load_locations().await;
    tracing::info!(
        "Locations: {}",
        locations
            .iter()
            .map(|l| l.location_id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    dashboard.set_location(location);
    if let Some(period) = period {
        dashboard.set_period(period);
    }

    if once {
        dashboard.refresh_now().settled().await;
        report_notice(&dashboard);
        render(&dashboard, prefs.get().unit);
        return Ok(());
    }

    dashboard.start();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut poll = tokio::time::interval(Duration::from_millis(500));
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut awaiting_cycle = true;

    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    tracing::error!("Failed to listen for Ctrl-C: {}", e);
                }
                tracing::info!("Shutting down");
                break;
            }
            _ = poll.tick() => {
                report_notice(&dashboard);
                match dashboard.status() {
                    CoordinatorStatus::Loading => awaiting_cycle = true,
                    CoordinatorStatus::Idle => {}
                    CoordinatorStatus::Settled | CoordinatorStatus::PartialFailure => {
                        if awaiting_cycle {
                            render(&dashboard, prefs.get().unit);
                            awaiting_cycle = false;
                        }
                    }
                }
            }
        }
    }

    dashboard.stop();
    Ok(())
}

fn report_notice(dashboard: &Dashboard) {
    if let Some(notice) = dashboard.take_error_notice() {
        tracing::warn!("{}", notice);
    }
}

fn render(dashboard: &Dashboard, unit: TemperatureUnit) {
    dashboard.current_weather().with_state(|state| match &state.data {
        Some(Some(w)) => tracing::info!(
            "{} @ {}: {}, humidity {}%, pressure {} hPa, wind {} m/s",
            w.location_id,
            format_date_time(w.timestamp),
            format_temperature(w.temperature, unit, 1),
            format_value(w.humidity, 0),
            format_value(w.pressure, 0),
            format_value(w.wind_speed, 1)
        ),
        _ => tracing::info!("Weather: no current reading"),
    });

    dashboard.current_air_quality().with_state(|state| match &state.data {
        Some(Some(a)) => {
            let level = aqi::classify(a.aqi);
            tracing::info!(
                "{} AQI {} ({}): {}",
                a.location_id,
                format_value(a.aqi, 0),
                level.category,
                level.description
            );
        }
        _ => tracing::info!("Air quality: no current reading"),
    });

    dashboard.weather_trends().with_state(|state| {
        for t in state.data.iter().flatten() {
            tracing::info!(
                "  {} temp {} .. {} {}",
                format_date(t.date.date()),
                format_value(airwatch::convert(t.min_temperature, unit), 1),
                format_value(airwatch::convert(t.max_temperature, unit), 1),
                unit_label(unit)
            );
        }
    });

    dashboard.air_quality_trends().with_state(|state| {
        for t in state.data.iter().flatten() {
            tracing::info!(
                "  {} AQI avg {} max {}",
                format_date(t.date.date()),
                format_value(t.avg_aqi, 0),
                format_value(t.max_aqi, 0)
            );
        }
    });

    dashboard.weather_stats().with_state(|state| {
        let buckets = state.data.as_ref().map_or(0, Vec::len);
        tracing::info!("{} stat buckets", buckets);
    });
}

async fn show_history<T, F>(client: ApiClient, request: PageRequest, line: F)
where
    T: HistoricalRow,
    F: Fn(&T) -> String,
{
    let mut view = HistoryView::<T>::new(client, request);
    view.load().await;

    for row in view.rows() {
        println!("{}", line(row));
    }
    println!(
        "Page {} of {} ({} rows)",
        view.request().page(),
        view.page_count().max(1),
        view.total()
    );
}

fn weather_line(r: &WeatherReading, unit: TemperatureUnit) -> String {
    format!(
        "{}  {:<8}  {:>9}  {:>4}%  {:>6} hPa  {:>5} m/s",
        format_date_time(r.timestamp),
        r.location_id,
        format_temperature(r.temperature, unit, 1),
        format_value(r.humidity, 0),
        format_value(r.pressure, 0),
        format_value(r.wind_speed, 1)
    )
}

fn air_quality_line(r: &AirQualityReading) -> String {
    let category = r
        .aqi_category
        .clone()
        .unwrap_or_else(|| aqi::aqi_category(r.aqi).to_string());
    format!(
        "{}  {:<8}  AQI {:>4}  {:<30}  PM2.5 {:>6}  PM10 {:>6}",
        format_date_time(r.timestamp),
        r.location_id,
        format_value(r.aqi, 0),
        category,
        format_value(r.pm25, 1),
        format_value(r.pm10, 1)
    )
}

fn run_prefs(config: &AppConfig, action: &PrefsAction) -> Result<()> {
    let prefs = PreferenceStore::open(&config.preferences.path);

    match action {
        PrefsAction::Show => {}
        PrefsAction::Set { unit, theme } => {
            prefs.set(PreferenceUpdate {
                unit: *unit,
                theme: *theme,
            });
        }
        PrefsAction::ToggleUnit => {
            prefs.toggle_unit();
        }
        PrefsAction::ToggleTheme => {
            prefs.toggle_theme();
        }
    }

    let current = prefs.get();
    println!("unit:  {} ({})", current.unit, unit_label(current.unit));
    println!("theme: {}", current.theme);
    Ok(())
}

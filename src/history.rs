//! Paged browsing and export of historical readings.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::api::{ApiClient, FetchError, HistoryQuery};
use crate::export::{self, ExportKind, ExportOptions};
use crate::format::days_ago;
use crate::models::{AirQualityReading, Page, WeatherReading};
use crate::traits::Clock;

/// Rows requested for an export: effectively "everything in range".
pub const EXPORT_PAGE_SIZE: u32 = 10_000;

/// Default look-back for the historical date range.
pub const DEFAULT_RANGE_DAYS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageSize {
    Ten,
    #[default]
    Twenty,
    Fifty,
}

impl PageSize {
    pub const ALL: [PageSize; 3] = [PageSize::Ten, PageSize::Twenty, PageSize::Fifty];

    pub fn get(self) -> u32 {
        match self {
            PageSize::Ten => 10,
            PageSize::Twenty => 20,
            PageSize::Fifty => 50,
        }
    }
}

impl TryFrom<u32> for PageSize {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            10 => Ok(PageSize::Ten),
            20 => Ok(PageSize::Twenty),
            50 => Ok(PageSize::Fifty),
            other => Err(format!("page size must be 10, 20 or 50, got {other}")),
        }
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// Filters and position for a historical listing.
///
/// Changing any filter or the page size moves back to the first page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    location_id: Option<String>,
    start: NaiveDate,
    end: NaiveDate,
    page: u32,
    page_size: PageSize,
}

impl PageRequest {
    /// First page of the last 30 days, all locations.
    pub fn new(clock: &dyn Clock) -> Self {
        Self {
            location_id: None,
            start: days_ago(clock, DEFAULT_RANGE_DAYS),
            end: clock.today(),
            page: 1,
            page_size: PageSize::default(),
        }
    }

    pub fn location_id(&self) -> Option<&str> {
        self.location_id.as_deref()
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> PageSize {
        self.page_size
    }

    pub fn set_location(&mut self, location_id: Option<String>) {
        self.location_id = location_id;
        self.page = 1;
    }

    pub fn set_range(&mut self, start: NaiveDate, end: NaiveDate) {
        self.start = start;
        self.end = end;
        self.page = 1;
    }

    pub fn set_page_size(&mut self, page_size: PageSize) {
        self.page_size = page_size;
        self.page = 1;
    }

    /// Pages are 1-based; 0 is clamped to the first page.
    pub fn set_page(&mut self, page: u32) {
        self.page = page.max(1);
    }

    pub fn to_query(&self) -> HistoryQuery {
        HistoryQuery {
            location_id: self.location_id.clone(),
            start: Some(self.start),
            end: Some(self.end),
            page: self.page,
            per_page: self.page_size.get(),
        }
    }

    /// Query for an export: page 1 of the same filters, as many rows as allowed.
    pub fn export_query(&self) -> HistoryQuery {
        HistoryQuery {
            page: 1,
            per_page: EXPORT_PAGE_SIZE,
            ..self.to_query()
        }
    }
}

/// A row type served by one of the historical endpoints.
pub trait HistoricalRow: Send + Sized + 'static {
    const KIND: ExportKind;

    fn fetch(
        client: &ApiClient,
        query: &HistoryQuery,
    ) -> impl Future<Output = Result<Page<Self>, FetchError>> + Send;
}

impl HistoricalRow for WeatherReading {
    const KIND: ExportKind = ExportKind::Weather;

    fn fetch(
        client: &ApiClient,
        query: &HistoryQuery,
    ) -> impl Future<Output = Result<Page<Self>, FetchError>> + Send {
        client.weather_historical(query)
    }
}

impl HistoricalRow for AirQualityReading {
    const KIND: ExportKind = ExportKind::AirQuality;

    fn fetch(
        client: &ApiClient,
        query: &HistoryQuery,
    ) -> impl Future<Output = Result<Page<Self>, FetchError>> + Send {
        client.air_quality_historical(query)
    }
}

/// One page of historical rows for the current [`PageRequest`].
#[derive(Debug)]
pub struct HistoryView<T> {
    client: ApiClient,
    request: PageRequest,
    rows: Vec<T>,
    total: u64,
}

impl<T: HistoricalRow> HistoryView<T> {
    pub fn new(client: ApiClient, request: PageRequest) -> Self {
        Self {
            client,
            request,
            rows: Vec::new(),
            total: 0,
        }
    }

    pub fn request(&self) -> &PageRequest {
        &self.request
    }

    /// Mutable access to the filters; call [`load`](Self::load) afterwards.
    pub fn request_mut(&mut self) -> &mut PageRequest {
        &mut self.request
    }

    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    /// Total rows matching the filters across all pages.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn page_count(&self) -> u64 {
        self.total.div_ceil(u64::from(self.request.page_size.get()))
    }

    /// Fetch the current page. A failure leaves the view empty.
    pub async fn load(&mut self) {
        let query = self.request.to_query();
        match T::fetch(&self.client, &query).await {
            Ok(page) => {
                self.total = page.total();
                self.rows = page.data;
                tracing::debug!(
                    "Loaded {} page {} ({} rows, {} total)",
                    T::KIND.file_name(),
                    query.page,
                    self.rows.len(),
                    self.total
                );
            }
            Err(e) => {
                tracing::debug!("Historical fetch failed: {}", e);
                self.rows.clear();
                self.total = 0;
            }
        }
    }

    /// Export every row matching the current filters into `dir`.
    ///
    /// Rows are written as received, not as parsed into `T`. Returns the
    /// written file, or `None` if there was nothing to export or the export
    /// failed.
    pub async fn export(&self, dir: &Path, options: ExportOptions) -> Option<PathBuf> {
        let query = self.request.export_query();
        let page = match self.client.historical_raw(T::KIND, &query).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!("Export fetch failed: {}", e);
                return None;
            }
        };

        match export::write_export(dir, T::KIND, &page.data, options) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!("Export failed: {:#}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::MockClock;

    fn request() -> PageRequest {
        let clock = MockClock::on_date(NaiveDate::from_ymd_opt(2025, 3, 15).unwrap());
        PageRequest::new(&clock)
    }

    #[test]
    fn test_page_size_values() {
        assert_eq!(PageSize::default(), PageSize::Twenty);
        assert_eq!(PageSize::try_from(50), Ok(PageSize::Fifty));
        assert!(PageSize::try_from(25).is_err());
        assert_eq!(
            PageSize::ALL.map(PageSize::get),
            [10, 20, 50]
        );
    }

    #[test]
    fn test_default_request_covers_last_30_days() {
        let clock = MockClock::on_date(NaiveDate::from_ymd_opt(2025, 3, 15).unwrap());
        let req = PageRequest::new(&clock);

        assert_eq!(req.end(), NaiveDate::from_ymd_opt(2025, 3, 15).unwrap());
        assert_eq!(req.start(), NaiveDate::from_ymd_opt(2025, 2, 13).unwrap());
        assert_eq!(req.page(), 1);
        assert_eq!(req.page_size(), PageSize::Twenty);
        assert_eq!(req.location_id(), None);
    }

    #[test]
    fn test_filter_changes_reset_page() {
        let mut req = request();

        req.set_page(4);
        req.set_location(Some("LOC002".into()));
        assert_eq!(req.page(), 1);

        req.set_page(3);
        req.set_page_size(PageSize::Fifty);
        assert_eq!(req.page(), 1);

        req.set_page(2);
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        req.set_range(start, end);
        assert_eq!(req.page(), 1);
    }

    #[test]
    fn test_set_page_keeps_filters() {
        let mut req = request();
        req.set_location(Some("LOC001".into()));
        req.set_page(5);
        assert_eq!(req.page(), 5);
        assert_eq!(req.location_id(), Some("LOC001"));

        req.set_page(0);
        assert_eq!(req.page(), 1);
    }

    #[test]
    fn test_queries() {
        let mut req = request();
        req.set_page_size(PageSize::Ten);
        req.set_page(3);

        let q = req.to_query();
        assert_eq!(q.page, 3);
        assert_eq!(q.per_page, 10);
        assert_eq!(q.start, Some(req.start()));
        assert_eq!(q.end, Some(req.end()));

        let export = req.export_query();
        assert_eq!(export.page, 1);
        assert_eq!(export.per_page, EXPORT_PAGE_SIZE);
        assert_eq!(export.start, q.start);
    }
}

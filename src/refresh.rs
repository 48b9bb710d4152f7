//! Coordinated polling of independent data series.
//!
//! A [`RefreshCoordinator`] owns a set of series. Each refresh cycle draws a
//! monotonically increasing token and dispatches every series fetch as its own
//! task. A response is applied only if the coordinator is still active and the
//! token is the latest one dispatched for that series, so a slow response from
//! an older cycle can never overwrite a newer one.
//!
//! Cycles run immediately on [`start`](RefreshCoordinator::start), on every
//! tick of the refresh interval, and whenever the parameters change (which
//! also restarts the interval). Teardown cancels the timer; in-flight fetches
//! are left to finish and their results are discarded.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::api::FetchError;
use crate::models::StatsPeriod;

/// Token identifying one refresh cycle.
pub type CycleId = u64;

/// Inputs shared by every series fetch in a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshParams {
    pub location_id: Option<String>,
    pub period: StatsPeriod,
    pub trend_days: u32,
}

impl Default for RefreshParams {
    fn default() -> Self {
        Self {
            location_id: None,
            period: StatsPeriod::Daily,
            trend_days: 7,
        }
    }
}

/// Loading/data/error status of one series.
///
/// `loading` is true only between dispatch and resolution of the latest
/// cycle. A failure keeps the previous `data`.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorStatus {
    /// No cycle has been dispatched yet.
    Idle,
    /// At least one series is waiting on its latest fetch.
    Loading,
    /// Every series settled without error.
    Settled,
    /// Every series settled and at least one holds an error.
    PartialFailure,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Slot<T> {
    state: FetchState<T>,
    latest: Option<CycleId>,
}

/// Read-only view of one series. Cheap to clone.
pub struct SeriesHandle<T> {
    name: Arc<str>,
    slot: Arc<Mutex<Slot<T>>>,
}

impl<T> Clone for SeriesHandle<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> fmt::Debug for SeriesHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeriesHandle")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<T> SeriesHandle<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inspect the current state without cloning the data.
    pub fn with_state<R>(&self, f: impl FnOnce(&FetchState<T>) -> R) -> R {
        f(&lock(&self.slot).state)
    }

    pub fn is_loading(&self) -> bool {
        self.with_state(|s| s.loading)
    }

    pub fn error(&self) -> Option<String> {
        self.with_state(|s| s.error.clone())
    }
}

impl<T: Clone> SeriesHandle<T> {
    /// Snapshot of the current state.
    pub fn state(&self) -> FetchState<T> {
        self.with_state(FetchState::clone)
    }

    pub fn data(&self) -> Option<T> {
        self.with_state(|s| s.data.clone())
    }
}

/// State shared between the coordinator and its in-flight fetch tasks.
struct Shared {
    active: CancellationToken,
    notice: Mutex<Option<String>>,
}

struct SeriesSummary {
    dispatched: bool,
    loading: bool,
    failed: bool,
}

type FetchFn<T> = Box<dyn Fn(RefreshParams) -> BoxFuture<'static, Result<T, FetchError>> + Send + Sync>;

/// Type-erased series so one coordinator can hold heterogeneous data.
trait Refreshable: Send + Sync {
    fn name(&self) -> &str;
    fn begin(&self, cycle: CycleId);
    fn spawn(&self, cycle: CycleId, params: RefreshParams, shared: Arc<Shared>) -> JoinHandle<()>;
    fn summary(&self) -> SeriesSummary;
    /// Wait for any apply in progress to finish.
    fn barrier(&self);
}

struct Series<T> {
    name: Arc<str>,
    slot: Arc<Mutex<Slot<T>>>,
    fetch: FetchFn<T>,
}

impl<T: Send + 'static> Refreshable for Series<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn begin(&self, cycle: CycleId) {
        let mut slot = lock(&self.slot);
        if slot.latest.is_none_or(|latest| cycle > latest) {
            slot.latest = Some(cycle);
            slot.state.loading = true;
        }
    }

    fn spawn(&self, cycle: CycleId, params: RefreshParams, shared: Arc<Shared>) -> JoinHandle<()> {
        let fut = (self.fetch)(params);
        let slot = Arc::clone(&self.slot);
        let name = Arc::clone(&self.name);
        tokio::spawn(async move {
            let result = fut.await;
            apply(&name, &slot, cycle, result, &shared);
        })
    }

    fn summary(&self) -> SeriesSummary {
        let slot = lock(&self.slot);
        SeriesSummary {
            dispatched: slot.latest.is_some(),
            loading: slot.state.loading,
            failed: slot.state.error.is_some(),
        }
    }

    fn barrier(&self) {
        drop(lock(&self.slot));
    }
}

fn apply<T>(
    name: &str,
    slot: &Mutex<Slot<T>>,
    cycle: CycleId,
    result: Result<T, FetchError>,
    shared: &Shared,
) {
    let mut slot = lock(slot);

    // Checked under the slot lock; `stop` takes every slot lock after
    // cancelling, so nothing lands once it returns.
    if shared.active.is_cancelled() {
        tracing::debug!("{}: discarding cycle {} response after teardown", name, cycle);
        return;
    }
    if slot.latest != Some(cycle) {
        tracing::debug!(
            "{}: discarding stale cycle {} response (latest is {:?})",
            name,
            cycle,
            slot.latest
        );
        return;
    }

    match result {
        Ok(data) => {
            slot.state.data = Some(data);
            slot.state.error = None;
        }
        Err(err) => {
            tracing::warn!("{}: refresh failed: {}", name, err);
            let message = err.to_string();
            slot.state.error = Some(message.clone());
            *lock(&shared.notice) = Some(message);
        }
    }
    slot.state.loading = false;
}

/// The tasks of one dispatched cycle.
#[must_use = "dropping a RefreshCycle detaches its tasks; call settled() to wait"]
pub struct RefreshCycle {
    id: CycleId,
    tasks: Vec<JoinHandle<()>>,
}

impl RefreshCycle {
    pub fn id(&self) -> CycleId {
        self.id
    }

    /// Number of series fetches dispatched in this cycle.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait until every series fetch of this cycle has resolved and been
    /// applied or discarded.
    pub async fn settled(self) {
        for result in futures::future::join_all(self.tasks).await {
            if let Err(e) = result {
                tracing::error!("refresh task for cycle {} failed: {}", self.id, e);
            }
        }
    }
}

struct DispatchState {
    params: RefreshParams,
    last_cycle: CycleId,
}

struct Inner {
    series: Vec<Box<dyn Refreshable>>,
    dispatch: Mutex<DispatchState>,
    shared: Arc<Shared>,
}

impl Inner {
    fn dispatch(&self) -> RefreshCycle {
        let (cycle, params) = {
            let mut state = lock(&self.dispatch);
            state.last_cycle += 1;
            let cycle = state.last_cycle;

            if self.shared.active.is_cancelled() {
                return RefreshCycle {
                    id: cycle,
                    tasks: Vec::new(),
                };
            }
            // Marked under the dispatch lock so tokens reach each series in order
            for series in &self.series {
                series.begin(cycle);
            }
            (cycle, state.params.clone())
        };

        tracing::debug!(
            "Dispatching refresh cycle {} for {} series (location: {:?}, period: {})",
            cycle,
            self.series.len(),
            params.location_id,
            params.period
        );

        let tasks = self
            .series
            .iter()
            .map(|series| series.spawn(cycle, params.clone(), Arc::clone(&self.shared)))
            .collect();

        RefreshCycle { id: cycle, tasks }
    }
}

/// Collects series before the coordinator is built.
pub struct RefreshCoordinatorBuilder {
    interval: Duration,
    params: RefreshParams,
    series: Vec<Box<dyn Refreshable>>,
}

impl RefreshCoordinatorBuilder {
    pub fn params(mut self, params: RefreshParams) -> Self {
        self.params = params;
        self
    }

    /// Register a series. `fetch` is called once per cycle with that cycle's
    /// parameters.
    pub fn series<T, F, Fut>(&mut self, name: &str, fetch: F) -> SeriesHandle<T>
    where
        T: Send + 'static,
        F: Fn(RefreshParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let name: Arc<str> = Arc::from(name);
        let slot = Arc::new(Mutex::new(Slot {
            state: FetchState::default(),
            latest: None,
        }));
        self.series.push(Box::new(Series {
            name: Arc::clone(&name),
            slot: Arc::clone(&slot),
            fetch: Box::new(move |params: RefreshParams| fetch(params).boxed()),
        }));
        SeriesHandle { name, slot }
    }

    pub fn build(self) -> RefreshCoordinator {
        RefreshCoordinator {
            interval: self.interval,
            inner: Arc::new(Inner {
                series: self.series,
                dispatch: Mutex::new(DispatchState {
                    params: self.params,
                    last_cycle: 0,
                }),
                shared: Arc::new(Shared {
                    active: CancellationToken::new(),
                    notice: Mutex::new(None),
                }),
            }),
            timer: Mutex::new(None),
        }
    }
}

/// Polls a set of series on a fixed interval with per-series failure
/// isolation. Dropping the coordinator tears it down.
pub struct RefreshCoordinator {
    interval: Duration,
    inner: Arc<Inner>,
    timer: Mutex<Option<CancellationToken>>,
}

impl fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.inner.series.iter().map(|s| s.name()).collect();
        f.debug_struct("RefreshCoordinator")
            .field("interval", &self.interval)
            .field("series", &names)
            .field("active", &self.is_active())
            .finish()
    }
}

impl RefreshCoordinator {
    pub fn builder(interval: Duration) -> RefreshCoordinatorBuilder {
        RefreshCoordinatorBuilder {
            interval,
            params: RefreshParams::default(),
            series: Vec::new(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_active(&self) -> bool {
        !self.inner.shared.active.is_cancelled()
    }

    pub fn params(&self) -> RefreshParams {
        lock(&self.inner.dispatch).params.clone()
    }

    /// Start polling: one cycle now, then one per interval.
    ///
    /// Must be called within a Tokio runtime. Calling it again restarts the
    /// interval. A zero interval is refused; `refresh_now` still works.
    pub fn start(&self) {
        if !self.is_active() {
            tracing::warn!("Refresh coordinator already stopped, not starting");
            return;
        }
        if self.interval.is_zero() {
            tracing::error!("Refresh interval must be greater than zero, not starting");
            return;
        }
        tracing::info!(
            "Starting refresh loop for {} series every {}s",
            self.inner.series.len(),
            self.interval.as_secs()
        );
        self.restart_timer();
    }

    fn restart_timer(&self) {
        let token = self.inner.shared.active.child_token();
        if let Some(previous) = lock(&self.timer).replace(token.clone()) {
            previous.cancel();
        }

        let inner = Arc::clone(&self.inner);
        let period = self.interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        tracing::debug!("Refresh timer cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        // Tasks are detached; their results are guarded by the cycle token
                        let _cycle = inner.dispatch();
                    }
                }
            }
        });
    }

    /// Replace the parameters. When they differ and the loop is running, the
    /// interval restarts and a cycle is dispatched immediately.
    ///
    /// Returns whether the parameters changed.
    pub fn set_params(&self, params: RefreshParams) -> bool {
        {
            let mut state = lock(&self.inner.dispatch);
            if state.params == params {
                return false;
            }
            tracing::info!(
                "Refresh parameters changed: location {:?}, period {}, trend days {}",
                params.location_id,
                params.period,
                params.trend_days
            );
            state.params = params;
        }

        let running = lock(&self.timer)
            .as_ref()
            .is_some_and(|t| !t.is_cancelled());
        if running && self.is_active() {
            self.restart_timer();
        }
        true
    }

    /// Dispatch one cycle outside the timer. After teardown the returned
    /// cycle is empty.
    pub fn refresh_now(&self) -> RefreshCycle {
        self.inner.dispatch()
    }

    /// Tear down: stop the timer and make every pending response a no-op.
    pub fn stop(&self) {
        if self.inner.shared.active.is_cancelled() {
            return;
        }
        self.inner.shared.active.cancel();
        if let Some(timer) = lock(&self.timer).take() {
            timer.cancel();
        }
        for series in &self.inner.series {
            series.barrier();
        }
        tracing::info!("Refresh coordinator stopped");
    }

    pub fn status(&self) -> CoordinatorStatus {
        let summaries: Vec<SeriesSummary> =
            self.inner.series.iter().map(|s| s.summary()).collect();

        if !summaries.iter().any(|s| s.dispatched) {
            CoordinatorStatus::Idle
        } else if summaries.iter().any(|s| s.loading) {
            CoordinatorStatus::Loading
        } else if summaries.iter().any(|s| s.failed) {
            CoordinatorStatus::PartialFailure
        } else {
            CoordinatorStatus::Settled
        }
    }

    /// Most recent series error since the last call; clears it.
    pub fn take_error_notice(&self) -> Option<String> {
        lock(&self.inner.shared.notice).take()
    }

    /// Record an error from outside the series (e.g. the locations list) as
    /// the current notice.
    pub fn post_error_notice(&self, message: impl Into<String>) {
        *lock(&self.inner.shared.notice) = Some(message.into());
    }
}

impl Drop for RefreshCoordinator {
    fn drop(&mut self) {
        self.stop();
    }
}

//! Resource synchronization controller
//!
//! A [`Resource`] gives a view one race-safe way to load an object or a
//! collection and keep `{data, loading, error}` current:
//!
//! - the first load after [`Resource::activate`] is debounced and never runs
//!   if the resource is torn down first
//! - at most one fetch is in flight; a second request while one is pending is
//!   dropped, not queued
//! - failures publish a caller-supplied message and schedule a bounded number
//!   of follow-up attempts at a fixed short delay
//! - results that complete after [`Resource::teardown`] are discarded

mod mutation;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tripdesk_domain::{ApiResult, FetchStatus, ResourceData, ResourceState};

pub use mutation::MutationWithRefetch;

/// Produces the raw payload for a resource.
pub type FetchFn = Arc<dyn Fn() -> BoxFuture<'static, ApiResult<Value>> + Send + Sync>;

/// Maps a raw payload (or one element of it) into a single item.
pub type ItemMapper<T> = Arc<dyn Fn(Value) -> anyhow::Result<T> + Send + Sync>;

/// Maps a whole raw payload into a list.
pub type ListMapper<T> = Arc<dyn Fn(Value) -> anyhow::Result<Vec<T>> + Send + Sync>;

pub const DEFAULT_ERROR_MESSAGE: &str = "Failed to load data";
pub const DEFAULT_AUTO_RETRY: u32 = 1;
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Behaviour knobs for a [`Resource`].
#[derive(Debug, Clone)]
pub struct ResourceOptions<T> {
    /// Treat the payload as a collection
    pub list: bool,
    /// Message published on failure in place of the transport error
    pub error_message: String,
    /// Follow-up attempts scheduled after a failed fetch
    pub auto_retry: u32,
    pub debounce: Duration,
    pub retry_delay: Duration,
    /// Run the debounced first fetch on activation
    pub auto_start: bool,
    /// Data published when a fetch fails
    pub fallback: Option<ResourceData<T>>,
}

impl<T> Default for ResourceOptions<T> {
    fn default() -> Self {
        Self {
            list: false,
            error_message: DEFAULT_ERROR_MESSAGE.to_string(),
            auto_retry: DEFAULT_AUTO_RETRY,
            debounce: DEFAULT_DEBOUNCE,
            retry_delay: DEFAULT_RETRY_DELAY,
            auto_start: true,
            fallback: None,
        }
    }
}

/// What a single fetch attempt did to the published state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// New data was published
    Applied,
    /// The error message and fallback were published
    Failed,
    /// Another fetch was in flight, or the resource was torn down
    Skipped,
    /// The fetch completed after teardown; nothing was published
    Discarded,
}

/// Builder for [`Resource`]
pub struct ResourceBuilder<T> {
    fetch: FetchFn,
    map_item: Option<ItemMapper<T>>,
    map_list: Option<ListMapper<T>>,
    options: ResourceOptions<T>,
}

impl<T> ResourceBuilder<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Expect a collection rather than a single object.
    #[must_use]
    pub fn list(mut self) -> Self {
        self.options.list = true;
        self
    }

    /// Element-wise (or whole-object) mapping.
    #[must_use]
    pub fn map_item<F>(mut self, map: F) -> Self
    where
        F: Fn(Value) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.map_item = Some(Arc::new(map));
        self
    }

    /// Whole-payload list mapping; takes priority over [`Self::map_item`].
    #[must_use]
    pub fn map_list<F>(mut self, map: F) -> Self
    where
        F: Fn(Value) -> anyhow::Result<Vec<T>> + Send + Sync + 'static,
    {
        self.options.list = true;
        self.map_list = Some(Arc::new(map));
        self
    }

    #[must_use]
    pub fn error_message(mut self, message: impl Into<String>) -> Self {
        self.options.error_message = message.into();
        self
    }

    #[must_use]
    pub fn auto_retry(mut self, attempts: u32) -> Self {
        self.options.auto_retry = attempts;
        self
    }

    #[must_use]
    pub fn debounce(mut self, delay: Duration) -> Self {
        self.options.debounce = delay;
        self
    }

    #[must_use]
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.options.retry_delay = delay;
        self
    }

    #[must_use]
    pub fn auto_start(mut self, enabled: bool) -> Self {
        self.options.auto_start = enabled;
        self
    }

    #[must_use]
    pub fn fallback(mut self, data: ResourceData<T>) -> Self {
        self.options.fallback = Some(data);
        self
    }

    #[must_use]
    pub fn options(mut self, options: ResourceOptions<T>) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Resource<T> {
        let (state, _) = watch::channel(ResourceState::new(self.options.auto_start));
        Resource {
            inner: Arc::new(Inner {
                fetch: self.fetch,
                map_item: self.map_item,
                map_list: self.map_list,
                options: self.options,
                state,
                in_flight: AtomicBool::new(false),
                activated: AtomicBool::new(false),
                active: AtomicBool::new(true),
                cancel: CancellationToken::new(),
            }),
        }
    }
}

/// Fetch/loading/error controller for one view-data relationship.
///
/// Cloning is cheap and yields a handle to the same controller.
pub struct Resource<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Resource<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T> fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("list", &self.inner.options.list)
            .field("active", &self.inner.active.load(Ordering::Acquire))
            .field("in_flight", &self.inner.in_flight.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

struct Inner<T> {
    fetch: FetchFn,
    map_item: Option<ItemMapper<T>>,
    map_list: Option<ListMapper<T>>,
    options: ResourceOptions<T>,
    state: watch::Sender<ResourceState<T>>,
    in_flight: AtomicBool,
    activated: AtomicBool,
    active: AtomicBool,
    cancel: CancellationToken,
}

impl<T> Resource<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Start building a resource around `fetch`.
    pub fn builder<F, Fut>(fetch: F) -> ResourceBuilder<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ApiResult<Value>> + Send + 'static,
    {
        ResourceBuilder {
            fetch: Arc::new(move || fetch().boxed()),
            map_item: None,
            map_list: None,
            options: ResourceOptions::default(),
        }
    }

    /// Arm the debounced first fetch (when `auto_start` is set).
    ///
    /// Must be called from within a Tokio runtime. Only the first call has
    /// any effect.
    pub fn activate(&self) {
        if self.inner.activated.swap(true, Ordering::AcqRel) || !self.inner.options.auto_start {
            return;
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::select! {
                () = inner.cancel.cancelled() => {
                    debug!(source = "resource", "torn down before debounced fetch fired");
                }
                () = tokio::time::sleep(inner.options.debounce) => {
                    if inner.fetch_once().await == FetchOutcome::Failed {
                        inner.schedule_retries();
                    }
                }
            }
        });
    }

    /// Re-run the fetch immediately, ignoring the debounce delay.
    ///
    /// A no-op returning [`FetchOutcome::Skipped`] while another fetch is in
    /// flight.
    pub async fn refetch(&self) -> FetchOutcome {
        let outcome = self.inner.fetch_once().await;
        if outcome == FetchOutcome::Failed {
            self.inner.schedule_retries();
        }
        outcome
    }

    /// Overwrite the published data locally, without a round trip.
    pub fn set_data(&self, data: ResourceData<T>) {
        if !self.is_active() {
            return;
        }
        self.inner.state.send_modify(|state| {
            state.data = Some(data);
            state.fetched = true;
        });
    }

    /// Mark the resource inactive; pending timers are cancelled and late
    /// results are ignored.
    pub fn teardown(&self) {
        if self.inner.active.swap(false, Ordering::AcqRel) {
            self.inner.cancel.cancel();
            debug!(source = "resource", "resource torn down");
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_fetching(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> ResourceState<T> {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn status(&self) -> FetchStatus {
        self.inner.state.borrow().status()
    }

    /// Observe every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ResourceState<T>> {
        self.inner.state.subscribe()
    }

    /// Pair `mutate` with this resource's refetch.
    pub fn with_mutation<A, R, F, Fut>(&self, mutate: F) -> MutationWithRefetch<A, R, T>
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ApiResult<R>> + Send + 'static,
    {
        MutationWithRefetch::new(self.clone(), mutate)
    }
}

/// Releases the single-flight slot even when the fetching future is dropped
/// mid-await. An abandoned fetch also clears `loading`.
struct FlightGuard<'a, T> {
    inner: &'a Inner<T>,
    settled: bool,
}

impl<T> Drop for FlightGuard<'_, T> {
    fn drop(&mut self) {
        self.inner.in_flight.store(false, Ordering::Release);
        if !self.settled {
            debug!(source = "resource", "fetch abandoned before completion");
            self.inner.state.send_modify(|state| state.loading = false);
        }
    }
}

impl<T> Inner<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    async fn fetch_once(&self) -> FetchOutcome {
        if !self.is_active() {
            return FetchOutcome::Skipped;
        }
        if self.in_flight.swap(true, Ordering::AcqRel) {
            debug!(source = "resource", "fetch already in flight, dropping request");
            return FetchOutcome::Skipped;
        }

        let mut flight = FlightGuard { inner: self, settled: false };

        self.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
        });

        let result = (self.fetch)().await;
        flight.settled = true;
        drop(flight);

        if !self.is_active() {
            debug!(source = "resource", "discarding result for torn-down resource");
            return FetchOutcome::Discarded;
        }

        let mapped = match result {
            Ok(raw) => self.map_payload(raw),
            Err(err) => {
                warn!(
                    source = "resource",
                    status = err.status,
                    code = ?err.code,
                    error = %err.message,
                    "resource fetch failed"
                );
                Err(())
            }
        };

        match mapped {
            Ok(data) => {
                self.state.send_modify(|state| {
                    state.data = Some(data);
                    state.loading = false;
                    state.error = None;
                    state.fetched = true;
                });
                FetchOutcome::Applied
            }
            Err(()) => {
                let fallback = self.options.fallback.clone();
                let message = self.options.error_message.clone();
                self.state.send_modify(|state| {
                    state.data = fallback;
                    state.loading = false;
                    state.error = Some(message);
                    state.fetched = true;
                });
                FetchOutcome::Failed
            }
        }
    }

    /// Turn a raw payload into published data. Mapping failures are logged
    /// here and reported as a plain failure.
    fn map_payload(&self, raw: Value) -> Result<ResourceData<T>, ()> {
        let mapped = if self.options.list {
            self.map_list_payload(raw).map(ResourceData::List)
        } else {
            self.map_single(raw).map(ResourceData::Item)
        };

        mapped.map_err(|err| {
            warn!(source = "resource", error = %err, "failed to map resource payload");
        })
    }

    fn map_list_payload(&self, raw: Value) -> anyhow::Result<Vec<T>> {
        if let Some(map_list) = &self.map_list {
            return map_list(raw);
        }
        match raw {
            Value::Array(items) => items.into_iter().map(|item| self.map_single(item)).collect(),
            other => {
                warn!(
                    source = "resource",
                    payload_kind = value_kind(&other),
                    "expected a list payload, using an empty list"
                );
                Ok(Vec::new())
            }
        }
    }

    fn map_single(&self, raw: Value) -> anyhow::Result<T> {
        match &self.map_item {
            Some(map_item) => map_item(raw),
            None => Ok(serde_json::from_value(raw)?),
        }
    }

    fn schedule_retries(self: &Arc<Self>) {
        if self.options.auto_retry == 0 || !self.is_active() {
            return;
        }

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            for attempt in 1..=inner.options.auto_retry {
                tokio::select! {
                    () = inner.cancel.cancelled() => return,
                    () = tokio::time::sleep(inner.options.retry_delay) => {}
                }
                debug!(source = "resource", attempt, "retrying failed fetch");
                match inner.fetch_once().await {
                    FetchOutcome::Failed => {}
                    _ => return,
                }
            }
        });
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests;

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::sleep;
use tripdesk_domain::{ApiResult, FetchStatus, NormalizedError, ResourceData};

use super::*;

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct Trip {
    id: u32,
    name: String,
}

/// Fetch stub that replays a script, then repeats a fallback response.
#[derive(Clone)]
struct ScriptedFetch {
    calls: Arc<AtomicUsize>,
    script: Arc<Mutex<VecDeque<ApiResult<Value>>>>,
    fallback: ApiResult<Value>,
    delay: Duration,
}

impl ScriptedFetch {
    fn always(response: ApiResult<Value>) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            script: Arc::new(Mutex::new(VecDeque::new())),
            fallback: response,
            delay: Duration::ZERO,
        }
    }

    fn then(self, first: ApiResult<Value>) -> Self {
        self.script.lock().push_back(first);
        self
    }

    fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn call(&self) -> impl Future<Output = ApiResult<Value>> + Send + 'static {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().pop_front().unwrap_or_else(|| self.fallback.clone());
        let delay = self.delay;
        async move {
            if !delay.is_zero() {
                sleep(delay).await;
            }
            next
        }
    }
}

fn trips() -> Value {
    json!([{"id": 1, "name": "Lisbon"}, {"id": 2, "name": "Porto"}])
}

fn server_error() -> ApiResult<Value> {
    Err(NormalizedError::new("Internal Server Error", 500))
}

fn resource_for(fetch: &ScriptedFetch) -> ResourceBuilder<Trip> {
    let fetch = fetch.clone();
    Resource::builder(move || fetch.call())
}

#[tokio::test(start_paused = true)]
async fn first_fetch_is_debounced() {
    let fetch = ScriptedFetch::always(Ok(trips()));
    let resource = resource_for(&fetch).list().build();

    assert!(resource.state().loading);
    assert_eq!(resource.status(), FetchStatus::NotYetFetched);

    resource.activate();
    sleep(Duration::from_millis(299)).await;
    assert_eq!(fetch.calls(), 0);

    sleep(Duration::from_millis(2)).await;
    assert_eq!(fetch.calls(), 1);

    let state = resource.state();
    assert!(!state.loading);
    assert_eq!(state.error, None);
    assert_eq!(state.data.as_ref().and_then(ResourceData::as_list).map(<[Trip]>::len), Some(2));
    assert_eq!(resource.status(), FetchStatus::Populated);
}

#[tokio::test(start_paused = true)]
async fn activate_twice_arms_a_single_fetch() {
    let fetch = ScriptedFetch::always(Ok(trips()));
    let resource = resource_for(&fetch).list().build();

    resource.activate();
    resource.activate();
    sleep(Duration::from_secs(1)).await;

    assert_eq!(fetch.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn teardown_before_debounce_prevents_fetch() {
    let fetch = ScriptedFetch::always(Ok(trips()));
    let resource = resource_for(&fetch).list().build();

    resource.activate();
    sleep(Duration::from_millis(100)).await;
    resource.teardown();
    sleep(Duration::from_secs(1)).await;

    assert_eq!(fetch.calls(), 0);
    assert!(!resource.is_active());
}

#[tokio::test(start_paused = true)]
async fn auto_start_disabled_waits_for_refetch() {
    let fetch = ScriptedFetch::always(Ok(json!({"id": 9, "name": "Faro"})));
    let resource = resource_for(&fetch).auto_start(false).build();

    assert!(!resource.state().loading);
    resource.activate();
    sleep(Duration::from_secs(1)).await;
    assert_eq!(fetch.calls(), 0);

    assert_eq!(resource.refetch().await, FetchOutcome::Applied);
    assert_eq!(
        resource.state().data,
        Some(ResourceData::Item(Trip { id: 9, name: "Faro".into() }))
    );
}

#[tokio::test(start_paused = true)]
async fn refetch_while_in_flight_is_a_no_op() {
    let fetch = ScriptedFetch::always(Ok(trips())).delayed(Duration::from_millis(100));
    let resource = resource_for(&fetch).list().auto_start(false).build();

    let pending = tokio::spawn({
        let resource = resource.clone();
        async move { resource.refetch().await }
    });
    tokio::task::yield_now().await;
    assert!(resource.is_fetching());

    let before = resource.state();
    assert_eq!(resource.refetch().await, FetchOutcome::Skipped);
    assert_eq!(resource.state(), before);
    assert_eq!(fetch.calls(), 1);

    assert_eq!(pending.await.unwrap(), FetchOutcome::Applied);
    assert!(!resource.is_fetching());
    assert_eq!(fetch.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn failure_publishes_message_and_retries_once() {
    let fetch = ScriptedFetch::always(server_error());
    let resource = resource_for(&fetch)
        .list()
        .auto_start(false)
        .error_message("Could not load trips")
        .build();

    assert_eq!(resource.refetch().await, FetchOutcome::Failed);
    let state = resource.state();
    assert_eq!(state.error.as_deref(), Some("Could not load trips"));
    assert_eq!(state.data, None);
    assert!(!state.loading);
    assert_eq!(fetch.calls(), 1);

    sleep(Duration::from_millis(199)).await;
    assert_eq!(fetch.calls(), 1);
    sleep(Duration::from_millis(2)).await;
    assert_eq!(fetch.calls(), 2);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(fetch.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn retry_success_clears_error() {
    let fetch = ScriptedFetch::always(Ok(trips())).then(server_error());
    let resource = resource_for(&fetch).list().auto_start(false).build();

    assert_eq!(resource.refetch().await, FetchOutcome::Failed);
    assert_eq!(resource.state().error.as_deref(), Some(DEFAULT_ERROR_MESSAGE));

    sleep(Duration::from_millis(250)).await;

    let state = resource.state();
    assert_eq!(fetch.calls(), 2);
    assert_eq!(state.error, None);
    assert_eq!(resource.status(), FetchStatus::Populated);
}

#[tokio::test(start_paused = true)]
async fn failure_publishes_fallback_data() {
    let fetch = ScriptedFetch::always(server_error());
    let resource = resource_for(&fetch)
        .list()
        .auto_start(false)
        .auto_retry(0)
        .fallback(ResourceData::List(vec![]))
        .build();

    resource.refetch().await;
    sleep(Duration::from_secs(1)).await;

    assert_eq!(fetch.calls(), 1);
    assert_eq!(resource.state().data, Some(ResourceData::List(vec![])));
    assert_eq!(resource.status(), FetchStatus::Empty);
}

#[tokio::test(start_paused = true)]
async fn non_array_payload_for_list_becomes_empty() {
    let fetch = ScriptedFetch::always(Ok(json!({"unexpected": true})));
    let resource = resource_for(&fetch).list().auto_start(false).build();

    assert_eq!(resource.refetch().await, FetchOutcome::Applied);
    let state = resource.state();
    assert_eq!(state.error, None);
    assert_eq!(state.data, Some(ResourceData::List(vec![])));
    assert_eq!(resource.status(), FetchStatus::Empty);
}

#[tokio::test(start_paused = true)]
async fn list_mapper_takes_priority_over_item_mapper() {
    let fetch = ScriptedFetch::always(Ok(json!({"rows": [{"id": 3, "name": "Braga"}]})));
    let resource = resource_for(&fetch)
        .auto_start(false)
        .map_item(|_| anyhow::bail!("item mapper must not run"))
        .map_list(|raw| Ok(serde_json::from_value(raw["rows"].clone())?))
        .build();

    assert_eq!(resource.refetch().await, FetchOutcome::Applied);
    assert_eq!(
        resource.state().data,
        Some(ResourceData::List(vec![Trip { id: 3, name: "Braga".into() }]))
    );
}

#[tokio::test(start_paused = true)]
async fn item_mapper_runs_per_element() {
    let fetch = ScriptedFetch::always(Ok(json!([{"tripId": 4, "title": "Evora"}])));
    let resource = resource_for(&fetch)
        .list()
        .auto_start(false)
        .map_item(|raw| {
            Ok(Trip {
                id: serde_json::from_value(raw["tripId"].clone())?,
                name: serde_json::from_value(raw["title"].clone())?,
            })
        })
        .build();

    resource.refetch().await;
    assert_eq!(
        resource.state().data,
        Some(ResourceData::List(vec![Trip { id: 4, name: "Evora".into() }]))
    );
}

#[tokio::test(start_paused = true)]
async fn mapping_failure_is_reported_as_fetch_failure() {
    let fetch = ScriptedFetch::always(Ok(json!({"id": "not-a-number"})));
    let resource = resource_for(&fetch).auto_start(false).auto_retry(0).build();

    assert_eq!(resource.refetch().await, FetchOutcome::Failed);
    assert_eq!(resource.state().error.as_deref(), Some(DEFAULT_ERROR_MESSAGE));
}

#[tokio::test(start_paused = true)]
async fn abandoned_refetch_releases_the_in_flight_slot() {
    let fetch = ScriptedFetch::always(Ok(trips())).delayed(Duration::from_millis(500));
    let resource = resource_for(&fetch).list().auto_start(false).build();

    let abandoned = tokio::time::timeout(Duration::from_millis(100), resource.refetch()).await;
    assert!(abandoned.is_err());
    assert!(!resource.is_fetching());
    assert!(!resource.state().loading);

    sleep(Duration::from_secs(5)).await;

    assert_eq!(resource.refetch().await, FetchOutcome::Applied);
    assert_eq!(fetch.calls(), 2);
    assert_eq!(resource.status(), FetchStatus::Populated);
}

#[tokio::test(start_paused = true)]
async fn late_result_after_teardown_is_discarded() {
    let fetch = ScriptedFetch::always(Ok(trips())).delayed(Duration::from_millis(100));
    let resource = resource_for(&fetch).list().auto_start(false).build();

    let pending = tokio::spawn({
        let resource = resource.clone();
        async move { resource.refetch().await }
    });
    tokio::task::yield_now().await;
    resource.teardown();

    assert_eq!(pending.await.unwrap(), FetchOutcome::Discarded);
    assert_eq!(resource.state().data, None);
    assert_eq!(resource.refetch().await, FetchOutcome::Skipped);
    assert_eq!(fetch.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn set_data_overwrites_locally() {
    let fetch = ScriptedFetch::always(Ok(trips()));
    let resource = resource_for(&fetch).list().auto_start(false).build();
    let mut updates = resource.subscribe();

    resource.set_data(ResourceData::List(vec![Trip { id: 5, name: "Sintra".into() }]));

    assert!(updates.has_changed().unwrap());
    let state = updates.borrow_and_update().clone();
    assert_eq!(state.data.as_ref().and_then(ResourceData::as_list).map(<[Trip]>::len), Some(1));
    assert_eq!(fetch.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn mutation_returns_its_result_and_refetches() {
    let fetch = ScriptedFetch::always(Ok(trips()));
    let resource = resource_for(&fetch).list().auto_start(false).build();
    let create = resource.with_mutation(|name: String| async move { Ok(json!({"created": name})) });

    let result = create.execute("Coimbra".to_string()).await.unwrap();

    assert_eq!(result, json!({"created": "Coimbra"}));
    assert_eq!(fetch.calls(), 1);
    assert_eq!(resource.status(), FetchStatus::Populated);
}

#[tokio::test(start_paused = true)]
async fn mutation_failure_still_refetches() {
    let fetch = ScriptedFetch::always(Ok(trips()));
    let resource = resource_for(&fetch).list().auto_start(false).build();
    let delete = resource
        .with_mutation(|_id: u32| async move { Err::<(), _>(NormalizedError::new("Forbidden", 403)) });

    let err = delete.execute(1).await.unwrap_err();

    assert_eq!(err.status, 403);
    assert_eq!(fetch.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn refetch_failure_does_not_mask_mutation_success() {
    let fetch = ScriptedFetch::always(server_error());
    let resource = resource_for(&fetch).list().auto_start(false).auto_retry(0).build();
    let update = resource.with_mutation(|_: ()| async move { Ok(7_u32) });

    assert_eq!(update.execute(()).await.unwrap(), 7);
    assert_eq!(resource.state().error.as_deref(), Some(DEFAULT_ERROR_MESSAGE));
}

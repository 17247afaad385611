//! Mutations that refresh a resource afterwards

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use tripdesk_domain::ApiResult;

use super::{FetchOutcome, Resource};

type MutateFn<A, R> = Arc<dyn Fn(A) -> BoxFuture<'static, ApiResult<R>> + Send + Sync>;

/// A mutation bound to the refetch of the resource it invalidates.
///
/// [`execute`](Self::execute) runs the mutation, then always attempts a
/// refetch, and hands back the mutation's own result. A failing refetch is
/// logged; it never replaces the mutation's outcome.
pub struct MutationWithRefetch<A, R, T> {
    mutate: MutateFn<A, R>,
    resource: Resource<T>,
}

impl<A, R, T> Clone for MutationWithRefetch<A, R, T> {
    fn clone(&self) -> Self {
        Self { mutate: Arc::clone(&self.mutate), resource: self.resource.clone() }
    }
}

impl<A, R, T> MutationWithRefetch<A, R, T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(resource: Resource<T>, mutate: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ApiResult<R>> + Send + 'static,
    {
        Self { mutate: Arc::new(move |args| mutate(args).boxed()), resource }
    }

    pub async fn execute(&self, args: A) -> ApiResult<R> {
        let result = (self.mutate)(args).await;
        if let Err(err) = &result {
            debug!(source = "resource", status = err.status, "mutation failed, refetching anyway");
        }

        match self.resource.refetch().await {
            FetchOutcome::Failed => {
                warn!(source = "resource", "refetch after mutation failed");
            }
            outcome => debug!(source = "resource", ?outcome, "refetch after mutation"),
        }

        result
    }
}

use async_trait::async_trait;
use std::error::Error;

/// Creates and destroys the resources held by a [`Pool`](crate::Pool).
///
/// The pool calls [`try_create`](Factory::try_create) exactly `capacity` times
/// while it is being built and never again. Every created resource is passed
/// to [`destroy`](Factory::destroy) exactly once, either on shutdown or when a
/// failed construction is rolled back.
#[async_trait]
pub trait Factory: Send + Sync {
    type Output: Send + Sync;
    type Error: Error + Send + Sync + 'static;

    async fn try_create(&self) -> Result<Self::Output, Self::Error>;

    /// Best-effort cleanup. Runs inside destructors, so it must not block or panic.
    fn destroy(&self, resource: Self::Output) {
        drop(resource);
    }
}

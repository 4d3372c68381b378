use crate::error::{Error, Result};
use crate::resource::Factory;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt::{self, Debug, Formatter};
use std::mem;
use std::ops::{Deref, DerefMut};
use std::ptr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, trace, warn};

mod builder;

pub use builder::Builder;

/// A fixed-size pool of resources created up front by a [`Factory`].
///
/// Cloning a `Pool` is cheap and every clone refers to the same resources.
pub struct Pool<F: Factory> {
    inner: Arc<Inner<F>>,
}

impl<F: Factory> Clone for Pool<F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<F: Factory> Debug for Pool<F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("state", &self.state())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<F: Factory> Pool<F> {
    /// Creates `capacity` resources and returns a pool with all of them idle.
    ///
    /// If any creation fails, the resources created so far are destroyed and
    /// the factory error is returned.
    pub async fn new(factory: F, capacity: usize) -> Result<Self> {
        Builder::new().max_size(capacity).build(factory).await
    }

    async fn from_builder(factory: F, builder: Builder) -> Result<Self> {
        let capacity = builder.max_size;
        if capacity == 0 {
            return Err(Error::ZeroCapacity);
        }

        let mut pending = Pending {
            factory: &factory,
            slots: VecDeque::with_capacity(capacity),
        };
        for id in 0..capacity {
            match factory.try_create().await {
                Ok(resource) => pending.slots.push_back(Slot { id, resource }),
                Err(err) => {
                    warn!(
                        "failed to create resource {} of {}, destroying {} created: {}",
                        id + 1,
                        capacity,
                        pending.slots.len(),
                        err
                    );
                    return Err(Error::Factory(Box::new(err)));
                }
            }
        }
        let idle = mem::take(&mut pending.slots);
        drop(pending);

        debug!("pool ready with {} resources", capacity);
        Ok(Self {
            inner: Arc::new(Inner {
                factory,
                capacity,
                acquire_timeout: builder.acquire_timeout,
                slots: Mutex::new(Slots {
                    idle,
                    in_use: 0,
                    closed: false,
                }),
                semaphore: Semaphore::new(capacity),
            }),
        })
    }

    /// Waits until a resource is idle and lends it out.
    ///
    /// Fails with [`Error::PoolClosed`] if the pool is, or becomes, shut down
    /// while waiting, and with [`Error::PoolTimedOut`] if an acquire timeout
    /// is configured and elapses. Dropping the returned future before it
    /// completes gives up the place in line without consuming a resource.
    pub async fn acquire(&self) -> Result<Pooled<'_, F>> {
        match self.inner.acquire_timeout {
            Some(duration) => match tokio::time::timeout(duration, self.inner.acquire()).await {
                Ok(result) => result,
                Err(_) => {
                    debug!("acquire timed out after {:?}", duration);
                    Err(Error::PoolTimedOut)
                }
            },
            None => self.inner.acquire().await,
        }
    }

    /// Returns a resource to the pool. Equivalent to dropping it, except that
    /// a resource owned by another pool is reported as
    /// [`Error::ForeignResource`]. That resource still goes back to its owner.
    pub fn release(&self, pooled: Pooled<'_, F>) -> Result<()> {
        let owned = ptr::eq(pooled.pool, &*self.inner);
        drop(pooled);
        if owned {
            Ok(())
        } else {
            Err(Error::ForeignResource)
        }
    }

    /// Closes the pool and destroys every idle resource.
    ///
    /// Pending and future acquires fail with [`Error::PoolClosed`]. Resources
    /// still lent out are destroyed when they are released. Calling this again
    /// does nothing.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.slots.lock().closed
    }

    pub fn state(&self) -> State {
        let slots = self.inner.slots.lock();
        State {
            capacity: self.inner.capacity,
            idle: slots.idle.len(),
            in_use: slots.in_use,
        }
    }

    pub fn get_factory(&self) -> &F {
        &self.inner.factory
    }
}

/// A snapshot of the pool's bookkeeping.
///
/// While the pool is open, `idle + in_use == capacity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct State {
    pub capacity: usize,
    pub idle: usize,
    pub in_use: usize,
}

struct Slot<T> {
    id: usize,
    resource: T,
}

struct Slots<T> {
    idle: VecDeque<Slot<T>>,
    in_use: usize,
    closed: bool,
}

/// Resources created while the pool is being built. Destroyed on drop unless
/// they have been moved into the pool.
struct Pending<'a, F: Factory> {
    factory: &'a F,
    slots: VecDeque<Slot<F::Output>>,
}

impl<F: Factory> Drop for Pending<'_, F> {
    fn drop(&mut self) {
        for slot in self.slots.drain(..) {
            self.factory.destroy(slot.resource);
        }
    }
}

struct Inner<F: Factory> {
    factory: F,
    capacity: usize,
    acquire_timeout: Option<Duration>,
    // One permit per resource in `slots.idle`.
    slots: Mutex<Slots<F::Output>>,
    semaphore: Semaphore,
}

impl<F: Factory> Inner<F> {
    async fn acquire(&self) -> Result<Pooled<'_, F>> {
        let permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| Error::PoolClosed)?;
        let mut slots = self.slots.lock();
        let slot = match slots.idle.pop_front() {
            Some(slot) => slot,
            // shutdown drained the idle set before the semaphore was closed
            None => return Err(Error::PoolClosed),
        };
        permit.forget();
        slots.in_use += 1;
        trace!("lent resource {}", slot.id);
        Ok(Pooled {
            pool: self,
            slot: Some(slot),
        })
    }

    fn release(&self, slot: Slot<F::Output>) {
        let mut slots = self.slots.lock();
        slots.in_use -= 1;
        if slots.closed {
            drop(slots);
            trace!("resource {} released after shutdown, destroying", slot.id);
            self.factory.destroy(slot.resource);
        } else {
            trace!("resource {} returned", slot.id);
            slots.idle.push_back(slot);
            drop(slots);
            // the resource must be visible before the permit that admits it
            self.semaphore.add_permits(1);
        }
    }

    fn shutdown(&self) {
        let idle = {
            let mut slots = self.slots.lock();
            if slots.closed {
                return;
            }
            slots.closed = true;
            mem::take(&mut slots.idle)
        };
        self.semaphore.close();
        debug!("pool shut down, destroying {} idle resources", idle.len());
        for slot in idle {
            self.factory.destroy(slot.resource);
        }
    }
}

impl<F: Factory> Drop for Inner<F> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// A resource lent out by a [`Pool`].
///
/// The holder has exclusive use of the resource until the guard is dropped or
/// passed to [`Pooled::release`], at which point it goes back to the pool.
pub struct Pooled<'a, F: Factory> {
    pool: &'a Inner<F>,
    slot: Option<Slot<F::Output>>,
}

impl<F: Factory> Debug for Pooled<'_, F>
where
    F::Output: Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooled")
            .field("id", &Self::id(self))
            .field("resource", &**self)
            .finish()
    }
}

impl<F: Factory> Deref for Pooled<'_, F> {
    type Target = F::Output;

    fn deref(&self) -> &Self::Target {
        &self.slot().resource
    }
}

impl<F: Factory> DerefMut for Pooled<'_, F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self.slot.as_mut() {
            Some(slot) => &mut slot.resource,
            None => unreachable!("pooled slot is only taken on drop"),
        }
    }
}

impl<F: Factory> Drop for Pooled<'_, F> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            self.pool.release(slot);
        }
    }
}

impl<F: Factory> Pooled<'_, F> {
    /// The slot this resource occupies, in `0..capacity`. Stable for the
    /// lifetime of the pool.
    pub fn id(pooled: &Self) -> usize {
        pooled.slot().id
    }

    pub fn release(pooled: Self) {
        drop(pooled);
    }

    fn slot(&self) -> &Slot<F::Output> {
        match self.slot.as_ref() {
            Some(slot) => slot,
            None => unreachable!("pooled slot is only taken on drop"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const CAPACITY: usize = 4;

    #[derive(Default)]
    struct IntFactory {
        destroyed: AtomicUsize,
    }

    #[async_trait]
    impl Factory for IntFactory {
        type Output = i32;
        type Error = Infallible;

        async fn try_create(&self) -> std::result::Result<Self::Output, Self::Error> {
            Ok(0)
        }

        fn destroy(&self, _resource: Self::Output) {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn assert_quiescent(pool: &Pool<IntFactory>) {
        let slots = pool.inner.slots.lock();
        assert_eq!(pool.inner.semaphore.available_permits(), slots.idle.len());
        assert_eq!(slots.idle.len() + slots.in_use, CAPACITY);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn permits_track_idle_resources() {
        let pool = Pool::new(IntFactory::default(), CAPACITY).await.unwrap();
        assert_quiescent(&pool);

        let handles = (0..64)
            .map(|_| {
                let pool = pool.clone();
                tokio::spawn(async move {
                    for _ in 0..20 {
                        let mut int = pool.acquire().await.unwrap();
                        *int += 1;
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.await.unwrap();
        }
        assert_quiescent(&pool);

        let held = pool.acquire().await.unwrap();
        assert_quiescent(&pool);
        drop(held);
        assert_quiescent(&pool);
    }

    #[tokio::test]
    async fn abandoned_acquires_keep_permits_in_step() {
        let pool = Builder::new()
            .max_size(CAPACITY)
            .acquire_timeout(Some(Duration::from_millis(10)))
            .build(IntFactory::default())
            .await
            .unwrap();

        let mut held = Vec::new();
        for _ in 0..CAPACITY {
            held.push(pool.acquire().await.unwrap());
        }
        assert!(matches!(pool.acquire().await, Err(Error::PoolTimedOut)));
        assert!(
            tokio::time::timeout(Duration::from_millis(10), pool.inner.acquire())
                .await
                .is_err()
        );
        assert_quiescent(&pool);

        held.clear();
        assert_quiescent(&pool);
        assert_eq!(pool.inner.semaphore.available_permits(), CAPACITY);
    }

    #[tokio::test]
    async fn shutdown_mid_flight_destroys_every_resource_once() {
        let pool = Pool::new(IntFactory::default(), CAPACITY).await.unwrap();

        let handles = (0..16)
            .map(|_| {
                let pool = pool.clone();
                tokio::spawn(async move {
                    while let Ok(_int) = pool.acquire().await {
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect::<Vec<_>>();
        tokio::task::yield_now().await;
        pool.shutdown();
        for handle in handles {
            handle.await.unwrap();
        }

        let state = pool.state();
        assert_eq!((state.idle, state.in_use), (0, 0));
        assert_eq!(pool.get_factory().destroyed.load(Ordering::SeqCst), CAPACITY);
    }
}

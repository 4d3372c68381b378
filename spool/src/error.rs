use std::error::Error as StdError;
use std::result::Result as StdResult;

pub type BoxDynError = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("pool capacity must be at least 1")]
    ZeroCapacity,

    #[error("error returned from the resource factory")]
    Factory(#[source] BoxDynError),

    #[error("attempted to acquire a resource on a closed pool")]
    PoolClosed,

    #[error("pool timed out while waiting for a resource")]
    PoolTimedOut,

    #[error("resource was released to a pool that does not own it")]
    ForeignResource,
}

pub type Result<T> = StdResult<T, Error>;

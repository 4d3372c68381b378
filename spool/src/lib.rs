//! Fixed-Size Async Resource Pool
//!
//! A [`Pool`] eagerly creates `capacity` resources through a
//! [`Factory`](resource::Factory) and lends them out one caller at a time.
//! Admission is bounded by a counting semaphore, so at most `capacity`
//! resources are ever in use and callers beyond that wait in
//! [`Pool::acquire`] until one is released or the pool is shut down.
mod error;
mod pool;
pub mod resource;

pub use async_trait::async_trait;
pub use error::{BoxDynError, Error, Result};
pub use pool::{Builder, Pool, Pooled, State};

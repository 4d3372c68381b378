use super::Pool;
use crate::error::Result;
use crate::resource::Factory;
use std::time::Duration;

/// Configures a [`Pool`] before its resources are created.
#[derive(Debug, Clone)]
pub struct Builder {
    pub(super) max_size: usize,
    pub(super) acquire_timeout: Option<Duration>,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            max_size: 10,
            acquire_timeout: None,
        }
    }
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of resources the pool creates and never exceeds. Must be at least 1.
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// How long [`Pool::acquire`] waits before giving up. `None` waits until a
    /// resource is released or the pool is shut down.
    pub fn acquire_timeout(mut self, acquire_timeout: Option<Duration>) -> Self {
        self.acquire_timeout = acquire_timeout;
        self
    }

    pub async fn build<F: Factory>(self, factory: F) -> Result<Pool<F>> {
        Pool::from_builder(factory, self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let builder = Builder::new();
        assert_eq!(builder.max_size, 10);
        assert_eq!(builder.acquire_timeout, None);
    }

    #[test]
    fn setters_override_defaults() {
        let builder = Builder::new()
            .max_size(3)
            .acquire_timeout(Some(Duration::from_millis(250)));
        assert_eq!(builder.max_size, 3);
        assert_eq!(builder.acquire_timeout, Some(Duration::from_millis(250)));
    }
}

use spool::async_trait;
use spool::resource::Factory;
use spool::{Builder, Pooled};
use std::convert::Infallible;
use std::time::Duration;

pub struct IntFactory;

#[async_trait]
impl Factory for IntFactory {
    type Output = i32;
    type Error = Infallible;

    async fn try_create(&self) -> Result<Self::Output, Self::Error> {
        Ok(0)
    }

    fn destroy(&self, resource: Self::Output) {
        println!("destroying {}", resource);
    }
}

#[tokio::main]
async fn main() {
    // every resource is created here; the pool never grows past max_size=1.
    let pool = Builder::new()
        .max_size(1)
        .acquire_timeout(Some(Duration::from_millis(100)))
        .build(IntFactory)
        .await
        .unwrap();

    let mut int = pool.acquire().await.unwrap();
    *int = 1;
    dbg!(Pooled::id(&int)); // 0
    dbg!(pool.state()); // State { capacity: 1, idle: 0, in_use: 1 }

    // the only resource is lent out, so this waits and then times out.
    dbg!(pool.acquire().await.is_err()); // true

    // release the resource and put it back to the pool.
    Pooled::release(int);

    let int = pool.acquire().await.unwrap();
    dbg!(*int); // 1; the same resource is reused.

    // lent resources are destroyed when they come back after shutdown.
    pool.shutdown();
    dbg!(pool.acquire().await.is_err()); // true; the pool is closed.
    drop(int); // destroying 1
}

//! PostgreSQL connections for [`spool`].
//!
//! The TLS bounds on [`PgConnFactory`] are the ones `tokio-postgres` needs to
//! open a connection from inside a spawned task: the connector is cloned per
//! connection, and both the stream and the handshake future cross threads.
use spool::async_trait;
use spool::resource::Factory;
use spool::Pool;
use tokio_postgres::tls::{MakeTlsConnect, TlsConnect};
use tokio_postgres::{Client, Config, Error, Socket};
use tracing::warn;

/// Opens one [`Client`] per pooled resource. The connection driver runs on
/// its own task and ends when the client is destroyed.
#[derive(Debug, Clone)]
pub struct PgConnFactory<T> {
    config: Config,
    tls: T,
}

impl<T> PgConnFactory<T> {
    pub fn new(config: Config, tls: T) -> Self {
        Self { config, tls }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[async_trait]
impl<T> Factory for PgConnFactory<T>
where
    T: MakeTlsConnect<Socket> + Clone + Send + Sync,
    T::Stream: Send + Sync + 'static,
    T::TlsConnect: Send + Sync,
    <T::TlsConnect as TlsConnect<Socket>>::Future: Send,
{
    type Output = Client;
    type Error = Error;

    async fn try_create(&self) -> Result<Self::Output, Self::Error> {
        let (client, conn) = self.config.connect(self.tls.clone()).await?;
        tokio::spawn(async move {
            if let Err(err) = conn.await {
                warn!("postgres connection closed with error: {}", err);
            }
        });
        Ok(client)
    }
}

/// Opens `pool_size` connections up front and pools them. Fails with
/// [`spool::Error::Factory`] if any of them cannot be opened; the ones that
/// were opened are closed again.
pub async fn connect<T>(
    config: Config,
    tls: T,
    pool_size: usize,
) -> spool::Result<Pool<PgConnFactory<T>>>
where
    PgConnFactory<T>: Factory,
{
    Pool::new(PgConnFactory::new(config, tls), pool_size).await
}

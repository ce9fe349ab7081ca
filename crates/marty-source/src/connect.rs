use marty_error::SourceError;
use tokio_postgres::{Client, Config, NoTls};

/// Open a connection to the source replica and spawn its driver task.
///
/// The driver task logs and exits silently on disconnect; the engine
/// notices the loss the next time it issues a query and reports it as a
/// fatal [`SourceError`], per the "connection errors are fatal" policy.
pub async fn connect(config: &Config) -> Result<Client, SourceError> {
    let (client, connection) = config.connect(NoTls).await?;
    tokio::spawn(async move {
        if let Err(error) = connection.await {
            tracing::error!(%error, "source connection closed with error");
        }
    });
    Ok(client)
}

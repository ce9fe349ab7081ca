use clap::Parser;
use marty_clone::{ClonePopulator, HistoryInspector};
use marty_cli::{CloneArgs, HistoryArgs};

#[derive(Debug, Parser)]
#[command(name = "clone", about = "Builds a clone database's federated views over a history-store snapshot")]
struct Cli {
    #[command(flatten)]
    history: HistoryArgs,
    #[command(flatten)]
    clone: CloneArgs,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();

    let (history_client, history_connection) = cli.history.to_config().connect(tokio_postgres::NoTls).await?;
    tokio::spawn(async move {
        if let Err(error) = history_connection.await {
            tracing::error!(%error, "history connection closed with error");
        }
    });
    let (clone_client, clone_connection) = cli.clone.to_config().connect(tokio_postgres::NoTls).await?;
    tokio::spawn(async move {
        if let Err(error) = clone_connection.await {
            tracing::error!(%error, "clone connection closed with error");
        }
    });

    let inspector = HistoryInspector::new(history_client).await?;
    let populator = ClonePopulator::new(clone_client, inspector.update());

    populator.initialize(&cli.history).await?;
    for schema in inspector.schemas().await? {
        populator.create_schema(&schema).await?;
        for mut table in inspector.tables(&schema).await? {
            inspector.columns(&mut table).await?;
            populator.create_table(&table).await?;
        }
    }

    Ok(())
}

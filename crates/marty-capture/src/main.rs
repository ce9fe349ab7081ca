use clap::Parser;
use marty_capture::Engine;
use marty_cli::{HistoryArgs, SlaveArgs};
use marty_history::HistoryStore;
use marty_source::SourceInspector;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, Parser)]
#[command(name = "history", about = "Captures source redo-log lines from stdin into the history store")]
struct Cli {
    #[command(flatten)]
    slave: SlaveArgs,
    #[command(flatten)]
    history: HistoryArgs,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();

    let source_client = marty_source::connect(&cli.slave.to_config()).await?;
    let (history_client, history_connection) = cli.history.to_config().connect(tokio_postgres::NoTls).await?;
    tokio::spawn(async move {
        if let Err(error) = history_connection.await {
            tracing::error!(%error, "history connection closed with error");
        }
    });

    let source = SourceInspector::new(source_client).await?;
    let history = HistoryStore::new(history_client);
    let mut engine = Engine::new(source, history);

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    while let Some(line) = lines.next_line().await? {
        if let Err(error) = engine.feed_line(&line).await {
            tracing::error!(%error, "capture engine failed, stopping");
            return Err(error.into());
        }
    }

    Ok(())
}

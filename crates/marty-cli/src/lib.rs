//! Role-prefixed connection flags.
//!
//! Each binary composes two of these via `#[command(flatten)]`, one per
//! database role it talks to (`history` uses [`SlaveArgs`] +
//! [`HistoryArgs`]; `clone` uses [`HistoryArgs`] + [`CloneArgs`]). Argument
//! *parsing* beyond this point (subcommands, global flags) is each binary's
//! own concern, not this crate's.

use clap::Args;
use tokio_postgres::Config;

/// Connection flags for the source replica (`--slave-*`).
#[derive(Debug, Clone, Args)]
pub struct SlaveArgs {
    #[arg(long = "slave-host")]
    pub slave_host: String,
    #[arg(long = "slave-port", default_value_t = 5432)]
    pub slave_port: u16,
    #[arg(long = "slave-user")]
    pub slave_user: String,
    #[arg(long = "slave-password")]
    pub slave_password: Option<String>,
    #[arg(long = "slave-database")]
    pub slave_database: String,
}

impl SlaveArgs {
    pub fn to_config(&self) -> Config {
        role_config(
            &self.slave_host,
            self.slave_port,
            &self.slave_user,
            self.slave_password.as_deref(),
            &self.slave_database,
        )
    }
}

/// Connection flags for the history database (`--history-*`).
#[derive(Debug, Clone, Args)]
pub struct HistoryArgs {
    #[arg(long = "history-host")]
    pub history_host: String,
    #[arg(long = "history-port", default_value_t = 5432)]
    pub history_port: u16,
    #[arg(long = "history-user")]
    pub history_user: String,
    #[arg(long = "history-password")]
    pub history_password: Option<String>,
    #[arg(long = "history-database")]
    pub history_database: String,
}

impl HistoryArgs {
    pub fn to_config(&self) -> Config {
        role_config(
            &self.history_host,
            self.history_port,
            &self.history_user,
            self.history_password.as_deref(),
            &self.history_database,
        )
    }
}

/// Connection flags for the clone database (`--clone-*`).
#[derive(Debug, Clone, Args)]
pub struct CloneArgs {
    #[arg(long = "clone-host")]
    pub clone_host: String,
    #[arg(long = "clone-port", default_value_t = 5432)]
    pub clone_port: u16,
    #[arg(long = "clone-user")]
    pub clone_user: String,
    #[arg(long = "clone-password")]
    pub clone_password: Option<String>,
    #[arg(long = "clone-database")]
    pub clone_database: String,
}

impl CloneArgs {
    pub fn to_config(&self) -> Config {
        role_config(
            &self.clone_host,
            self.clone_port,
            &self.clone_user,
            self.clone_password.as_deref(),
            &self.clone_database,
        )
    }
}

fn role_config(host: &str, port: u16, user: &str, password: Option<&str>, database: &str) -> Config {
    let mut config = Config::new();
    config.host(host).port(port).user(user).dbname(database);
    if let Some(password) = password {
        config.password(password);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        slave: SlaveArgs,
        #[command(flatten)]
        history: HistoryArgs,
    }

    #[test]
    fn parses_role_prefixed_flags() {
        let cli = TestCli::parse_from([
            "history",
            "--slave-host",
            "slave.internal",
            "--slave-user",
            "replica",
            "--slave-database",
            "baldur",
            "--history-host",
            "history.internal",
            "--history-user",
            "marty",
            "--history-database",
            "history",
        ]);
        assert_eq!(cli.slave.slave_host, "slave.internal");
        assert_eq!(cli.slave.slave_port, 5432);
        assert_eq!(cli.history.history_database, "history");
    }
}

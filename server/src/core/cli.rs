use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::constants::{
    ENV_CLICKHOUSE_DATABASE, ENV_CLICKHOUSE_PASSWORD, ENV_CLICKHOUSE_URL, ENV_CLICKHOUSE_USER,
    ENV_CONFIG, ENV_HOST, ENV_PORT,
};

#[derive(Parser)]
#[command(name = "llmlens")]
#[command(version, about = "LLM request observability dashboard backend", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Server host address
    #[arg(long, short = 'H', global = true, env = ENV_HOST)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', global = true, env = ENV_PORT)]
    pub port: Option<u16>,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// ClickHouse HTTP URL
    #[arg(long, global = true, env = ENV_CLICKHOUSE_URL)]
    pub clickhouse_url: Option<String>,

    /// ClickHouse database name
    #[arg(long, global = true, env = ENV_CLICKHOUSE_DATABASE)]
    pub clickhouse_database: Option<String>,

    /// ClickHouse user
    #[arg(long, global = true, env = ENV_CLICKHOUSE_USER)]
    pub clickhouse_user: Option<String>,

    /// ClickHouse password
    #[arg(long, global = true, env = ENV_CLICKHOUSE_PASSWORD)]
    pub clickhouse_password: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the server (default when no command is given)
    Start,
}

/// CLI overrides applied on top of the config file
#[derive(Debug, Default, Clone)]
pub struct CliConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub config: Option<PathBuf>,
    pub clickhouse_url: Option<String>,
    pub clickhouse_database: Option<String>,
    pub clickhouse_user: Option<String>,
    pub clickhouse_password: Option<String>,
}

/// Parse command line arguments into overrides and an optional command
pub fn parse() -> (CliConfig, Option<Commands>) {
    let cli = Cli::parse();

    let config = CliConfig {
        host: cli.host,
        port: cli.port,
        config: cli.config,
        clickhouse_url: cli.clickhouse_url,
        clickhouse_database: cli.clickhouse_database,
        clickhouse_user: cli.clickhouse_user,
        clickhouse_password: cli.clickhouse_password,
    };

    (config, cli.command)
}

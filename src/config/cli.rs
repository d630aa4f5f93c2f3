use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

use crate::cache::CacheBackend;

/// Command-line arguments for the shardpress binary.
#[derive(Debug, Parser)]
#[command(
    name = "shardpress",
    version,
    about = "Continent-sharded article store with a replicated global view"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "SHARDPRESS_CONFIG_FILE",
        value_name = "PATH"
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the replication consumer and the cache refresher until interrupted.
    Run(Box<RunArgs>),
    /// Apply shard migrations and set up the replication queue.
    Migrate(MigrateArgs),
    /// Run one cache refresh pass and exit.
    Refresh(RefreshArgs),
    /// Fetch one article through the cache.
    Get(GetArgs),
    /// List articles published within the last N days across every shard.
    Recent(RecentArgs),
    /// Report replication jobs that exhausted their attempts.
    #[command(name = "dead-letters")]
    DeadLetters(DeadLettersArgs),
}

impl Default for Command {
    fn default() -> Self {
        Command::Run(Box::<RunArgs>::default())
    }
}

/// Overrides shared by every command.
#[derive(Debug, Args, Default, Clone)]
pub struct LoggingOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct CacheOverrides {
    /// Override the cache backend.
    #[arg(long = "cache-backend", value_name = "BACKEND", value_parser = parse_backend)]
    pub cache_backend: Option<CacheBackend>,

    /// Override the Redis connection URL.
    #[arg(long = "redis-url", value_name = "URL")]
    pub redis_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(flatten)]
    pub cache: CacheOverrides,

    /// Override the replication worker concurrency.
    #[arg(long = "replication-concurrency", value_name = "COUNT")]
    pub replication_concurrency: Option<u32>,

    /// Enable or disable the replication consumer.
    #[arg(
        long = "replication-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub replication_enabled: Option<bool>,

    /// Override the refresher cadence.
    #[arg(long = "refresher-interval-seconds", value_name = "SECONDS")]
    pub refresher_interval_seconds: Option<u64>,

    /// Enable or disable the periodic cache refresher.
    #[arg(
        long = "refresher-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub refresher_enabled: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub logging: LoggingOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RefreshArgs {
    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(flatten)]
    pub cache: CacheOverrides,

    /// Override the look-back window in days.
    #[arg(long = "window-days", value_name = "DAYS")]
    pub window_days: Option<u32>,
}

#[derive(Debug, Args, Clone)]
pub struct GetArgs {
    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(flatten)]
    pub cache: CacheOverrides,

    /// Shard the article lives in (case-insensitive).
    #[arg(long, value_name = "SHARD")]
    pub shard: String,

    /// Article id within the shard.
    #[arg(long, value_name = "ID")]
    pub id: i64,
}

#[derive(Debug, Args, Clone)]
pub struct RecentArgs {
    #[command(flatten)]
    pub logging: LoggingOverrides,

    /// Look-back window in days.
    #[arg(long, default_value_t = 14, value_parser = clap::value_parser!(u32).range(1..))]
    pub days: u32,
}

#[derive(Debug, Args, Clone)]
pub struct DeadLettersArgs {
    #[command(flatten)]
    pub logging: LoggingOverrides,

    /// Maximum number of jobs to list.
    #[arg(long, default_value_t = 50)]
    pub limit: u32,
}

fn parse_backend(value: &str) -> Result<CacheBackend, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "memory" => Ok(CacheBackend::Memory),
        "redis" => Ok(CacheBackend::Redis),
        other => Err(format!("unknown cache backend `{other}` (memory|redis)")),
    }
}

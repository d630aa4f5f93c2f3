//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::{
    CacheOverrides, CliArgs, Command, DeadLettersArgs, GetArgs, LoggingOverrides, MigrateArgs,
    RecentArgs, RefreshArgs, RunArgs,
};

use std::{
    collections::{BTreeMap, HashMap},
    num::{NonZeroU32, NonZeroU64, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::{cache::CacheBackend, domain::shard::ShardKey};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "shardpress";
const ENV_PREFIX: &str = "SHARDPRESS";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_ARTICLE_TTL_SECS: u64 = 3600;
const DEFAULT_COMMENT_TTL_SECS: u64 = 3600;
const DEFAULT_COMMENT_CEILING: usize = 30;
const DEFAULT_MEMORY_CAPACITY: usize = 10_000;
const DEFAULT_REPLICATION_MAX_ATTEMPTS: u32 = 25;
const DEFAULT_REPLICATION_CONCURRENCY: u32 = 1;
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 3600;
const DEFAULT_REFRESH_WINDOW_DAYS: u32 = 14;
const DEFAULT_PROFANITY_FAILURE_THRESHOLD: u32 = 3;
const DEFAULT_PROFANITY_BREAK_SECS: u64 = 30;
const DEFAULT_PROFANITY_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub shards: ShardSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub replication: ReplicationSettings,
    pub refresher: RefresherSettings,
    pub profanity: ProfanitySettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

/// Connection URL per configured shard. Always contains [`ShardKey::Global`].
#[derive(Debug, Clone)]
pub struct ShardSettings {
    urls: BTreeMap<ShardKey, String>,
}

impl ShardSettings {
    pub fn global_url(&self) -> &str {
        self.urls
            .get(&ShardKey::Global)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn url(&self, key: ShardKey) -> Option<&str> {
        self.urls.get(&key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ShardKey, &str)> {
        self.urls.iter().map(|(key, url)| (*key, url.as_str()))
    }

    pub fn regional(&self) -> impl Iterator<Item = (ShardKey, &str)> {
        self.iter().filter(|(key, _)| !key.is_global())
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub backend: CacheBackend,
    pub redis_url: Option<String>,
    pub article_ttl_seconds: NonZeroU64,
    pub comment_ttl_seconds: NonZeroU64,
    pub comment_ceiling: NonZeroUsize,
    pub memory_capacity: NonZeroUsize,
}

#[derive(Debug, Clone)]
pub struct ReplicationSettings {
    pub queue_url: String,
    pub max_attempts: NonZeroU32,
    pub concurrency: NonZeroU32,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct RefresherSettings {
    pub interval: Duration,
    pub window: time::Duration,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct ProfanitySettings {
    /// Absent disables the content gate.
    pub base_url: Option<String>,
    pub failure_threshold: NonZeroU32,
    pub break_duration: Duration,
    pub timeout: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_command_overrides(cli.command.as_ref());

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    shards: HashMap<String, String>,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
    replication: RawReplicationSettings,
    refresher: RawRefresherSettings,
    profanity: RawProfanitySettings,
}

impl RawSettings {
    fn apply_command_overrides(&mut self, command: Option<&Command>) {
        match command {
            Some(Command::Run(args)) => self.apply_run_overrides(args),
            Some(Command::Migrate(args)) => self.apply_logging_overrides(&args.logging),
            Some(Command::Refresh(args)) => {
                self.apply_logging_overrides(&args.logging);
                self.apply_cache_overrides(&args.cache);
                if let Some(days) = args.window_days {
                    self.refresher.window_days = Some(days);
                }
            }
            Some(Command::Get(args)) => {
                self.apply_logging_overrides(&args.logging);
                self.apply_cache_overrides(&args.cache);
            }
            Some(Command::Recent(args)) => self.apply_logging_overrides(&args.logging),
            Some(Command::DeadLetters(args)) => self.apply_logging_overrides(&args.logging),
            None => self.apply_run_overrides(&RunArgs::default()),
        }
    }

    fn apply_run_overrides(&mut self, args: &RunArgs) {
        self.apply_logging_overrides(&args.logging);
        self.apply_cache_overrides(&args.cache);
        if let Some(value) = args.replication_concurrency {
            self.replication.concurrency = Some(value);
        }
        if let Some(enabled) = args.replication_enabled {
            self.replication.enabled = Some(enabled);
        }
        if let Some(seconds) = args.refresher_interval_seconds {
            self.refresher.interval_seconds = Some(seconds);
        }
        if let Some(enabled) = args.refresher_enabled {
            self.refresher.enabled = Some(enabled);
        }
    }

    fn apply_logging_overrides(&mut self, overrides: &LoggingOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }

    fn apply_cache_overrides(&mut self, overrides: &CacheOverrides) {
        if let Some(backend) = overrides.cache_backend {
            self.cache.backend = Some(backend);
        }
        if let Some(url) = overrides.redis_url.as_ref() {
            self.cache.redis_url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            shards,
            database,
            cache,
            replication,
            refresher,
            profanity,
        } = raw;

        let logging = build_logging_settings(logging)?;
        let shards = build_shard_settings(shards)?;
        let database = build_database_settings(database)?;
        let cache = build_cache_settings(cache)?;
        let replication = build_replication_settings(replication, &shards)?;
        let refresher = build_refresher_settings(refresher)?;
        let profanity = build_profanity_settings(profanity)?;

        Ok(Self {
            logging,
            shards,
            database,
            cache,
            replication,
            refresher,
            profanity,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_shard_settings(raw: HashMap<String, String>) -> Result<ShardSettings, LoadError> {
    let mut urls = BTreeMap::new();
    for (name, url) in raw {
        let key = ShardKey::parse(&name)
            .map_err(|err| LoadError::invalid("shards", err.to_string()))?;
        let Some(url) = non_blank(Some(url)) else {
            return Err(LoadError::invalid(
                "shards",
                format!("url for shard `{key}` must not be empty"),
            ));
        };
        urls.insert(key, url);
    }

    if !urls.contains_key(&ShardKey::Global) {
        return Err(LoadError::invalid(
            "shards.global",
            "the global shard must be configured",
        ));
    }

    Ok(ShardSettings { urls })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let value = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);

    Ok(DatabaseSettings {
        max_connections: non_zero_u32(value.into(), "database.max_connections")?,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let backend = cache.backend.unwrap_or_default();
    let redis_url = non_blank(cache.redis_url);
    if backend == CacheBackend::Redis && redis_url.is_none() {
        return Err(LoadError::invalid(
            "cache.redis_url",
            "required when cache.backend is `redis`",
        ));
    }

    let article_ttl_seconds = NonZeroU64::new(
        cache
            .article_ttl_seconds
            .unwrap_or(DEFAULT_ARTICLE_TTL_SECS),
    )
    .ok_or_else(|| LoadError::invalid("cache.article_ttl_seconds", "must be greater than zero"))?;

    let comment_ttl_seconds = NonZeroU64::new(
        cache
            .comment_ttl_seconds
            .unwrap_or(DEFAULT_COMMENT_TTL_SECS),
    )
    .ok_or_else(|| LoadError::invalid("cache.comment_ttl_seconds", "must be greater than zero"))?;

    let comment_ceiling = non_zero_usize(
        cache.comment_ceiling.unwrap_or(DEFAULT_COMMENT_CEILING as u64),
        "cache.comment_ceiling",
    )?;
    let memory_capacity = non_zero_usize(
        cache.memory_capacity.unwrap_or(DEFAULT_MEMORY_CAPACITY as u64),
        "cache.memory_capacity",
    )?;

    Ok(CacheSettings {
        backend,
        redis_url,
        article_ttl_seconds,
        comment_ttl_seconds,
        comment_ceiling,
        memory_capacity,
    })
}

fn build_replication_settings(
    replication: RawReplicationSettings,
    shards: &ShardSettings,
) -> Result<ReplicationSettings, LoadError> {
    let queue_url =
        non_blank(replication.queue_url).unwrap_or_else(|| shards.global_url().to_string());

    let max_attempts = non_zero_u32(
        replication
            .max_attempts
            .unwrap_or(DEFAULT_REPLICATION_MAX_ATTEMPTS)
            .into(),
        "replication.max_attempts",
    )?;
    let concurrency = non_zero_u32(
        replication
            .concurrency
            .unwrap_or(DEFAULT_REPLICATION_CONCURRENCY)
            .into(),
        "replication.concurrency",
    )?;

    Ok(ReplicationSettings {
        queue_url,
        max_attempts,
        concurrency,
        enabled: replication.enabled.unwrap_or(true),
    })
}

fn build_refresher_settings(
    refresher: RawRefresherSettings,
) -> Result<RefresherSettings, LoadError> {
    let interval_seconds = refresher
        .interval_seconds
        .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS);
    if interval_seconds == 0 {
        return Err(LoadError::invalid(
            "refresher.interval_seconds",
            "must be greater than zero",
        ));
    }

    let window_days = refresher.window_days.unwrap_or(DEFAULT_REFRESH_WINDOW_DAYS);
    if window_days == 0 {
        return Err(LoadError::invalid(
            "refresher.window_days",
            "must be greater than zero",
        ));
    }

    Ok(RefresherSettings {
        interval: Duration::from_secs(interval_seconds),
        window: time::Duration::days(i64::from(window_days)),
        enabled: refresher.enabled.unwrap_or(true),
    })
}

fn build_profanity_settings(
    profanity: RawProfanitySettings,
) -> Result<ProfanitySettings, LoadError> {
    let failure_threshold = non_zero_u32(
        profanity
            .failure_threshold
            .unwrap_or(DEFAULT_PROFANITY_FAILURE_THRESHOLD)
            .into(),
        "profanity.failure_threshold",
    )?;

    let break_seconds = profanity
        .break_seconds
        .unwrap_or(DEFAULT_PROFANITY_BREAK_SECS);
    if break_seconds == 0 {
        return Err(LoadError::invalid(
            "profanity.break_seconds",
            "must be greater than zero",
        ));
    }

    let timeout_seconds = profanity
        .timeout_seconds
        .unwrap_or(DEFAULT_PROFANITY_TIMEOUT_SECS);
    if timeout_seconds == 0 {
        return Err(LoadError::invalid(
            "profanity.timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ProfanitySettings {
        base_url: non_blank(profanity.base_url),
        failure_threshold,
        break_duration: Duration::from_secs(break_seconds),
        timeout: Duration::from_secs(timeout_seconds),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    backend: Option<CacheBackend>,
    redis_url: Option<String>,
    article_ttl_seconds: Option<u64>,
    comment_ttl_seconds: Option<u64>,
    comment_ceiling: Option<u64>,
    memory_capacity: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawReplicationSettings {
    queue_url: Option<String>,
    max_attempts: Option<u32>,
    concurrency: Option<u32>,
    enabled: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRefresherSettings {
    interval_seconds: Option<u64>,
    window_days: Option<u32>,
    enabled: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawProfanitySettings {
    base_url: Option<String>,
    failure_threshold: Option<u32>,
    break_seconds: Option<u64>,
    timeout_seconds: Option<u64>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests;

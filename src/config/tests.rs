use super::*;

fn raw_with_global() -> RawSettings {
    let mut raw = RawSettings::default();
    raw.shards
        .insert("global".to_string(), "postgres://global".to_string());
    raw
}

#[test]
fn defaults_match_documented_values() {
    let settings = Settings::from_raw(raw_with_global()).expect("valid settings");

    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert_eq!(settings.logging.format, LogFormat::Compact);
    assert_eq!(settings.database.max_connections.get(), 8);
    assert_eq!(settings.cache.backend, CacheBackend::Memory);
    assert_eq!(settings.cache.article_ttl_seconds.get(), 3600);
    assert_eq!(settings.cache.comment_ttl_seconds.get(), 3600);
    assert_eq!(settings.cache.comment_ceiling.get(), 30);
    assert_eq!(settings.replication.max_attempts.get(), 25);
    assert!(settings.replication.enabled);
    assert_eq!(settings.refresher.interval, Duration::from_secs(3600));
    assert_eq!(settings.refresher.window, time::Duration::days(14));
    assert!(settings.profanity.base_url.is_none());
}

#[test]
fn global_shard_is_required() {
    let mut raw = RawSettings::default();
    raw.shards
        .insert("europe".to_string(), "postgres://eu".to_string());

    let err = Settings::from_raw(raw).expect_err("missing global shard");
    assert!(matches!(err, LoadError::Invalid { key: "shards.global", .. }));
}

#[test]
fn shard_names_are_parsed_case_insensitively() {
    let mut raw = raw_with_global();
    raw.shards
        .insert("Europe".to_string(), "postgres://eu".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.shards.url(ShardKey::Europe), Some("postgres://eu"));
    let regional: Vec<_> = settings.shards.regional().map(|(key, _)| key).collect();
    assert_eq!(regional, vec![ShardKey::Europe]);
}

#[test]
fn unknown_shard_name_is_rejected() {
    let mut raw = raw_with_global();
    raw.shards
        .insert("atlantis".to_string(), "postgres://nowhere".to_string());

    let err = Settings::from_raw(raw).expect_err("unknown shard");
    assert!(matches!(err, LoadError::Invalid { key: "shards", .. }));
}

#[test]
fn queue_url_defaults_to_global_shard() {
    let settings = Settings::from_raw(raw_with_global()).expect("valid settings");
    assert_eq!(settings.replication.queue_url, "postgres://global");
}

#[test]
fn redis_backend_requires_url() {
    let mut raw = raw_with_global();
    raw.cache.backend = Some(CacheBackend::Redis);

    let err = Settings::from_raw(raw).expect_err("redis without url");
    assert!(matches!(err, LoadError::Invalid { key: "cache.redis_url", .. }));
}

#[test]
fn zero_comment_ceiling_is_rejected() {
    let mut raw = raw_with_global();
    raw.cache.comment_ceiling = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero ceiling");
    assert!(matches!(err, LoadError::Invalid { key: "cache.comment_ceiling", .. }));
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = raw_with_global();
    raw.logging.level = Some("info".to_string());
    raw.refresher.interval_seconds = Some(60);

    let args = CliArgs::parse_from([
        "shardpress",
        "run",
        "--log-level",
        "debug",
        "--refresher-interval-seconds",
        "120",
        "--replication-enabled",
        "false",
    ]);
    raw.apply_command_overrides(args.command.as_ref());
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.refresher.interval, Duration::from_secs(120));
    assert!(!settings.replication.enabled);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = raw_with_global();
    let args = CliArgs::parse_from(["shardpress", "migrate", "--log-json", "yes"]);
    raw.apply_command_overrides(args.command.as_ref());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.logging.format, LogFormat::Json);
}

#[test]
fn default_to_run_command() {
    let args = CliArgs::parse_from(["shardpress"]);
    let command = args.command.unwrap_or_default();
    assert!(matches!(command, Command::Run(_)));
}

#[test]
fn parse_get_arguments() {
    let args = CliArgs::parse_from([
        "shardpress",
        "get",
        "--shard",
        "Europe",
        "--id",
        "42",
        "--cache-backend",
        "memory",
    ]);

    match args.command.expect("get command") {
        Command::Get(get) => {
            assert_eq!(get.shard, "Europe");
            assert_eq!(get.id, 42);
            assert_eq!(get.cache.cache_backend, Some(CacheBackend::Memory));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_recent_defaults_to_fourteen_days() {
    let args = CliArgs::parse_from(["shardpress", "recent"]);

    match args.command.expect("recent command") {
        Command::Recent(recent) => assert_eq!(recent.days, 14),
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_dead_letters_limit() {
    let args = CliArgs::parse_from(["shardpress", "dead-letters", "--limit", "5"]);

    match args.command.expect("dead-letters command") {
        Command::DeadLetters(dead) => assert_eq!(dead.limit, 5),
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn refresh_window_override_applies() {
    let mut raw = raw_with_global();
    let args = CliArgs::parse_from(["shardpress", "refresh", "--window-days", "3"]);
    raw.apply_command_overrides(args.command.as_ref());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.refresher.window, time::Duration::days(3));
}

use std::io::Write;

use clap::Parser;
use shardpress::{
    cache::CacheBackend,
    config::{self, CliArgs, LoadError, LogFormat},
    domain::shard::ShardKey,
};

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config file");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn config_file_layers_over_defaults() {
    let file = write_config(
        r#"
[shards]
global = "postgres://override/global"
oceania = "postgres://override/oceania"

[cache]
comment_ceiling = 12

[profanity]
base_url = "http://moderation.internal"
"#,
    );
    let path = file.path().to_string_lossy().to_string();

    let args = CliArgs::parse_from(["shardpress", "--config-file", &path, "migrate"]);
    let settings = config::load(&args).expect("settings");

    assert_eq!(
        settings.shards.url(ShardKey::Oceania),
        Some("postgres://override/oceania")
    );
    assert_eq!(settings.shards.global_url(), "postgres://override/global");
    assert_eq!(settings.replication.queue_url, "postgres://override/global");
    assert_eq!(settings.cache.comment_ceiling.get(), 12);
    assert_eq!(settings.cache.backend, CacheBackend::Memory);
    assert_eq!(
        settings.profanity.base_url.as_deref(),
        Some("http://moderation.internal")
    );
}

#[test]
fn cli_flags_win_over_the_config_file() {
    let file = write_config(
        r#"
[shards]
global = "postgres://file/global"

[logging]
json = false
"#,
    );
    let path = file.path().to_string_lossy().to_string();

    let args = CliArgs::parse_from([
        "shardpress",
        "--config-file",
        &path,
        "refresh",
        "--log-json",
        "true",
        "--window-days",
        "2",
    ]);
    let settings = config::load(&args).expect("settings");

    assert_eq!(settings.logging.format, LogFormat::Json);
    assert_eq!(settings.refresher.window, time::Duration::days(2));
}

#[test]
fn invalid_values_name_the_offending_key() {
    let file = write_config(
        r#"
[shards]
global = "postgres://file/global"

[refresher]
interval_seconds = 0
"#,
    );
    let path = file.path().to_string_lossy().to_string();

    let args = CliArgs::parse_from(["shardpress", "--config-file", &path, "migrate"]);
    let err = config::load(&args).expect_err("zero interval");

    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "refresher.interval_seconds",
            ..
        }
    ));
}

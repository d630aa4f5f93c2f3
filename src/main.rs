use std::{process, sync::Arc};

use apalis::{
    layers::WorkerBuilderExt,
    prelude::{Monitor, WorkerBuilder, WorkerFactoryFn},
};
use apalis_sql::{Config as ApalisSqlConfig, postgres::PostgresStorage};
use shardpress::{
    application::{
        error::AppError,
        jobs::{
            ArticleCacheRefresher, ReplicationConsumer, ReplicationContext, ReplicationPublisher,
            process_replicate_article_job,
        },
        moderation::ContentGate,
        repos::{JobsRepo, ProjectionsRepo, ShardStore},
        router::ShardRouter,
        shards::ShardRegistry,
    },
    cache::{ArticleCache, CacheBackend, CacheConfig, CacheStore, CommentCache, MemoryCacheStore},
    config,
    domain::{dto::ArticleDto, shard::ShardKey, types::JobType},
    infra::{
        circuit::CircuitBreakerConfig,
        db::{PostgresQueue, PostgresShard},
        error::InfraError,
        profanity::ProfanityClient,
        redis::RedisCacheStore,
        telemetry,
    },
};
use tokio_util::sync::CancellationToken;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

const SOURCE: &str = "shardpress::main";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::validation(format!("failed to load configuration: {err}")))?;

    let command = cli_args.command.unwrap_or_default();

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Run(_) => run_service(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
        config::Command::Refresh(_) => run_refresh(settings).await,
        config::Command::Get(args) => run_get(settings, args).await,
        config::Command::Recent(args) => run_recent(settings, args).await,
        config::Command::DeadLetters(args) => run_dead_letters(settings, args).await,
    }
}

/// Consumer and refresher side by side until Ctrl-C.
async fn run_service(settings: config::Settings) -> Result<(), AppError> {
    let app = build_application(&settings).await?;
    let shutdown = CancellationToken::new();

    let monitor_handle = if settings.replication.enabled {
        Some(spawn_replication_monitor(
            &app.queue,
            ReplicationContext {
                consumer: app.consumer.clone(),
            },
            &settings.replication,
            shutdown.clone(),
        ))
    } else {
        info!(target = SOURCE, "replication consumer disabled");
        None
    };

    let refresher_handle = if settings.refresher.enabled {
        let refresher = ArticleCacheRefresher::new(
            app.router.clone(),
            app.articles.clone(),
            settings.refresher.interval,
            settings.refresher.window,
        );
        let token = shutdown.clone();
        Some(tokio::spawn(async move { refresher.run(token).await }))
    } else {
        info!(target = SOURCE, "article cache refresher disabled");
        None
    };

    tokio::signal::ctrl_c()
        .await
        .map_err(|err| AppError::unexpected(format!("failed to listen for ctrl-c: {err}")))?;
    info!(target = SOURCE, "shutdown requested");
    shutdown.cancel();

    if let Some(handle) = refresher_handle {
        if let Err(err) = handle.await {
            warn!(target = SOURCE, error = %err, "refresher task ended abnormally");
        }
    }
    if let Some(handle) = monitor_handle {
        if let Err(err) = handle.await {
            warn!(target = SOURCE, error = %err, "replication monitor ended abnormally");
        }
    }

    Ok(())
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    for (key, url) in settings.shards.iter() {
        let shard = connect_shard(key, url, &settings).await?;
        shard
            .run_migrations()
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
        info!(target = SOURCE, shard = %key, "shard migrated");
    }

    let queue = connect_queue(&settings).await?;
    queue
        .setup()
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
    info!(target = SOURCE, "replication queue ready");
    Ok(())
}

async fn run_refresh(settings: config::Settings) -> Result<(), AppError> {
    let app = build_application(&settings).await?;
    let refresher = ArticleCacheRefresher::new(
        app.router,
        app.articles,
        settings.refresher.interval,
        settings.refresher.window,
    );

    let report = refresher.refresh_once().await;
    for failure in &report.failed_shards {
        warn!(
            target = SOURCE,
            shard = %failure.shard,
            error = %failure.message,
            "shard skipped during refresh"
        );
    }
    println!(
        "cached {} of {} article(s)",
        report.cached, report.fetched
    );
    Ok(())
}

async fn run_get(settings: config::Settings, args: config::GetArgs) -> Result<(), AppError> {
    let app = build_application(&settings).await?;
    let article = app.router.get(&args.shard, args.id).await?;
    print_json(&article)
}

async fn run_recent(settings: config::Settings, args: config::RecentArgs) -> Result<(), AppError> {
    let app = build_application(&settings).await?;
    let recent = app
        .router
        .list_recent(time::Duration::days(i64::from(args.days)))
        .await;

    for failure in &recent.failed_shards {
        warn!(
            target = SOURCE,
            shard = %failure.shard,
            error = %failure.message,
            "shard unavailable; listing is partial"
        );
    }

    let articles: Vec<ArticleDto> = recent
        .articles
        .iter()
        .map(|record| ArticleDto::from_record(record, String::new()))
        .collect();
    print_json(&articles)
}

async fn run_dead_letters(
    settings: config::Settings,
    args: config::DeadLettersArgs,
) -> Result<(), AppError> {
    let queue = connect_queue(&settings).await?;
    let jobs = queue
        .list_dead_letters(JobType::ReplicateArticle, args.limit)
        .await?;

    println!("{} dead-lettered replication job(s)", jobs.len());
    for job in jobs {
        println!(
            "{}\t{}\tattempts={}/{}\t{}",
            job.id,
            job.state.as_str(),
            job.attempts,
            job.max_attempts,
            job.last_error.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to encode output: {err}")))?;
    println!("{rendered}");
    Ok(())
}

struct Application {
    router: Arc<ShardRouter>,
    articles: Arc<ArticleCache>,
    consumer: Arc<ReplicationConsumer>,
    queue: PostgresQueue,
}

async fn build_application(settings: &config::Settings) -> Result<Application, AppError> {
    let global = connect_shard(ShardKey::Global, settings.shards.global_url(), settings).await?;
    let global_store: Arc<dyn ShardStore> = Arc::new(global.clone());
    let projections: Arc<dyn ProjectionsRepo> = Arc::new(global);

    let mut registry = ShardRegistry::new(global_store, projections.clone());
    for (key, url) in settings.shards.regional() {
        let shard = connect_shard(key, url, settings).await?;
        registry = registry.with_shard(key, Arc::new(shard));
    }
    info!(
        target = SOURCE,
        shards = registry.len(),
        keys = ?registry.keys(),
        "shard registry initialised"
    );

    let cache_config = CacheConfig::from(&settings.cache);
    let store = build_cache_store(&cache_config).await?;
    let articles = Arc::new(ArticleCache::new(store.clone(), &cache_config));
    let comments = Arc::new(CommentCache::new(store, &cache_config));

    let queue = connect_queue(settings).await?;
    let jobs: Arc<dyn JobsRepo> = Arc::new(queue.clone());
    let publisher = Arc::new(ReplicationPublisher::new(
        jobs,
        settings.replication.max_attempts.get(),
    ));

    let gate = build_content_gate(&settings.profanity)?;

    let router = Arc::new(
        ShardRouter::new(Arc::new(registry))
            .with_article_cache_opt(Some(articles.clone()))
            .with_comment_cache_opt(Some(comments))
            .with_publisher_opt(Some(publisher))
            .with_gate_opt(gate),
    );

    let consumer = Arc::new(
        ReplicationConsumer::new(projections)
            .with_sources_opt(Some(router.registry().clone()))
            .with_cache_opt(Some(articles.clone())),
    );

    Ok(Application {
        router,
        articles,
        consumer,
        queue,
    })
}

async fn connect_shard(
    key: ShardKey,
    url: &str,
    settings: &config::Settings,
) -> Result<PostgresShard, AppError> {
    let pool = PostgresShard::connect(url, settings.database.max_connections.get())
        .await
        .map_err(|err| {
            AppError::from(InfraError::database(format!(
                "failed to connect to shard `{key}`: {err}"
            )))
        })?;
    let shard = PostgresShard::new(key, pool);
    shard.health_check().await.map_err(|err| {
        AppError::from(InfraError::database(format!(
            "shard `{}` failed its health check: {err}",
            shard.key()
        )))
    })?;
    Ok(shard)
}

async fn connect_queue(settings: &config::Settings) -> Result<PostgresQueue, AppError> {
    let pool = PostgresShard::connect(
        &settings.replication.queue_url,
        settings.database.max_connections.get(),
    )
    .await
    .map_err(|err| {
        AppError::from(InfraError::database(format!(
            "failed to connect to replication queue: {err}"
        )))
    })?;
    Ok(PostgresQueue::new(pool))
}

async fn build_cache_store(config: &CacheConfig) -> Result<Arc<dyn CacheStore>, AppError> {
    match config.backend {
        CacheBackend::Memory => Ok(Arc::new(MemoryCacheStore::new(config))),
        CacheBackend::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .ok_or_else(|| InfraError::configuration("cache.redis_url is not configured"))?;
            let store = RedisCacheStore::connect(url).await?;
            Ok(Arc::new(store))
        }
    }
}

fn build_content_gate(
    profanity: &config::ProfanitySettings,
) -> Result<Option<Arc<dyn ContentGate>>, AppError> {
    let Some(base_url) = profanity.base_url.as_deref() else {
        info!(target = SOURCE, "profanity gate disabled");
        return Ok(None);
    };

    let client = ProfanityClient::new(
        base_url,
        profanity.timeout,
        CircuitBreakerConfig {
            failure_threshold: profanity.failure_threshold.get(),
            break_duration: profanity.break_duration,
        },
    )?;
    Ok(Some(Arc::new(client)))
}

fn spawn_replication_monitor(
    queue: &PostgresQueue,
    context: ReplicationContext,
    replication: &config::ReplicationSettings,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let storage = PostgresStorage::new_with_config(
        queue.pool().clone(),
        ApalisSqlConfig::new(JobType::ReplicateArticle.as_str()),
    );

    let worker = WorkerBuilder::new("replicate-article-worker")
        .concurrency(replication.concurrency.get() as usize)
        .data(context)
        .backend(storage)
        .build_fn(process_replicate_article_job);

    let monitor = Monitor::new().register(worker);

    tokio::spawn(async move {
        let signal = async move {
            shutdown.cancelled().await;
            Ok::<(), std::io::Error>(())
        };
        if let Err(err) = monitor.run_with_signal(signal).await {
            error!(error = %err, "replication monitor stopped");
        }
    })
}

//! In-memory shard, queue and gate fakes shared by the integration tests.

#![allow(dead_code)]

use std::{
    collections::BTreeMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use shardpress::{
    application::{
        jobs::{ReplicationConsumer, ReplicationPublisher},
        moderation::{ContentGate, GateError},
        repos::{
            ArticleChanges, ArticlesRepo, CommentsRepo, CreateArticleParams, CreateCommentParams,
            JobsRepo, NewJobRecord, ProjectionsRepo, ReplicateArticleParams, RepoError,
            ShardStore,
        },
        router::ShardRouter,
        shards::ShardRegistry,
    },
    cache::{
        ArticleCache, CacheConfig, CacheStore, CacheStoreError, CommentCache, MemoryCacheStore,
    },
    domain::{
        entities::{ArticleRecord, CommentRecord, JobRecord, SourceRef},
        shard::ShardKey,
        types::{JobState, JobType},
    },
};
use time::OffsetDateTime;

/// One shard held in memory. The global instance doubles as the projections repository.
pub struct MemoryShard {
    key: ShardKey,
    articles: Mutex<BTreeMap<i64, ArticleRecord>>,
    comments: Mutex<Vec<CommentRecord>>,
    next_id: AtomicI64,
    unreachable: AtomicBool,
    insert_failures: AtomicUsize,
    projection_writes_fail: AtomicBool,
    reads: AtomicUsize,
}

impl MemoryShard {
    pub fn new(key: ShardKey) -> Arc<Self> {
        Arc::new(Self {
            key,
            articles: Mutex::new(BTreeMap::new()),
            comments: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            unreachable: AtomicBool::new(false),
            insert_failures: AtomicUsize::new(0),
            projection_writes_fail: AtomicBool::new(false),
            reads: AtomicUsize::new(0),
        })
    }

    /// Every subsequent call fails as if the database were down.
    pub fn set_unreachable(&self, value: bool) {
        self.unreachable.store(value, Ordering::SeqCst);
    }

    /// The next `count` projection inserts fail.
    pub fn fail_next_inserts(&self, count: usize) {
        self.insert_failures.store(count, Ordering::SeqCst);
    }

    pub fn fail_projection_writes(&self, value: bool) {
        self.projection_writes_fail.store(value, Ordering::SeqCst);
    }

    /// Point reads served by this shard.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn articles(&self) -> Vec<ArticleRecord> {
        self.articles
            .lock()
            .expect("articles lock")
            .values()
            .cloned()
            .collect()
    }

    pub fn projection_of(&self, source: SourceRef) -> Option<ArticleRecord> {
        self.articles().into_iter().find(|a| a.source == Some(source))
    }

    /// Inserts a row with an explicit publication time, bypassing the router.
    pub fn seed(&self, title: &str, published_at: OffsetDateTime) -> ArticleRecord {
        let record = ArticleRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            author: "seed".into(),
            title: title.into(),
            content: format!("{title} body"),
            shard_key: self.key,
            published_at,
            updated_at: published_at,
            source: None,
        };
        self.articles
            .lock()
            .expect("articles lock")
            .insert(record.id, record.clone());
        record
    }

    fn check(&self) -> Result<(), RepoError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence(format!(
                "shard `{}` unreachable",
                self.key
            )));
        }
        Ok(())
    }

    fn check_projection_write(&self) -> Result<(), RepoError> {
        self.check()?;
        if self.projection_writes_fail.load(Ordering::SeqCst) {
            return Err(RepoError::Timeout);
        }
        Ok(())
    }
}

#[async_trait]
impl ArticlesRepo for MemoryShard {
    async fn find_article(&self, id: i64) -> Result<Option<ArticleRecord>, RepoError> {
        self.check()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.articles.lock().expect("articles lock").get(&id).cloned())
    }

    async fn create_article(
        &self,
        params: CreateArticleParams,
    ) -> Result<ArticleRecord, RepoError> {
        self.check()?;
        let now = OffsetDateTime::now_utc();
        let record = ArticleRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            author: params.author,
            title: params.title,
            content: params.content,
            shard_key: self.key,
            published_at: params.published_at.unwrap_or(now),
            updated_at: now,
            source: None,
        };
        self.articles
            .lock()
            .expect("articles lock")
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_article(
        &self,
        id: i64,
        changes: &ArticleChanges,
    ) -> Result<Option<ArticleRecord>, RepoError> {
        self.check()?;
        let mut articles = self.articles.lock().expect("articles lock");
        Ok(articles.get_mut(&id).map(|record| {
            record.author = changes.author.clone();
            record.title = changes.title.clone();
            record.content = changes.content.clone();
            record.updated_at = OffsetDateTime::now_utc();
            record.clone()
        }))
    }

    async fn delete_article(&self, id: i64) -> Result<Option<ArticleRecord>, RepoError> {
        self.check()?;
        Ok(self.articles.lock().expect("articles lock").remove(&id))
    }

    async fn list_published_since(
        &self,
        since: OffsetDateTime,
    ) -> Result<Vec<ArticleRecord>, RepoError> {
        self.check()?;
        let mut rows: Vec<ArticleRecord> = self
            .articles()
            .into_iter()
            .filter(|a| a.published_at >= since)
            .collect();
        rows.sort_by_key(|a| (a.published_at, a.id));
        Ok(rows)
    }
}

#[async_trait]
impl CommentsRepo for MemoryShard {
    async fn list_comments(&self, article_id: i64) -> Result<Vec<CommentRecord>, RepoError> {
        self.check()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .comments
            .lock()
            .expect("comments lock")
            .iter()
            .filter(|c| c.article_id == article_id)
            .cloned()
            .collect())
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        self.check()?;
        let record = CommentRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            article_id: params.article_id,
            author: params.author,
            text: params.text,
            shard_key: self.key,
            created_at: OffsetDateTime::now_utc(),
        };
        self.comments
            .lock()
            .expect("comments lock")
            .push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl ProjectionsRepo for MemoryShard {
    async fn insert_projection(
        &self,
        params: ReplicateArticleParams,
    ) -> Result<ArticleRecord, RepoError> {
        self.check()?;
        let pending = self.insert_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.insert_failures.store(pending - 1, Ordering::SeqCst);
            return Err(RepoError::from_persistence("global shard write failed"));
        }

        let now = OffsetDateTime::now_utc();
        let mut articles = self.articles.lock().expect("articles lock");
        if let Some(existing) = articles.values().find(|a| a.source == Some(params.source)) {
            return Ok(existing.clone());
        }

        let record = ArticleRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            author: params.author,
            title: params.title,
            content: params.content,
            shard_key: ShardKey::Global,
            published_at: params.published_at,
            updated_at: now,
            source: Some(params.source),
        };
        articles.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_projection(
        &self,
        source: &SourceRef,
        changes: &ArticleChanges,
    ) -> Result<Option<ArticleRecord>, RepoError> {
        self.check_projection_write()?;
        let mut articles = self.articles.lock().expect("articles lock");
        Ok(articles
            .values_mut()
            .find(|a| a.source.as_ref() == Some(source))
            .map(|record| {
                record.author = changes.author.clone();
                record.title = changes.title.clone();
                record.content = changes.content.clone();
                record.clone()
            }))
    }

    async fn delete_projection(
        &self,
        source: &SourceRef,
    ) -> Result<Option<ArticleRecord>, RepoError> {
        self.check_projection_write()?;
        let mut articles = self.articles.lock().expect("articles lock");
        let id = articles
            .values()
            .find(|a| a.source.as_ref() == Some(source))
            .map(|a| a.id);
        Ok(id.and_then(|id| articles.remove(&id)))
    }
}

/// Queue fake. Enqueued payloads stay available for manual delivery.
#[derive(Default)]
pub struct MemoryJobs {
    jobs: Mutex<Vec<JobRecord>>,
    fail: AtomicBool,
}

impl MemoryJobs {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, value: bool) {
        self.fail.store(value, Ordering::SeqCst);
    }

    pub fn payloads(&self) -> Vec<serde_json::Value> {
        self.jobs
            .lock()
            .expect("jobs lock")
            .iter()
            .map(|job| job.payload.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().expect("jobs lock").len()
    }

    /// Marks a job as failed with every attempt spent.
    pub fn exhaust(&self, id: &str) {
        let mut jobs = self.jobs.lock().expect("jobs lock");
        if let Some(job) = jobs.iter_mut().find(|job| job.id == id) {
            job.state = JobState::Failed;
            job.attempts = job.max_attempts;
            job.last_error = Some("global shard write failed".into());
        }
    }
}

#[async_trait]
impl JobsRepo for MemoryJobs {
    async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("queue unavailable"));
        }
        let mut jobs = self.jobs.lock().expect("jobs lock");
        let id = format!("job-{}", jobs.len() + 1);
        jobs.push(JobRecord {
            id: id.clone(),
            job_type: job.job_type,
            payload: job.payload,
            state: JobState::Pending,
            attempts: 0,
            max_attempts: job.max_attempts,
            run_at: job.run_at,
            done_at: None,
            last_error: None,
        });
        Ok(id)
    }

    async fn find_job(&self, id: &str) -> Result<Option<JobRecord>, RepoError> {
        Ok(self
            .jobs
            .lock()
            .expect("jobs lock")
            .iter()
            .find(|job| job.id == id)
            .cloned())
    }

    async fn list_dead_letters(
        &self,
        job_type: JobType,
        limit: u32,
    ) -> Result<Vec<JobRecord>, RepoError> {
        Ok(self
            .jobs
            .lock()
            .expect("jobs lock")
            .iter()
            .filter(|job| job.job_type == job_type && job.is_dead_letter())
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

/// Store that fails every call.
pub struct FailingCacheStore;

#[async_trait]
impl CacheStore for FailingCacheStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheStoreError> {
        Err(CacheStoreError::unavailable("connection refused"))
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheStoreError> {
        Err(CacheStoreError::unavailable("connection refused"))
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheStoreError> {
        Err(CacheStoreError::unavailable("connection refused"))
    }
}

/// Gate with a fixed verdict, or a fixed failure.
pub enum StaticGate {
    Clean,
    Dirty,
    Down,
}

#[async_trait]
impl ContentGate for StaticGate {
    async fn is_clean(&self, _text: &str) -> Result<bool, GateError> {
        match self {
            StaticGate::Clean => Ok(true),
            StaticGate::Dirty => Ok(false),
            StaticGate::Down => Err(GateError::Unavailable("connection refused".into())),
        }
    }
}

/// Regional shards `europe` and `asia` plus `global`, wired to memory caches and a queue fake.
pub struct Harness {
    pub europe: Arc<MemoryShard>,
    pub asia: Arc<MemoryShard>,
    pub global: Arc<MemoryShard>,
    pub jobs: Arc<MemoryJobs>,
    pub store: Arc<MemoryCacheStore>,
    pub articles: Arc<ArticleCache>,
    pub comments: Arc<CommentCache>,
    pub router: Arc<ShardRouter>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_gate(None)
    }

    pub fn with_gate(gate: Option<Arc<dyn ContentGate>>) -> Self {
        let config = CacheConfig::default();
        let store = Arc::new(MemoryCacheStore::new(&config));
        let store_dyn: Arc<dyn CacheStore> = store.clone();
        Self::build(store, store_dyn, &config, gate)
    }

    /// Same wiring, but every cache call hits a failing store.
    pub fn with_failing_cache() -> Self {
        let config = CacheConfig::default();
        let store = Arc::new(MemoryCacheStore::new(&config));
        let failing: Arc<dyn CacheStore> = Arc::new(FailingCacheStore);
        Self::build(store, failing, &config, None)
    }

    fn build(
        store: Arc<MemoryCacheStore>,
        cache_store: Arc<dyn CacheStore>,
        config: &CacheConfig,
        gate: Option<Arc<dyn ContentGate>>,
    ) -> Self {
        let europe = MemoryShard::new(ShardKey::Europe);
        let asia = MemoryShard::new(ShardKey::Asia);
        let global = MemoryShard::new(ShardKey::Global);
        let jobs = MemoryJobs::new();

        let global_store: Arc<dyn ShardStore> = global.clone();
        let projections: Arc<dyn ProjectionsRepo> = global.clone();
        let registry = ShardRegistry::new(global_store, projections)
            .with_shard(ShardKey::Europe, europe.clone())
            .with_shard(ShardKey::Asia, asia.clone());

        let articles = Arc::new(ArticleCache::new(cache_store.clone(), config));
        let comments = Arc::new(CommentCache::new(cache_store, config));
        let jobs_dyn: Arc<dyn JobsRepo> = jobs.clone();
        let publisher = Arc::new(ReplicationPublisher::new(jobs_dyn, 25));

        let router = Arc::new(
            ShardRouter::new(Arc::new(registry))
                .with_article_cache_opt(Some(articles.clone()))
                .with_comment_cache_opt(Some(comments.clone()))
                .with_publisher_opt(Some(publisher))
                .with_gate_opt(gate),
        );

        Self {
            europe,
            asia,
            global,
            jobs,
            store,
            articles,
            comments,
            router,
        }
    }

    /// Consumer wired the way the service runs it: source lookups and cache invalidation.
    pub fn consumer(&self) -> ReplicationConsumer {
        let projections: Arc<dyn ProjectionsRepo> = self.global.clone();
        ReplicationConsumer::new(projections)
            .with_sources_opt(Some(self.router.registry().clone()))
            .with_cache_opt(Some(self.articles.clone()))
    }
}

pub fn new_article(title: &str) -> CreateArticleParams {
    CreateArticleParams {
        author: "Ana".into(),
        title: title.into(),
        content: format!("{title} content"),
        published_at: None,
    }
}

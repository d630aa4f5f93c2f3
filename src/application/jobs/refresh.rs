//! Periodic warm-up of the article cache from recently published articles.

use std::{sync::Arc, time::Duration as StdDuration};

use metrics::histogram;
use time::Duration;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    application::router::{ShardFailure, ShardRouter},
    cache::ArticleCache,
    domain::dto::ArticleDto,
};

const SOURCE: &str = "shardpress::application::jobs::refresh";

pub(crate) const METRIC_REFRESH_MS: &str = "shardpress_refresh_ms";

#[derive(Debug, Clone, Default)]
pub struct RefreshReport {
    /// Articles read from the shards inside the window.
    pub fetched: usize,
    /// Articles the cache store accepted.
    pub cached: usize,
    pub failed_shards: Vec<ShardFailure>,
}

/// Pushes every article published inside the trailing window into the cache, on an interval.
pub struct ArticleCacheRefresher {
    router: Arc<ShardRouter>,
    cache: Arc<ArticleCache>,
    interval: StdDuration,
    window: Duration,
}

impl ArticleCacheRefresher {
    pub fn new(
        router: Arc<ShardRouter>,
        cache: Arc<ArticleCache>,
        interval: StdDuration,
        window: Duration,
    ) -> Self {
        Self {
            router,
            cache,
            interval,
            window,
        }
    }

    /// One pass over all shards. Failing shards are skipped and reported.
    pub async fn refresh_once(&self) -> RefreshReport {
        let started_at = Instant::now();
        let recent = self.router.list_recent(self.window).await;

        let mut cached = 0;
        for record in &recent.articles {
            let dto = ArticleDto::from_record(record, uuid::Uuid::new_v4().simple().to_string());
            if self.cache.set(&dto).await {
                cached += 1;
            }
        }

        histogram!(METRIC_REFRESH_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        let report = RefreshReport {
            fetched: recent.articles.len(),
            cached,
            failed_shards: recent.failed_shards,
        };
        if report.failed_shards.is_empty() {
            info!(
                target = SOURCE,
                fetched = report.fetched,
                cached = report.cached,
                "article cache refreshed"
            );
        } else {
            warn!(
                target = SOURCE,
                fetched = report.fetched,
                cached = report.cached,
                failed = report.failed_shards.len(),
                "article cache refreshed with failing shards"
            );
        }
        report
    }

    /// Refreshes immediately, then once per interval until `shutdown` fires.
    ///
    /// A pass already running completes before the loop observes cancellation.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            target = SOURCE,
            interval_secs = self.interval.as_secs(),
            window_days = self.window.whole_days(),
            "article cache refresher started"
        );

        while !shutdown.is_cancelled() {
            self.refresh_once().await;

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(self.interval) => {}
            }
        }

        info!(target = SOURCE, "article cache refresher stopped");
    }
}

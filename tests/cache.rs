mod support;

use std::{sync::Arc, time::Duration};

use shardpress::{
    cache::{ArticleCache, CacheConfig, CacheStore, CommentCache, MemoryCacheStore},
    domain::{
        dto::{ArticleDto, CommentDto},
        shard::ShardKey,
    },
};
use support::{Harness, new_article};
use time::macros::datetime;

fn comment(article_id: i64) -> CommentDto {
    CommentDto {
        id: article_id * 10,
        article_id,
        author: "Ben".into(),
        text: "hello".into(),
        shard_key: ShardKey::Oceania,
        created_at: datetime!(2026-03-01 12:00 UTC),
    }
}

fn article(id: i64) -> ArticleDto {
    ArticleDto {
        id,
        title: "Reef".into(),
        content: "Coral".into(),
        author: "Ana".into(),
        published_at: datetime!(2026-03-01 12:00 UTC),
        shard_key: ShardKey::Oceania,
        source_record_id: None,
        source_shard_key: None,
        trace_id: "t-1".into(),
    }
}

#[tokio::test]
async fn comment_index_never_exceeds_ceiling() {
    let config = CacheConfig::default();
    let store = Arc::new(MemoryCacheStore::new(&config));
    let cache = CommentCache::new(store.clone(), &config);

    for article_id in 1..=31 {
        cache
            .set(ShardKey::Oceania, article_id, &[comment(article_id)])
            .await;
    }

    assert_eq!(cache.tracked(), 30);
    assert!(!cache.is_tracked(ShardKey::Oceania, 1));
    assert!(cache.get(ShardKey::Oceania, 1).await.is_none());
    assert!(store.get("comment:oceania:1").await.expect("get").is_none());
    for article_id in 2..=31 {
        assert!(cache.is_tracked(ShardKey::Oceania, article_id));
    }
}

#[tokio::test]
async fn touched_listing_survives_eviction() {
    let config = CacheConfig::default();
    let cache = CommentCache::new(Arc::new(MemoryCacheStore::new(&config)), &config);

    for article_id in 1..=30 {
        cache
            .set(ShardKey::Oceania, article_id, &[comment(article_id)])
            .await;
    }
    assert!(cache.get(ShardKey::Oceania, 1).await.is_some());

    cache.set(ShardKey::Oceania, 31, &[comment(31)]).await;

    assert!(cache.is_tracked(ShardKey::Oceania, 1));
    assert!(!cache.is_tracked(ShardKey::Oceania, 2));
}

#[tokio::test]
async fn removing_twice_leaves_key_absent() {
    let config = CacheConfig::default();
    let store = Arc::new(MemoryCacheStore::new(&config));
    let comments = CommentCache::new(store.clone(), &config);
    let articles = ArticleCache::new(store.clone(), &config);

    comments.set(ShardKey::Oceania, 4, &[comment(4)]).await;
    articles.set(&article(4)).await;

    comments.remove(ShardKey::Oceania, 4).await;
    comments.remove(ShardKey::Oceania, 4).await;
    articles.remove(ShardKey::Oceania, 4).await;
    articles.remove(ShardKey::Oceania, 4).await;

    assert!(!comments.is_tracked(ShardKey::Oceania, 4));
    assert!(store.is_empty());
}

#[tokio::test(start_paused = true)]
async fn article_entry_expires_after_ttl_even_when_read() {
    let config = CacheConfig::default();
    let cache = ArticleCache::new(Arc::new(MemoryCacheStore::new(&config)), &config);
    cache.set(&article(8)).await;

    tokio::time::advance(Duration::from_secs(1800)).await;
    assert_eq!(cache.get(ShardKey::Oceania, 8).await, Some(article(8)));

    tokio::time::advance(Duration::from_secs(1801)).await;
    assert!(cache.get(ShardKey::Oceania, 8).await.is_none());
}

#[tokio::test]
async fn unavailable_store_degrades_to_shard_reads() {
    let harness = Harness::with_failing_cache();

    let created = harness
        .router
        .create("europe", new_article("Degraded"))
        .await
        .expect("create ignores cache failure");

    let fetched = harness
        .router
        .get("europe", created.id)
        .await
        .expect("get falls through to the shard");
    assert_eq!(fetched.id, created.id);
    harness
        .router
        .get("europe", created.id)
        .await
        .expect("still served by the shard");
    assert_eq!(harness.europe.reads(), 2);

    harness
        .router
        .delete("europe", created.id)
        .await
        .expect("delete ignores cache failure");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_stay_near_the_ceiling() {
    const WRITERS: i64 = 8;
    const PER_WRITER: i64 = 25;

    let config = CacheConfig::default();
    let cache = Arc::new(CommentCache::new(
        Arc::new(MemoryCacheStore::new(&config)),
        &config,
    ));

    let handles: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let cache = cache.clone();
            tokio::spawn(async move {
                for n in 0..PER_WRITER {
                    let article_id = writer * 1_000 + n;
                    cache
                        .set(ShardKey::Oceania, article_id, &[comment(article_id)])
                        .await;
                    cache.get(ShardKey::Oceania, article_id).await;
                }
            })
        })
        .collect();
    for handle in handles {
        handle.await.expect("writer task");
    }

    assert!(cache.tracked() <= 30 + WRITERS as usize);

    cache.set(ShardKey::Oceania, 99_999, &[comment(99_999)]).await;
    assert!(cache.is_tracked(ShardKey::Oceania, 99_999));
}

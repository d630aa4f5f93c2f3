mod context;
mod queue;
mod refresh;
mod replicate;

pub use context::{ReplicationContext, job_failed};
pub use queue::enqueue_job;
pub use refresh::{ArticleCacheRefresher, RefreshReport};
pub use replicate::{
    Delivery, ReplicateArticleJob, ReplicationConsumer, ReplicationError, ReplicationPublisher,
    process_replicate_article_job,
};

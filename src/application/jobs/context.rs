use std::sync::Arc;

use apalis::prelude::Error as ApalisError;

use super::replicate::ReplicationConsumer;

/// Shared context passed to the replication worker.
#[derive(Clone)]
pub struct ReplicationContext {
    pub consumer: Arc<ReplicationConsumer>,
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convert any error into an [`ApalisError::Failed`], which makes the job eligible for redelivery.
pub fn job_failed<E>(err: E) -> ApalisError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let boxed: BoxError = Box::new(err);
    ApalisError::Failed(Arc::new(boxed))
}

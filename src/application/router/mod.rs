//! Shard router: resolves shard keys and fans reads out across shards.

mod commands;
mod error;
mod queries;
mod service;
mod types;

pub use error::RouterError;
pub use service::ShardRouter;
pub use types::{RecentArticles, ShardFailure};

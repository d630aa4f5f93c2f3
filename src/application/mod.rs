pub mod error;
pub mod jobs;
pub mod moderation;
pub mod repos;
pub mod router;
pub mod shards;

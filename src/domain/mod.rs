//! Domain layer types and invariants.

pub mod dto;
pub mod entities;
pub mod error;
pub mod shard;
pub mod types;

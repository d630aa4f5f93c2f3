//! Infrastructure adapters and runtime bootstrap.

pub mod circuit;
pub mod db;
pub mod error;
pub mod profanity;
pub mod redis;
pub mod telemetry;

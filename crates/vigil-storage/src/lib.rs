//! Repository abstraction over the cache/reports/threads spaces (spec §4.2):
//! a Redis-backed primary with secondary indexes, an in-memory fallback used
//! when Redis is unreachable, and a failover wrapper that switches between
//! them transparently.

pub mod compression;
pub mod error;
pub mod eviction;
pub mod memory;
pub mod redis_backend;
pub mod repository;

pub use compression::{decode, encode, Encoded, COMPRESSION_THRESHOLD_BYTES};
pub use error::{Result, StorageError};
pub use eviction::spawn_eviction_task;
pub use memory::InMemoryRepository;
pub use redis_backend::RedisRepository;
pub use repository::FailoverRepository;

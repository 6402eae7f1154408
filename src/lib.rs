//! # Singleton Pool
//!
//! A thread-safe registry that constructs each keyed singleton exactly once,
//! and a bounded pool of resource handles to keep inside such a singleton.
//!
//! ## Quick Start
//!
//! ```rust
//! use singleton_pool::{BoundedPool, SingletonRegistry};
//! use std::sync::Arc;
//!
//! // Build the registry once and pass it to whoever needs it.
//! let registry = SingletonRegistry::new();
//!
//! let pool: Arc<BoundedPool> = registry
//!     .get_or_init("connectors", || BoundedPool::new(2))
//!     .unwrap();
//!
//! let first = pool.acquire().unwrap();
//! let _second = pool.acquire().unwrap();
//! assert!(pool.acquire().is_none()); // exhausted, never blocks
//!
//! pool.release(first).unwrap();
//! assert_eq!(pool.available(), 1);
//! ```
//!
//! ## Features
//!
//! - **Exactly-once construction**: concurrent first callers of a key run one factory
//! - **Retryable failures**: a failed factory publishes nothing
//! - **Bounded handles**: a pool never hands out more than its capacity
//! - **Tracing support**: `tracing` logs plus an optional per-registry event callback
//!
//! ## Main Types
//!
//! - [`SingletonRegistry`] - keyed exactly-once construction
//! - [`BoundedPool`] - non-blocking acquisition of numbered units
//! - [`Handle`] / [`HandleGuard`] - a checked-out unit, plain or released on drop
//! - [`RegistryError`] / [`PoolError`] - error types
//! - [`RegistryEvent`] - events delivered to [`SingletonRegistry::set_trace_callback`]

mod pool;
mod pool_error;
mod registry;
mod registry_error;
mod registry_event;

pub use pool::{BoundedPool, Handle, HandleGuard, DEFAULT_CAPACITY};
pub use pool_error::PoolError;
pub use registry::{SingletonRegistry, TraceCallback};
pub use registry_error::{BoxError, RegistryError};
pub use registry_event::RegistryEvent;

//! Custom resource types for the Redis/Valkey failover operator.
//!
//! Defines `RedisFailover` and `ValkeyFailover`, their defaulting and
//! validation rules, the booleans derived from their spec (bootstrapping,
//! sentinel-enablement, quorum), and the `FailoverResource` trait the
//! operator core uses to stay kind-agnostic.

pub mod common;
pub mod error;
pub mod redisfailover;
pub mod valkeyfailover;

pub use common::{
    bootstrapping, operator_managed_failover, quorum, sentinel_enabled, sentinels_allowed,
    AuthSpec, BootstrapNode, EngineSpec, ExporterSpec, FailoverResource, FailoverStatus,
    SentinelSpec, DEFAULT_SENTINEL_ENABLED, HEALTHY_STATE, NOT_HEALTHY_STATE,
};
pub use error::Error;
pub use redisfailover::{RedisFailover, RedisFailoverSpec};
pub use valkeyfailover::{ValkeyFailover, ValkeyFailoverSpec};

//! Operator-wide error type and classification, per `spec.md` §7.

use std::time::Duration;

/// How a given error should be handled by the controller loop.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    /// Network blips, optimistic-concurrency conflicts, not-found during
    /// races: retry with backoff.
    Transient,
    /// User action required: validation failure, missing auth secret.
    Configuration,
    /// Another actor (e.g. Sentinel) changed topology mid-flight: abort
    /// this heal action and retry the whole cycle next reconciliation.
    Precondition,
    /// Internal invariant broken: surface loudly and stop the worker from
    /// retrying this key until the next resync.
    Fatal,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("custom resource validation failed: {source}")]
    Validation {
        #[from]
        source: redisfailover_crd::Error,
    },

    #[error("Kubernetes API error: {source}")]
    Kube {
        #[from]
        source: kube::Error,
    },

    #[error("Redis wire error talking to {addr}: {source}")]
    Redis {
        addr: String,
        #[source]
        source: rustis::Error,
    },

    #[error("Sentinel wire error talking to {addr}: {source}")]
    Sentinel {
        addr: String,
        #[source]
        source: rustis::Error,
    },

    #[error("topology changed concurrently: {0}")]
    ConcurrentTopologyChange(String),

    #[error("no healthy replica candidate available for promotion")]
    NoPromotionCandidate,

    #[error("auth secret {secret} is missing key {key}")]
    MissingAuthSecretKey { secret: String, key: String },

    #[error("object [{namespace}/{name}] is missing required metadata.{field}")]
    MissingObjectKey {
        namespace: String,
        name: String,
        field: &'static str,
    },

    #[error("invariant violated: {0}")]
    InvariantViolated(String),
}

impl Error {
    pub fn classify(&self) -> ErrorClass {
        match self {
            Error::Validation { .. } => ErrorClass::Configuration,
            Error::MissingAuthSecretKey { .. } => ErrorClass::Configuration,
            Error::Kube { source } => {
                if is_transient_kube_error(source) {
                    ErrorClass::Transient
                } else {
                    ErrorClass::Fatal
                }
            }
            Error::Redis { .. } | Error::Sentinel { .. } => ErrorClass::Transient,
            Error::ConcurrentTopologyChange(_) => ErrorClass::Precondition,
            Error::NoPromotionCandidate => ErrorClass::Precondition,
            Error::MissingObjectKey { .. } => ErrorClass::Transient,
            Error::InvariantViolated(_) => ErrorClass::Fatal,
        }
    }

    /// Backoff duration to use on the next requeue, capped by the resync
    /// interval (`spec.md` §4.1).
    pub fn backoff(&self, attempt: u32, resync_interval: Duration) -> Duration {
        match self.classify() {
            ErrorClass::Fatal => resync_interval,
            _ => {
                let secs = 2u64.saturating_pow(attempt.min(6)).min(resync_interval.as_secs().max(1));
                Duration::from_secs(secs)
            }
        }
    }
}

fn is_transient_kube_error(err: &kube::Error) -> bool {
    match err {
        kube::Error::Api(api_err) => {
            matches!(api_err.code, 404 | 409 | 429 | 500 | 502 | 503 | 504)
        }
        _ => true,
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

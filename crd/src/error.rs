/// Errors surfaced while resolving or validating a `RedisFailover`/`ValkeyFailover` spec.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("name length can't be higher than {max} characters (got {actual}): [{name}]")]
    NameTooLong {
        name: String,
        actual: usize,
        max: usize,
    },

    #[error("BootstrapNode must include a host when provided")]
    BootstrapNodeMissingHost,

    #[error("object [{namespace}/{name}] is missing required field .metadata.{field}")]
    MissingObjectKey {
        namespace: String,
        name: String,
        field: &'static str,
    },

    #[error("Kubernetes reported error: {source}")]
    KubeError {
        #[from]
        source: kube::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

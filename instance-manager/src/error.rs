//! Error type for the instance-manager binary.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to access data directory {path}: {source}")]
    DataDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a directory")]
    NotADirectory { path: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

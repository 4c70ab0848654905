use std::path::PathBuf;

use thiserror::Error;
use vocalabel_audio::AudioError;
use vocalabel_domain::{DomainError, RecordId};
use vocalabel_services::ServiceError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid setting {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

impl ConfigError {
    pub(crate) fn invalid<T: Into<String>>(key: &'static str, message: T) -> Self {
        Self::Invalid {
            key,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("record id {0} appears more than once in the batch")]
    DuplicateId(RecordId),
    #[error("annotation dataset `{0}` already exists")]
    DatasetExists(String),
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

//! Stage-level error type.

use crate::config::ConfigError;
use thiserror::Error;
use tickerfunnel_core::artifacts::ArtifactError;
use tickerfunnel_core::data::{BackoffLimitExceeded, DataError};
use tickerfunnel_core::domain::Stage;
use tickerfunnel_core::store::StoreError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("data error: {0}")]
    Data(#[from] DataError),

    #[error(transparent)]
    BackoffLimit(#[from] BackoffLimitExceeded),

    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("stage '{stage}' failed: {source}")]
    StageFailed {
        stage: Stage,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Attach the failing stage, unless one is already attached.
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            e @ PipelineError::StageFailed { .. } => e,
            e => PipelineError::StageFailed {
                stage,
                source: Box::new(e),
            },
        }
    }

    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            PipelineError::StageFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// True if the root cause is a backoff topic hitting its ceiling.
    pub fn is_backoff_limit(&self) -> bool {
        match self {
            PipelineError::BackoffLimit(_) => true,
            PipelineError::StageFailed { source, .. } => source.is_backoff_limit(),
            _ => false,
        }
    }

    /// Message recorded on failed step and run rows.
    pub fn root_message(&self) -> String {
        match self {
            PipelineError::StageFailed { source, .. } => source.root_message(),
            e => e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn stage_attached_once() {
        let limit = BackoffLimitExceeded {
            topic: "quote_batch".into(),
            attempts: 11,
            ceiling: Duration::from_secs(300),
        };
        let err = PipelineError::from(limit)
            .in_stage(Stage::Prices)
            .in_stage(Stage::Build);
        assert_eq!(err.failed_stage(), Some(Stage::Prices));
        assert!(err.is_backoff_limit());
        assert!(err.root_message().contains("quote_batch"));
        assert!(err.to_string().starts_with("stage 'extract-prices' failed"));
    }

    #[test]
    fn data_errors_are_not_backoff() {
        let err = PipelineError::from(DataError::ResponseFormatChanged("no header".into()));
        assert!(!err.is_backoff_limit());
        assert_eq!(err.failed_stage(), None);
    }
}

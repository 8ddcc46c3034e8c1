mod ask;
mod config;
mod serve;
mod status;
mod upload;

pub use ask::AskArgs;
pub use config::ConfigCommand;
pub use serve::{ServeArgs, ServeCommand};
pub use upload::UploadArgs;

pub use ask::handle_ask;
pub use config::handle_config;
pub use serve::handle_serve;
pub use status::handle_status;
pub use upload::handle_upload;

use crate::error::DaemonError;

/// Human-readable description of a daemon failure, including the failing
/// ingestion stage and a retry hint when the daemon reported one.
pub(crate) fn describe_error(err: &DaemonError) -> String {
    match err {
        DaemonError::Remote {
            kind,
            stage: Some(stage),
            message,
        } => format!("{} (stage: {}, kind: {})", message, stage, kind),
        DaemonError::Remote { kind, message, .. } if kind.is_retryable() => {
            format!("{} (kind: {}, retry later)", message, kind)
        }
        DaemonError::Remote { kind, message, .. } => format!("{} (kind: {})", message, kind),
        DaemonError::NotRunning => {
            "daemon is not running; start it with `logsage serve`".to_string()
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, IngestStage};

    #[test]
    fn test_describe_remote_errors() {
        let err = DaemonError::Remote {
            kind: ErrorKind::EmbeddingServiceError,
            stage: Some(IngestStage::Embed),
            message: "embed failed: connection refused".to_string(),
        };
        assert_eq!(
            describe_error(&err),
            "embed failed: connection refused (stage: embed, kind: embedding_service_error)"
        );

        let err = DaemonError::Remote {
            kind: ErrorKind::Busy,
            stage: None,
            message: "a corpus is already being built; retry later".to_string(),
        };
        assert!(describe_error(&err).ends_with("(kind: busy, retry later)"));

        let err = DaemonError::Remote {
            kind: ErrorKind::EmptyQuery,
            stage: None,
            message: "query cannot be empty".to_string(),
        };
        assert_eq!(describe_error(&err), "query cannot be empty (kind: empty_query)");
    }
}

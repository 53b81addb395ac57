use std::io;
use thiserror::Error;

/// Errors raised while driving the external segment-download tool
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("{tool} not found. Install with: {hint}")]
    ToolMissing { tool: String, hint: String },

    #[error("Failed to spawn {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("Download failed: {filename}.mp4")]
    Failed { filename: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Outcomes that end a whole batch instead of a single episode
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Invalid episode range")]
    InvalidEpisodeRange,

    #[error("No streams found for first episode")]
    NoStreamsForFirstEpisode,

    #[error("No quality selected")]
    QualitySelectionCancelled,

    #[error("First episode extraction failed: {0}")]
    FirstEpisode(anyhow::Error),
}

/// Connection resets and broken pipes are noise from the site, not failures of the run.
pub fn is_transient(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .map(|e| {
                matches!(
                    e.kind(),
                    io::ErrorKind::ConnectionReset
                        | io::ErrorKind::ConnectionAborted
                        | io::ErrorKind::BrokenPipe
                )
            })
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_connection_reset_is_transient() {
        let err = io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer");
        let wrapped: anyhow::Error = Err::<(), _>(err)
            .context("fetching master playlist")
            .unwrap_err();
        assert!(is_transient(&wrapped));
    }

    #[test]
    fn test_other_errors_are_not_transient() {
        let err = anyhow::anyhow!("Master playlist not found");
        assert!(!is_transient(&err));

        let io_err: anyhow::Error = io::Error::new(io::ErrorKind::NotFound, "missing").into();
        assert!(!is_transient(&io_err));
    }

    #[test]
    fn test_download_failure_names_file() {
        let err = DownloadError::Failed {
            filename: "frieren_ep3_sub".to_string(),
        };
        assert_eq!(err.to_string(), "Download failed: frieren_ep3_sub.mp4");
    }
}

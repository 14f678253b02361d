use crate::domain::Qe2MaceError;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, thiserror::Error)]
pub enum ReportWriteError {
    #[error("failed to create report directory '{}': {source}", path.display())]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize report '{}': {source}", path.display())]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to write report '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<ReportWriteError> for Qe2MaceError {
    fn from(error: ReportWriteError) -> Self {
        let message = error.to_string();
        match error {
            ReportWriteError::Serialize { .. } => {
                Qe2MaceError::internal("RUN.REPORT_SERIALIZE", message)
            }
            ReportWriteError::Directory { .. } | ReportWriteError::Write { .. } => {
                Qe2MaceError::io_system("IO.REPORT_WRITE", message)
            }
        }
    }
}

/// Writes `report` as pretty-printed JSON, creating parent directories.
pub fn write_json_report<T: Serialize>(path: &Path, report: &T) -> Result<(), ReportWriteError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ReportWriteError::Directory {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let json = serde_json::to_string_pretty(report).map_err(|source| {
        ReportWriteError::Serialize {
            path: path.to_path_buf(),
            source,
        }
    })?;
    fs::write(path, json).map_err(|source| ReportWriteError::Write {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn current_unix_timestamp_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}

pub(crate) fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

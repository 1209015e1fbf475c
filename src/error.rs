use std::error::Error;
use std::fmt;
use std::io;

#[derive(Debug)]
pub enum MetricsError {
    Git(git2::Error),
    Io(io::Error),
    Csv(csv::Error),
    Json(serde_json::Error),
    Plot(String),
    Command(String),
    Validation(String),
    StatsUnavailable(String),
}

impl fmt::Display for MetricsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricsError::Git(e) => write!(f, "Git error: {}", e),
            MetricsError::Io(e) => write!(f, "IO error: {}", e),
            MetricsError::Csv(e) => write!(f, "CSV error: {}", e),
            MetricsError::Json(e) => write!(f, "JSON error: {}", e),
            MetricsError::Plot(e) => write!(f, "Plot error: {}", e),
            MetricsError::Command(e) => write!(f, "Command error: {}", e),
            MetricsError::Validation(e) => write!(f, "Validation error: {}", e),
            MetricsError::StatsUnavailable(e) => {
                write!(f, "'scc' command not found or failed: {}", e)
            }
        }
    }
}

impl Error for MetricsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MetricsError::Git(e) => Some(e),
            MetricsError::Io(e) => Some(e),
            MetricsError::Csv(e) => Some(e),
            MetricsError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<git2::Error> for MetricsError {
    fn from(e: git2::Error) -> Self {
        MetricsError::Git(e)
    }
}

impl From<io::Error> for MetricsError {
    fn from(e: io::Error) -> Self {
        MetricsError::Io(e)
    }
}

impl From<csv::Error> for MetricsError {
    fn from(e: csv::Error) -> Self {
        MetricsError::Csv(e)
    }
}

impl From<serde_json::Error> for MetricsError {
    fn from(e: serde_json::Error) -> Self {
        MetricsError::Json(e)
    }
}

pub type Result<T> = std::result::Result<T, MetricsError>;

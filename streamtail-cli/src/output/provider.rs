use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use streamtail_engine::BoxSink;
use tokio::io::BufWriter;
use tracing::info;

use crate::error::AppError;

/// Where the stream bytes go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Write to stdout, usually piped into a player
    Stdout,
    /// Write to a file, truncating it first
    File(PathBuf),
}

impl FromStr for OutputTarget {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err(AppError::InvalidInput("Output path is empty".to_string())),
            "-" => Ok(OutputTarget::Stdout),
            path => Ok(OutputTarget::File(PathBuf::from(path))),
        }
    }
}

impl fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputTarget::Stdout => write!(f, "stdout"),
            OutputTarget::File(path) => write!(f, "{}", path.display()),
        }
    }
}

impl OutputTarget {
    pub fn is_stdout(&self) -> bool {
        matches!(self, OutputTarget::Stdout)
    }

    /// Open the target as a buffered sink for the session.
    pub async fn open_sink(&self) -> Result<BoxSink, AppError> {
        let sink: BoxSink = match self {
            OutputTarget::Stdout => Box::new(BufWriter::new(tokio::io::stdout())),
            OutputTarget::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent).await?;
                }
                let file = tokio::fs::File::create(path).await?;
                Box::new(BufWriter::new(file))
            }
        };
        info!(output = %self, "Output opened");
        Ok(sink)
    }
}

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crate::init::job::JobError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("D-Bus error: {0}")]
    Dbus(#[from] zbus::Error),

    /// The whole operation, connection included, ran past its deadline.
    #[error("init daemon did not answer within {0:?}")]
    Deadline(Duration),

    #[error("job for {unit} did not complete: {source}")]
    Job {
        unit: String,
        #[source]
        source: JobError,
    },

    #[error("job for {unit} was dropped before reporting a result")]
    JobAbandoned { unit: String },

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} failed with exit code {code:?}{}", fmt_stderr(.stderr))]
    Exit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("invalid service pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] io::Error),

    #[error("invalid config {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config {}: {reason}", path.display())]
    ConfigValue { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

fn fmt_stderr(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {}", stderr)
    }
}

impl Error {
    /// Returns the job failure if this error came from a job outcome.
    pub fn job_error(&self) -> Option<&JobError> {
        match self {
            Error::Job { source, .. } => Some(source),
            _ => None,
        }
    }
}

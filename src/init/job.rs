//! Job results reported by systemd and the wait for them.
//!
//! Mutating manager calls (`StartUnit`, `StopUnit`) only queue a job. The
//! daemon reports the job's result once, as a short string, when the job is
//! removed from its queue. [`Job`] carries that result over a single-use
//! channel and [`JobOutcome`] turns it into success or a [`JobError`].

use once_cell::sync::Lazy;
use std::collections::HashMap;
use tokio::sync::oneshot;

use crate::{Error, Result};

/// Result of a finished job, as named by systemd.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Done,
    Canceled,
    Timeout,
    Failed,
    Dependency,
    Skipped,
    /// A result string this crate does not know about.
    Other(String),
}

static OUTCOMES: Lazy<HashMap<&'static str, JobOutcome>> = Lazy::new(|| {
    HashMap::from([
        ("done", JobOutcome::Done),
        ("canceled", JobOutcome::Canceled),
        ("timeout", JobOutcome::Timeout),
        ("failed", JobOutcome::Failed),
        ("dependency", JobOutcome::Dependency),
        ("skipped", JobOutcome::Skipped),
    ])
});

impl JobOutcome {
    pub fn parse(result: &str) -> Self {
        OUTCOMES
            .get(result)
            .cloned()
            .unwrap_or_else(|| Self::Other(result.to_string()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Done => "done",
            Self::Canceled => "canceled",
            Self::Timeout => "timeout",
            Self::Failed => "failed",
            Self::Dependency => "dependency",
            Self::Skipped => "skipped",
            Self::Other(result) => result,
        }
    }

    pub fn into_result(self) -> Result<(), JobError> {
        match self {
            Self::Done => Ok(()),
            Self::Canceled => Err(JobError::Canceled),
            Self::Timeout => Err(JobError::Timeout),
            Self::Failed => Err(JobError::Failed),
            Self::Dependency => Err(JobError::Dependency),
            Self::Skipped => Err(JobError::Skipped),
            Self::Other(result) => Err(JobError::Unknown(result)),
        }
    }
}

/// Why a job did not finish with `done`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error("job has been canceled before it finished execution")]
    Canceled,

    /// Reported by the daemon; unrelated to [`Error::Deadline`].
    #[error("job timeout was reached")]
    Timeout,

    #[error("job failed")]
    Failed,

    #[error("another job this job has been depending on failed and the job hence has been removed too")]
    Dependency,

    #[error("job was skipped because it didn't apply to the units current state")]
    Skipped,

    #[error("unknown error (job result {0:?})")]
    Unknown(String),
}

/// A queued job whose result has not been received yet.
#[derive(Debug)]
pub struct Job {
    unit: String,
    path: String,
    result: oneshot::Receiver<String>,
}

impl Job {
    /// Create a job handle and the sender the daemon side fulfils.
    pub fn channel(unit: &str, path: &str) -> (oneshot::Sender<String>, Self) {
        let (tx, rx) = oneshot::channel();
        let job = Self {
            unit: unit.to_string(),
            path: path.to_string(),
            result: rx,
        };
        (tx, job)
    }

    /// Block until the job result arrives and resolve it.
    pub async fn wait(self) -> Result<()> {
        let result = self.result.await.map_err(|_| Error::JobAbandoned {
            unit: self.unit.clone(),
        })?;

        tracing::debug!("Job {} for {} finished: {}", self.path, self.unit, result);

        JobOutcome::parse(&result)
            .into_result()
            .map_err(|source| Error::Job {
                unit: self.unit,
                source,
            })
    }
}

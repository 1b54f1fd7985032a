use std::time::Duration;

use thiserror::Error;

use crate::store::{FailureKind, FetchFailure};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("timeout: no response within {:.1}s", .0.as_secs_f64())]
    Timeout(Duration),
    #[error("transport: {0}")]
    Transport(String),
    #[error("http status: {status} {reason}")]
    HttpStatus { status: u16, reason: String },
    #[error("malformed feed: {0}")]
    Malformed(String),
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Timeout(_) => FailureKind::Timeout,
            FetchError::Transport(_) => FailureKind::Transport,
            FetchError::HttpStatus { .. } => FailureKind::HttpStatus,
            FetchError::Malformed(_) => FailureKind::Malformed,
        }
    }

    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            return FetchError::Timeout(timeout);
        }
        FetchError::Transport(error_chain(&err))
    }

    pub fn into_failure(self) -> FetchFailure {
        FetchFailure { kind: self.kind(), message: self.to_string() }
    }
}

// reqwest hides the useful part (dns, refused, tls) in the source chain
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut cur = err.source();
    while let Some(e) = cur {
        let s = e.to_string();
        if !parts.iter().any(|p| p.contains(&s)) { parts.push(s); }
        cur = e.source();
    }
    parts.join(": ")
}

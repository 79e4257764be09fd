//! Run outcome and the event-reporting interface

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

use crate::error::DriverError;

/// Pass/fail result of one run, the only data handed upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub success: bool,
    pub detail: String,
}

impl Outcome {
    pub fn passed(what: &str) -> Self {
        Self {
            success: true,
            detail: format!("OK: {} succeeded", what),
        }
    }

    pub fn failed(what: &str, error: &dyn fmt::Display) -> Self {
        Self {
            success: false,
            detail: format!("ERROR: {} failed: {}", what, error),
        }
    }

    pub fn from_result<T>(what: &str, result: &Result<T, DriverError>) -> Self {
        match result {
            Ok(_) => Self::passed(what),
            Err(e) => Self::failed(what, e),
        }
    }
}

/// Receives the outcome of a run, e.g. a monitoring system's passive check.
#[async_trait]
pub trait EventReporter: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// File `outcome` under `service`. Returns the receiver's reply, if any.
    async fn report(&self, service: &str, outcome: &Outcome) -> Result<Option<String>, Self::Error>;
}

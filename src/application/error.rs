use std::error::Error as StdError;
use std::iter;

use axum::{http::StatusCode, response::Response};
use thiserror::Error;

use crate::{config::LoadError, infra::error::InfraError};

/// Diagnostic carried in response extensions for the response logger.
///
/// Clients only ever see the public error body; the cause chain stays here.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub origin: &'static str,
    pub status: StatusCode,
    pub chain: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(
        origin: &'static str,
        status: StatusCode,
        error: &(dyn StdError + 'static),
    ) -> Self {
        let chain = iter::successors(Some(error), |&err| err.source())
            .map(ToString::to_string)
            .collect();
        Self {
            origin,
            status,
            chain,
        }
    }

    pub fn from_message(
        origin: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            origin,
            status,
            chain: vec![message.into()],
        }
    }

    /// Outermost message of the chain.
    pub fn summary(&self) -> &str {
        self.chain
            .first()
            .map(String::as_str)
            .unwrap_or("no diagnostic available")
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Failures that end the process, reported once by `main`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("cache write failed")]
    struct WriteFailed(#[source] Refused);

    #[derive(Debug, Error)]
    #[error("connection refused")]
    struct Refused;

    #[test]
    fn report_walks_the_source_chain() {
        let report =
            ErrorReport::from_error("test", StatusCode::SERVICE_UNAVAILABLE, &WriteFailed(Refused));
        assert_eq!(report.chain, ["cache write failed", "connection refused"]);
        assert_eq!(report.summary(), "cache write failed");
    }

    #[test]
    fn empty_report_has_a_placeholder_summary() {
        let mut report = ErrorReport::from_message("test", StatusCode::BAD_REQUEST, "x");
        report.chain.clear();
        assert_eq!(report.summary(), "no diagnostic available");
    }
}

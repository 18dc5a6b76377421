// src/services/renderer.rs

//! Rendered-page fetching.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::AppError;

/// Why a page could not be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderCause {
    /// The readiness landmark did not appear in time
    Timeout(Duration),
    /// The browser failed to launch, navigate or report content
    Browser(String),
}

impl fmt::Display for RenderCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout(limit) => write!(f, "not ready after {}s", limit.as_secs()),
            Self::Browser(message) => write!(f, "{message}"),
        }
    }
}

/// A page that could not be rendered, with the URL that was requested.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to render {url}: {cause}")]
pub struct RenderFailure {
    pub url: String,
    pub cause: RenderCause,
}

impl RenderFailure {
    pub fn timeout(url: impl Into<String>, limit: Duration) -> Self {
        Self {
            url: url.into(),
            cause: RenderCause::Timeout(limit),
        }
    }

    pub fn browser(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self {
            url: url.into(),
            cause: RenderCause::Browser(message.to_string()),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.cause, RenderCause::Timeout(_))
    }
}

impl From<RenderFailure> for AppError {
    fn from(failure: RenderFailure) -> Self {
        AppError::render(failure.url, failure.cause)
    }
}

/// Produces fully rendered markup for pages that need client-side scripts.
///
/// Implementations must be safe to call concurrently; each call is
/// independent of every other call.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Render `url` and return the document markup once it is ready.
    async fn render(&self, url: &str) -> std::result::Result<String, RenderFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_message_keeps_url() {
        let failure = RenderFailure::timeout("https://example.com/p/1", Duration::from_secs(20));
        assert!(failure.is_timeout());
        assert_eq!(
            failure.to_string(),
            "failed to render https://example.com/p/1: not ready after 20s"
        );

        let err = AppError::from(RenderFailure::browser("https://example.com", "crashed"));
        assert!(matches!(err, AppError::Render { ref url, .. } if url == "https://example.com"));
    }
}

//! Error taxonomy for the search pipeline.
//!
//! Only [`SearchError`] ever reaches a caller. [`ExternalCallError`] describes
//! why a best-effort collaborator (enhancer, ranker, or a single provider)
//! contributed nothing; the aggregator logs it and degrades.

use std::time::Duration;
use thiserror::Error;

/// User-visible search failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// Empty, oversized, or otherwise malformed input. Correctable by the caller.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The caller exceeded a rate-limit window.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimitExceeded { retry_after_secs: u64 },
}

/// Failure of a single guarded call to an external collaborator.
#[derive(Debug, Error)]
pub enum ExternalCallError {
    #[error("{collaborator} timed out after {}ms", .after.as_millis())]
    Timeout {
        collaborator: String,
        after: Duration,
    },

    #[error("{collaborator} failed: {source}")]
    Failure {
        collaborator: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ExternalCallError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExternalCallError::Timeout { .. })
    }
}

/// Run `fut` under `limit`, mapping both elapsed deadlines and inner errors
/// into [`ExternalCallError`]. The future is dropped on timeout.
pub async fn guarded<T, F>(
    collaborator: &str,
    limit: Duration,
    fut: F,
) -> Result<T, ExternalCallError>
where
    F: std::future::Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(ExternalCallError::Failure {
            collaborator: collaborator.to_string(),
            source,
        }),
        Err(_) => Err(ExternalCallError::Timeout {
            collaborator: collaborator.to_string(),
            after: limit,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_guarded_passes_value_through() {
        let out = guarded("enhancer", Duration::from_millis(100), async { Ok(7) }).await;
        assert_eq!(out.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_guarded_maps_failure() {
        let out: Result<(), _> = guarded("ranker", Duration::from_millis(100), async {
            Err(anyhow::anyhow!("bad gateway"))
        })
        .await;
        let err = out.unwrap_err();
        assert!(!err.is_timeout());
        assert!(err.to_string().contains("ranker failed: bad gateway"));
    }

    #[tokio::test]
    async fn test_guarded_maps_timeout() {
        let out: Result<(), _> = guarded("provider:edx", Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;
        let err = out.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "provider:edx timed out after 50ms");
    }

    #[test]
    fn test_rate_limit_message() {
        let err = SearchError::RateLimitExceeded {
            retry_after_secs: 60,
        };
        assert_eq!(err.to_string(), "rate limit exceeded, retry after 60s");
    }
}

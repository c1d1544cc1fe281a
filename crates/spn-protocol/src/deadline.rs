//! Bounded collaborator calls.

use std::future::Future;
use std::time::Duration;

use spn_core::SpError;

/// Run `fut` for at most `limit`. Running out of time is
/// [`SpError::Timeout`] naming `operation`; dropping the returned future
/// cancels `fut`.
pub async fn bounded<T, F>(operation: &str, limit: Duration, fut: F) -> Result<T, SpError>
where
    F: Future<Output = Result<T, SpError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(operation, limit_ms = limit.as_millis() as u64, "collaborator call timed out");
            Err(SpError::Timeout {
                operation: operation.to_string(),
                millis: limit.as_millis() as u64,
            })
        }
    }
}

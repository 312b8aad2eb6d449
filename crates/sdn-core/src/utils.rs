/*!
 * Async helpers shared by the bridge crates.
 */
use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;
use tracing::Instrument;

use crate::error::{Error, Result};
use crate::logging::component_span;

/// Run a future with a timeout
///
/// # Arguments
///
/// * `duration` - The timeout duration
/// * `what` - Short description used in the timeout error
/// * `future` - The future to run
pub async fn with_timeout<F, T, E>(duration: Duration, what: &str, future: F) -> Result<std::result::Result<T, E>>
where
    F: Future<Output = std::result::Result<T, E>>,
{
    timeout(duration, future)
        .await
        .map_err(|_| Error::timeout(format!("{} timed out after {:?}", what, duration)))
}

/// Spawn a long-running component task inside its own tracing span
///
/// # Arguments
///
/// * `name` - Component name, e.g. "reader"
/// * `id` - Instance identifier, e.g. the port the component drives
/// * `fut` - The future to run
pub fn spawn_component<F>(name: &str, id: &str, fut: F) -> tokio::task::JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(fut.instrument(component_span(name, Some(id))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_success() -> Result<()> {
        let result = with_timeout(Duration::from_secs(1), "answer", async { Ok::<_, Error>(42) }).await?;
        assert_eq!(result?, 42);
        Ok(())
    }

    #[tokio::test]
    async fn test_with_timeout_failure() {
        let result = with_timeout(Duration::from_millis(10), "connect", async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<_, Error>(42)
        })
        .await;
        match result {
            Err(Error::Timeout(msg)) => assert!(msg.starts_with("connect timed out")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_spawn_component() {
        let handle = spawn_component("test", "unit", async { 7 });
        assert_eq!(handle.await.ok(), Some(7));
    }
}

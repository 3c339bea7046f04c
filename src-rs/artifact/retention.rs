//! Periodic removal of old generated diagrams.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::store::ArtifactStore;

/// Deletes generated diagrams older than `max_age` every `interval` until
/// `cancel` fires. The fallback diagram is never touched.
pub async fn run(
    store: Arc<ArtifactStore>,
    max_age: Duration,
    interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        max_age_secs = max_age.as_secs(),
        interval_secs = interval.as_secs(),
        "diagram retention job started"
    );

    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("diagram retention job stopping");
                break;
            }
            _ = ticker.tick() => {
                match store.purge_older_than(max_age).await {
                    Ok(0) => tracing::debug!("diagram retention: nothing to purge"),
                    Ok(removed) => tracing::info!(removed, "diagram retention: purged old diagrams"),
                    Err(err) => tracing::error!(error = %err, "diagram retention: sweep failed"),
                }
            }
        }
    }
}

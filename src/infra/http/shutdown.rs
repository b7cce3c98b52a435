//! Graceful shutdown sequencing for the HTTP server.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How long the server may take to close once in-flight requests were told
/// to abandon their work.
const ABANDON_WAIT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drain {
    /// The server stopped on its own, before or within the grace period.
    Completed,
    /// The grace period ran out and in-flight requests were canceled.
    Abandoned,
}

/// Drives `server` until it stops.
///
/// `requested` fires when shutdown begins; in-flight requests keep running
/// for up to `grace` after that. Only when the grace period expires is
/// `requests` canceled, which makes handlers bail out with a canceled
/// response.
pub async fn run_until_drained<F, E>(
    server: F,
    requested: &CancellationToken,
    requests: &CancellationToken,
    grace: Duration,
) -> Result<Drain, E>
where
    F: Future<Output = Result<(), E>>,
{
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => return result.map(|()| Drain::Completed),
        _ = async {
            requested.cancelled().await;
            tokio::time::sleep(grace).await;
        } => {}
    }

    warn!(
        grace_secs = grace.as_secs(),
        "Graceful shutdown timed out, canceling in-flight requests"
    );
    requests.cancel();

    match tokio::time::timeout(ABANDON_WAIT, &mut server).await {
        Ok(result) => result.map(|()| Drain::Abandoned),
        Err(_) => {
            info!("Server still busy after cancellation, exiting anyway");
            Ok(Drain::Abandoned)
        }
    }
}

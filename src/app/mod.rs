//! Node orchestration: wiring, lifecycle, and ordered shutdown.

pub mod deduplicator;
pub mod gatherer;

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

/// Total time allowed for the drain-and-close sequence.
pub(crate) const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(30);

/// Await every task against a shared deadline; stragglers are abandoned and
/// logged rather than blocking exit.
pub(crate) async fn join_with_deadline(handles: Vec<JoinHandle<()>>, deadline: Duration) {
    let cutoff = Instant::now() + deadline;
    let mut abandoned = 0usize;

    for handle in handles {
        let remaining = cutoff.saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.is_panic() => {
                warn!(error = %e, "Task panicked during shutdown");
            }
            Ok(Err(_)) => {}
            Err(_) => {
                abandoned += 1;
            }
        }
    }

    if abandoned > 0 {
        warn!(abandoned, "Tasks exceeded the shutdown deadline");
    } else {
        info!("All tasks stopped cleanly");
    }
}

// Cancels the pipeline on Ctrl+C. Listing stops and page workers take no new
// pages; in-flight objects finish.

use s3thaw_rs::PipelineCancellationToken;
use tokio::task::JoinHandle;
use tokio::{select, signal};
use tracing::{debug, warn};

pub fn spawn_ctrl_c_handler(cancellation_token: PipelineCancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        select! {
            _ = cancellation_token.cancelled() => {
                debug!("cancellation_token canceled.")
            }
            _ = signal::ctrl_c() => {
                warn!("ctrl-c received, stopping the run.");
                cancellation_token.cancel();
            }
        }
    })
}

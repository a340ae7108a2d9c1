// Uses tokio::select! to wait for either pipeline cancellation or Ctrl+C signal.
//
// An interrupt ends the process at once with exit code 0, after one last
// progress line. Deletes still in flight are not awaited.

use azrm_rs::{PipelineCancellationToken, ProgressReporter};
use tokio::task::JoinHandle;
use tokio::{select, signal};
use tracing::{debug, warn};

pub fn spawn_ctrl_c_handler(
    cancellation_token: PipelineCancellationToken,
    progress_reporter: ProgressReporter,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        select! {
            _ = cancellation_token.cancelled() => {
                debug!("cancellation_token canceled.")
            }
            _ = signal::ctrl_c() => {
                cancellation_token.cancel();
                warn!("user terminated the execution.");
                progress_reporter.report();
                std::process::exit(0);
            }
        }
    })
}

//! Delete worker slots for the azrm-rs pipeline.
//!
//! The pipeline spawns `concurrency` `ObjectDeleter`s per cycle. Each one
//! pops names from the shared buffer and deletes them one at a time until the
//! buffer is exhausted (empty and listing finished) or the run is cancelled.

use std::time::Duration;

use anyhow::Result;
use tracing::{debug, error, info, trace, warn};

use crate::buffer::PopResult;
use crate::stage::Stage;
use crate::types::OnErrorPolicy;
use crate::types::error::AzrmError;


/// One worker slot.
pub struct ObjectDeleter {
    slot_index: u16,
    base: Stage,
}

impl ObjectDeleter {
    pub fn new(base: Stage, slot_index: u16) -> Self {
        Self { slot_index, base }
    }

    /// Drain the buffer.
    ///
    /// Returns an error only when a delete fails under the halt policy; in
    /// that case the shared cancellation token has already been cancelled
    /// so that the other slots stop before taking another name.
    pub async fn delete(&self) -> Result<()> {
        debug!(slot_index = self.slot_index, "delete worker started.");

        let idle_wait = Duration::from_millis(self.base.config.worker_idle_wait_milliseconds);
        loop {
            if self.base.is_cancelled() {
                info!(
                    slot_index = self.slot_index,
                    "delete worker has been cancelled."
                );
                return Ok(());
            }

            match self.base.buffer.pop() {
                PopResult::Name(name) => self.delete_object(&name).await?,
                PopResult::Empty => {
                    trace!(
                        slot_index = self.slot_index,
                        "waiting on buffer to refill..."
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(idle_wait) => {}
                        _ = self.base.cancellation_token.cancelled() => {}
                    }
                }
                PopResult::Exhausted => {
                    debug!(
                        slot_index = self.slot_index,
                        "delete worker has been completed."
                    );
                    return Ok(());
                }
            }
        }
    }

    async fn delete_object(&self, name: &str) -> Result<()> {
        let result = tokio::select! {
            result = self.base.target.delete_object(name) => result,
            _ = self.base.cancellation_token.cancelled() => {
                debug!(slot_index = self.slot_index, name = name, "delete abandoned.");
                return Ok(());
            }
        };

        let Err(e) = result else {
            self.base.stats.increment_deleted();
            trace!(slot_index = self.slot_index, name = name, "blob deleted.");
            return Ok(());
        };

        let status = e.downcast_ref::<AzrmError>().and_then(AzrmError::status);
        match self.base.config.on_error {
            OnErrorPolicy::Continue => {
                self.base.stats.increment_failed();
                warn!(
                    slot_index = self.slot_index,
                    name = name,
                    status = status,
                    error = format!("{e:#}"),
                    "There was an error deleting \"{}\", but we will continue.",
                    name
                );
                Ok(())
            }
            OnErrorPolicy::Halt => {
                error!(
                    slot_index = self.slot_index,
                    name = name,
                    status = status,
                    "There was an error deleting \"{}\": {:#}",
                    name,
                    e
                );
                self.base.cancellation_token.cancel();
                Err(e)
            }
        }
    }
}

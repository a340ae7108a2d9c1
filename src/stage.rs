use std::sync::Arc;

use crate::buffer::DeleteBuffer;
use crate::config::Config;
use crate::storage::Storage;
use crate::types::RunStatistics;
use crate::types::token::PipelineCancellationToken;

/// Shared context handed to the lister and to every delete worker.
///
/// There are no channels between stages: the lister fills `buffer` and the
/// workers drain it. `stats` belongs to the current retry cycle and is reset
/// by the pipeline between cycles.
#[derive(Clone)]
pub struct Stage {
    pub config: Config,
    pub target: Storage,
    pub buffer: Arc<DeleteBuffer>,
    pub stats: Arc<RunStatistics>,
    pub cancellation_token: PipelineCancellationToken,
}

impl Stage {
    pub fn new(
        config: Config,
        target: Storage,
        buffer: Arc<DeleteBuffer>,
        stats: Arc<RunStatistics>,
        cancellation_token: PipelineCancellationToken,
    ) -> Self {
        Self {
            config,
            target,
            buffer,
            stats,
            cancellation_token,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}

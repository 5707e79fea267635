//! Step contract executed by the engine.

use super::context::ProcessContext;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Why a step did not finish.
#[derive(Error, Debug)]
pub enum StepError {
    /// A stage exceeded its time budget. The step raises its alarm before
    /// returning this.
    #[error("{stage} timed out after {}s", limit.as_secs())]
    Timeout { stage: String, limit: Duration },

    /// The step observed its cancellation token. Not an error condition.
    #[error("Step cancelled")]
    Cancelled,

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl StepError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StepError::Cancelled)
    }
}

/// One unit of work in a process tree.
///
/// Steps are shared between engine runs, so all per-run state lives in the
/// context rather than in the step value.
#[async_trait]
pub trait ProcessStep<C: ProcessContext>: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Eligibility gate, checked independently of the completion flag.
    fn can_execute(&self, _ctx: &C) -> bool {
        true
    }

    /// Run the step to completion.
    ///
    /// Implementations must check `cancel` in every wait and return
    /// [`StepError::Cancelled`] promptly once it fires.
    async fn execute(&self, ctx: &C, cancel: &CancellationToken) -> Result<(), StepError>;
}

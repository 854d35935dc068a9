use async_trait::async_trait;
use weatherman_core::run_match::WorkflowRun;
use weatherman_core::run_request::WorkflowInputs;

use crate::api::ActionsError;

/// Remote automation service that runs the forecast workflow.
///
/// Each method performs exactly one outbound request and never retries.
#[async_trait]
pub trait WorkflowProvider: Send + Sync {
    /// Trigger one run of the forecast workflow in `repo`.
    async fn dispatch_workflow(
        &self,
        repo: &str,
        inputs: &WorkflowInputs,
    ) -> Result<(), ActionsError>;

    /// Most recent workflow runs in `repo`, newest first.
    async fn list_recent_runs(&self, repo: &str) -> Result<Vec<WorkflowRun>, ActionsError>;
}

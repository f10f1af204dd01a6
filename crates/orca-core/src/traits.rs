use futures::future::BoxFuture;

use crate::error::Result;
use crate::graph::GraphDocument;
use crate::types::*;

/// The engine's HTTP surface, one method per route.
///
/// Every call is a pure read except [`execute`](Backend::execute). Callers
/// decide what to do with results that arrive after the navigation state has
/// moved on.
pub trait Backend: Send + Sync + 'static {
    /// Names of all workflow definitions.
    fn list_workflows(&self) -> BoxFuture<'_, Result<Vec<WorkflowSummary>>>;

    /// Ask the engine to start a run. Does not wait for it to finish.
    fn execute(&self, workflow: &str) -> BoxFuture<'_, Result<ExecuteAck>>;

    /// Task/dependency document of a workflow.
    fn fetch_graph(&self, workflow: &str) -> BoxFuture<'_, Result<GraphDocument>>;

    /// Past runs of a workflow, oldest first.
    fn fetch_runs(&self, workflow: &str) -> BoxFuture<'_, Result<Vec<RunSummary>>>;

    /// Task-level log artifacts of one run.
    fn fetch_task_logs(
        &self,
        workflow: &str,
        run: &str,
    ) -> BoxFuture<'_, Result<Vec<TaskLogSummary>>>;

    /// Content of one artifact.
    fn fetch_log(
        &self,
        workflow: &str,
        run: &str,
        artifact: &str,
    ) -> BoxFuture<'_, Result<LogContent>>;
}

//! In-memory engine double and fixtures for exercising the navigation
//! controller without a network.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Duration, NaiveDate};
use futures::future::BoxFuture;
use tokio::sync::Semaphore;

use orca_core::error::{OrcaError, Result};
use orca_core::graph::GraphDocument;
use orca_core::traits::Backend;
use orca_core::types::*;

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListWorkflows,
    Execute(String),
    Graph(String),
    Runs(String),
    TaskLogs(String, String),
    Log(String, String, String),
}

impl Call {
    /// Key used for holds and scripted failures, e.g. `runs:orders`.
    pub fn key(&self) -> String {
        match self {
            Call::ListWorkflows => "workflows".to_string(),
            Call::Execute(w) => format!("execute:{}", w),
            Call::Graph(w) => format!("graph:{}", w),
            Call::Runs(w) => format!("runs:{}", w),
            Call::TaskLogs(w, r) => format!("tasks:{}@{}", w, r),
            Call::Log(w, r, a) => format!("log:{}@{}@{}", w, r, a),
        }
    }
}

#[derive(Default)]
struct Script {
    workflows: Vec<String>,
    graphs: HashMap<String, GraphDocument>,
    runs: HashMap<String, Vec<String>>,
    task_logs: HashMap<(String, String), Vec<String>>,
    logs: HashMap<(String, String, String), String>,
    failures: HashMap<String, String>,
}

/// A [`Backend`] answering from a script, recording every call.
///
/// A call can be held back with [`hold`](Self::hold) until
/// [`release`](Self::release), which lets tests decide the order in which
/// concurrent fetches resolve.
#[derive(Default)]
pub struct ScriptedBackend {
    script: Mutex<Script>,
    holds: Mutex<HashMap<String, Arc<Semaphore>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workflows<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.script.lock().unwrap().workflows = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_graph(self, workflow: &str, doc: GraphDocument) -> Self {
        self.script
            .lock()
            .unwrap()
            .graphs
            .insert(workflow.to_string(), doc);
        self
    }

    pub fn with_runs<I, S>(self, workflow: &str, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_runs(workflow, labels);
        self
    }

    pub fn with_task_logs<I, S>(self, workflow: &str, run: &str, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.script.lock().unwrap().task_logs.insert(
            (workflow.to_string(), run.to_string()),
            labels.into_iter().map(Into::into).collect(),
        );
        self
    }

    pub fn with_log(self, workflow: &str, run: &str, artifact: &str, text: &str) -> Self {
        self.script.lock().unwrap().logs.insert(
            (workflow.to_string(), run.to_string(), artifact.to_string()),
            text.to_string(),
        );
        self
    }

    /// Replace the run list of a workflow.
    pub fn set_runs<I, S>(&self, workflow: &str, labels: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.script.lock().unwrap().runs.insert(
            workflow.to_string(),
            labels.into_iter().map(Into::into).collect(),
        );
    }

    /// Make calls with this key fail with a transport error.
    pub fn fail(&self, key: &str, message: &str) {
        self.script
            .lock()
            .unwrap()
            .failures
            .insert(key.to_string(), message.to_string());
    }

    /// Stop failing calls with this key.
    pub fn heal(&self, key: &str) {
        self.script.lock().unwrap().failures.remove(key);
    }

    /// Hold calls with this key until released.
    pub fn hold(&self, key: &str) {
        self.holds
            .lock()
            .unwrap()
            .insert(key.to_string(), Arc::new(Semaphore::new(0)));
    }

    /// Let one held call with this key proceed.
    pub fn release(&self, key: &str) {
        if let Some(sem) = self.holds.lock().unwrap().get(key) {
            sem.add_permits(1);
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    async fn enter(&self, call: Call) -> Result<()> {
        let key = call.key();
        self.calls.lock().unwrap().push(call);

        let hold = self.holds.lock().unwrap().get(&key).cloned();
        if let Some(sem) = hold {
            let permit = sem
                .acquire()
                .await
                .map_err(|e| OrcaError::Transport(e.to_string()))?;
            permit.forget();
        }

        match self.script.lock().unwrap().failures.get(&key) {
            Some(message) => Err(OrcaError::Transport(message.clone())),
            None => Ok(()),
        }
    }
}

fn not_found(what: String) -> OrcaError {
    OrcaError::Http {
        status: 404,
        body: format!("{} not found", what),
    }
}

impl Backend for ScriptedBackend {
    fn list_workflows(&self) -> BoxFuture<'_, Result<Vec<WorkflowSummary>>> {
        Box::pin(async move {
            self.enter(Call::ListWorkflows).await?;
            let script = self.script.lock().unwrap();
            Ok(script
                .workflows
                .iter()
                .map(|n| WorkflowSummary::new(n.clone()))
                .collect())
        })
    }

    fn execute(&self, workflow: &str) -> BoxFuture<'_, Result<ExecuteAck>> {
        let workflow = workflow.to_string();
        Box::pin(async move {
            self.enter(Call::Execute(workflow.clone())).await?;
            let message = format!("DAG dags/{}.orca execution started", workflow);
            Ok(ExecuteAck {
                raw: serde_json::json!({ "message": message }),
                message: Some(message),
            })
        })
    }

    fn fetch_graph(&self, workflow: &str) -> BoxFuture<'_, Result<GraphDocument>> {
        let workflow = workflow.to_string();
        Box::pin(async move {
            self.enter(Call::Graph(workflow.clone())).await?;
            let script = self.script.lock().unwrap();
            script
                .graphs
                .get(&workflow)
                .cloned()
                .ok_or_else(|| not_found(format!("graph {}", workflow)))
        })
    }

    fn fetch_runs(&self, workflow: &str) -> BoxFuture<'_, Result<Vec<RunSummary>>> {
        let workflow = workflow.to_string();
        Box::pin(async move {
            self.enter(Call::Runs(workflow.clone())).await?;
            let script = self.script.lock().unwrap();
            Ok(script
                .runs
                .get(&workflow)
                .map(|labels| labels.iter().map(|l| RunSummary::new(l.clone())).collect())
                .unwrap_or_default())
        })
    }

    fn fetch_task_logs(
        &self,
        workflow: &str,
        run: &str,
    ) -> BoxFuture<'_, Result<Vec<TaskLogSummary>>> {
        let key = (workflow.to_string(), run.to_string());
        Box::pin(async move {
            self.enter(Call::TaskLogs(key.0.clone(), key.1.clone())).await?;
            let script = self.script.lock().unwrap();
            Ok(script
                .task_logs
                .get(&key)
                .map(|labels| labels.iter().map(|l| TaskLogSummary::new(l.clone())).collect())
                .unwrap_or_default())
        })
    }

    fn fetch_log(
        &self,
        workflow: &str,
        run: &str,
        artifact: &str,
    ) -> BoxFuture<'_, Result<LogContent>> {
        let key = (workflow.to_string(), run.to_string(), artifact.to_string());
        Box::pin(async move {
            self.enter(Call::Log(key.0.clone(), key.1.clone(), key.2.clone()))
                .await?;
            let script = self.script.lock().unwrap();
            script
                .logs
                .get(&key)
                .map(|text| LogContent { text: text.clone() })
                .ok_or_else(|| not_found(format!("log {}/{}/{}", key.0, key.1, key.2)))
        })
    }
}

/// `n` run labels in the engine's naming, oldest first, one hour apart.
pub fn run_labels(n: usize) -> Vec<String> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("valid fixture date");
    (1..=n)
        .map(|i| {
            (start + Duration::hours(i as i64))
                .format("%Y-%m-%d_%H-%M-%S")
                .to_string()
        })
        .collect()
}

/// Two tasks, `A -> B`.
pub fn two_task_graph() -> GraphDocument {
    GraphDocument::new()
        .with_task("A", "first")
        .with_task("B", "second")
        .with_edge("A", "B")
}

/// Engine double preloaded with one workflow, `orders`, one run and two
/// artifacts.
pub fn orders_backend() -> ScriptedBackend {
    ScriptedBackend::new()
        .with_workflows(["orders.orca", "billing.orca"])
        .with_graph("orders", two_task_graph())
        .with_graph("billing", GraphDocument::new().with_task("charge", ""))
        .with_runs("orders", ["2024-01-01T09-00-00", "2024-01-02T10-00-00"])
        .with_task_logs("orders", "2024-01-02T10-00-00", ["A.log", "B.log"])
        .with_log("orders", "2024-01-02T10-00-00", "A.log", "A ran\n")
        .with_log("orders", "2024-01-02T10-00-00", "B.log", "B ran\n")
}

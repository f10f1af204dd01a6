use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use orca_core::config::{BackendConfig, ListRoute};
use orca_core::error::{OrcaError, Result};
use orca_core::graph::GraphDocument;
use orca_core::traits::Backend;
use orca_core::types::*;

use crate::schema::*;

const EXECUTE_ROUTE: &str = "/execute";
const GRAPH_ROUTE: &str = "/graph";
const RUNS_ROUTE: &str = "/executionLogs";
const TASK_LOGS_ROUTE: &str = "/executionTaskLogs";
const TASK_LOG_ROUTE: &str = "/executionTaskLog";

/// Backend gateway speaking the engine's JSON-over-HTTP routes.
///
/// No retries: a failed call is reported once and the caller decides what to
/// keep on screen.
pub struct HttpBackend {
    http: Client,
    base_url: String,
    list_route: ListRoute,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OrcaError::Transport(e.to_string()))?;
        Ok(Self::with_client(http, &config.base_url, config.list_route))
    }

    pub fn with_client(http: Client, base_url: &str, list_route: ListRoute) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            list_route,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.base_url, route)
    }

    async fn get<T: DeserializeOwned>(&self, route: &str) -> Result<T> {
        debug!(route, "GET");
        let request = self.http.get(self.url(route));
        self.send(route, request).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, route: &str, body: &B) -> Result<T> {
        debug!(route, "POST");
        let request = self.http.post(self.url(route)).json(body);
        self.send(route, request).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        route: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let response = request.send().await.map_err(|e| {
            warn!(route, error = %e, "Request failed");
            OrcaError::Transport(e.to_string())
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| OrcaError::Transport(e.to_string()))?;

        if !status.is_success() {
            // The engine reports failures as {"error": "..."}
            let body = serde_json::from_str::<ErrorBody>(&text)
                .map(|b| b.error)
                .unwrap_or(text);
            warn!(route, status = status.as_u16(), body = %body, "Engine returned an error");
            return Err(OrcaError::Http {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            warn!(route, error = %e, "Response did not match the expected shape");
            OrcaError::MalformedResponse {
                route: route.to_string(),
                message: e.to_string(),
            }
        })
    }
}

impl Backend for HttpBackend {
    fn list_workflows(&self) -> BoxFuture<'_, Result<Vec<WorkflowSummary>>> {
        Box::pin(async move {
            let resp: WorkflowListResponse = self.get(self.list_route.path()).await?;
            Ok(resp
                .into_names()
                .into_iter()
                .map(WorkflowSummary::new)
                .collect())
        })
    }

    fn execute(&self, workflow: &str) -> BoxFuture<'_, Result<ExecuteAck>> {
        let body = PathRequest::dag(workflow);
        Box::pin(async move {
            let raw: serde_json::Value = self.post(EXECUTE_ROUTE, &body).await?;
            let message = raw
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string);
            Ok(ExecuteAck { message, raw })
        })
    }

    fn fetch_graph(&self, workflow: &str) -> BoxFuture<'_, Result<GraphDocument>> {
        let body = PathRequest::dag(workflow);
        Box::pin(async move {
            let resp: GraphResponse = self.post(GRAPH_ROUTE, &body).await?;
            Ok(resp.graph)
        })
    }

    fn fetch_runs(&self, workflow: &str) -> BoxFuture<'_, Result<Vec<RunSummary>>> {
        let body = PathRequest::logs(&[workflow]);
        Box::pin(async move {
            let resp: RunListResponse = self.post(RUNS_ROUTE, &body).await?;
            Ok(resp.log_list.into_iter().map(RunSummary::new).collect())
        })
    }

    fn fetch_task_logs(
        &self,
        workflow: &str,
        run: &str,
    ) -> BoxFuture<'_, Result<Vec<TaskLogSummary>>> {
        let body = PathRequest::logs(&[workflow, run]);
        Box::pin(async move {
            let resp: TaskLogListResponse = self.post(TASK_LOGS_ROUTE, &body).await?;
            Ok(resp
                .log_task_list
                .into_iter()
                .map(TaskLogSummary::new)
                .collect())
        })
    }

    fn fetch_log(
        &self,
        workflow: &str,
        run: &str,
        artifact: &str,
    ) -> BoxFuture<'_, Result<LogContent>> {
        let body = PathRequest::logs(&[workflow, run, artifact]);
        Box::pin(async move {
            let resp: LogResponse = self.post(TASK_LOG_ROUTE, &body).await?;
            Ok(LogContent { text: resp.log })
        })
    }
}

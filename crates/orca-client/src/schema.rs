//! Request and response bodies of the engine's routes.
//!
//! Responses are decoded into these shapes and nothing else: a body that does
//! not fit is rejected, never patched up.

use serde::{Deserialize, Deserializer, Serialize};

use orca_core::graph::GraphDocument;

// ── Request types ────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub(crate) struct PathRequest {
    pub path: String,
}

impl PathRequest {
    pub fn dag(workflow: &str) -> Self {
        Self {
            path: format!("dags/{}", workflow),
        }
    }

    pub fn logs(segments: &[&str]) -> Self {
        Self {
            path: format!("logs/{}", segments.join("/")),
        }
    }
}

// ── Response types ───────────────────────────────────────────────

/// The list route answers either `{dagList: [...]}` or a bare array,
/// depending on the deployment.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum WorkflowListResponse {
    Wrapped {
        #[serde(rename = "dagList", deserialize_with = "nullable_list")]
        dag_list: Vec<String>,
    },
    Bare(Vec<String>),
}

impl WorkflowListResponse {
    pub fn into_names(self) -> Vec<String> {
        match self {
            WorkflowListResponse::Wrapped { dag_list } => dag_list,
            WorkflowListResponse::Bare(names) => names,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphResponse {
    pub graph: GraphDocument,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RunListResponse {
    #[serde(rename = "logList", deserialize_with = "nullable_list")]
    pub log_list: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TaskLogListResponse {
    #[serde(rename = "logTaskList", deserialize_with = "nullable_list")]
    pub log_task_list: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LogResponse {
    pub log: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: String,
}

/// The engine sends `null` for an empty directory listing. The field itself
/// is still required.
fn nullable_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_accepts_both_shapes() {
        let wrapped: WorkflowListResponse =
            serde_json::from_str(r#"{"dagList":["a.orca","b.orca"],"message":"DAGs"}"#).unwrap();
        assert_eq!(wrapped.into_names(), ["a.orca", "b.orca"]);

        let bare: WorkflowListResponse = serde_json::from_str(r#"["a.orca"]"#).unwrap();
        assert_eq!(bare.into_names(), ["a.orca"]);
    }

    #[test]
    fn list_rejects_other_shapes() {
        assert!(serde_json::from_str::<WorkflowListResponse>(r#"{"dags":["a"]}"#).is_err());
        assert!(serde_json::from_str::<WorkflowListResponse>(r#"[1, 2]"#).is_err());
        assert!(serde_json::from_str::<WorkflowListResponse>(r#""a""#).is_err());
    }

    #[test]
    fn null_list_is_empty_but_missing_field_is_not() {
        let runs: RunListResponse = serde_json::from_str(r#"{"logList":null}"#).unwrap();
        assert!(runs.log_list.is_empty());
        assert!(serde_json::from_str::<RunListResponse>(r#"{"message":"logs/x"}"#).is_err());
    }

    #[test]
    fn log_must_be_a_string() {
        assert!(serde_json::from_str::<LogResponse>(r#"{"log":42}"#).is_err());
        let ok: LogResponse = serde_json::from_str(r#"{"log":""}"#).unwrap();
        assert_eq!(ok.log, "");
    }

    #[test]
    fn request_paths() {
        assert_eq!(PathRequest::dag("orders").path, "dags/orders");
        assert_eq!(PathRequest::logs(&["orders"]).path, "logs/orders");
        assert_eq!(
            PathRequest::logs(&["orders", "r1", "A.log"]).path,
            "logs/orders/r1/A.log"
        );
    }
}

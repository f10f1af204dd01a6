use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::location::SEPARATOR;

/// Extension carried by workflow definition files on the engine side.
pub const WORKFLOW_EXTENSION: &str = ".orca";

/// Which workflow, which run of it, and which task-level log artifact is
/// currently selected.
///
/// Fields are ordered: a run is only set when a workflow is, and an artifact
/// only when a run is. The constructors below are the only way to build a
/// non-empty state, so a gap cannot be represented.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NavigationState {
    workflow_id: Option<String>,
    run_id: Option<String>,
    artifact_id: Option<String>,
}

impl NavigationState {
    /// The fully-unset state.
    pub fn new() -> Self {
        Self::default()
    }

    /// A state selecting only a workflow. `None` if `id` is not a usable segment.
    pub fn workflow(id: impl Into<String>) -> Option<Self> {
        Self::new().with_workflow(id)
    }

    pub fn workflow_id(&self) -> Option<&str> {
        self.workflow_id.as_deref()
    }

    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    pub fn artifact_id(&self) -> Option<&str> {
        self.artifact_id.as_deref()
    }

    /// Number of set fields, 0 through 3.
    pub fn depth(&self) -> usize {
        [&self.workflow_id, &self.run_id, &self.artifact_id]
            .iter()
            .take_while(|f| f.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.workflow_id.is_none()
    }

    /// Select a workflow, dropping any run and artifact.
    pub fn with_workflow(&self, id: impl Into<String>) -> Option<Self> {
        let id = segment(id)?;
        Some(Self {
            workflow_id: Some(id),
            run_id: None,
            artifact_id: None,
        })
    }

    /// Select a run of the current workflow, dropping any artifact.
    pub fn with_run(&self, id: impl Into<String>) -> Option<Self> {
        let workflow_id = self.workflow_id.clone()?;
        let id = segment(id)?;
        Some(Self {
            workflow_id: Some(workflow_id),
            run_id: Some(id),
            artifact_id: None,
        })
    }

    /// Select an artifact of the current run.
    pub fn with_artifact(&self, id: impl Into<String>) -> Option<Self> {
        let run_id = self.run_id.clone()?;
        let id = segment(id)?;
        Some(Self {
            workflow_id: self.workflow_id.clone(),
            run_id: Some(run_id),
            artifact_id: Some(id),
        })
    }

    /// Drop the deepest set field.
    pub fn parent(&self) -> Self {
        let mut out = self.clone();
        if out.artifact_id.take().is_none() && out.run_id.take().is_none() {
            out.workflow_id = None;
        }
        out
    }
}

/// Identifiers are opaque, but they must be non-empty and must not contain
/// the token separator, otherwise the state would not survive a round trip
/// through the location token.
fn segment(id: impl Into<String>) -> Option<String> {
    let id = id.into();
    if id.is_empty() || id.contains(SEPARATOR) {
        None
    } else {
        Some(id)
    }
}

/// One workflow definition known to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub name: String,
}

impl WorkflowSummary {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The identifier used in the navigation token: no leading path, no
    /// definition extension.
    pub fn workflow_id(&self) -> &str {
        let base = self.name.rsplit('/').next().unwrap_or(&self.name);
        base.strip_suffix(WORKFLOW_EXTENSION).unwrap_or(base)
    }
}

/// One past execution of a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub label: String,
}

/// Timestamp layouts the engine uses when naming run directories.
const RUN_LABEL_FORMATS: &[&str] = &["%Y-%m-%d_%H-%M-%S", "%Y-%m-%dT%H-%M-%S"];

impl RunSummary {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }

    /// Start time encoded in the label, when it follows one of the engine's
    /// timestamp layouts.
    pub fn started_at(&self) -> Option<NaiveDateTime> {
        RUN_LABEL_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(&self.label, fmt).ok())
    }
}

/// One task-level log artifact of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskLogSummary {
    pub label: String,
}

impl TaskLogSummary {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }
}

/// Raw content of one artifact, shown verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogContent {
    pub text: String,
}

/// Whatever the engine answered to an execute request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteAck {
    #[serde(default)]
    pub message: Option<String>,
    pub raw: serde_json::Value,
}

/// The panels kept consistent with the navigation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Panel {
    Workflows,
    Runs,
    Tasks,
    Log,
    Graph,
}

impl Panel {
    pub const ALL: [Panel; 5] = [
        Panel::Workflows,
        Panel::Runs,
        Panel::Tasks,
        Panel::Log,
        Panel::Graph,
    ];
}

impl std::fmt::Display for Panel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Panel::Workflows => "workflows",
            Panel::Runs => "runs",
            Panel::Tasks => "tasks",
            Panel::Log => "log",
            Panel::Graph => "graph",
        };
        f.write_str(name)
    }
}

/// Events published on the [`EventBus`](crate::event::EventBus).
#[derive(Debug, Clone)]
pub enum UiEvent {
    /// The navigation state changed.
    Navigated { token: String },
    /// A panel was rebound from a fresh fetch.
    PanelUpdated { panel: Panel },
    /// A panel was emptied because the state no longer selects it.
    PanelCleared { panel: Panel },
    /// A fetch failed; the panel keeps what it showed before.
    FetchFailed { panel: Panel, error: String },
    /// A fetch resolved after the state moved on and was dropped.
    StaleDiscarded { panel: Panel, seq: u64 },
    ExecutionAccepted {
        workflow: String,
        message: Option<String>,
    },
    ExecutionFailed { workflow: String, error: String },
}

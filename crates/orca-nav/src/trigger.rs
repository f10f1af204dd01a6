use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use orca_core::event::EventBus;
use orca_core::traits::Backend;
use orca_core::types::{NavigationState, UiEvent};

/// Starts workflow executions without waiting for them.
///
/// Only the workflow of the given state is read. The navigation state is
/// left alone and the run list is not refreshed; a new run shows up on the
/// next refresh of that panel.
pub struct ExecutionTrigger {
    backend: Arc<dyn Backend>,
    bus: Arc<EventBus>,
}

impl ExecutionTrigger {
    pub fn new(backend: Arc<dyn Backend>, bus: Arc<EventBus>) -> Self {
        Self { backend, bus }
    }

    /// Send an execute request for the selected workflow. Returns `None`
    /// when no workflow is selected, in which case nothing is sent.
    pub fn run(&self, state: &NavigationState) -> Option<JoinHandle<()>> {
        let workflow = state.workflow_id()?.to_string();
        let backend = self.backend.clone();
        let bus = self.bus.clone();

        info!(%workflow, "Execute requested");
        Some(tokio::spawn(async move {
            match backend.execute(&workflow).await {
                Ok(ack) => {
                    info!(%workflow, message = ?ack.message, "Execution accepted");
                    bus.publish(UiEvent::ExecutionAccepted {
                        workflow,
                        message: ack.message,
                    });
                }
                Err(e) => {
                    warn!(%workflow, error = %e, "Execution request failed");
                    bus.publish(UiEvent::ExecutionFailed {
                        workflow,
                        error: e.to_string(),
                    });
                }
            }
        }))
    }
}

use std::sync::Arc;

use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::warn;

use orca_core::error::OrcaError;
use orca_core::event::EventBus;
use orca_core::types::{Panel, UiEvent};
use orca_nav::{Controller, ExecutionTrigger, Navigator};

use crate::event::{EventLoop, TuiEvent};
use crate::input::{InputAction, InputHandler};
use crate::ui;

/// Panels that take the cursor, in Tab order.
const FOCUS_ORDER: [Panel; 4] = [Panel::Workflows, Panel::Runs, Panel::Tasks, Panel::Log];

/// A line shown in the status bar until the next one replaces it.
#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub text: String,
    pub is_error: bool,
}

/// Application state.
pub struct App {
    pub navigator: Arc<Navigator>,
    pub controller: Controller,
    trigger: ExecutionTrigger,
    pub input: InputHandler,
    pub focus: Panel,
    pub status: Option<StatusMessage>,
    pub tick_count: usize,
}

impl App {
    pub fn new(navigator: Arc<Navigator>, controller: Controller, trigger: ExecutionTrigger) -> Self {
        Self {
            navigator,
            controller,
            trigger,
            input: InputHandler::new(),
            focus: Panel::Workflows,
            status: None,
            tick_count: 0,
        }
    }

    /// The token shown in the address bar.
    pub fn token(&self) -> String {
        self.navigator.current().to_string()
    }

    fn info(&mut self, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            text: text.into(),
            is_error: false,
        });
    }

    fn error(&mut self, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            text: text.into(),
            is_error: true,
        });
    }

    /// Handle a client event.
    pub fn handle_ui_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::FetchFailed { panel, error } => {
                self.error(format!("{} unavailable: {}", panel, error));
            }
            UiEvent::ExecutionAccepted { workflow, message } => {
                let message = message.unwrap_or_else(|| "accepted".to_string());
                self.info(format!("{}: {}", workflow, message));
            }
            UiEvent::ExecutionFailed { workflow, error } => {
                self.error(format!("Execute {} failed: {}", workflow, error));
            }
            UiEvent::Navigated { .. }
            | UiEvent::PanelUpdated { .. }
            | UiEvent::PanelCleared { .. }
            | UiEvent::StaleDiscarded { .. } => {}
        }
    }

    fn cycle_focus(&mut self, forward: bool) {
        let pos = FOCUS_ORDER
            .iter()
            .position(|p| *p == self.focus)
            .unwrap_or(0);
        let len = FOCUS_ORDER.len();
        let next = if forward { pos + 1 } else { pos + len - 1 };
        self.focus = FOCUS_ORDER[next % len];
    }

    /// Apply one input action. Returns `false` when the app should quit.
    pub fn handle_action(&mut self, action: InputAction) -> bool {
        match action {
            InputAction::Quit => return false,
            InputAction::FocusNext => self.cycle_focus(true),
            InputAction::FocusPrev => self.cycle_focus(false),
            InputAction::Up => match self.controller.panels_mut().list_mut(self.focus) {
                Some(list) => list.select_prev(),
                None => self.controller.panels_mut().log.scroll_up(1),
            },
            InputAction::Down => match self.controller.panels_mut().list_mut(self.focus) {
                Some(list) => list.select_next(),
                None => self.controller.panels_mut().log.scroll_down(1),
            },
            InputAction::ScrollUp => self.controller.panels_mut().log.scroll_up(10),
            InputAction::ScrollDown => self.controller.panels_mut().log.scroll_down(10),
            InputAction::Activate => {
                let next = self
                    .controller
                    .panels()
                    .list(self.focus)
                    .and_then(|list| list.activate());
                if let Some(next) = next {
                    if let Err(e) = self.navigator.navigate(next) {
                        self.error(e.to_string());
                    } else if self.focus != Panel::Tasks {
                        self.cycle_focus(true);
                    }
                }
            }
            InputAction::Back => {
                if let Err(e) = self.navigator.up() {
                    self.error(e.to_string());
                }
            }
            InputAction::Execute => {
                let state = self.navigator.current();
                match self.trigger.run(&state) {
                    Some(_) => self.info(format!(
                        "Execution of {} requested",
                        state.workflow_id().unwrap_or_default()
                    )),
                    None => self.error(OrcaError::NoWorkflowSelected.to_string()),
                }
            }
            InputAction::Refresh => {
                self.controller.refresh();
                self.info("Refreshing");
            }
            InputAction::BeginEdit => {
                let token = self.token();
                self.input.begin_edit(&token);
            }
            InputAction::Commit(raw) => {
                if let Err(e) = self.navigator.navigate_token(&raw) {
                    self.error(e.to_string());
                }
            }
            InputAction::Cancel | InputAction::None => {}
        }
        true
    }
}

/// Main app loop.
pub async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    app: &mut App,
    event_bus: Arc<EventBus>,
    tick_interval: std::time::Duration,
) -> anyhow::Result<()> {
    let mut events = EventLoop::new(event_bus.subscribe(), tick_interval);
    app.controller.start();

    loop {
        if let Err(e) = app.controller.poll() {
            warn!(error = %e, "Giving up on inconsistent engine data");
            return Err(e.into());
        }
        terminal.draw(|f| ui::draw(f, app))?;

        if let Some(event) = events.next().await {
            match event {
                TuiEvent::Key(key) => {
                    let action = app.input.handle_key(key);
                    if !app.handle_action(action) {
                        break;
                    }
                }
                TuiEvent::Ui(event) => app.handle_ui_event(event),
                TuiEvent::Tick => {
                    app.tick_count += 1;
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use orca_core::location::MemoryLocation;
    use orca_test_utils::{orders_backend, Call, ScriptedBackend};

    const RUN: &str = "2024-01-02T10-00-00";

    async fn app(backend: Arc<ScriptedBackend>, token: &str) -> App {
        let bus = Arc::new(EventBus::default());
        let navigator = Arc::new(Navigator::new(Arc::new(MemoryLocation::new(token)), bus.clone()));
        let mut controller = Controller::new(backend.clone(), bus.clone(), navigator.subscribe(), 10);
        controller.start();
        controller.settle().await.unwrap();
        App::new(navigator, controller, ExecutionTrigger::new(backend, bus))
    }

    #[tokio::test]
    async fn enter_walks_down_the_hierarchy() {
        let backend = Arc::new(orders_backend());
        let mut app = app(backend, "").await;

        assert!(app.handle_action(InputAction::Activate));
        assert_eq!(app.token(), "orders");
        assert_eq!(app.focus, Panel::Runs);
        app.controller.settle().await.unwrap();

        // Runs are listed newest first
        app.handle_action(InputAction::Activate);
        assert_eq!(app.token(), format!("orders@{RUN}"));
        app.controller.settle().await.unwrap();

        app.handle_action(InputAction::Down);
        app.handle_action(InputAction::Activate);
        assert_eq!(app.token(), format!("orders@{RUN}@B.log"));
        app.controller.settle().await.unwrap();
        assert_eq!(app.controller.panels().log.text(), "B ran\n");
    }

    #[tokio::test]
    async fn backspace_goes_up_one_level() {
        let backend = Arc::new(orders_backend());
        let mut app = app(backend, &format!("orders@{RUN}@A.log")).await;
        app.handle_action(InputAction::Back);
        assert_eq!(app.token(), format!("orders@{RUN}"));
    }

    #[tokio::test]
    async fn edited_token_is_navigated() {
        let backend = Arc::new(orders_backend());
        let mut app = app(backend, "").await;
        app.handle_action(InputAction::BeginEdit);
        assert!(app.input.editing);
        app.handle_action(InputAction::Commit("billing@@x".into()));
        assert_eq!(app.token(), "billing");
    }

    #[tokio::test]
    async fn execute_without_workflow_reports_error() {
        let backend = Arc::new(orders_backend());
        let mut app = app(backend.clone(), "").await;
        app.handle_action(InputAction::Execute);
        assert!(app.status.as_ref().unwrap().is_error);
        assert_eq!(backend.count(|c| matches!(c, Call::Execute(_))), 0);
    }

    #[tokio::test]
    async fn focus_wraps_around() {
        let backend = Arc::new(orders_backend());
        let mut app = app(backend, "").await;
        app.handle_action(InputAction::FocusPrev);
        assert_eq!(app.focus, Panel::Log);
        app.handle_action(InputAction::FocusNext);
        assert_eq!(app.focus, Panel::Workflows);
    }

    #[tokio::test]
    async fn fetch_failure_shows_in_status() {
        let backend = Arc::new(orders_backend());
        let mut app = app(backend, "").await;
        app.handle_ui_event(UiEvent::FetchFailed {
            panel: Panel::Runs,
            error: "HTTP 500: boom".into(),
        });
        let status = app.status.unwrap();
        assert!(status.is_error);
        assert!(status.text.contains("runs unavailable"));
    }
}

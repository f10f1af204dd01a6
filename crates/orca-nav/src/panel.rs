//! Panel view state: what each panel shows, for which key, and where its
//! cursor sits.

use orca_core::graph::GraphModel;
use orca_core::types::*;

use crate::scheduler::PanelKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Nothing selected for this panel.
    Cleared,
    /// A fetch is in flight; any previous content is still shown.
    Loading,
    Ready,
}

/// Content of a panel plus the key it was fetched for.
#[derive(Debug, Clone)]
struct Bound<T> {
    key: Option<PanelKey>,
    content: T,
    state: LoadState,
    error: Option<String>,
}

impl<T: Default> Bound<T> {
    fn new() -> Self {
        Self {
            key: None,
            content: T::default(),
            state: LoadState::Cleared,
            error: None,
        }
    }

    fn begin(&mut self) {
        self.state = LoadState::Loading;
    }

    fn bind(&mut self, key: PanelKey, content: T) {
        self.key = Some(key);
        self.content = content;
        self.state = LoadState::Ready;
        self.error = None;
    }

    /// Record a failed fetch. The last good content stays.
    fn fail(&mut self, error: String) {
        self.error = Some(error);
        self.state = if self.key.is_some() {
            LoadState::Ready
        } else {
            LoadState::Cleared
        };
    }

    fn clear(&mut self) {
        *self = Self::new();
    }
}

/// One row of a list panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    /// Value that goes into the navigation token.
    pub id: String,
    /// What the user sees.
    pub label: String,
}

impl ListItem {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// A selectable list: workflows, runs, or task logs.
#[derive(Debug, Clone)]
pub struct ListPanel {
    panel: Panel,
    view: Bound<Vec<ListItem>>,
    cursor: usize,
}

impl ListPanel {
    pub fn new(panel: Panel) -> Self {
        Self {
            panel,
            view: Bound::new(),
            cursor: 0,
        }
    }

    pub fn panel(&self) -> Panel {
        self.panel
    }

    pub fn items(&self) -> &[ListItem] {
        &self.view.content
    }

    pub fn key(&self) -> Option<&PanelKey> {
        self.view.key.as_ref()
    }

    pub fn state(&self) -> LoadState {
        self.view.state
    }

    pub fn error(&self) -> Option<&str> {
        self.view.error.as_deref()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn selected(&self) -> Option<&ListItem> {
        self.view.content.get(self.cursor)
    }

    pub fn select_next(&mut self) {
        if self.cursor + 1 < self.view.content.len() {
            self.cursor += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    /// Replace the items. The cursor lands on `current` if it is listed.
    pub fn bind(&mut self, key: PanelKey, items: Vec<ListItem>, current: Option<&str>) {
        self.view.bind(key, items);
        self.cursor = 0;
        self.follow(current);
    }

    /// Move the cursor onto `current` if it is listed, otherwise leave it.
    pub fn follow(&mut self, current: Option<&str>) {
        if let Some(pos) = current.and_then(|id| self.view.content.iter().position(|i| i.id == id)) {
            self.cursor = pos;
        }
        if self.cursor >= self.view.content.len() {
            self.cursor = self.view.content.len().saturating_sub(1);
        }
    }

    pub fn begin(&mut self) {
        self.view.begin();
    }

    pub fn fail(&mut self, error: String) {
        self.view.fail(error);
    }

    pub fn clear(&mut self) {
        self.view.clear();
        self.cursor = 0;
    }

    /// The state reached by picking the item under the cursor.
    ///
    /// Built from the key the items were fetched for, so picking from a list
    /// that has not caught up yet still lands on a consistent state.
    pub fn activate(&self) -> Option<NavigationState> {
        let item = self.selected()?;
        match self.view.key.as_ref()? {
            PanelKey::Workflows => NavigationState::workflow(item.id.as_str()),
            PanelKey::Runs { workflow } => {
                NavigationState::workflow(workflow.as_str())?.with_run(item.id.as_str())
            }
            PanelKey::Tasks { workflow, run } => NavigationState::workflow(workflow.as_str())?
                .with_run(run.as_str())?
                .with_artifact(item.id.as_str()),
            _ => None,
        }
    }
}

/// Last `min(limit, len)` runs, newest first. The engine lists runs oldest
/// first.
pub fn recent_runs(runs: &[RunSummary], limit: usize) -> Vec<RunSummary> {
    runs.iter().rev().take(limit).cloned().collect()
}

/// Raw artifact text, shown verbatim.
#[derive(Debug, Clone)]
pub struct LogPanel {
    view: Bound<LogContent>,
    scroll: u16,
}

impl LogPanel {
    pub fn new() -> Self {
        Self {
            view: Bound::new(),
            scroll: 0,
        }
    }

    pub fn text(&self) -> &str {
        &self.view.content.text
    }

    pub fn key(&self) -> Option<&PanelKey> {
        self.view.key.as_ref()
    }

    pub fn state(&self) -> LoadState {
        self.view.state
    }

    pub fn error(&self) -> Option<&str> {
        self.view.error.as_deref()
    }

    pub fn scroll(&self) -> u16 {
        self.scroll
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max = self.text().lines().count().saturating_sub(1);
        let max = u16::try_from(max).unwrap_or(u16::MAX);
        self.scroll = self.scroll.saturating_add(lines).min(max);
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn bind(&mut self, key: PanelKey, content: LogContent) {
        if self.view.key.as_ref() != Some(&key) {
            self.scroll = 0;
        }
        self.view.bind(key, content);
    }

    pub fn begin(&mut self) {
        self.view.begin();
    }

    pub fn fail(&mut self, error: String) {
        self.view.fail(error);
    }

    pub fn clear(&mut self) {
        self.view.clear();
        self.scroll = 0;
    }
}

impl Default for LogPanel {
    fn default() -> Self {
        Self::new()
    }
}

/// Task graph of the selected workflow.
#[derive(Debug, Clone)]
pub struct GraphPanel {
    view: Bound<GraphModel>,
}

impl GraphPanel {
    pub fn new() -> Self {
        Self { view: Bound::new() }
    }

    pub fn model(&self) -> &GraphModel {
        &self.view.content
    }

    pub fn key(&self) -> Option<&PanelKey> {
        self.view.key.as_ref()
    }

    pub fn state(&self) -> LoadState {
        self.view.state
    }

    pub fn error(&self) -> Option<&str> {
        self.view.error.as_deref()
    }

    pub fn bind(&mut self, key: PanelKey, model: GraphModel) {
        self.view.bind(key, model);
    }

    pub fn begin(&mut self) {
        self.view.begin();
    }

    pub fn fail(&mut self, error: String) {
        self.view.fail(error);
    }

    pub fn clear(&mut self) {
        self.view.clear();
    }
}

impl Default for GraphPanel {
    fn default() -> Self {
        Self::new()
    }
}

/// All panels kept consistent with the navigation state.
#[derive(Debug, Clone)]
pub struct Panels {
    pub workflows: ListPanel,
    pub runs: ListPanel,
    pub tasks: ListPanel,
    pub log: LogPanel,
    pub graph: GraphPanel,
}

impl Panels {
    pub fn new() -> Self {
        Self {
            workflows: ListPanel::new(Panel::Workflows),
            runs: ListPanel::new(Panel::Runs),
            tasks: ListPanel::new(Panel::Tasks),
            log: LogPanel::new(),
            graph: GraphPanel::new(),
        }
    }

    pub fn list(&self, panel: Panel) -> Option<&ListPanel> {
        match panel {
            Panel::Workflows => Some(&self.workflows),
            Panel::Runs => Some(&self.runs),
            Panel::Tasks => Some(&self.tasks),
            _ => None,
        }
    }

    pub fn list_mut(&mut self, panel: Panel) -> Option<&mut ListPanel> {
        match panel {
            Panel::Workflows => Some(&mut self.workflows),
            Panel::Runs => Some(&mut self.runs),
            Panel::Tasks => Some(&mut self.tasks),
            _ => None,
        }
    }

    pub fn state(&self, panel: Panel) -> LoadState {
        match panel {
            Panel::Log => self.log.state(),
            Panel::Graph => self.graph.state(),
            list => self.list(list).map(ListPanel::state).unwrap_or(LoadState::Cleared),
        }
    }

    pub fn key(&self, panel: Panel) -> Option<&PanelKey> {
        match panel {
            Panel::Log => self.log.key(),
            Panel::Graph => self.graph.key(),
            list => self.list(list).and_then(ListPanel::key),
        }
    }

    pub fn begin(&mut self, panel: Panel) {
        match panel {
            Panel::Log => self.log.begin(),
            Panel::Graph => self.graph.begin(),
            list => {
                if let Some(p) = self.list_mut(list) {
                    p.begin();
                }
            }
        }
    }

    pub fn fail(&mut self, panel: Panel, error: String) {
        match panel {
            Panel::Log => self.log.fail(error),
            Panel::Graph => self.graph.fail(error),
            list => {
                if let Some(p) = self.list_mut(list) {
                    p.fail(error);
                }
            }
        }
    }

    pub fn clear(&mut self, panel: Panel) {
        match panel {
            Panel::Log => self.log.clear(),
            Panel::Graph => self.graph.clear(),
            list => {
                if let Some(p) = self.list_mut(list) {
                    p.clear();
                }
            }
        }
    }

    /// Put every list cursor on the item the state selects.
    pub fn follow(&mut self, state: &NavigationState) {
        self.workflows.follow(state.workflow_id());
        self.runs.follow(state.run_id());
        self.tasks.follow(state.artifact_id());
    }
}

impl Default for Panels {
    fn default() -> Self {
        Self::new()
    }
}

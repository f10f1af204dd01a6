//! Decides, for a navigation transition, which panels to fetch, which to
//! empty, and which to leave alone.

use orca_core::types::{NavigationState, Panel};

/// The navigation fields a panel's content depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PanelKey {
    Workflows,
    Runs {
        workflow: String,
    },
    Tasks {
        workflow: String,
        run: String,
    },
    Log {
        workflow: String,
        run: String,
        artifact: String,
    },
    Graph {
        workflow: String,
    },
}

impl PanelKey {
    /// Key for `panel` under `state`, `None` when the state does not select
    /// anything for it.
    pub fn for_state(panel: Panel, state: &NavigationState) -> Option<Self> {
        let workflow = state.workflow_id().map(str::to_string);
        let run = state.run_id().map(str::to_string);
        let artifact = state.artifact_id().map(str::to_string);
        match panel {
            Panel::Workflows => Some(PanelKey::Workflows),
            Panel::Runs => Some(PanelKey::Runs { workflow: workflow? }),
            Panel::Tasks => Some(PanelKey::Tasks {
                workflow: workflow?,
                run: run?,
            }),
            Panel::Log => Some(PanelKey::Log {
                workflow: workflow?,
                run: run?,
                artifact: artifact?,
            }),
            Panel::Graph => Some(PanelKey::Graph { workflow: workflow? }),
        }
    }

    pub fn panel(&self) -> Panel {
        match self {
            PanelKey::Workflows => Panel::Workflows,
            PanelKey::Runs { .. } => Panel::Runs,
            PanelKey::Tasks { .. } => Panel::Tasks,
            PanelKey::Log { .. } => Panel::Log,
            PanelKey::Graph { .. } => Panel::Graph,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelAction {
    /// Fetch fresh content for this key.
    Refresh(PanelKey),
    /// Empty the panel.
    Clear,
    /// Content already matches; do nothing.
    Keep,
}

/// One action per panel, in [`Panel::ALL`] order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshPlan {
    actions: Vec<(Panel, PanelAction)>,
}

impl RefreshPlan {
    /// Plan for moving from `previous` to `next`.
    ///
    /// The workflow list is always refetched. Any other panel whose key is
    /// the same under both states is kept.
    pub fn between(previous: &NavigationState, next: &NavigationState) -> Self {
        Self::build(next, |panel, key| {
            panel != Panel::Workflows && PanelKey::for_state(panel, previous).as_ref() == Some(key)
        })
    }

    /// Plan that refetches everything `next` selects.
    pub fn full(next: &NavigationState) -> Self {
        Self::build(next, |_, _| false)
    }

    fn build(next: &NavigationState, keep: impl Fn(Panel, &PanelKey) -> bool) -> Self {
        let actions = Panel::ALL
            .iter()
            .map(|&panel| {
                let action = match PanelKey::for_state(panel, next) {
                    None => PanelAction::Clear,
                    Some(key) if keep(panel, &key) => PanelAction::Keep,
                    Some(key) => PanelAction::Refresh(key),
                };
                (panel, action)
            })
            .collect();
        Self { actions }
    }

    pub fn action(&self, panel: Panel) -> &PanelAction {
        self.actions
            .iter()
            .find(|(p, _)| *p == panel)
            .map(|(_, a)| a)
            .unwrap_or(&PanelAction::Keep)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Panel, PanelAction)> {
        self.actions.iter()
    }

    /// Keys that need a fetch.
    pub fn refreshes(&self) -> impl Iterator<Item = &PanelKey> {
        self.actions.iter().filter_map(|(_, a)| match a {
            PanelAction::Refresh(key) => Some(key),
            _ => None,
        })
    }
}

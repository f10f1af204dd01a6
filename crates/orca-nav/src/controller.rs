//! Keeps the panels consistent with the navigation state.
//!
//! Fetches run concurrently and report back over a channel. Each carries a
//! [`Ticket`]; a result is applied only while its key still matches the
//! current state and nothing newer has been applied to the panel. Anything
//! else is dropped without touching the panel.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, warn};

use orca_core::error::{OrcaError, Result};
use orca_core::event::EventBus;
use orca_core::graph::{self, GraphDocument};
use orca_core::traits::Backend;
use orca_core::types::*;

use crate::panel::{recent_runs, ListItem, Panels};
use crate::scheduler::{PanelAction, PanelKey, RefreshPlan};

/// Identifies one fetch: its order of issue and what it was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub seq: u64,
    pub key: PanelKey,
}

/// What a fetch brought back.
#[derive(Debug)]
pub enum Payload {
    Workflows(Vec<WorkflowSummary>),
    Runs(Vec<RunSummary>),
    Tasks(Vec<TaskLogSummary>),
    Log(LogContent),
    Graph(GraphDocument),
}

#[derive(Debug)]
pub struct Outcome {
    pub ticket: Ticket,
    pub result: Result<Payload>,
}

pub struct Controller {
    backend: Arc<dyn Backend>,
    bus: Arc<EventBus>,
    nav: watch::Receiver<NavigationState>,
    /// State the panels were last planned for.
    state: NavigationState,
    panels: Panels,
    run_history: usize,
    next_seq: u64,
    applied: HashMap<Panel, u64>,
    /// Newest fetch issued per panel that has not come back yet.
    live: HashMap<Panel, Ticket>,
    in_flight: usize,
    discarded: u64,
    tx: mpsc::UnboundedSender<Outcome>,
    rx: mpsc::UnboundedReceiver<Outcome>,
}

impl Controller {
    pub fn new(
        backend: Arc<dyn Backend>,
        bus: Arc<EventBus>,
        nav: watch::Receiver<NavigationState>,
        run_history: usize,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            backend,
            bus,
            nav,
            state: NavigationState::new(),
            panels: Panels::new(),
            run_history,
            next_seq: 0,
            applied: HashMap::new(),
            live: HashMap::new(),
            in_flight: 0,
            discarded: 0,
            tx,
            rx,
        }
    }

    pub fn panels(&self) -> &Panels {
        &self.panels
    }

    pub fn panels_mut(&mut self) -> &mut Panels {
        &mut self.panels
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    /// Fetches issued but not yet applied or discarded.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Results dropped because the state had moved on.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Populate every panel for the current state.
    pub fn start(&mut self) {
        self.state = self.nav.borrow_and_update().clone();
        let plan = RefreshPlan::full(&self.state);
        self.dispatch(plan);
    }

    /// Refetch everything the current state selects.
    pub fn refresh(&mut self) {
        let plan = RefreshPlan::full(&self.state);
        self.dispatch(plan);
    }

    /// Handle a pending navigation change. Returns whether there was one.
    pub fn sync(&mut self) -> bool {
        if !self.nav.has_changed().unwrap_or(false) {
            return false;
        }
        let next = self.nav.borrow_and_update().clone();
        let plan = RefreshPlan::between(&self.state, &next);
        self.state = next;
        self.dispatch(plan);
        true
    }

    fn dispatch(&mut self, plan: RefreshPlan) {
        debug!(state = %self.state, "Applying refresh plan");
        for (panel, action) in plan.iter() {
            match action {
                PanelAction::Refresh(key) => self.spawn_fetch(key.clone()),
                PanelAction::Clear => {
                    if self.panels.key(*panel).is_some() {
                        self.bus.publish(UiEvent::PanelCleared { panel: *panel });
                    }
                    self.panels.clear(*panel);
                }
                PanelAction::Keep => {
                    // A kept panel still needs a fetch when its content is
                    // not for this key and no fetch for it is outstanding.
                    if let Some(key) = PanelKey::for_state(*panel, &self.state) {
                        if self.orphaned(&key) {
                            debug!(%panel, "Refetching panel whose response was discarded");
                            self.spawn_fetch(key);
                        }
                    }
                }
            }
        }
        self.panels.follow(&self.state);
    }

    fn orphaned(&self, key: &PanelKey) -> bool {
        let panel = key.panel();
        self.panels.key(panel) != Some(key)
            && self.live.get(&panel).map(|t| &t.key) != Some(key)
    }

    fn spawn_fetch(&mut self, key: PanelKey) {
        self.next_seq += 1;
        let ticket = Ticket {
            seq: self.next_seq,
            key,
        };
        self.panels.begin(ticket.key.panel());
        self.live.insert(ticket.key.panel(), ticket.clone());
        self.in_flight += 1;

        let backend = self.backend.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = fetch(backend.as_ref(), &ticket.key).await;
            // The receiver lives as long as the controller.
            let _ = tx.send(Outcome { ticket, result });
        });
    }

    /// Apply one resolved fetch.
    ///
    /// Transport and decoding failures leave the panel's last good content in
    /// place. A graph that breaks its own structure is returned as an error.
    pub fn apply(&mut self, outcome: Outcome) -> Result<()> {
        self.in_flight = self.in_flight.saturating_sub(1);
        let Outcome { ticket, result } = outcome;
        let panel = ticket.key.panel();
        if self.live.get(&panel).map(|t| t.seq) == Some(ticket.seq) {
            self.live.remove(&panel);
        }

        let current = self.nav.borrow().clone();
        let matches = PanelKey::for_state(panel, &current).as_ref() == Some(&ticket.key);
        let newest = self.applied.get(&panel).map_or(true, |&seq| ticket.seq > seq);
        if !matches || !newest {
            debug!(%panel, seq = ticket.seq, "Discarding stale response");
            self.discarded += 1;
            self.bus.publish(UiEvent::StaleDiscarded {
                panel,
                seq: ticket.seq,
            });
            return Ok(());
        }
        self.applied.insert(panel, ticket.seq);

        let payload = match result {
            Ok(payload) => payload,
            Err(e) => {
                warn!(%panel, error = %e, "Fetch failed, keeping previous content");
                self.panels.fail(panel, e.to_string());
                self.bus.publish(UiEvent::FetchFailed {
                    panel,
                    error: e.to_string(),
                });
                return Ok(());
            }
        };

        self.bind(ticket.key, &current, payload)?;
        self.bus.publish(UiEvent::PanelUpdated { panel });
        Ok(())
    }

    fn bind(&mut self, key: PanelKey, state: &NavigationState, payload: Payload) -> Result<()> {
        match payload {
            Payload::Workflows(list) => {
                let items = list
                    .iter()
                    .map(|w| ListItem::new(w.workflow_id(), w.name.clone()))
                    .collect();
                self.panels.workflows.bind(key, items, state.workflow_id());
            }
            Payload::Runs(runs) => {
                let items = recent_runs(&runs, self.run_history)
                    .into_iter()
                    .map(|r| ListItem::new(r.label.clone(), r.label))
                    .collect();
                self.panels.runs.bind(key, items, state.run_id());
            }
            Payload::Tasks(tasks) => {
                let items = tasks
                    .into_iter()
                    .map(|t| ListItem::new(t.label.clone(), t.label))
                    .collect();
                self.panels.tasks.bind(key, items, state.artifact_id());
            }
            Payload::Log(content) => self.panels.log.bind(key, content),
            Payload::Graph(doc) => match graph::transform(&doc) {
                Ok(model) => self.panels.graph.bind(key, model),
                Err(e) => {
                    error!(error = %e, "Engine sent an inconsistent graph");
                    return Err(e);
                }
            },
        }
        Ok(())
    }

    /// Wait for the next navigation change or fetch result and handle it.
    /// Returns `false` once the navigator is gone.
    pub async fn step(&mut self) -> Result<bool> {
        tokio::select! {
            changed = self.nav.changed() => {
                if changed.is_err() {
                    return Ok(false);
                }
                self.sync();
                Ok(true)
            }
            Some(outcome) = self.rx.recv() => {
                self.apply(outcome)?;
                Ok(true)
            }
        }
    }

    /// Handle whatever is ready without waiting.
    pub fn poll(&mut self) -> Result<()> {
        self.sync();
        while let Ok(outcome) = self.rx.try_recv() {
            self.apply(outcome)?;
        }
        Ok(())
    }

    /// Handle any pending navigation change, then apply results until no
    /// fetch is in flight.
    pub async fn settle(&mut self) -> Result<()> {
        loop {
            self.sync();
            if self.in_flight == 0 {
                return Ok(());
            }
            match self.rx.recv().await {
                Some(outcome) => self.apply(outcome)?,
                None => return Err(OrcaError::Transport("fetch channel closed".into())),
            }
        }
    }
}

async fn fetch(backend: &dyn Backend, key: &PanelKey) -> Result<Payload> {
    match key {
        PanelKey::Workflows => backend.list_workflows().await.map(Payload::Workflows),
        PanelKey::Runs { workflow } => backend.fetch_runs(workflow).await.map(Payload::Runs),
        PanelKey::Tasks { workflow, run } => backend
            .fetch_task_logs(workflow, run)
            .await
            .map(Payload::Tasks),
        PanelKey::Log {
            workflow,
            run,
            artifact,
        } => backend
            .fetch_log(workflow, run, artifact)
            .await
            .map(Payload::Log),
        PanelKey::Graph { workflow } => backend.fetch_graph(workflow).await.map(Payload::Graph),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::navigator::Navigator;
    use crate::panel::LoadState;
    use orca_core::location::MemoryLocation;
    use orca_test_utils::{orders_backend, run_labels, Call, ScriptedBackend};

    const RUN: &str = "2024-01-02T10-00-00";

    fn setup(backend: Arc<ScriptedBackend>, token: &str) -> (Navigator, Controller, Arc<EventBus>) {
        let bus = Arc::new(EventBus::default());
        let nav = Navigator::new(Arc::new(MemoryLocation::new(token)), bus.clone());
        let controller = Controller::new(backend, bus.clone(), nav.subscribe(), 10);
        (nav, controller, bus)
    }

    async fn pump_until(c: &mut Controller, done: impl Fn(&Controller) -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !done(c) {
                c.step().await.unwrap();
            }
        })
        .await
        .expect("controller did not reach the expected state");
    }

    fn labels(c: &Controller) -> Vec<String> {
        c.panels().runs.items().iter().map(|i| i.label.clone()).collect()
    }

    #[tokio::test]
    async fn start_populates_every_selected_panel() {
        let backend = Arc::new(orders_backend());
        let (_nav, mut c, _) = setup(backend.clone(), &format!("orders@{RUN}@A.log"));
        c.start();
        c.settle().await.unwrap();

        let p = c.panels();
        assert_eq!(p.workflows.items().len(), 2);
        assert_eq!(p.workflows.cursor(), 0);
        assert_eq!(p.runs.items()[0].label, RUN);
        assert_eq!(p.tasks.selected().unwrap().id, "A.log");
        assert_eq!(p.log.text(), "A ran\n");
        assert_eq!(p.graph.model().nodes.len(), 2);
        assert_eq!(backend.calls().len(), 5);
    }

    #[tokio::test]
    async fn selecting_artifact_does_not_refetch_runs() {
        let backend = Arc::new(orders_backend());
        let (nav, mut c, _) = setup(backend.clone(), &format!("orders@{RUN}"));
        c.start();
        c.settle().await.unwrap();

        let model = c.panels().graph.model().clone();
        assert_eq!(
            model.nodes.iter().map(|n| n.id.as_str()).collect::<Vec<_>>(),
            vec!["A", "B"]
        );
        assert_eq!(model.edges.len(), 1);
        assert_eq!((model.edges[0].source.as_str(), model.edges[0].target.as_str()), ("A", "B"));
        assert_eq!(c.panels().log.state(), LoadState::Cleared);

        nav.navigate_token(&format!("orders@{RUN}@B.log")).unwrap();
        c.settle().await.unwrap();

        assert_eq!(c.panels().log.text(), "B ran\n");
        assert_eq!(backend.count(|call| matches!(call, Call::Runs(_))), 1);
        assert_eq!(backend.count(|call| matches!(call, Call::TaskLogs(..))), 1);
        assert_eq!(backend.count(|call| matches!(call, Call::Graph(_))), 1);
        assert_eq!(backend.count(|call| matches!(call, Call::Log(..))), 1);
    }

    #[tokio::test]
    async fn run_list_shows_newest_ten() {
        let all = run_labels(23);
        let backend = Arc::new(
            ScriptedBackend::new()
                .with_workflows(["orders.orca"])
                .with_runs("orders", all.clone()),
        );
        let (_nav, mut c, _) = setup(backend, "orders");
        c.start();
        c.settle().await.unwrap();

        let expected: Vec<String> = all[13..].iter().rev().cloned().collect();
        assert_eq!(labels(&c), expected);
        assert_eq!(labels(&c)[0], all[22]);
    }

    #[tokio::test]
    async fn late_response_for_previous_state_is_discarded() {
        let backend = Arc::new(orders_backend().with_runs("billing", ["b1"]));
        backend.hold("runs:orders");
        backend.hold("runs:billing");
        let (nav, mut c, bus) = setup(backend.clone(), "orders");
        let mut events = bus.subscribe();
        c.start();

        nav.navigate_token("billing").unwrap();
        assert!(c.sync());

        backend.release("runs:billing");
        pump_until(&mut c, |c| c.panels().runs.state() == LoadState::Ready).await;
        assert_eq!(labels(&c), vec!["b1"]);

        backend.release("runs:orders");
        pump_until(&mut c, |c| c.in_flight() == 0).await;
        assert_eq!(labels(&c), vec!["b1"]);
        assert_eq!(
            c.panels().runs.key(),
            Some(&PanelKey::Runs { workflow: "billing".into() })
        );

        let mut saw_stale = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, UiEvent::StaleDiscarded { panel: Panel::Runs, .. }) {
                saw_stale = true;
            }
        }
        assert!(saw_stale);
    }

    #[tokio::test]
    async fn stale_response_arriving_first_leaves_panel_loading() {
        let backend = Arc::new(orders_backend().with_runs("billing", ["b1"]));
        backend.hold("runs:orders");
        backend.hold("runs:billing");
        let (nav, mut c, _) = setup(backend.clone(), "orders");
        c.start();
        nav.navigate_token("billing").unwrap();
        c.sync();

        // Everything but the held billing run list resolves; the orders
        // fetches are all out of date by now.
        backend.release("runs:orders");
        pump_until(&mut c, |c| c.in_flight() == 1).await;
        assert!(c.discarded() >= 2);
        assert_eq!(c.panels().runs.state(), LoadState::Loading);
        assert!(c.panels().runs.items().is_empty());

        backend.release("runs:billing");
        pump_until(&mut c, |c| c.panels().runs.state() == LoadState::Ready).await;
        assert_eq!(labels(&c), vec!["b1"]);
    }

    #[tokio::test]
    async fn returning_to_state_refetches_discarded_panel() {
        let backend = Arc::new(orders_backend().with_runs("billing", ["b1"]));
        backend.hold("runs:orders");
        let (nav, mut c, _) = setup(backend.clone(), "orders");
        c.start();
        pump_until(&mut c, |c| c.in_flight() == 1).await;

        // The orders run list comes back while the navigator briefly points
        // at billing, before the controller has planned for that move.
        nav.navigate_token("billing").unwrap();
        backend.release("runs:orders");
        let outcome = c.rx.recv().await.unwrap();
        c.apply(outcome).unwrap();
        assert_eq!(c.discarded(), 1);
        assert_eq!(c.panels().runs.state(), LoadState::Loading);

        nav.navigate_token("orders").unwrap();
        backend.release("runs:orders");
        c.settle().await.unwrap();

        assert_eq!(c.panels().runs.state(), LoadState::Ready);
        assert_eq!(labels(&c).len(), 2);
        assert_eq!(backend.count(|call| matches!(call, Call::Runs(w) if w == "orders")), 2);
    }

    #[tokio::test]
    async fn older_ticket_for_same_key_is_discarded() {
        let backend = Arc::new(orders_backend());
        let (_nav, mut c, _) = setup(backend.clone(), "orders");
        c.start();
        c.settle().await.unwrap();

        let older = Outcome {
            ticket: Ticket {
                seq: 1,
                key: PanelKey::Runs { workflow: "orders".into() },
            },
            result: Ok(Payload::Runs(vec![RunSummary::new("ghost")])),
        };
        c.apply(older).unwrap();
        assert_eq!(c.discarded(), 1);
        assert!(labels(&c).iter().all(|l| l != "ghost"));
    }

    #[tokio::test]
    async fn failed_fetch_keeps_last_good_content() {
        let backend = Arc::new(orders_backend());
        let (_nav, mut c, bus) = setup(backend.clone(), "orders");
        c.start();
        c.settle().await.unwrap();
        assert_eq!(labels(&c).len(), 2);

        backend.fail("runs:orders", "connection refused");
        let mut events = bus.subscribe();
        c.refresh();
        c.settle().await.unwrap();

        assert_eq!(labels(&c).len(), 2);
        assert_eq!(c.panels().runs.state(), LoadState::Ready);
        assert!(c.panels().runs.error().unwrap().contains("connection refused"));

        let mut failed = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let UiEvent::FetchFailed { panel, .. } = event {
                failed.push(panel);
            }
        }
        assert_eq!(failed, vec![Panel::Runs]);
    }

    #[tokio::test]
    async fn going_up_clears_deeper_panels() {
        let backend = Arc::new(orders_backend());
        let (nav, mut c, _) = setup(backend.clone(), &format!("orders@{RUN}@A.log"));
        c.start();
        c.settle().await.unwrap();

        nav.up().unwrap();
        nav.up().unwrap();
        c.settle().await.unwrap();

        assert_eq!(c.state().to_string(), "orders");
        assert_eq!(c.panels().tasks.state(), LoadState::Cleared);
        assert_eq!(c.panels().log.state(), LoadState::Cleared);
        assert_eq!(c.panels().runs.state(), LoadState::Ready);
        assert_eq!(backend.count(|call| matches!(call, Call::Runs(_))), 1);
    }

    #[tokio::test]
    async fn poll_applies_only_what_is_ready() {
        let backend = Arc::new(orders_backend());
        backend.hold("runs:orders");
        let (_nav, mut c, _) = setup(backend.clone(), "orders");
        c.start();

        pump_until(&mut c, |c| c.in_flight() == 1).await;
        c.poll().unwrap();
        assert_eq!(c.panels().runs.state(), LoadState::Loading);

        backend.release("runs:orders");
        tokio::time::timeout(Duration::from_secs(5), async {
            while c.panels().runs.state() != LoadState::Ready {
                c.poll().unwrap();
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_eq!(labels(&c).len(), 2);
    }

    #[tokio::test]
    async fn inconsistent_graph_is_an_error() {
        let doc = orca_core::GraphDocument::new()
            .with_task("A", "")
            .with_edge("A", "Z");
        let backend = Arc::new(
            ScriptedBackend::new()
                .with_workflows(["orders.orca"])
                .with_graph("orders", doc),
        );
        let (_nav, mut c, _) = setup(backend, "orders");
        c.start();
        let err = c.settle().await.unwrap_err();
        assert!(err.is_contract_violation());
    }
}

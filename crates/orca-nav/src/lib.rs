pub mod controller;
pub mod navigator;
pub mod panel;
pub mod scheduler;
pub mod trigger;

pub use controller::{Controller, Outcome, Payload, Ticket};
pub use navigator::Navigator;
pub use panel::{recent_runs, GraphPanel, ListItem, ListPanel, LoadState, LogPanel, Panels};
pub use scheduler::{PanelAction, PanelKey, RefreshPlan};
pub use trigger::ExecutionTrigger;

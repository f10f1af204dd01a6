mod app;
mod event;
mod input;
mod ui;

use std::sync::Arc;
use std::time::Duration;

use orca_core::event::EventBus;
use orca_nav::{Controller, ExecutionTrigger, Navigator};

/// Launch the terminal UI.
pub async fn run_tui(
    navigator: Arc<Navigator>,
    controller: Controller,
    trigger: ExecutionTrigger,
    event_bus: Arc<EventBus>,
    tick_interval: Duration,
) -> anyhow::Result<()> {
    // Enter raw mode
    crossterm::terminal::enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    crossterm::execute!(
        stdout,
        crossterm::terminal::EnterAlternateScreen,
        crossterm::event::EnableMouseCapture
    )?;

    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let mut app = app::App::new(navigator, controller, trigger);
    let result = app::run_app(&mut terminal, &mut app, event_bus, tick_interval).await;

    // Restore terminal
    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        crossterm::terminal::LeaveAlternateScreen,
        crossterm::event::DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

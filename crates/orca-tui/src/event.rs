use std::io;
use std::time::Duration;

use crossterm::event::{Event as CrosstermEvent, EventStream, KeyEvent, KeyEventKind};
use futures::stream::BoxStream;
use futures::StreamExt;
use orca_core::types::UiEvent;
use tokio::sync::broadcast;
use tokio::time::{interval, Interval, MissedTickBehavior};

/// Events that drive the TUI loop.
#[derive(Debug)]
pub enum TuiEvent {
    /// A key press.
    Key(KeyEvent),
    /// A client event from the EventBus.
    Ui(UiEvent),
    /// Tick timer; fetch results are picked up and spinners advance. Terminal
    /// resizes arrive as ticks too, since every tick redraws.
    Tick,
}

/// Merged event loop: terminal input + EventBus + tick timer.
///
/// Terminal input is read from one long-lived stream, so a key is never
/// lost when another source wins the race.
pub struct EventLoop {
    input: BoxStream<'static, io::Result<CrosstermEvent>>,
    input_open: bool,
    ui_rx: broadcast::Receiver<UiEvent>,
    ticker: Interval,
}

impl EventLoop {
    pub fn new(ui_rx: broadcast::Receiver<UiEvent>, tick_interval: Duration) -> Self {
        Self::with_input(EventStream::new().boxed(), ui_rx, tick_interval)
    }

    pub fn with_input(
        input: BoxStream<'static, io::Result<CrosstermEvent>>,
        ui_rx: broadcast::Receiver<UiEvent>,
        tick_interval: Duration,
    ) -> Self {
        let mut ticker = interval(tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            input,
            input_open: true,
            ui_rx,
            ticker,
        }
    }

    /// Wait for the next event from any source. `None` once the bus is gone.
    pub async fn next(&mut self) -> Option<TuiEvent> {
        tokio::select! {
            result = self.ui_rx.recv() => {
                match result {
                    Ok(evt) => Some(TuiEvent::Ui(evt)),
                    Err(broadcast::error::RecvError::Lagged(_)) => Some(TuiEvent::Tick),
                    Err(_) => None,
                }
            }
            input = self.input.next(), if self.input_open => {
                match input {
                    Some(Ok(CrosstermEvent::Key(key))) if key.kind != KeyEventKind::Release => {
                        Some(TuiEvent::Key(key))
                    }
                    Some(Ok(_)) => Some(TuiEvent::Tick),
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Terminal input failed");
                        Some(TuiEvent::Tick)
                    }
                    None => {
                        self.input_open = false;
                        Some(TuiEvent::Tick)
                    }
                }
            }
            _ = self.ticker.tick() => Some(TuiEvent::Tick),
        }
    }
}

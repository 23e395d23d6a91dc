//! Periodic tick driver
//!
//! Spawns a tokio task that sends a [`Tick`] every period until shut down.
//! The owner of the session receives ticks and calls `tick()` itself, so all
//! session state stays on the owner's task.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

/// One timer tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick;

/// Commands sent to the ticker task
#[derive(Debug)]
pub enum TickerCommand {
    /// Stop ticking
    Shutdown,
}

/// Handle for controlling the ticker task
pub struct TickerHandle {
    pub command_tx: mpsc::Sender<TickerCommand>,
    pub tick_rx: mpsc::Receiver<Tick>,
}

impl TickerHandle {
    /// Ask the ticker to stop; safe to call after it already stopped
    pub async fn shutdown(&self) {
        let _ = self.command_tx.send(TickerCommand::Shutdown).await;
    }
}

/// Spawn the ticker on the current tokio runtime
pub fn spawn_ticker(period: Duration) -> TickerHandle {
    let (command_tx, command_rx) = mpsc::channel(4);
    let (tick_tx, tick_rx) = mpsc::channel(16);

    tokio::spawn(ticker_task(period, command_rx, tick_tx));

    TickerHandle {
        command_tx,
        tick_rx,
    }
}

async fn ticker_task(
    period: Duration,
    mut command_rx: mpsc::Receiver<TickerCommand>,
    tick_tx: mpsc::Sender<Tick>,
) {
    let mut interval = tokio::time::interval(period);
    // A slow owner should see one late tick, not a burst
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick of an interval fires immediately
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if tick_tx.send(Tick).await.is_err() {
                    break;
                }
            }
            cmd = command_rx.recv() => {
                if matches!(cmd, Some(TickerCommand::Shutdown) | None) {
                    break;
                }
            }
        }
    }
}

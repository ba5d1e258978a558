//! Screen signals
//!
//! Typed requests one part of the UI sends to a screen, e.g. the tab bar
//! asking the notes screen to open its composer. Each channel has exactly
//! one receiving screen; signals sent while nobody listens are dropped.

use tokio::sync::mpsc;

/// Something a screen is asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomeSignal {
    /// Open the new-note composer
    ComposeNote,
    /// Focus the todo text input
    FocusTodoInput,
}

/// Sending half, cloneable across widgets
#[derive(Debug, Clone)]
pub struct SignalSender {
    tx: mpsc::UnboundedSender<HomeSignal>,
}

/// Receiving half, owned by one screen
#[derive(Debug)]
pub struct SignalReceiver {
    rx: mpsc::UnboundedReceiver<HomeSignal>,
}

/// Create a connected sender/receiver pair
pub fn channel() -> (SignalSender, SignalReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SignalSender { tx }, SignalReceiver { rx })
}

impl SignalSender {
    /// Deliver a signal; returns false when the screen is gone
    pub fn emit(&self, signal: HomeSignal) -> bool {
        match self.tx.send(signal) {
            Ok(()) => true,
            Err(_) => {
                tracing::debug!("No screen listening for {:?}", signal);
                false
            }
        }
    }
}

impl SignalReceiver {
    /// Next signal, or `None` once every sender is dropped
    pub async fn next(&mut self) -> Option<HomeSignal> {
        self.rx.recv().await
    }

    /// Next signal if one is already queued
    pub fn try_next(&mut self) -> Option<HomeSignal> {
        self.rx.try_recv().ok()
    }
}

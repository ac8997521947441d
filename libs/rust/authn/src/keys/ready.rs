//! Single-fire readiness signal.

use tokio::sync::watch;

/// Announces, exactly once, that a key source finished its initial fetch.
///
/// Clones observe the same signal; any number of tasks may wait on it.
#[derive(Debug, Clone)]
pub struct ReadySignal {
    rx: watch::Receiver<bool>,
}

/// Firing half of a [`ReadySignal`].
#[derive(Debug)]
pub(crate) struct ReadyTrigger {
    tx: watch::Sender<bool>,
}

impl ReadySignal {
    pub(crate) fn new() -> (ReadyTrigger, Self) {
        let (tx, rx) = watch::channel(false);
        (ReadyTrigger { tx }, Self { rx })
    }

    /// A signal that has already fired.
    pub(crate) fn fired() -> Self {
        let (trigger, signal) = Self::new();
        trigger.fire();
        signal
    }

    /// Whether the signal has fired.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        *self.rx.borrow()
    }

    /// Waits until the signal fires.
    ///
    /// Also returns if the owning source is dropped before firing.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        let _ = rx.wait_for(|ready| *ready).await;
    }
}

impl ReadyTrigger {
    /// Fires the signal. Later calls are no-ops.
    pub(crate) fn fire(&self) {
        self.tx.send_if_modified(|ready| !std::mem::replace(ready, true));
    }
}

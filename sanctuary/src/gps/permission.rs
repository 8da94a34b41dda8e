//! Location permission push notifications.

use super::PermissionState;
use tokio::sync::watch;

/// Platform permission status, observed as a stream of changes.
pub trait PermissionSource: Send + Sync {
    /// A receiver holding the current state and notified on every change.
    fn subscribe(&self) -> watch::Receiver<PermissionState>;
}

/// Permission source driven by hand (CLI simulation and tests).
#[derive(Debug)]
pub struct SimulatedPermissions {
    tx: watch::Sender<PermissionState>,
}

impl SimulatedPermissions {
    pub fn new(initial: PermissionState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Publish a new state. Subscribers are notified even if none are live yet.
    pub fn set(&self, state: PermissionState) {
        self.tx.send_replace(state);
    }

    pub fn current(&self) -> PermissionState {
        *self.tx.borrow()
    }
}

impl Default for SimulatedPermissions {
    fn default() -> Self {
        Self::new(PermissionState::Prompt)
    }
}

impl PermissionSource for SimulatedPermissions {
    fn subscribe(&self) -> watch::Receiver<PermissionState> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_sees_changes() {
        let source = SimulatedPermissions::new(PermissionState::Prompt);
        let mut rx = source.subscribe();
        assert_eq!(*rx.borrow(), PermissionState::Prompt);

        source.set(PermissionState::Denied);
        rx.changed().await.expect("sender alive");
        assert_eq!(*rx.borrow_and_update(), PermissionState::Denied);
        assert_eq!(source.current(), PermissionState::Denied);
    }
}

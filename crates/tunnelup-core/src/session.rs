use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info};

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Tunnel session state as reported by the session subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl SessionState {
    #[must_use]
    pub fn is_disconnected(self) -> bool {
        matches!(self, Self::Disconnected)
    }
}

/// The two capabilities the updater needs from the tunnel: read its state and
/// ask it to go down.
#[async_trait]
pub trait SessionControl: Send + Sync {
    fn state(&self) -> SessionState;

    /// Request a disconnect. Completion is observed through [`Self::state`].
    async fn disconnect(&self);
}

/// Brings the session down before an install, within a bounded wait.
#[derive(Clone)]
pub struct DisconnectCoordinator {
    session: Arc<dyn SessionControl>,
    poll_interval: Duration,
}

impl DisconnectCoordinator {
    pub fn new(session: Arc<dyn SessionControl>, poll_interval: Duration) -> Self {
        Self {
            session,
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
        }
    }

    /// Returns `true` once the session is observed disconnected, `false` if
    /// `timeout` elapses first. An already-disconnected session is reported
    /// immediately and no disconnect is requested.
    pub async fn ensure_disconnected(&self, timeout: Duration) -> bool {
        if self.session.state().is_disconnected() {
            debug!("Session already disconnected");
            return true;
        }

        info!("Disconnecting active session before installing update");
        let wait = async {
            self.session.disconnect().await;
            self.wait_for_disconnect().await;
        };

        // The polling future is dropped when the timer wins.
        if tokio::time::timeout(timeout, wait).await.is_ok() {
            info!("Session disconnected");
            true
        } else {
            error!(
                "Session did not disconnect within {}s",
                timeout.as_secs_f32()
            );
            false
        }
    }

    async fn wait_for_disconnect(&self) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if self.session.state().is_disconnected() {
                return;
            }
        }
    }
}

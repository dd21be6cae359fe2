//! Backend warm-up polling.
//!
//! After an upload the backend's model pipeline may still be cold. One
//! cancellable task polls `/api/status` at a fixed interval, folds the raw
//! step/ready signals into a `ReadinessState`, and publishes snapshots on a
//! watch channel. The task stops itself on the first ready response; a new
//! upload cycle cancels any previous task before spawning its own, so at
//! most one poll cycle is ever active.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::backend::{StatusResponse, VisionBackend};

/// Interval between status queries.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How long the completed warm-up display lingers before dismissal. A
/// display concern the orchestration exposes alongside the ready signal, not
/// a correctness requirement of the poller.
pub const READY_GRACE: Duration = Duration::from_millis(1500);

/// Detail shown while the backend is not answering status queries.
pub const UPLINK_WAIT_DETAIL: &str = "Waiting for server uplink...";

/// Snapshot of the warm-up pipeline, published after every poll tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessState {
    /// Phase label, e.g. "LOADING VISION CORE".
    pub message: String,
    /// Scrolling-log detail line.
    pub detail: String,
    /// Pipeline stage, monotonically non-decreasing within a cycle.
    pub step: u32,
    /// Pipeline stage count.
    pub total_steps: u32,
    /// Terminal flag; becomes true exactly once per cycle.
    pub ready: bool,
}

impl Default for ReadinessState {
    fn default() -> Self {
        Self {
            message: "Connecting...".to_string(),
            detail: "Handshake".to_string(),
            step: 0,
            total_steps: 5,
            ready: false,
        }
    }
}

impl ReadinessState {
    /// Fold one status response in. The step index never regresses; a
    /// lower-than-observed step still refreshes the display text.
    fn absorb(&mut self, status: &StatusResponse) {
        self.message = status.message.clone();
        self.detail = status.detail.clone();
        self.total_steps = status.total_steps;
        if status.step > self.step {
            self.step = status.step;
        }
        self.ready = status.ready;
    }
}

/// Controller for the single active polling task.
pub struct ReadinessPoller {
    handle: Option<JoinHandle<()>>,
    cancel: Option<CancellationToken>,
    state_tx: watch::Sender<ReadinessState>,
}

impl ReadinessPoller {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(ReadinessState::default());
        Self {
            handle: None,
            cancel: None,
            state_tx,
        }
    }

    /// Observe state snapshots as the cycle progresses.
    pub fn subscribe(&self) -> watch::Receiver<ReadinessState> {
        self.state_tx.subscribe()
    }

    /// The most recently published state.
    pub fn current(&self) -> ReadinessState {
        self.state_tx.borrow().clone()
    }

    /// Begin a new warm-up cycle, superseding any active one.
    pub async fn start(&mut self, backend: Arc<dyn VisionBackend>) {
        self.stop().await;
        self.state_tx.send_replace(ReadinessState::default());
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(poll_loop(backend, self.state_tx.clone(), cancel.clone()));
        self.handle = Some(handle);
        self.cancel = Some(cancel);
    }

    /// Cancel and join the active cycle, if any.
    pub async fn stop(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                warn!("poll task failed to join: {err}");
            }
        }
    }

    /// Whether a poll cycle is currently running.
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Default for ReadinessPoller {
    fn default() -> Self {
        Self::new()
    }
}

async fn poll_loop(
    backend: Arc<dyn VisionBackend>,
    state_tx: watch::Sender<ReadinessState>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match backend.status().await {
                    Ok(status) => {
                        let ready = status.ready;
                        state_tx.send_modify(|state| state.absorb(&status));
                        if ready {
                            info!("backend pipeline ready");
                            break;
                        }
                        debug!("warm-up step {}/{}: {}", status.step, status.total_steps, status.detail);
                    }
                    Err(err) => {
                        // The backend may still be cold-starting; retry next tick.
                        warn!("status poll failed: {err}");
                        state_tx.send_modify(|state| {
                            state.detail = UPLINK_WAIT_DETAIL.to_string();
                        });
                    }
                }
            }
            () = cancel.cancelled() => {
                debug!("readiness cycle cancelled");
                break;
            }
        }
    }
}

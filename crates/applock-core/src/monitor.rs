//! Idle monitor task
//!
//! Owns the periodic idle check and the host's activity/visibility feed.
//! The task is a scoped resource: dropping the [`MonitorHandle`] aborts it,
//! so no timer outlives the view that mounted the guard.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::guard::LockGuard;
use crate::types::{ActivityKind, Visibility};

/// Host signal delivered to the monitor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuardEvent {
    Activity(ActivityKind),
    Visibility(Visibility),
}

/// Cloneable sender the host's listeners write to
#[derive(Clone, Debug)]
pub struct EventSink {
    sender: mpsc::UnboundedSender<GuardEvent>,
}

impl EventSink {
    /// Returns `false` once the monitor has stopped
    pub fn send(&self, event: GuardEvent) -> bool {
        self.sender.send(event).is_ok()
    }

    pub fn activity(&self, kind: ActivityKind) -> bool {
        self.send(GuardEvent::Activity(kind))
    }

    pub fn visibility(&self, visibility: Visibility) -> bool {
        self.send(GuardEvent::Visibility(visibility))
    }
}

/// Spawns the monitor task for a guard
pub struct IdleMonitor;

impl IdleMonitor {
    /// Start checking `guard` every `config().check_interval`
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(guard: Arc<LockGuard>) -> MonitorHandle {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let period = guard.config().check_interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        guard.check_idle();
                    }
                    event = receiver.recv() => match event {
                        Some(GuardEvent::Activity(kind)) => guard.record_activity(kind),
                        Some(GuardEvent::Visibility(visibility)) => {
                            guard.handle_visibility(visibility)
                        }
                        None => break,
                    },
                }
            }

            debug!("Idle monitor stopped");
        });

        debug!(?period, "Idle monitor started");
        MonitorHandle {
            sink: EventSink { sender },
            task: Some(task),
        }
    }
}

/// Owner of a running monitor task
pub struct MonitorHandle {
    sink: EventSink,
    task: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Sender for the host's activity and visibility listeners
    pub fn sink(&self) -> EventSink {
        self.sink.clone()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop the task and wait for it to finish
    pub async fn shutdown(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

//! One cancellable group for every timer a session registers.
//!
//! Timers do not mutate anything themselves: when they fire they send an
//! event to the session actor, which is the only owner of session state.
//! Tearing the group down is a single [`TaskGroup::cancel_all`] call.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::{AbortHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

/// Timers and background work owned by one session.
pub struct TaskGroup<E> {
    tasks: JoinSet<()>,
    tx: UnboundedSender<E>,
    cancelled: bool,
}

impl<E: Send + 'static> TaskGroup<E> {
    /// Create a group whose timers deliver events through `tx`.
    pub fn new(tx: UnboundedSender<E>) -> Self {
        Self {
            tasks: JoinSet::new(),
            tx,
            cancelled: false,
        }
    }

    /// A sender for tasks that need to emit more than one event.
    pub fn sender(&self) -> UnboundedSender<E> {
        self.tx.clone()
    }

    /// Run `fut` as part of the group.
    ///
    /// Returns `None` once the group has been cancelled; nothing is spawned.
    pub fn spawn<F>(&mut self, fut: F) -> Option<AbortHandle>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.cancelled {
            debug!("task group cancelled, refusing new task");
            return None;
        }
        self.reap();
        Some(self.tasks.spawn(fut))
    }

    /// Deliver `event` once `delay` has elapsed.
    pub fn after(&mut self, delay: Duration, event: E) -> Option<AbortHandle> {
        self.at(Instant::now() + delay, event)
    }

    /// Deliver `event` at `deadline`.
    pub fn at(&mut self, deadline: Instant, event: E) -> Option<AbortHandle> {
        let tx = self.tx.clone();
        self.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = tx.send(event);
        })
    }

    /// Deliver `make()` every `period`, first one `period` from now.
    ///
    /// Stops on its own if the event receiver goes away.
    pub fn every<F>(&mut self, period: Duration, mut make: F) -> Option<AbortHandle>
    where
        F: FnMut() -> E + Send + 'static,
    {
        let tx = self.tx.clone();
        self.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if tx.send(make()).is_err() {
                    break;
                }
            }
        })
    }

    /// Abort every task in the group and refuse further registrations.
    ///
    /// Returns the number of tasks that were still live.
    pub fn cancel_all(&mut self) -> usize {
        self.reap();
        let live = self.tasks.len();
        self.cancelled = true;
        self.tasks.abort_all();
        live
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Number of tasks not yet reaped.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn reap(&mut self) {
        while self.tasks.try_join_next().is_some() {}
    }
}

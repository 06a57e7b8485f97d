//! Single-slot completion for `go` requests.

use parking_lot::{Condvar, Mutex};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::Duration;

/// How a `go` request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoOutcome {
    /// The simulator ran for the requested time and paused.
    Completed,
    /// A newer `go` from the same handle replaced this one.
    Superseded,
    /// Cancelled by the caller or the handle was dropped.
    Cancelled,
}

pub(crate) type Callback = Box<dyn FnOnce(GoOutcome) + Send>;

#[derive(Default)]
struct Slot {
    outcome: Option<GoOutcome>,
    waker: Option<Waker>,
    callback: Option<Callback>,
}

pub(crate) struct Shared {
    slot: Mutex<Slot>,
    resolved: Condvar,
}

impl Shared {
    pub(crate) fn new(callback: Option<Callback>) -> Arc<Self> {
        Arc::new(Self {
            slot: Mutex::new(Slot {
                callback,
                ..Slot::default()
            }),
            resolved: Condvar::new(),
        })
    }

    /// Settle the completion once; later calls are ignored.
    pub(crate) fn resolve(&self, outcome: GoOutcome) -> bool {
        let (waker, callback) = {
            let mut slot = self.slot.lock();
            if slot.outcome.is_some() {
                return false;
            }
            slot.outcome = Some(outcome);
            (slot.waker.take(), slot.callback.take())
        };
        self.resolved.notify_all();
        if let Some(waker) = waker {
            waker.wake();
        }
        if let Some(callback) = callback {
            callback(outcome);
        }
        true
    }
}

/// Pending result of [`SimulationIface::go`](super::SimulationIface::go).
///
/// Wait on it, poll it, `.await` it or cancel it. Only the most recent `go`
/// of a handle can complete; older ones resolve as
/// [`GoOutcome::Superseded`].
#[derive(Clone)]
pub struct GoCompletion {
    shared: Arc<Shared>,
}

impl GoCompletion {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Block until resolved.
    pub fn wait(&self) -> GoOutcome {
        let mut slot = self.shared.slot.lock();
        loop {
            if let Some(outcome) = slot.outcome {
                return outcome;
            }
            self.shared.resolved.wait(&mut slot);
        }
    }

    /// Block until resolved or `timeout` elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<GoOutcome> {
        let mut slot = self.shared.slot.lock();
        if slot.outcome.is_none() {
            let _ = self
                .shared
                .resolved
                .wait_while_for(&mut slot, |slot| slot.outcome.is_none(), timeout);
        }
        slot.outcome
    }

    /// Outcome if already resolved.
    pub fn try_outcome(&self) -> Option<GoOutcome> {
        self.shared.slot.lock().outcome
    }

    /// Resolve as cancelled. Returns `false` if it had already resolved.
    pub fn cancel(&self) -> bool {
        self.shared.resolve(GoOutcome::Cancelled)
    }
}

impl std::fmt::Debug for GoCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoCompletion")
            .field("outcome", &self.try_outcome())
            .finish()
    }
}

impl Future for GoCompletion {
    type Output = GoOutcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<GoOutcome> {
        let mut slot = self.shared.slot.lock();
        match slot.outcome {
            Some(outcome) => Poll::Ready(outcome),
            None => {
                slot.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn resolves_once() {
        let shared = Shared::new(None);
        let completion = GoCompletion::new(Arc::clone(&shared));
        assert_eq!(completion.try_outcome(), None);
        assert!(shared.resolve(GoOutcome::Completed));
        assert!(!shared.resolve(GoOutcome::Superseded));
        assert!(!completion.cancel());
        assert_eq!(completion.wait(), GoOutcome::Completed);
    }

    #[test]
    fn wait_blocks_until_resolved() {
        let shared = Shared::new(None);
        let completion = GoCompletion::new(Arc::clone(&shared));
        let resolver = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            shared.resolve(GoOutcome::Completed);
        });
        assert_eq!(completion.wait(), GoOutcome::Completed);
        resolver.join().unwrap();
    }

    #[test]
    fn wait_timeout_expires() {
        let completion = GoCompletion::new(Shared::new(None));
        assert_eq!(completion.wait_timeout(Duration::from_millis(5)), None);
        assert!(completion.cancel());
        assert_eq!(
            completion.wait_timeout(Duration::from_millis(5)),
            Some(GoOutcome::Cancelled)
        );
    }

    #[test]
    fn callback_runs_with_outcome() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let shared = Shared::new(Some(Box::new(move |outcome| {
            assert_eq!(outcome, GoOutcome::Superseded);
            seen.fetch_add(1, Ordering::SeqCst);
        })));
        shared.resolve(GoOutcome::Superseded);
        shared.resolve(GoOutcome::Completed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

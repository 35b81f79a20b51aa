//! Coalesced flush scheduling.
//!
//! Repeated render triggers (every `add` on a live page can request a
//! re-render) are coalesced into one delayed flush: an explicit pending
//! flag plus one scheduled callback handle. Cancellation discards a
//! not-yet-fired handle; the next trigger installs a new one. The graph
//! engine knows nothing about any of this.

use tracing::trace;

/// Host-environment scheduling. Implementations decide what "later"
/// means (a timeout, a microtask, a frame); tests drive a manual queue.
pub trait Scheduler {
    type Handle;

    /// Schedule `callback` to run later, returning a cancellation handle.
    fn schedule(&mut self, callback: Box<dyn FnOnce() + Send>) -> Self::Handle;

    /// Discard a not-yet-fired handle. Firing an already-cancelled
    /// callback must not happen.
    fn cancel(&mut self, handle: Self::Handle);
}

/// The debounced flush wrapper: at most one scheduled flush at a time.
pub struct Debounced<S: Scheduler> {
    scheduler: S,
    pending: Option<S::Handle>,
}

impl<S: Scheduler> Debounced<S> {
    pub fn new(scheduler: S) -> Self {
        Self {
            scheduler,
            pending: None,
        }
    }

    /// Request a flush. While one is already pending the request
    /// coalesces into it and `flush` is dropped unscheduled.
    pub fn trigger<F>(&mut self, flush: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.pending.is_some() {
            trace!("flush already pending, coalescing");
            return;
        }
        self.pending = Some(self.scheduler.schedule(Box::new(flush)));
    }

    /// Cancel the pending flush, if any.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            self.scheduler.cancel(handle);
        }
    }

    /// The host environment reports that the scheduled callback fired;
    /// the next trigger schedules anew.
    pub fn mark_flushed(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }
}

/// A manually pumped scheduler: callbacks queue until `fire_all`.
/// Handles are monotonically assigned ids, so a stale handle from an
/// already-fired callback can never cancel a newer one.
#[derive(Default)]
pub struct ManualScheduler {
    next_id: usize,
    queue: Vec<(usize, Box<dyn FnOnce() + Send>)>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every still-scheduled callback, in scheduling order.
    pub fn fire_all(&mut self) -> usize {
        let queue = std::mem::take(&mut self.queue);
        let fired = queue.len();
        for (_, callback) in queue {
            callback();
        }
        fired
    }

    pub fn scheduled(&self) -> usize {
        self.queue.len()
    }
}

impl Scheduler for ManualScheduler {
    type Handle = usize;

    fn schedule(&mut self, callback: Box<dyn FnOnce() + Send>) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        self.queue.push((id, callback));
        id
    }

    fn cancel(&mut self, handle: usize) {
        self.queue.retain(|(id, _)| *id != handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> Box<dyn FnOnce() + Send>) {
        let count = Arc::new(AtomicUsize::new(0));
        let make = {
            let count = Arc::clone(&count);
            move || {
                let count = Arc::clone(&count);
                Box::new(move || {
                    count.fetch_add(1, Ordering::SeqCst);
                }) as Box<dyn FnOnce() + Send>
            }
        };
        (count, make)
    }

    #[test]
    fn repeated_triggers_coalesce_into_one_flush() {
        let (count, make) = counter();
        let mut debounced = Debounced::new(ManualScheduler::new());
        for _ in 0..5 {
            let flush = make();
            debounced.trigger(move || flush());
        }
        assert!(debounced.is_pending());
        assert_eq!(debounced.scheduler_mut().fire_all(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancel_discards_the_pending_handle() {
        let (count, make) = counter();
        let mut debounced = Debounced::new(ManualScheduler::new());
        let flush = make();
        debounced.trigger(move || flush());
        debounced.cancel();
        assert!(!debounced.is_pending());
        assert_eq!(debounced.scheduler_mut().fire_all(), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn a_new_trigger_schedules_after_the_last_flush_fired() {
        let (count, make) = counter();
        let mut debounced = Debounced::new(ManualScheduler::new());

        let flush = make();
        debounced.trigger(move || flush());
        debounced.scheduler_mut().fire_all();
        debounced.mark_flushed();

        let flush = make();
        debounced.trigger(move || flush());
        debounced.scheduler_mut().fire_all();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}

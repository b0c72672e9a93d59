use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use tracing::debug;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Delivers callbacks from the render thread to the caller's thread.
pub trait Dispatcher: Send + Sync {
    fn post(&self, task: Task);
}

/// Runs tasks directly on the render thread.
///
/// Suitable for headless hosts that hand results off through their own
/// channel; a task must not block on the engine that posted it.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineDispatcher;

impl Dispatcher for InlineDispatcher {
    fn post(&self, task: Task) {
        task();
    }
}

/// Queues tasks for a host loop that drains a [`DispatchQueue`].
#[derive(Debug, Clone)]
pub struct ChannelDispatcher {
    tx: Sender<Task>,
}

/// Receiving half of a [`ChannelDispatcher`], owned by the host thread.
#[derive(Debug)]
pub struct DispatchQueue {
    rx: Receiver<Task>,
}

impl ChannelDispatcher {
    pub fn new() -> (Self, DispatchQueue) {
        let (tx, rx) = unbounded();
        (Self { tx }, DispatchQueue { rx })
    }
}

impl Dispatcher for ChannelDispatcher {
    fn post(&self, task: Task) {
        if self.tx.send(task).is_err() {
            debug!("dispatch queue dropped; callback discarded");
        }
    }
}

impl DispatchQueue {
    /// Runs every task queued so far and returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Waits up to `timeout` for one task and runs it.
    pub fn run_next_timeout(&self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(task) => {
                task();
                true
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    #[test]
    fn channel_dispatcher_defers_until_drained() {
        let (dispatcher, queue) = ChannelDispatcher::new();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let hits = Arc::clone(&hits);
            dispatcher.post(Box::new(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(queue.run_pending(), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert!(!queue.run_next_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn post_after_queue_drop_is_silent() {
        let (dispatcher, queue) = ChannelDispatcher::new();
        drop(queue);
        dispatcher.post(Box::new(|| panic!("must not run")));
    }

    #[test]
    fn inline_dispatcher_runs_immediately() {
        let hits = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&hits);
        InlineDispatcher.post(Box::new(move || {
            inner.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError,
};

use tokio::sync::oneshot;

/// Delivers a result to a single waiting caller exactly once.
///
/// Completion and cancellation may race from different threads; whichever wins the
/// compare-and-set hands its value to the receiver and every later call is ignored.
pub struct ResumeOnce<T> {
    resumed: AtomicBool,
    sender: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> ResumeOnce<T> {
    pub fn channel() -> (Arc<Self>, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        let guard = Arc::new(Self {
            resumed: AtomicBool::new(false),
            sender: Mutex::new(Some(tx)),
        });
        (guard, rx)
    }

    /// Returns `true` if this call delivered the value.
    pub fn resume(&self, value: T) -> bool {
        if self
            .resumed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match sender {
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        }
    }
}

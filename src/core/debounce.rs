use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Cancelable trailing-edge debounce timer.
///
/// Each `schedule` supersedes the previous one: only the most recently
/// scheduled callback can fire, and only after `delay` of quiet. `cancel`
/// and `Drop` guarantee that no pending callback fires.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    generation: Arc<AtomicU64>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Run `callback` after the quiet period unless superseded first.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(&self, callback: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let armed = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = Arc::clone(&self.generation);
        let delay = self.delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if generation.load(Ordering::SeqCst) == armed {
                callback.await;
            } else {
                tracing::trace!("Debounced callback {} superseded", armed);
            }
        });
    }

    /// Drop any pending callback
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

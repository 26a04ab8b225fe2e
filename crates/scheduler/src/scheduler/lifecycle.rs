use std::sync::atomic::Ordering;

use tracing::{debug, info};

use super::Scheduler;

impl Scheduler {
    /// Stop dispatching.
    ///
    /// No further tasks are dequeued; anything still queued is marked
    /// Cancelled. With `drain_pending`, blocks until tasks already handed to
    /// the workers have finished. Otherwise returns right away and running
    /// tasks finish in the background. Calling this more than once is a no-op.
    pub fn shutdown(&self, drain_pending: bool) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Scheduler shutdown requested (drain: {})", drain_pending);

        self.queue.close();
        let dispatcher = self.dispatcher.lock().take();

        if drain_pending {
            // Let the dispatcher finish any hand-off it is in the middle of.
            if let Some(dispatcher) = dispatcher {
                dispatcher.join();
            }
            self.pool.close();
            self.pool.wait_idle();
        } else {
            self.pool.close();
            // Detach: the thread exits on its own now that the queue is closed.
            drop(dispatcher);
        }

        let leftover = self.queue.drain();
        let abandoned = leftover
            .iter()
            .filter(|task| matches!(self.registry.cancel(task.id()), Ok(true)))
            .count();
        if abandoned > 0 {
            debug!("{} queued tasks cancelled by shutdown", abandoned);
        }

        info!("Scheduler stopped");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown(self.config.drain_on_shutdown);
    }
}

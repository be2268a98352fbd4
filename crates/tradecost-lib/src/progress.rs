use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use tracing::info;

/// Thread-safe completion counter that logs every tenth of the work.
pub(crate) struct Progress {
    label: &'static str,
    total: usize,
    done: AtomicUsize,
    started: Instant,
}

impl Progress {
    pub(crate) fn new(label: &'static str, total: usize) -> Self {
        Self {
            label,
            total,
            done: AtomicUsize::new(0),
            started: Instant::now(),
        }
    }

    pub(crate) fn tick(&self) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        let step = (self.total / 10).max(1);
        if done % step == 0 || done == self.total {
            info!(
                stage = self.label,
                done,
                total = self.total,
                percent = 100 * done / self.total.max(1),
                elapsed_s = self.started.elapsed().as_secs(),
                "progress"
            );
        }
    }
}

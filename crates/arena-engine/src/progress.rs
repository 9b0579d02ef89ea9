//! Progress reporting for long tournaments

use tracing::info;

/// Told once per completed matchup repetition and once at the end.
pub trait ProgressObserver: Send {
    fn advance(&mut self);
    fn close(&mut self);
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn advance(&mut self) {}
    fn close(&mut self) {}
}

/// Logs progress through `tracing` every tenth of the way.
#[derive(Debug, Clone)]
pub struct LogProgress {
    total: usize,
    done: usize,
    step: usize,
}

impl LogProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            done: 0,
            step: (total / 10).max(1),
        }
    }

    pub fn done(&self) -> usize {
        self.done
    }
}

impl ProgressObserver for LogProgress {
    fn advance(&mut self) {
        self.done += 1;
        if self.done % self.step == 0 || self.done == self.total {
            info!(done = self.done, total = self.total, "playing matches");
        }
    }

    fn close(&mut self) {
        info!(done = self.done, total = self.total, "finished playing matches");
    }
}

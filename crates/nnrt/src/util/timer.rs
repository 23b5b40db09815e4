use std::time::{Duration, Instant};

/// Measures the wall time of one op sequence run.
pub trait Timer: Send {
    fn start(&mut self);
    fn end(&mut self);
    /// Time between the last `start`/`end` pair.
    fn elapsed(&self) -> Duration;
}

/// Host clock timer.
#[derive(Debug, Default)]
pub struct CpuTimer {
    started: Option<Instant>,
    elapsed: Duration,
}

impl CpuTimer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Timer for CpuTimer {
    fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    fn end(&mut self) {
        if let Some(started) = self.started.take() {
            self.elapsed = started.elapsed();
        }
    }

    fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

use std::time::{Duration, Instant};

/// Wall time of one unit of work, split into the database-only portion
/// (`pure`) and everything including materialization (`full`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimingSplit {
    full: Duration,
    pure: Duration,
}

impl TimingSplit {
    /// `full` is raised to `pure` if a caller measured them inconsistently.
    pub fn new(full: Duration, pure: Duration) -> Self {
        Self {
            full: full.max(pure),
            pure,
        }
    }

    /// Used when the phases cannot be separated, e.g. a foreign process.
    pub fn undivided(elapsed: Duration) -> Self {
        Self::new(elapsed, elapsed)
    }

    pub fn full(&self) -> Duration {
        self.full
    }

    pub fn pure(&self) -> Duration {
        self.pure
    }

    pub fn overhead(&self) -> Duration {
        self.full - self.pure
    }

    /// Adds time spent outside the strategy (batch materialization).
    pub fn with_overhead(self, extra: Duration) -> Self {
        Self::new(self.full + extra, self.pure)
    }
}

/// Rows per second, or `None` when either operand is zero.
pub fn rate(rows: usize, elapsed: Duration) -> Option<f64> {
    let seconds = elapsed.as_secs_f64();
    if rows == 0 || seconds <= 0.0 {
        return None;
    }
    let value = rows as f64 / seconds;
    value.is_finite().then_some(value)
}

/// Measures the full and pure phases of a strategy invocation.
pub struct Stopwatch {
    started: Instant,
    pure: Duration,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            pure: Duration::ZERO,
        }
    }

    /// Times `f` as part of the pure phase.
    pub async fn pure<F, T>(&mut self, f: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        let begin = Instant::now();
        let out = f.await;
        self.pure += begin.elapsed();
        out
    }

    pub fn finish(self) -> TimingSplit {
        TimingSplit::new(self.started.elapsed(), self.pure)
    }
}

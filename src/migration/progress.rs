//! Rate/ETA progress logging and per-stage wall-clock accounting for long
//! migration runs.

use std::time::{Duration, Instant};
use tracing::info;

/// Progress logging interval (rows). Override with env PROGRESS_INTERVAL.
pub fn progress_interval() -> usize {
    std::env::var("PROGRESS_INTERVAL")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(500)
}

#[derive(Clone)]
pub struct Progress {
    label: String,
    total: Option<usize>,
    every: usize,
    start: Instant,
    last_log: Instant,
    processed: usize,
}

impl Progress {
    pub fn new<L: Into<String>>(label: L, total: Option<usize>) -> Self {
        let now = Instant::now();
        Self {
            label: label.into(),
            total,
            every: progress_interval(),
            start: now,
            last_log: now,
            processed: 0,
        }
    }

    pub fn tick(&mut self, n: usize) {
        self.processed += n;
        if self.processed == n || self.processed % self.every == 0 {
            self.log(false);
        }
    }

    pub fn finish(&mut self) {
        self.log(true);
    }

    fn log(&mut self, done: bool) {
        let now = Instant::now();
        if !done && now.duration_since(self.last_log) < Duration::from_millis(200) {
            // Avoid log-spam if the interval is very small and the loop is fast
            return;
        }
        self.last_log = now;

        let elapsed = now.duration_since(self.start).as_secs_f64().max(0.001);
        let rate = (self.processed as f64) / elapsed;
        match self.total {
            Some(t) => {
                let pct = (100.0 * (self.processed as f64)) / (t as f64).max(1.0);
                let remaining = t.saturating_sub(self.processed);
                let eta = if self.processed > 0 {
                    (remaining as f64) * (elapsed / (self.processed as f64))
                } else {
                    0.0
                };
                if done {
                    info!(target: "progress", label=%self.label, processed=self.processed, total=t, pct=?format!("{:.1}", pct), rate=?format!("{:.1}/s", rate), took=?format!("{:.1}s", elapsed), "done");
                } else {
                    info!(target: "progress", label=%self.label, processed=self.processed, remaining, total=t, pct=?format!("{:.1}", pct), rate=?format!("{:.1}/s", rate), eta=?format!("{:.1}s", eta), "progress");
                }
            }
            None if done => {
                info!(target: "progress", label=%self.label, processed=self.processed, rate=?format!("{:.1}/s", rate), took=?format!("{:.1}s", elapsed), "done");
            }
            None => {
                info!(target: "progress", label=%self.label, processed=self.processed, rate=?format!("{:.1}/s", rate), "progress");
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct StageTiming {
    pub name: String,
    pub elapsed: Duration,
    pub success: bool,
}

impl StageTiming {
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

/// Emit the slowest-first stage breakdown collected during a run.
pub fn emit_stage_summary(timings: &[StageTiming]) {
    if timings.is_empty() {
        return;
    }
    let mut timings = timings.to_vec();
    timings.sort_by_key(|t| std::cmp::Reverse(t.elapsed));
    let total = timings
        .iter()
        .fold(Duration::ZERO, |acc, timing| acc + timing.elapsed);
    info!(
        target: "metrics",
        stages = timings.len(),
        total_ms = format!("{:.2}", total.as_secs_f64() * 1000.0),
        "migration stage timing summary"
    );
    for timing in timings {
        let pct = if total.as_nanos() == 0 {
            0.0
        } else {
            (timing.elapsed.as_secs_f64() / total.as_secs_f64()) * 100.0
        };
        info!(
            target: "metrics",
            stage = %timing.name,
            took_ms = format!("{:.2}", timing.elapsed_ms()),
            pct = format!("{:.1}", pct),
            success = timing.success,
            "stage timing detail"
        );
    }
}

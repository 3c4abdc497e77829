use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::insights::durations;

const UPDATE_INTERVAL: Duration = Duration::from_secs(10);

/// Progress reporting for the build-processing pass.
///
/// Observational only: rate-limited to a fixed wall-clock interval, with an
/// estimated time remaining projected from the observed fetch rate. Never
/// affects delivery order or pipeline state.
pub struct ProcessingProgress {
    bar: ProgressBar,
    total: usize,
    started: Instant,
    last_update: Instant,
}

impl ProcessingProgress {
    pub fn start(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        bar.set_draw_target(ProgressDrawTarget::stderr());
        bar.set_style(
            ProgressStyle::default_bar()
                .template("  {bar:30} {percent}% complete {msg}")
                .unwrap(),
        );

        Self {
            bar,
            total,
            started: Instant::now(),
            last_update: Instant::now(),
        }
    }

    /// Safe to call once per build; redraws at most every `UPDATE_INTERVAL`.
    pub fn observe(&mut self, processed: usize, fetched: usize) {
        if self.last_update.elapsed() < UPDATE_INTERVAL {
            return;
        }
        self.last_update = Instant::now();

        self.bar.set_position(processed as u64);
        self.bar
            .set_message(estimate_remaining(self.started, self.total, processed, fetched));
    }

    pub fn finish(self, processed: usize, fetched: usize) {
        self.bar.set_position(processed as u64);
        self.bar.finish_with_message(format!(
            "({fetched} builds fetched from API, {processed} builds processed)"
        ));
    }
}

/// Projects the observed fetch rate over the remaining unprocessed builds.
fn estimate_remaining(started: Instant, total: usize, processed: usize, fetched: usize) -> String {
    let elapsed = started.elapsed().as_secs_f64();
    if fetched == 0 || elapsed <= 0.0 {
        return String::new();
    }

    let rate_per_second = fetched as f64 / elapsed;
    let remaining = total.saturating_sub(processed) as f64;
    let eta = chrono::Duration::seconds((remaining / rate_per_second) as i64);
    format!("({} remaining)", durations::format(eta))
}

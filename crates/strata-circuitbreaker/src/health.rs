//! Time-windowed success/failure accounting.

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use strata_core::SharedTimeProvider;

const WINDOW_COUNT: u32 = 10;
const RESOLUTION: Duration = Duration::from_millis(20);

/// Health of the guarded operation over the sampling duration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HealthInfo {
    /// Number of sampled calls.
    pub throughput: u32,
    /// Share of sampled calls that failed, in `0.0..=1.0`.
    pub failure_rate: f64,
    pub failure_count: u32,
}

impl HealthInfo {
    pub fn from_counts(successes: u32, failures: u32) -> Self {
        let throughput = successes.saturating_add(failures);
        let failure_rate = if throughput == 0 {
            0.0
        } else {
            f64::from(failures) / f64::from(throughput)
        };

        Self {
            throughput,
            failure_rate,
            failure_count: failures,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct HealthWindow {
    started_at: Instant,
    successes: u32,
    failures: u32,
}

impl HealthWindow {
    fn new(started_at: Instant) -> Self {
        Self {
            started_at,
            successes: 0,
            failures: 0,
        }
    }
}

/// Success/failure counters over a sampling duration.
///
/// Short sampling durations use one window that is reset wholesale once it
/// expires. Longer ones are split into ten rolling sub-windows so that old
/// samples decay gradually.
#[derive(Debug)]
pub struct HealthMetrics {
    sampling_duration: Duration,
    window_duration: Duration,
    rolling: bool,
    windows: VecDeque<HealthWindow>,
    time: SharedTimeProvider,
}

impl HealthMetrics {
    pub fn new(sampling_duration: Duration, time: SharedTimeProvider) -> Self {
        let rolling = sampling_duration >= RESOLUTION * WINDOW_COUNT;
        let window_duration = if rolling {
            sampling_duration / WINDOW_COUNT
        } else {
            sampling_duration
        };

        Self {
            sampling_duration,
            window_duration,
            rolling,
            windows: VecDeque::with_capacity(WINDOW_COUNT as usize + 1),
            time,
        }
    }

    /// True when samples decay through rolling sub-windows.
    pub fn is_rolling(&self) -> bool {
        self.rolling
    }

    pub fn increment_success(&mut self) {
        let window = self.current_window();
        window.successes = window.successes.saturating_add(1);
    }

    pub fn increment_failure(&mut self) {
        let window = self.current_window();
        window.failures = window.failures.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.windows.clear();
    }

    pub fn health_info(&mut self) -> HealthInfo {
        self.current_window();

        let (successes, failures) = self.windows.iter().fold((0u32, 0u32), |(s, f), w| {
            (s.saturating_add(w.successes), f.saturating_add(w.failures))
        });
        HealthInfo::from_counts(successes, failures)
    }

    fn current_window(&mut self) -> &mut HealthWindow {
        let now = self.time.now();

        let expired = self
            .windows
            .back()
            .map_or(true, |w| now.saturating_duration_since(w.started_at) >= self.window_duration);
        if expired {
            if !self.rolling {
                self.windows.clear();
            }
            self.windows.push_back(HealthWindow::new(now));
        }

        while let Some(oldest) = self.windows.front() {
            if now.saturating_duration_since(oldest.started_at) >= self.sampling_duration {
                self.windows.pop_front();
            } else {
                break;
            }
        }

        // A zero sampling duration evicts even the window pushed above.
        if self.windows.is_empty() {
            self.windows.push_back(HealthWindow::new(now));
        }
        let last = self.windows.len() - 1;
        &mut self.windows[last]
    }
}

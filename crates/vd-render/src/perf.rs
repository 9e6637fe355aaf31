//! Frame timing.
//!
//! The host brackets each frame with `begin_frame(now)` / `end_frame(now)`
//! using any monotonic millisecond clock. FPS comes from the spacing of
//! frame starts over a rolling window, frame time from the brackets.
//! Iterations that skip painting call `tick(now)` instead.

use std::collections::VecDeque;

/// Assumed until two frames have been observed.
pub const NOMINAL_FPS: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceMetrics {
    pub fps: f64,
    /// Duration of the last completed frame.
    pub frame_time_ms: f64,
    pub avg_frame_time_ms: f64,
    pub frame_count: u64,
    /// Frames that exceeded the budget.
    pub slow_frames: u64,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self {
            fps: NOMINAL_FPS,
            frame_time_ms: 0.0,
            avg_frame_time_ms: 0.0,
            frame_count: 0,
            slow_frames: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PerformanceMonitor {
    window: usize,
    budget_ms: f64,
    frame_start: Option<f64>,
    last_begin: Option<f64>,
    intervals: VecDeque<f64>,
    durations: VecDeque<f64>,
    metrics: PerformanceMetrics,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(60, 1000.0 / NOMINAL_FPS)
    }
}

impl PerformanceMonitor {
    pub fn new(window: usize, budget_ms: f64) -> Self {
        Self {
            window: window.max(1),
            budget_ms,
            frame_start: None,
            last_begin: None,
            intervals: VecDeque::new(),
            durations: VecDeque::new(),
            metrics: PerformanceMetrics::default(),
        }
    }

    pub fn begin_frame(&mut self, now_ms: f64) {
        self.tick(now_ms);
        self.frame_start = Some(now_ms);
    }

    /// Count a loop iteration that painted nothing. Keeps frame spacing
    /// honest across idle stretches without adding a frame duration.
    pub fn tick(&mut self, now_ms: f64) {
        if let Some(prev) = self.last_begin {
            let dt = now_ms - prev;
            if dt > 0.0 {
                push_bounded(&mut self.intervals, dt, self.window);
                let avg = mean(&self.intervals);
                self.metrics.fps = 1000.0 / avg;
            }
        }
        self.last_begin = Some(now_ms);
    }

    pub fn end_frame(&mut self, now_ms: f64) {
        let Some(start) = self.frame_start.take() else {
            log::trace!("perf: end_frame without begin_frame");
            return;
        };
        let duration = (now_ms - start).max(0.0);
        push_bounded(&mut self.durations, duration, self.window);
        self.metrics.frame_time_ms = duration;
        self.metrics.avg_frame_time_ms = mean(&self.durations);
        self.metrics.frame_count += 1;
        if duration > self.budget_ms {
            self.metrics.slow_frames += 1;
            log::trace!("perf: slow frame {duration:.2}ms (budget {:.2}ms)", self.budget_ms);
        }
    }

    pub fn get_metrics(&self) -> PerformanceMetrics {
        self.metrics
    }

    /// Forget timing history, e.g. after the loop was paused.
    pub fn reset(&mut self) {
        self.frame_start = None;
        self.last_begin = None;
        self.intervals.clear();
        self.durations.clear();
        self.metrics.fps = NOMINAL_FPS;
    }
}

fn push_bounded(buf: &mut VecDeque<f64>, value: f64, cap: usize) {
    if buf.len() == cap {
        buf.pop_front();
    }
    buf.push_back(value);
}

fn mean(buf: &VecDeque<f64>) -> f64 {
    if buf.is_empty() {
        return 0.0;
    }
    buf.iter().sum::<f64>() / buf.len() as f64
}

//! Latency histograms: a periodic window that restarts on every marker and a
//! cumulative window that lives as long as the process.
//!
//! Latencies are whole milliseconds. Both windows track 1 ms .. 10 000 000 ms
//! with 3 significant figures.

use hdrhistogram::Histogram;
use std::fmt;
use streamlat_common::{Result, StreamError};

pub const LOWEST_DISCERNIBLE_MS: u64 = 1;
pub const HIGHEST_TRACKABLE_MS: u64 = 10_000_000;
pub const SIGNIFICANT_FIGURES: u8 = 3;

/// How a sample had to be adjusted to fit the histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clamp {
    None,
    /// Negative latency (sender clock ahead of ours), recorded as 0.
    Low,
    /// Above `HIGHEST_TRACKABLE_MS`, recorded as that value.
    High,
}

/// Spread of a non-empty window, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencySpread {
    pub min_ms: u64,
    pub max_ms: u64,
    pub mean_ms: f64,
    pub p99_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSummary {
    pub count: u64,
    /// `None` when nothing was recorded.
    pub latency: Option<LatencySpread>,
    pub clamped: u64,
}

pub struct LatencyWindow {
    histogram: Histogram<u64>,
    clamped_low: u64,
    clamped_high: u64,
}

impl LatencyWindow {
    pub fn new() -> Result<Self> {
        let histogram = Histogram::new_with_bounds(
            LOWEST_DISCERNIBLE_MS,
            HIGHEST_TRACKABLE_MS,
            SIGNIFICANT_FIGURES,
        )
        .map_err(|e| StreamError::Histogram(format!("{e:?}")))?;

        Ok(Self { histogram, clamped_low: 0, clamped_high: 0 })
    }

    pub fn record(&mut self, latency_ms: i64) -> Clamp {
        if latency_ms < 0 {
            self.clamped_low += 1;
            self.histogram.saturating_record(0);
            return Clamp::Low;
        }

        let value = latency_ms as u64;
        if value > HIGHEST_TRACKABLE_MS {
            self.clamped_high += 1;
            self.histogram.saturating_record(HIGHEST_TRACKABLE_MS);
            return Clamp::High;
        }

        self.histogram.saturating_record(value);
        Clamp::None
    }

    pub fn count(&self) -> u64 {
        self.histogram.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histogram.is_empty()
    }

    /// Value at or below which `percentile`% of samples fall; `None` when empty.
    /// `0.0` gives the minimum and `100.0` the maximum.
    ///
    /// Buckets near the top of the range report a highest-equivalent value
    /// slightly above `HIGHEST_TRACKABLE_MS`; results are capped at that bound.
    pub fn value_at_percentile(&self, percentile: f64) -> Option<u64> {
        if self.is_empty() {
            return None;
        }
        Some(self.histogram.value_at_percentile(percentile).min(HIGHEST_TRACKABLE_MS))
    }

    pub fn mean(&self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        Some(self.histogram.mean().min(HIGHEST_TRACKABLE_MS as f64))
    }

    /// Samples that were clamped low or high since the last reset.
    pub fn clamped(&self) -> u64 {
        self.clamped_low + self.clamped_high
    }

    pub fn summary(&self) -> WindowSummary {
        let latency = match (
            self.value_at_percentile(0.0),
            self.value_at_percentile(100.0),
            self.mean(),
            self.value_at_percentile(99.0),
        ) {
            (Some(min_ms), Some(max_ms), Some(mean_ms), Some(p99_ms)) => {
                Some(LatencySpread { min_ms, max_ms, mean_ms, p99_ms })
            }
            _ => None,
        };

        WindowSummary { count: self.count(), latency, clamped: self.clamped() }
    }

    pub fn reset(&mut self) {
        self.histogram.reset();
        self.clamped_low = 0;
        self.clamped_high = 0;
    }
}

/// Periodic + cumulative windows, fed together.
pub struct LatencyTracker {
    periodic: LatencyWindow,
    cumulative: LatencyWindow,
}

impl LatencyTracker {
    pub fn new() -> Result<Self> {
        Ok(Self {
            periodic: LatencyWindow::new()?,
            cumulative: LatencyWindow::new()?,
        })
    }

    /// Record one sample into both windows.
    pub fn record(&mut self, latency_ms: i64) -> Clamp {
        self.cumulative.record(latency_ms);
        self.periodic.record(latency_ms)
    }

    pub fn periodic(&self) -> &LatencyWindow {
        &self.periodic
    }

    pub fn cumulative(&self) -> &LatencyWindow {
        &self.cumulative
    }

    /// Summarize both windows, then start a new periodic window.
    pub fn report_and_reset_periodic(&mut self) -> LatencyReport {
        let report = LatencyReport {
            periodic: self.periodic.summary(),
            cumulative: self.cumulative.summary(),
        };
        self.periodic.reset();
        report
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyReport {
    pub periodic: WindowSummary,
    pub cumulative: WindowSummary,
}

impl LatencyReport {
    /// The two console lines, periodic first.
    pub fn lines(&self) -> [String; 2] {
        [
            report_line("period", &self.periodic),
            report_line("overall", &self.cumulative),
        ]
    }
}

impl fmt::Display for LatencyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [periodic, cumulative] = self.lines();
        write!(f, "{periodic}\n{cumulative}")
    }
}

fn report_line(scope: &str, summary: &WindowSummary) -> String {
    let values = match summary.latency {
        Some(s) => format!(
            "{}, {}, {:.3}, {}",
            ms_to_secs(s.min_ms),
            ms_to_secs(s.max_ms),
            s.mean_ms / 1000.0,
            ms_to_secs(s.p99_ms),
        ),
        None => "n/a, n/a, n/a, n/a".to_string(),
    };
    format!(
        "{} messages received in {scope}, latency(min, max, avg, 99%) = {values} (sec)",
        summary.count
    )
}

fn ms_to_secs(ms: u64) -> String {
    format!("{:.3}", ms as f64 / 1000.0)
}

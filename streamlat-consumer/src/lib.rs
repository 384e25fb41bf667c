pub mod dispatcher;
pub mod stats;

pub use dispatcher::{Dispatch, DispatchCounters, Dispatcher, RunOutcome, Step};
pub use stats::{Clamp, LatencyReport, LatencyTracker, LatencyWindow, WindowSummary};

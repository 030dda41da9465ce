//! Runtime configuration.

/// Default number of times a cell's invalidation callback may run within one
/// drain pass before the drain is aborted as a cycle.
pub const DEFAULT_CYCLE_THRESHOLD: usize = 20;

/// Configuration for a `Runtime`.
///
/// # Example
///
/// ```rust
/// use lumen_reactive::RuntimeConfig;
///
/// let config = RuntimeConfig::default().cycle_threshold(5).trace_events(true);
/// assert_eq!(config.get_cycle_threshold(), 5);
/// assert!(config.get_trace_events());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuntimeConfig {
    cycle_threshold: usize,
    trace_events: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            cycle_threshold: DEFAULT_CYCLE_THRESHOLD,
            trace_events: false,
        }
    }
}

impl RuntimeConfig {
    /// Sets the per-drain invalidation limit.
    pub fn cycle_threshold(mut self, threshold: usize) -> Self {
        self.cycle_threshold = threshold;
        self
    }

    /// Sets whether a trace recorder should be installed.
    pub fn trace_events(mut self, enabled: bool) -> Self {
        self.trace_events = enabled;
        self
    }

    /// Returns the per-drain invalidation limit.
    #[inline]
    pub fn get_cycle_threshold(&self) -> usize {
        self.cycle_threshold
    }

    /// Returns whether a trace recorder should be installed.
    #[inline]
    pub fn get_trace_events(&self) -> bool {
        self.trace_events
    }
}

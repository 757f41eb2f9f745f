//! Named-interval stopwatch used to time run phases and single tasks.
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Returned by [`Profiler::stop`] for a key that was never started.
pub const UNKNOWN: i64 = -1;

#[derive(Debug, Clone, Copy)]
enum Interval {
    Running(Instant),
    Stopped(Duration),
}

/// A set of independent stopwatches addressed by key.
///
/// Starting a key that is already running restarts it. Stopped keys keep
/// their elapsed time until they are started again.
#[derive(Debug, Default)]
pub struct Profiler {
    intervals: HashMap<String, Interval>,
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, key: impl Into<String>) {
        self.intervals
            .insert(key.into(), Interval::Running(Instant::now()));
    }

    /// Stops `key` and returns the elapsed milliseconds, or [`UNKNOWN`].
    pub fn stop(&mut self, key: &str) -> i64 {
        match self.intervals.get_mut(key) {
            Some(interval) => {
                if let Interval::Running(start) = *interval {
                    *interval = Interval::Stopped(start.elapsed());
                }
                self.elapsed_ms(key)
            }
            None => UNKNOWN,
        }
    }

    /// Stops every key that is still running.
    pub fn stop_all(&mut self) {
        for interval in self.intervals.values_mut() {
            if let Interval::Running(start) = *interval {
                *interval = Interval::Stopped(start.elapsed());
            }
        }
    }

    pub fn is_running(&self, key: &str) -> bool {
        matches!(self.intervals.get(key), Some(Interval::Running(_)))
    }

    /// Elapsed time of `key`, measured up to now when it is still running.
    pub fn elapsed(&self, key: &str) -> Option<Duration> {
        self.intervals.get(key).map(|interval| match interval {
            Interval::Running(start) => start.elapsed(),
            Interval::Stopped(duration) => *duration,
        })
    }

    pub fn elapsed_ms(&self, key: &str) -> i64 {
        self.elapsed(key)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(UNKNOWN)
    }

    pub fn elapsed_secs(&self, key: &str) -> f64 {
        self.elapsed(key)
            .map(|d| d.as_secs_f64())
            .unwrap_or(UNKNOWN as f64)
    }

    pub fn elapsed_mins(&self, key: &str) -> f64 {
        self.elapsed(key)
            .map(|d| d.as_secs_f64() / 60.0)
            .unwrap_or(UNKNOWN as f64)
    }

    /// Human readable elapsed time of `key`, e.g. `1h 2min 3s 40ms`.
    pub fn describe(&self, key: &str) -> Option<String> {
        self.elapsed(key).map(describe)
    }
}

/// Formats a duration into hours, minutes, seconds and milliseconds,
/// leaving out every unit that is zero.
pub fn describe(duration: Duration) -> String {
    let total = duration.as_millis();
    let units = [
        (total / 3_600_000, "h"),
        (total / 60_000 % 60, "min"),
        (total / 1_000 % 60, "s"),
        (total % 1_000, "ms"),
    ];

    let parts: Vec<String> = units
        .into_iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{value}{unit}"))
        .collect();

    match parts.is_empty() {
        true => String::from("0ms"),
        false => parts.join(" "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_unknown_key() {
        let mut profiler = Profiler::new();
        assert_eq!(profiler.stop("missing"), UNKNOWN);
        assert_eq!(profiler.elapsed_ms("missing"), UNKNOWN);
        assert!(profiler.describe("missing").is_none());
    }

    #[test]
    fn test_keys_are_independent() {
        let mut profiler = Profiler::new();
        profiler.start("a");
        profiler.start("b");

        assert!(profiler.stop("a") >= 0);
        assert!(!profiler.is_running("a"));
        assert!(profiler.is_running("b"));

        profiler.stop_all();
        assert!(!profiler.is_running("b"));
    }

    #[test]
    fn test_stopped_key_is_frozen() {
        let mut profiler = Profiler::new();
        profiler.start("a");
        let first = profiler.stop("a");
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(profiler.elapsed_ms("a"), first);
        assert_eq!(profiler.stop("a"), first);
    }

    #[test]
    fn test_derived_units() {
        let mut profiler = Profiler::new();
        profiler
            .intervals
            .insert("a".into(), Interval::Stopped(Duration::from_millis(90_500)));

        assert_eq!(profiler.elapsed_ms("a"), 90_500);
        assert_eq!(profiler.elapsed_secs("a"), 90.5);
        assert!((profiler.elapsed_mins("a") - 90.5 / 60.0).abs() < 1e-12);
        assert_eq!(profiler.describe("a").as_deref(), Some("1min 30s 500ms"));

        assert_eq!(profiler.elapsed_secs("missing"), UNKNOWN as f64);
        assert_eq!(profiler.elapsed_mins("missing"), UNKNOWN as f64);
    }

    #[test]
    fn test_describe_omits_zero_units() {
        assert_eq!(describe(Duration::ZERO), "0ms");
        assert_eq!(describe(Duration::from_millis(40)), "40ms");
        assert_eq!(describe(Duration::from_millis(3_000)), "3s");
        assert_eq!(describe(Duration::from_millis(3_723_040)), "1h 2min 3s 40ms");
        assert_eq!(describe(Duration::from_millis(3_600_005)), "1h 5ms");
    }
}

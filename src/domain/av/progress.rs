//! Progress math: time parsing, percent/ETA, throttling and the text gauges
//! shown in chat.

use regex::Regex;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

pub const BAR_WIDTH: usize = 20;

/// Lower bound on the interval between two progress edits.
pub const MIN_UPDATE_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSample {
    /// Position in the output, in whole seconds.
    pub out_time_secs: u64,
}

fn progress_line_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(\w+)=(.*?)\s*$").ok())
        .as_ref()
}

/// Decode one `key=value` line of `-progress` output. Only the output time
/// keys produce a sample; `N/A` values are skipped.
pub fn parse_progress_line(line: &str) -> Option<ProgressSample> {
    let caps = progress_line_regex()?.captures(line)?;
    let value = caps.get(2)?.as_str();
    if value.is_empty() || value.eq_ignore_ascii_case("N/A") {
        return None;
    }
    let out_time_secs = match caps.get(1)?.as_str() {
        "out_time" => time_to_seconds(value),
        // Both keys carry microseconds.
        "out_time_us" | "out_time_ms" => value.parse::<i64>().ok()?.max(0) as u64 / 1_000_000,
        _ => return None,
    };
    Some(ProgressSample { out_time_secs })
}

/// `HH:MM:SS[.fraction]` (or `MM:SS`, or `SS`) to whole seconds. Malformed
/// input yields 0.
pub fn time_to_seconds(raw: &str) -> u64 {
    let parts: Vec<&str> = raw.trim().split(':').collect();
    if parts.is_empty() || parts.len() > 3 {
        return 0;
    }
    let (whole, last) = parts.split_at(parts.len() - 1);
    let ceiling = if whole.is_empty() { u64::MAX as f64 } else { 60.0 };
    let seconds = match last[0].parse::<f64>() {
        Ok(s) if s.is_finite() && s >= 0.0 && s < ceiling => s.floor() as u64,
        _ => return 0,
    };
    let mut total = 0u64;
    for part in whole {
        let Ok(v) = part.parse::<u64>() else {
            return 0;
        };
        match total.checked_mul(60).and_then(|t| t.checked_add(v)) {
            Some(t) => total = t,
            None => return 0,
        }
    }
    total
        .checked_mul(60)
        .and_then(|t| t.checked_add(seconds))
        .unwrap_or(0)
}

/// Always `HH:MM:SS`, hours are not capped at 24.
pub fn seconds_to_time(secs: u64) -> String {
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// `MM:SS`, or `HH:MM:SS` once there are hours.
pub fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    if hours > 0 {
        seconds_to_time(secs)
    } else {
        format!("{:02}:{:02}", (secs % 3600) / 60, secs % 60)
    }
}

pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", size, UNITS[unit])
}

pub fn format_throughput(bytes: u64, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs <= f64::EPSILON {
        return "n/a".to_string();
    }
    format!("{}/s", format_file_size((bytes as f64 / secs) as u64))
}

/// Percent in `[0, 100]`; 0 when the total is unknown.
pub fn progress_percent(current_secs: u64, total_secs: u64) -> f64 {
    if total_secs == 0 {
        return 0.0;
    }
    (current_secs as f64 / total_secs as f64 * 100.0).clamp(0.0, 100.0)
}

/// Remaining seconds, extrapolated from the elapsed wall-clock time.
pub fn estimate_eta(elapsed_secs: f64, percent: f64) -> Option<u64> {
    if percent <= 0.0 || elapsed_secs <= 0.0 {
        return None;
    }
    if percent >= 100.0 {
        return Some(0);
    }
    let total = elapsed_secs * 100.0 / percent;
    Some((total - elapsed_secs).max(0.0).round() as u64)
}

pub fn progress_bar(percent: f64) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * BAR_WIDTH as f64).floor() as usize;
    let mut bar = "█".repeat(filled);
    bar.push_str(&"░".repeat(BAR_WIDTH - filled));
    bar
}

/// Decides whether a progress edit may be sent now.
#[derive(Debug)]
pub struct UpdateThrottle {
    interval: Duration,
    last_emit: Option<Instant>,
}

impl UpdateThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(MIN_UPDATE_INTERVAL),
            last_emit: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The first call always passes; later calls pass once `interval` has elapsed.
    pub fn should_emit(&mut self, now: Instant) -> bool {
        let due = match self.last_emit {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };
        if due {
            self.last_emit = Some(now);
        }
        due
    }

    /// Record an emission that bypassed the throttle.
    pub fn mark(&mut self, now: Instant) {
        self.last_emit = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_to_seconds() {
        assert_eq!(time_to_seconds("00:01:02.500000"), 62);
        assert_eq!(time_to_seconds("01:00:00"), 3600);
        assert_eq!(time_to_seconds("02:03"), 123);
        assert_eq!(time_to_seconds("45.9"), 45);
        assert_eq!(time_to_seconds("25:00:00.00"), 90_000);
    }

    #[test]
    fn test_time_to_seconds_malformed_is_zero() {
        assert_eq!(time_to_seconds(""), 0);
        assert_eq!(time_to_seconds("abc"), 0);
        assert_eq!(time_to_seconds("N/A"), 0);
        assert_eq!(time_to_seconds("1:2:3:4"), 0);
        assert_eq!(time_to_seconds("-00:00:01.0"), 0);
        assert_eq!(time_to_seconds("00:xx:01"), 0);
        assert_eq!(time_to_seconds("1:1e300"), 0);
        assert_eq!(time_to_seconds("00:00:60"), 0);
        assert_eq!(time_to_seconds("1e300"), 0);
        assert_eq!(time_to_seconds("307445734561825861:00:00"), 0);
        assert_eq!(time_to_seconds(&format!("{}:00", u64::MAX)), 0);
    }

    #[test]
    fn test_overflowing_progress_time_is_ignored() {
        assert_eq!(
            parse_progress_line("out_time=307445734561825861:00:00"),
            Some(ProgressSample { out_time_secs: 0 })
        );
    }

    #[test]
    fn test_seconds_to_time() {
        assert_eq!(seconds_to_time(0), "00:00:00");
        assert_eq!(seconds_to_time(62), "00:01:02");
        assert_eq!(seconds_to_time(90_061), "25:01:01");
    }

    #[test]
    fn test_time_round_trip() {
        for secs in [0, 1, 59, 60, 3599, 3600, 86_399, 90_000, 359_999] {
            assert_eq!(time_to_seconds(&seconds_to_time(secs)), secs);
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(5), "00:05");
        assert_eq!(format_duration(150), "02:30");
        assert_eq!(format_duration(3725), "01:02:05");
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0.00 B");
        assert_eq!(format_file_size(512), "512.00 B");
        assert_eq!(format_file_size(1536), "1.50 KB");
        assert_eq!(format_file_size(20 * 1024 * 1024), "20.00 MB");
        assert_eq!(format_file_size(2000 * 1024 * 1024), "1.95 GB");
    }

    #[test]
    fn test_format_throughput() {
        assert_eq!(
            format_throughput(10 * 1024 * 1024, Duration::from_secs(2)),
            "5.00 MB/s"
        );
        assert_eq!(format_throughput(10, Duration::ZERO), "n/a");
    }

    #[test]
    fn test_progress_percent() {
        assert_eq!(progress_percent(0, 100), 0.0);
        assert_eq!(progress_percent(50, 200), 25.0);
        assert_eq!(progress_percent(300, 200), 100.0);
        assert_eq!(progress_percent(10, 0), 0.0);
    }

    #[test]
    fn test_estimate_eta() {
        assert_eq!(estimate_eta(30.0, 50.0), Some(30));
        assert_eq!(estimate_eta(10.0, 25.0), Some(30));
        assert_eq!(estimate_eta(10.0, 100.0), Some(0));
        assert_eq!(estimate_eta(10.0, 0.0), None);
        assert_eq!(estimate_eta(0.0, 40.0), None);
    }

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(0.0), "░".repeat(20));
        assert_eq!(progress_bar(100.0), "█".repeat(20));
        assert_eq!(progress_bar(50.0), format!("{}{}", "█".repeat(10), "░".repeat(10)));
        assert_eq!(progress_bar(42.0).chars().count(), BAR_WIDTH);
        assert_eq!(progress_bar(250.0), "█".repeat(20));
    }

    #[test]
    fn test_parse_progress_line() {
        assert_eq!(
            parse_progress_line("out_time=00:00:12.345678"),
            Some(ProgressSample { out_time_secs: 12 })
        );
        assert_eq!(
            parse_progress_line("out_time_ms=4000000"),
            Some(ProgressSample { out_time_secs: 4 })
        );
        assert_eq!(
            parse_progress_line("out_time_us=61500000\n"),
            Some(ProgressSample { out_time_secs: 61 })
        );
    }

    #[test]
    fn test_parse_progress_line_ignores_noise() {
        assert_eq!(parse_progress_line("frame=120"), None);
        assert_eq!(parse_progress_line("progress=continue"), None);
        assert_eq!(parse_progress_line("out_time=N/A"), None);
        assert_eq!(parse_progress_line("out_time_ms=N/A"), None);
        assert_eq!(parse_progress_line("garbage"), None);
        assert_eq!(parse_progress_line(""), None);
    }

    #[test]
    fn test_throttle() {
        let start = Instant::now();
        let mut throttle = UpdateThrottle::new(Duration::from_secs(5));
        assert!(throttle.should_emit(start));
        assert!(!throttle.should_emit(start + Duration::from_secs(1)));
        assert!(!throttle.should_emit(start + Duration::from_millis(4999)));
        assert!(throttle.should_emit(start + Duration::from_secs(5)));
        assert!(!throttle.should_emit(start + Duration::from_secs(6)));
    }

    #[test]
    fn test_throttle_three_second_window() {
        let t0 = Instant::now();
        let mut throttle = UpdateThrottle::new(Duration::from_secs(3));
        let emitted: Vec<bool> = [0, 1, 2, 4]
            .into_iter()
            .map(|offset| throttle.should_emit(t0 + Duration::from_secs(offset)))
            .collect();
        assert_eq!(emitted, vec![true, false, false, true]);
    }

    #[test]
    fn test_throttle_enforces_minimum_interval() {
        let start = Instant::now();
        let mut throttle = UpdateThrottle::new(Duration::from_secs(1));
        assert_eq!(throttle.interval(), MIN_UPDATE_INTERVAL);
        assert!(throttle.should_emit(start));
        assert!(!throttle.should_emit(start + Duration::from_secs(2)));
        assert!(throttle.should_emit(start + Duration::from_secs(3)));
    }

    #[test]
    fn test_throttle_mark_resets_window() {
        let start = Instant::now();
        let mut throttle = UpdateThrottle::new(Duration::from_secs(3));
        throttle.mark(start);
        assert!(!throttle.should_emit(start + Duration::from_secs(1)));
    }
}

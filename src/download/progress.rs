//! Rate and progress math for the transfer loop.
//!
//! Everything here is pure: the transfer engine calls these once per block to
//! size the next read and to render the progress line.

use std::fmt;
use std::time::Duration;

/// Largest block the engine will ever request in a single read (4 MiB).
pub const MAX_BLOCK_SIZE: usize = 4 * 1024 * 1024;

/// Block size used for the first read of every transfer.
pub const INITIAL_BLOCK_SIZE: usize = 1024;

/// Reads or elapsed times shorter than this are treated as "instant".
const MIN_MEASURABLE: Duration = Duration::from_millis(1);

const UNITS: [char; 9] = ['b', 'k', 'M', 'G', 'T', 'P', 'E', 'Z', 'Y'];

/// Formats a byte count with base-1024 units and two decimals.
///
/// `None` renders as `N/A`, zero renders as `0.00b`.
#[must_use]
pub fn format_bytes(bytes: Option<f64>) -> String {
    let Some(bytes) = bytes else {
        return "N/A".to_string();
    };
    let (mantissa, exponent) = scale_bytes(bytes);
    format!("{mantissa:.2}{}", UNITS[exponent])
}

/// Splits a byte count into `(mantissa, exponent)` with the largest exponent
/// whose mantissa is still at least 1.
#[must_use]
pub fn scale_bytes(bytes: f64) -> (f64, usize) {
    let mut value = bytes;
    let mut exponent = 0;
    while value >= 1024.0 && exponent < UNITS.len() - 1 {
        value /= 1024.0;
        exponent += 1;
    }
    (value, exponent)
}

/// Percent complete, right-aligned to six columns (`---.-%` when unknown).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_percent(downloaded: u64, total: Option<u64>) -> String {
    match total {
        Some(total) if total > 0 => {
            let percent = downloaded as f64 / total as f64 * 100.0;
            format!("{:>6}", format!("{percent:.1}%"))
        }
        Some(_) => format!("{:>6}", "100.0%"),
        None => "---.-%".to_string(),
    }
}

/// Average transfer rate in bytes per second since the transfer started.
///
/// Returns `None` when nothing moved yet or the elapsed time is too short to
/// measure.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn average_speed(elapsed: Duration, downloaded: u64) -> Option<f64> {
    if downloaded == 0 || elapsed < MIN_MEASURABLE {
        return None;
    }
    Some(downloaded as f64 / elapsed.as_secs_f64())
}

/// Speed column, right-aligned to ten columns.
#[must_use]
pub fn format_speed(speed: Option<f64>) -> String {
    match speed {
        Some(rate) => format!("{:>10}", format!("{}/s", format_bytes(Some(rate)))),
        None => format!("{:>10}", "---b/s"),
    }
}

/// Estimated time remaining at the current average rate.
///
/// Unknown when the total is unknown, nothing was transferred, the elapsed
/// time is below one millisecond, or the estimate exceeds 99 minutes.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn estimate_eta(elapsed: Duration, total: Option<u64>, downloaded: u64) -> Option<Duration> {
    let total = total?;
    let rate = average_speed(elapsed, downloaded)?;
    let remaining = total.saturating_sub(downloaded) as f64;
    let eta_secs = (remaining / rate) as u64;
    if eta_secs / 60 > 99 {
        return None;
    }
    Some(Duration::from_secs(eta_secs))
}

/// ETA column as `MM:SS` (`--:--` when unknown).
#[must_use]
pub fn format_eta(eta: Option<Duration>) -> String {
    match eta {
        Some(eta) => {
            let secs = eta.as_secs();
            format!("{:02}:{:02}", secs / 60, secs % 60)
        }
        None => "--:--".to_string(),
    }
}

/// Picks the next read size from how long the previous block took.
///
/// The result stays within half and double the previous block, never exceeds
/// [`MAX_BLOCK_SIZE`] and never drops below one byte. A read faster than 1 ms
/// jumps straight to the upper bound.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn best_block_size(elapsed: Duration, bytes: usize) -> usize {
    let bytes = bytes as f64;
    let new_min = (bytes / 2.0).max(1.0);
    let new_max = (bytes * 2.0).max(1.0).min(MAX_BLOCK_SIZE as f64);
    if elapsed < MIN_MEASURABLE {
        return new_max as usize;
    }
    let rate = bytes / elapsed.as_secs_f64();
    if rate > new_max {
        return new_max as usize;
    }
    if rate < new_min {
        return new_min as usize;
    }
    rate as usize
}

/// Snapshot of a running transfer, rendered as one progress line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    /// Bytes received so far.
    pub downloaded: u64,
    /// Declared total length, if the source announced one.
    pub total: Option<u64>,
    /// Wall time since the transfer started.
    pub elapsed: Duration,
}

impl ProgressUpdate {
    /// Percent column.
    #[must_use]
    pub fn percent(&self) -> String {
        format_percent(self.downloaded, self.total)
    }

    /// Formatted total size.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn total_size(&self) -> String {
        format_bytes(self.total.map(|t| t as f64))
    }

    /// Formatted average speed.
    #[must_use]
    pub fn speed(&self) -> String {
        format_speed(average_speed(self.elapsed, self.downloaded))
    }

    /// Formatted ETA.
    #[must_use]
    pub fn eta(&self) -> String {
        format_eta(estimate_eta(self.elapsed, self.total, self.downloaded))
    }
}

impl fmt::Display for ProgressUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[download] {} of {} at {} ETA {}",
            self.percent(),
            self.total_size(),
            self.speed(),
            self.eta()
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes_unknown_is_not_available() {
        assert_eq!(format_bytes(None), "N/A");
    }

    #[test]
    fn test_format_bytes_zero_uses_base_unit() {
        assert_eq!(format_bytes(Some(0.0)), "0.00b");
    }

    #[test]
    fn test_format_bytes_unit_boundaries() {
        assert_eq!(format_bytes(Some(1023.0)), "1023.00b");
        assert_eq!(format_bytes(Some(1024.0)), "1.00k");
        assert_eq!(format_bytes(Some(1536.0)), "1.50k");
        assert_eq!(format_bytes(Some(1024.0 * 1024.0)), "1.00M");
        assert_eq!(format_bytes(Some(5.0 * 1024.0 * 1024.0 * 1024.0)), "5.00G");
    }

    #[test]
    fn test_format_bytes_caps_at_largest_unit() {
        let huge = 1024f64.powi(10);
        assert!(format_bytes(Some(huge)).ends_with('Y'));
    }

    #[test]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn test_format_bytes_round_trips_within_one_percent() {
        let samples: [u64; 9] = [
            1,
            999,
            1024,
            4097,
            123_456,
            9_999_999,
            1_073_741_824,
            3_000_000_000_000,
            u64::MAX / 3,
        ];
        for bytes in samples {
            let rendered = format_bytes(Some(bytes as f64));
            let (_, exponent) = scale_bytes(bytes as f64);
            let mantissa: f64 = rendered[..rendered.len() - 1].parse().unwrap();
            assert!(mantissa >= 1.0, "mantissa below one for {bytes}: {rendered}");
            let rebuilt = mantissa * 1024f64.powi(exponent as i32);
            let error = (rebuilt - bytes as f64).abs() / bytes as f64;
            assert!(error <= 0.01, "{bytes} -> {rendered} off by {error}");
        }
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(0, None), "---.-%");
        assert_eq!(format_percent(50, Some(200)), " 25.0%");
        assert_eq!(format_percent(200, Some(200)), "100.0%");
    }

    #[test]
    fn test_format_speed_unknown_before_first_byte() {
        assert_eq!(format_speed(average_speed(Duration::from_secs(1), 0)), "    ---b/s");
        assert_eq!(format_speed(average_speed(Duration::ZERO, 10)), "    ---b/s");
    }

    #[test]
    fn test_average_speed_is_cumulative() {
        let speed = average_speed(Duration::from_secs(2), 2048).unwrap();
        assert_eq!(speed, 1024.0);
        assert_eq!(format_speed(Some(speed)), "   1.00k/s");
    }

    #[test]
    fn test_estimate_eta_known_total() {
        let eta = estimate_eta(Duration::from_secs(10), Some(2000), 1000).unwrap();
        assert_eq!(eta, Duration::from_secs(10));
        assert_eq!(format_eta(Some(eta)), "00:10");
    }

    #[test]
    fn test_estimate_eta_unknown_cases() {
        assert!(estimate_eta(Duration::from_secs(1), None, 10).is_none());
        assert!(estimate_eta(Duration::from_secs(1), Some(100), 0).is_none());
        assert!(estimate_eta(Duration::from_micros(500), Some(100), 10).is_none());
        // 1 byte/s with 10_000 bytes left is well over 99 minutes
        assert!(estimate_eta(Duration::from_secs(1), Some(10_001), 1).is_none());
        assert_eq!(format_eta(None), "--:--");
    }

    #[test]
    fn test_best_block_size_instant_read_jumps_to_double() {
        assert_eq!(best_block_size(Duration::ZERO, 1024), 2048);
    }

    #[test]
    fn test_best_block_size_respects_ceiling() {
        assert_eq!(best_block_size(Duration::ZERO, MAX_BLOCK_SIZE), MAX_BLOCK_SIZE);
        assert_eq!(
            best_block_size(Duration::from_millis(10), MAX_BLOCK_SIZE),
            MAX_BLOCK_SIZE
        );
    }

    #[test]
    fn test_best_block_size_follows_measured_rate() {
        // 1000 bytes in 0.625 s is 1600 B/s, inside [500, 2000]
        assert_eq!(best_block_size(Duration::from_millis(625), 1000), 1600);
    }

    #[test]
    fn test_best_block_size_clamps_slow_reads() {
        assert_eq!(best_block_size(Duration::from_secs(100), 1000), 500);
        assert_eq!(best_block_size(Duration::from_secs(100), 1), 1);
        assert_eq!(best_block_size(Duration::from_secs(1), 0), 1);
    }

    #[test]
    fn test_progress_update_display() {
        let update = ProgressUpdate {
            downloaded: 512,
            total: Some(1024),
            elapsed: Duration::from_secs(1),
        };
        assert_eq!(
            update.to_string(),
            "[download]  50.0% of 1.00k at  512.00b/s ETA 00:01"
        );
    }
}

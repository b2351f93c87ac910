use chrono::{DateTime, Utc};

const STAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Timestamp in the form stored on listings and the status page.
pub fn utc_stamp() -> String {
    format_stamp(Utc::now())
}

pub fn format_stamp(ts: DateTime<Utc>) -> String {
    ts.format(STAMP_FORMAT).to_string()
}

const MAX_DELAY_SECS: f64 = 3600.0;

// Parse a delay given in (possibly fractional) seconds; negatives and NaN clamp
// to zero, anything above an hour to an hour.
pub fn delay_from_secs(secs: f64) -> std::time::Duration {
    if secs.is_nan() || secs <= 0.0 {
        return std::time::Duration::ZERO;
    }
    std::time::Duration::from_secs_f64(secs.min(MAX_DELAY_SECS))
}

use anyhow::{anyhow, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};
use sha2::{Digest, Sha256};

/// Calendar days are cut at this fixed offset (UTC+04:00), whatever the local
/// timezone of the machine running the client.
pub const CANONICAL_OFFSET_SECS: i32 = 4 * 3600;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn canonical_offset() -> FixedOffset {
    FixedOffset::east_opt(CANONICAL_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Today's calendar day at the canonical offset.
pub fn today() -> NaiveDate {
    Utc::now().with_timezone(&canonical_offset()).date_naive()
}

pub fn sha256_hex(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

pub fn parse_decimal(value: &str) -> Result<f64> {
    let parsed = value
        .trim()
        .replace(',', ".")
        .parse::<f64>()
        .map_err(|e| anyhow!("Parse decimal: {}", e))?;
    if !parsed.is_finite() {
        return Err(anyhow!("Parse decimal: not a finite number"));
    }
    Ok(parsed)
}

/// Reduces any date or timestamp the backend or the user hands us to a single
/// calendar day. Plain dates are taken as-is; timestamps carrying an offset are
/// shifted to [`CANONICAL_OFFSET_SECS`] first.
pub fn normalize_date(value: &str) -> Option<NaiveDate> {
    let raw = value.trim();
    if raw.is_empty() {
        return None;
    }

    let formats = ["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y", "%Y/%m/%d", "%Y.%m.%d"];
    for fmt in formats.iter() {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(date);
        }
    }

    if let Ok(stamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(stamp.with_timezone(&canonical_offset()).date_naive());
    }

    let naive_formats = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"];
    for fmt in naive_formats.iter() {
        if let Ok(stamp) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(stamp.date());
        }
    }
    None
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

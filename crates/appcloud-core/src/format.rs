//! Display helpers shared by the introspection reports.

use chrono::{DateTime, Local, TimeZone};

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Byte count with one decimal and a unit suffix, `NA` when unknown.
pub fn pretty_size(size: Option<u64>) -> String {
    let Some(size) = size else {
        return "NA".to_string();
    };
    let bytes = size as f64;
    if size < 1024 {
        format!("{size}B")
    } else if bytes < MIB {
        format!("{:.1}K", bytes / KIB)
    } else if bytes < GIB {
        format!("{:.1}M", bytes / MIB)
    } else {
        format!("{:.1}G", bytes / GIB)
    }
}

/// Uptime as `Nd:Nh:Nm:Ns`; fractional seconds are dropped.
pub fn uptime_string(seconds: f64) -> String {
    let mut rest = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let days = rest / 86_400;
    rest -= days * 86_400;
    let hours = rest / 3_600;
    rest -= hours * 3_600;
    let minutes = rest / 60;
    rest -= minutes * 60;
    format!("{days}d:{hours}h:{minutes}m:{rest}s")
}

/// Unix timestamp rendered in the local timezone.
pub fn format_since(timestamp: i64) -> String {
    format_since_in(timestamp, &Local)
}

pub fn format_since_in<Tz: TimeZone>(timestamp: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match DateTime::from_timestamp(timestamp, 0) {
        Some(utc) => utc
            .with_timezone(tz)
            .format("%m/%d/%Y %I:%M%p")
            .to_string(),
        None => timestamp.to_string(),
    }
}

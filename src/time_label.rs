use std::{fmt, str::FromStr};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::TimeLabelError;

static TIME_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\d{1,2})(?::([0-5]\d))?\s*(am|pm)?$").expect("valid time label regex")
});

/// Named slice of the 24-hour day. Night wraps midnight.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimeBucket {
    #[serde(rename = "Early Morning")]
    EarlyMorning,
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeBucket {
    pub const ALL: [TimeBucket; 5] = [
        TimeBucket::EarlyMorning,
        TimeBucket::Morning,
        TimeBucket::Afternoon,
        TimeBucket::Evening,
        TimeBucket::Night,
    ];

    pub fn label(self) -> &'static str {
        match self {
            TimeBucket::EarlyMorning => "Early Morning",
            TimeBucket::Morning => "Morning",
            TimeBucket::Afternoon => "Afternoon",
            TimeBucket::Evening => "Evening",
            TimeBucket::Night => "Night",
        }
    }

    /// Half-open `[start, end)` hour range; `start > end` means it wraps.
    pub fn hours(self) -> (u32, u32) {
        match self {
            TimeBucket::EarlyMorning => (4, 8),
            TimeBucket::Morning => (8, 12),
            TimeBucket::Afternoon => (12, 16),
            TimeBucket::Evening => (16, 20),
            TimeBucket::Night => (20, 4),
        }
    }

    pub fn contains(self, hour: u32) -> bool {
        if hour > 23 {
            return false;
        }
        let (start, end) = self.hours();
        if start < end {
            hour >= start && hour < end
        } else {
            hour >= start || hour < end
        }
    }

    pub fn for_hour(hour: u32) -> Option<TimeBucket> {
        Self::ALL.into_iter().find(|bucket| bucket.contains(hour))
    }
}

impl fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TimeBucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|bucket| bucket.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown time of day: {wanted}"))
    }
}

/// Converts a `"<hour> AM|PM"` label to a 24-hour hour.
///
/// Minutes (`"7:30 PM"`) are accepted and ignored. 12 AM is hour 0 and
/// 12 PM is hour 12.
pub fn parse_time_label(label: &str) -> Result<u32, TimeLabelError> {
    let cleaned = label.trim();
    if cleaned.is_empty() {
        return Err(TimeLabelError::Empty);
    }

    let caps = TIME_LABEL_RE
        .captures(cleaned)
        .ok_or_else(|| TimeLabelError::Malformed(cleaned.to_string()))?;
    let hour = caps[1]
        .parse::<u32>()
        .map_err(|_| TimeLabelError::Malformed(cleaned.to_string()))?;
    let meridiem = caps
        .get(3)
        .map(|m| m.as_str().to_ascii_uppercase())
        .ok_or_else(|| TimeLabelError::MissingMeridiem(cleaned.to_string()))?;
    if !(1..=12).contains(&hour) {
        return Err(TimeLabelError::InvalidHour(hour));
    }

    let hour24 = match (meridiem.as_str(), hour) {
        ("AM", 12) => 0,
        ("AM", h) => h,
        (_, 12) => 12,
        (_, h) => h + 12,
    };
    Ok(hour24)
}

pub fn bucket_for_label(label: &str) -> Result<TimeBucket, TimeLabelError> {
    let hour = parse_time_label(label)?;
    TimeBucket::for_hour(hour).ok_or(TimeLabelError::InvalidHour(hour))
}

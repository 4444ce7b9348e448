use serde::{Deserialize, Serialize};

/// Start times a customer can pick when booking.
pub const TIME_SLOTS: &[&str] = &[
    "08:00 AM", "09:00 AM", "10:00 AM", "11:00 AM", "12:00 PM", "01:00 PM", "02:00 PM",
    "03:00 PM", "04:00 PM", "05:00 PM", "06:00 PM",
];

/// A requested start time, always one of [`TIME_SLOTS`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeSlot(String);

impl TimeSlot {
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        let trimmed = s.trim();
        if !TIME_SLOTS.contains(&trimmed) {
            return Err(anyhow::anyhow!("unknown time slot: {s}"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Minutes after midnight.
    pub fn start_minutes(&self) -> u32 {
        // Members of TIME_SLOTS always parse.
        clock_minutes(&self.0).unwrap_or(0)
    }

    /// Absolute distance between two start times on the same day, in minutes.
    pub fn minutes_between(&self, other: &TimeSlot) -> u32 {
        self.start_minutes().abs_diff(other.start_minutes())
    }
}

impl TryFrom<String> for TimeSlot {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TimeSlot::parse(&value)
    }
}

impl From<TimeSlot> for String {
    fn from(slot: TimeSlot) -> Self {
        slot.0
    }
}

impl std::fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parses a 12-hour clock string such as "09:00 AM" or "5 PM" into minutes
/// after midnight. "12 AM" is hour 0 and "12 PM" stays hour 12.
pub fn clock_minutes(s: &str) -> Option<u32> {
    let s = s.trim();
    let (clock, meridiem) = s.split_once(char::is_whitespace)?;
    let (hour_str, minute_str) = clock.split_once(':').unwrap_or((clock, "0"));

    let hour: u32 = hour_str.parse().ok()?;
    let minute: u32 = minute_str.parse().ok()?;
    if !(1..=12).contains(&hour) || minute > 59 {
        return None;
    }

    let hour = match meridiem.trim().to_ascii_uppercase().as_str() {
        "AM" if hour == 12 => 0,
        "AM" => hour,
        "PM" if hour == 12 => 12,
        "PM" => hour + 12,
        _ => return None,
    };

    Some(hour * 60 + minute)
}

//! Candle bucket widths supported by the collector.
//!
//! Time periods are stored as plain minute counts; only the durations listed
//! here can be translated into an exchange timeframe token.

use std::fmt;
use std::str::FromStr;

use chrono::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Timeframe {
    OneMinute,
    ThreeMinutes,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
    TwoHours,
    FourHours,
    SixHours,
    EightHours,
    TwelveHours,
    OneDay,
    OneWeek,
    OneMonth,
}

static TABLE: [(Timeframe, i64, &str); 14] = [
    (Timeframe::OneMinute, 1, "1m"),
    (Timeframe::ThreeMinutes, 3, "3m"),
    (Timeframe::FiveMinutes, 5, "5m"),
    (Timeframe::FifteenMinutes, 15, "15m"),
    (Timeframe::ThirtyMinutes, 30, "30m"),
    (Timeframe::OneHour, 60, "1h"),
    (Timeframe::TwoHours, 120, "2h"),
    (Timeframe::FourHours, 240, "4h"),
    (Timeframe::SixHours, 360, "6h"),
    (Timeframe::EightHours, 480, "8h"),
    (Timeframe::TwelveHours, 720, "12h"),
    (Timeframe::OneDay, 1440, "1d"),
    (Timeframe::OneWeek, 10080, "1w"),
    (Timeframe::OneMonth, 43200, "1M"),
];

impl Timeframe {
    pub const ALL: [Timeframe; 14] = [
        Timeframe::OneMinute,
        Timeframe::ThreeMinutes,
        Timeframe::FiveMinutes,
        Timeframe::FifteenMinutes,
        Timeframe::ThirtyMinutes,
        Timeframe::OneHour,
        Timeframe::TwoHours,
        Timeframe::FourHours,
        Timeframe::SixHours,
        Timeframe::EightHours,
        Timeframe::TwelveHours,
        Timeframe::OneDay,
        Timeframe::OneWeek,
        Timeframe::OneMonth,
    ];

    /// Returns `None` for durations no exchange timeframe exists for.
    pub fn from_minutes(minutes: i64) -> Option<Self> {
        TABLE
            .iter()
            .find(|(_, m, _)| *m == minutes)
            .map(|(tf, _, _)| *tf)
    }

    pub fn minutes(self) -> i64 {
        self.entry().1
    }

    /// Short token as understood by most exchange APIs ("1m", "4h", "1M").
    pub fn token(self) -> &'static str {
        self.entry().2
    }

    pub fn duration(self) -> Duration {
        Duration::minutes(self.minutes())
    }

    fn entry(self) -> &'static (Timeframe, i64, &'static str) {
        // TABLE is ordered like the enum declaration
        &TABLE[self as usize]
    }
}

/// Translates a stored duration into an exchange timeframe token.
pub fn to_timeframe_token(minutes: i64) -> Option<&'static str> {
    Timeframe::from_minutes(minutes).map(Timeframe::token)
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TABLE
            .iter()
            .find(|(_, _, token)| *token == s)
            .map(|(tf, _, _)| *tf)
            .ok_or_else(|| format!("Unsupported timeframe token: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documented_minutes_have_tokens() {
        assert_eq!(to_timeframe_token(1), Some("1m"));
        assert_eq!(to_timeframe_token(5), Some("5m"));
        assert_eq!(to_timeframe_token(15), Some("15m"));
        assert_eq!(to_timeframe_token(60), Some("1h"));
        assert_eq!(to_timeframe_token(1440), Some("1d"));
        assert_eq!(to_timeframe_token(10080), Some("1w"));
        assert_eq!(to_timeframe_token(43200), Some("1M"));
    }

    #[test]
    fn test_only_documented_set_is_supported() {
        let documented = [1, 3, 5, 15, 30, 60, 120, 240, 360, 480, 720, 1440, 10080, 43200];
        for minutes in 1..=50_000 {
            assert_eq!(
                to_timeframe_token(minutes).is_some(),
                documented.contains(&minutes),
                "minutes = {}",
                minutes
            );
        }
        assert_eq!(to_timeframe_token(7), None);
        assert_eq!(to_timeframe_token(0), None);
        assert_eq!(to_timeframe_token(-1), None);
    }

    #[test]
    fn test_enum_order_matches_table() {
        for tf in Timeframe::ALL {
            assert_eq!(Timeframe::from_minutes(tf.minutes()), Some(tf));
            assert_eq!(tf.token().parse::<Timeframe>(), Ok(tf));
        }
    }

    #[test]
    fn test_duration() {
        assert_eq!(Timeframe::FourHours.duration(), Duration::hours(4));
        assert_eq!(Timeframe::OneMonth.duration(), Duration::days(30));
        assert!("7m".parse::<Timeframe>().is_err());
    }
}

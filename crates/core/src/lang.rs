//! Model languages and localized firing-exercise text.
//!
//! The original publication dictionaries are editable per installation;
//! this core ships the hardcoded per-language fallbacks that apply when no
//! dictionary entry exists, which is the behaviour the exercise generator
//! relies on.

use chrono::{Datelike, Timelike};

use crate::firing::FiringInterval;
use crate::types::Timestamp;

/// Model languages, default first.
pub const LANGUAGES: &[&str] = &["da", "en"];

pub const DEFAULT_LANGUAGE: &str = "da";

const MONTHS_EN: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const MONTHS_DA: [&str; 12] = [
    "januar",
    "februar",
    "marts",
    "april",
    "maj",
    "juni",
    "juli",
    "august",
    "september",
    "oktober",
    "november",
    "december",
];

/// Subject line for generated firing-exercise messages.
pub fn firing_exercise_subject(lang: &str) -> &'static str {
    match lang {
        "da" => "Skydeøvelser. Advarsel.",
        _ => "Firing exercises. Warning.",
    }
}

fn format_date(lang: &str, t: Timestamp) -> String {
    let month_index = t.month0() as usize;
    match lang {
        "da" => format!("{}. {} {}", t.day(), MONTHS_DA[month_index], t.year()),
        _ => format!("{} {} {}", t.day(), MONTHS_EN[month_index], t.year()),
    }
}

fn format_time(t: Timestamp) -> String {
    format!("{:02}:{:02}", t.hour(), t.minute())
}

/// Localized rendering of one firing interval.
///
/// Same-day intervals collapse to a single date, e.g.
/// `"6 August 2026, hours 08:00 - 16:00"` (en) or
/// `"6. august 2026, kl. 08:00 - 16:00"` (da); intervals spanning days
/// render both endpoints in full.
pub fn format_interval(lang: &str, interval: &FiringInterval) -> String {
    let same_day = interval.from.date_naive() == interval.to.date_naive();
    if same_day {
        let hours = match lang {
            "da" => "kl.",
            _ => "hours",
        };
        format!(
            "{}, {} {} - {}",
            format_date(lang, interval.from),
            hours,
            format_time(interval.from),
            format_time(interval.to)
        )
    } else {
        format!(
            "{}, {} - {}, {}",
            format_date(lang, interval.from),
            format_time(interval.from),
            format_date(lang, interval.to),
            format_time(interval.to)
        )
    }
}

/// Render a sorted interval list, one line per interval.
pub fn format_intervals(lang: &str, intervals: &[FiringInterval]) -> String {
    intervals
        .iter()
        .map(|i| format_interval(lang, i))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn ts(day: u32, hour: u32, minute: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2026, 8, day, hour, minute, 0).unwrap()
    }

    #[test]
    fn same_day_interval_english() {
        let i = FiringInterval::new(ts(6, 8, 0), ts(6, 16, 30));
        assert_eq!(format_interval("en", &i), "6 August 2026, hours 08:00 - 16:30");
    }

    #[test]
    fn same_day_interval_danish() {
        let i = FiringInterval::new(ts(6, 8, 0), ts(6, 16, 30));
        assert_eq!(format_interval("da", &i), "6. august 2026, kl. 08:00 - 16:30");
    }

    #[test]
    fn cross_day_interval_renders_both_dates() {
        let i = FiringInterval::new(ts(6, 22, 0), ts(7, 4, 0));
        assert_eq!(
            format_interval("en", &i),
            "6 August 2026, 22:00 - 7 August 2026, 04:00"
        );
    }

    #[test]
    fn interval_list_is_one_line_per_interval() {
        let intervals = vec![
            FiringInterval::new(ts(6, 8, 0), ts(6, 12, 0)),
            FiringInterval::new(ts(7, 8, 0), ts(7, 12, 0)),
        ];
        let text = format_intervals("en", &intervals);
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn subject_fallbacks() {
        assert_eq!(firing_exercise_subject("en"), "Firing exercises. Warning.");
        assert_eq!(firing_exercise_subject("da"), "Skydeøvelser. Advarsel.");
        assert_eq!(
            firing_exercise_subject("de"),
            "Firing exercises. Warning."
        );
    }
}

//! Date-only calendar math behind the almanac placeholders
//!
//! Zodiac sun sign, lunar phase and illumination, day-ruling planet,
//! meteorological season, and the eclipse-season heuristic. All of it is
//! plain arithmetic over the caller's local date; reproducibility depends on
//! the anchor constants below, so they are not configurable.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};

/// Mean synodic month, in days.
pub const SYNODIC_MONTH_DAYS: f64 = 29.530588853;

/// Half the eclipse year: lunar nodes line up with the sun on this cadence.
pub const ECLIPSE_SEMESTER_DAYS: f64 = 173.31;

/// Eclipse seasons span roughly this many days either side of alignment.
const ECLIPSE_SEASON_HALF_WIDTH_DAYS: f64 = 18.0;

/// Reference new moon: 2000-01-06 18:14 UTC.
fn new_moon_anchor() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2000, 1, 6)
        .and_then(|d| d.and_hms_opt(18, 14, 0))
        .expect("valid anchor date")
}

/// Reference node alignment: the total lunar eclipse of 2000-07-16.
fn eclipse_anchor() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2000, 7, 16)
        .and_then(|d| d.and_hms_opt(13, 55, 0))
        .expect("valid anchor date")
}

fn days_since(anchor: NaiveDateTime, t: NaiveDateTime) -> f64 {
    (t - anchor).num_seconds() as f64 / 86_400.0
}

/// Age of the moon in days, in `[0, SYNODIC_MONTH_DAYS)`.
pub fn moon_age_days(t: NaiveDateTime) -> f64 {
    days_since(new_moon_anchor(), t).rem_euclid(SYNODIC_MONTH_DAYS)
}

/// One of the eight conventional phase names.
pub fn moon_phase(t: NaiveDateTime) -> &'static str {
    const PHASES: [&str; 8] = [
        "New Moon",
        "Waxing Crescent",
        "First Quarter",
        "Waxing Gibbous",
        "Full Moon",
        "Waning Gibbous",
        "Last Quarter",
        "Waning Crescent",
    ];
    let age = moon_age_days(t);
    let index = ((age / SYNODIC_MONTH_DAYS) * 8.0).round() as usize % 8;
    PHASES[index]
}

/// Illuminated fraction of the lunar disc, as a whole percentage.
pub fn moon_illumination_percent(t: NaiveDateTime) -> u8 {
    let age = moon_age_days(t);
    let fraction = (1.0 - (std::f64::consts::TAU * age / SYNODIC_MONTH_DAYS).cos()) / 2.0;
    (fraction * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Tropical zodiac sun sign for a calendar date.
pub fn zodiac_sign(d: NaiveDate) -> &'static str {
    let m = d.month();
    let day = d.day();
    match (m, day) {
        (3, 21..) | (4, ..=19) => "Aries",
        (4, 20..) | (5, ..=20) => "Taurus",
        (5, 21..) | (6, ..=20) => "Gemini",
        (6, 21..) | (7, ..=22) => "Cancer",
        (7, 23..) | (8, ..=22) => "Leo",
        (8, 23..) | (9, ..=22) => "Virgo",
        (9, 23..) | (10, ..=22) => "Libra",
        (10, 23..) | (11, ..=21) => "Scorpio",
        (11, 22..) | (12, ..=21) => "Sagittarius",
        (12, 22..) | (1, ..=19) => "Capricorn",
        (1, 20..) | (2, ..=18) => "Aquarius",
        _ => "Pisces",
    }
}

/// Chaldean ruler of the weekday.
pub fn day_planet(d: NaiveDate) -> &'static str {
    match d.weekday() {
        Weekday::Sun => "the Sun",
        Weekday::Mon => "the Moon",
        Weekday::Tue => "Mars",
        Weekday::Wed => "Mercury",
        Weekday::Thu => "Jupiter",
        Weekday::Fri => "Venus",
        Weekday::Sat => "Saturn",
    }
}

/// Meteorological season, northern hemisphere.
pub fn season(d: NaiveDate) -> &'static str {
    match d.month() {
        12 | 1 | 2 => "winter",
        3..=5 => "spring",
        6..=8 => "summer",
        _ => "autumn",
    }
}

/// Whether the date falls inside an eclipse season.
///
/// Heuristic: within [`ECLIPSE_SEASON_HALF_WIDTH_DAYS`] of a multiple of
/// [`ECLIPSE_SEMESTER_DAYS`] from the anchor eclipse. Good enough for a
/// horoscope line, not for astronomy.
pub fn in_eclipse_season(t: NaiveDateTime) -> bool {
    let offset = days_since(eclipse_anchor(), t).rem_euclid(ECLIPSE_SEMESTER_DAYS);
    offset.min(ECLIPSE_SEMESTER_DAYS - offset) <= ECLIPSE_SEASON_HALF_WIDTH_DAYS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn on(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_anchor_new_moon() {
        let t = at(2000, 1, 6, 18, 14);
        assert!(moon_age_days(t) < 0.001);
        assert_eq!(moon_phase(t), "New Moon");
        assert!(moon_illumination_percent(t) < 1);
    }

    #[test]
    fn test_full_moon_of_january_2000() {
        // Total lunar eclipse night, half a synodic month after the anchor.
        let t = at(2000, 1, 21, 4, 40);
        assert_eq!(moon_phase(t), "Full Moon");
        assert!(moon_illumination_percent(t) >= 95);
    }

    #[test]
    fn test_first_quarter() {
        let t = at(2000, 1, 14, 12, 0);
        assert_eq!(moon_phase(t), "First Quarter");
    }

    #[test]
    fn test_new_moon_cycles_persist() {
        // A new moon 297 lunations after the anchor.
        let t = at(2024, 1, 11, 12, 0);
        assert_eq!(moon_phase(t), "New Moon");
        assert!(moon_illumination_percent(t) < 5);
    }

    #[test]
    fn test_zodiac_boundaries() {
        assert_eq!(zodiac_sign(on(2024, 3, 21)), "Aries");
        assert_eq!(zodiac_sign(on(2024, 4, 19)), "Aries");
        assert_eq!(zodiac_sign(on(2024, 4, 20)), "Taurus");
        assert_eq!(zodiac_sign(on(2024, 1, 1)), "Capricorn");
        assert_eq!(zodiac_sign(on(2024, 1, 20)), "Aquarius");
        assert_eq!(zodiac_sign(on(2024, 2, 19)), "Pisces");
        assert_eq!(zodiac_sign(on(2024, 12, 22)), "Capricorn");
    }

    #[test]
    fn test_day_planet() {
        // 2024-01-01 was a Monday.
        assert_eq!(day_planet(on(2024, 1, 1)), "the Moon");
        assert_eq!(day_planet(on(2024, 1, 6)), "Saturn");
        assert_eq!(day_planet(on(2024, 1, 7)), "the Sun");
    }

    #[test]
    fn test_season() {
        assert_eq!(season(on(2024, 1, 15)), "winter");
        assert_eq!(season(on(2024, 4, 15)), "spring");
        assert_eq!(season(on(2024, 7, 15)), "summer");
        assert_eq!(season(on(2024, 10, 15)), "autumn");
        assert_eq!(season(on(2024, 12, 15)), "winter");
    }

    #[test]
    fn test_eclipse_season_anchor() {
        assert!(in_eclipse_season(at(2000, 7, 16, 13, 55)));
        // Quarter of an eclipse year away from alignment: quiet skies.
        assert!(!in_eclipse_season(at(2000, 10, 16, 0, 0)));
    }

    #[test]
    fn test_illumination_bounds() {
        for day in 0..60 {
            let t = at(2023, 1, 1, 0, 0) + chrono::Duration::days(day);
            let pct = moon_illumination_percent(t);
            assert!(pct <= 100);
        }
    }
}

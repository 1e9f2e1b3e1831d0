//! Calendar-aware duration spans.
//!
//! A [`Span`] is parsed from the designator syntax
//! `P[nY][nM][nD][T[nH][nM][nS]]` and anchors a behavior's or plan's
//! active window. Month and year arithmetic is calendar-aware (a month is
//! not a fixed number of days); days, hours, minutes, and seconds are
//! fixed-length.

use std::fmt;
use std::str::FromStr;

use chrono::{Days, Months};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

/// Milliseconds in one fixed-length day.
const MILLIS_PER_DAY: i64 = 86_400_000;

// ---------------------------------------------------------------------------
// Span
// ---------------------------------------------------------------------------

/// A normalized duration. Fields are kept separate so that calendar
/// arithmetic can apply them in order: years, months, days, then time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub years: u32,
    pub months: u32,
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl Span {
    /// Parse a designator-syntax duration expression.
    ///
    /// At least one field is required. An empty time portion (`P1DT`,
    /// `PT`), fields out of their designator order (`P1D2Y`), repeated
    /// fields, and unknown designators are all malformed.
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        let malformed = |reason: String| CoreError::MalformedDuration {
            input: input.to_string(),
            reason,
        };

        let mut chars = input.chars().peekable();
        if chars.next() != Some('P') {
            return Err(malformed("must start with 'P'".into()));
        }

        let mut span = Span::default();
        let mut in_time = false;
        let mut last_rank = -1i32;
        let mut total_fields = 0u32;
        let mut section_fields = 0u32;

        while let Some(&c) = chars.peek() {
            if c == 'T' {
                if in_time {
                    return Err(malformed("repeated 'T' separator".into()));
                }
                chars.next();
                in_time = true;
                last_rank = -1;
                section_fields = 0;
                continue;
            }

            if !c.is_ascii_digit() {
                return Err(malformed(format!("unexpected character '{c}'")));
            }
            let mut value: u64 = 0;
            while let Some(digit) = chars.peek().and_then(|d| d.to_digit(10)) {
                value = value * 10 + digit as u64;
                if value > u32::MAX as u64 {
                    return Err(malformed("field value out of range".into()));
                }
                chars.next();
            }

            let designator = chars
                .next()
                .ok_or_else(|| malformed("number without a designator".into()))?;
            let (rank, slot) = match (in_time, designator) {
                (false, 'Y') => (0, &mut span.years),
                (false, 'M') => (1, &mut span.months),
                (false, 'D') => (2, &mut span.days),
                (false, 'H' | 'S') => {
                    return Err(malformed(format!(
                        "time designator '{designator}' before 'T' separator"
                    )))
                }
                (true, 'H') => (0, &mut span.hours),
                (true, 'M') => (1, &mut span.minutes),
                (true, 'S') => (2, &mut span.seconds),
                (_, other) => return Err(malformed(format!("unknown designator '{other}'"))),
            };
            if rank <= last_rank {
                return Err(malformed(format!("designator '{designator}' out of order")));
            }
            last_rank = rank;
            *slot = value as u32;
            total_fields += 1;
            section_fields += 1;
        }

        if in_time && section_fields == 0 {
            return Err(malformed("empty time portion after 'T'".into()));
        }
        if total_fields == 0 {
            return Err(malformed("at least one field is required".into()));
        }
        Ok(span)
    }

    /// Returns `true` when every field is zero.
    pub fn is_zero(&self) -> bool {
        *self == Span::default()
    }

    /// The instant this span ends when anchored at `start`.
    ///
    /// Applied in order years→months→days→time. Year/month addition is
    /// calendar-aware and clamps to the last day of a shorter target month
    /// (`chrono` semantics); out-of-range calendar arithmetic is an error.
    pub fn end(&self, start: Timestamp) -> Result<Timestamp, CoreError> {
        let overflow =
            || CoreError::Validation(format!("duration {self} out of range from {start}"));

        let total_months = self.years as u64 * 12 + self.months as u64;
        let months = u32::try_from(total_months).map_err(|_| overflow())?;
        let at = start
            .checked_add_months(Months::new(months))
            .ok_or_else(overflow)?;
        let at = at
            .checked_add_days(Days::new(self.days as u64))
            .ok_or_else(overflow)?;
        let seconds =
            self.hours as i64 * 3600 + self.minutes as i64 * 60 + self.seconds as i64;
        at.checked_add_signed(chrono::Duration::seconds(seconds))
            .ok_or_else(overflow)
    }

    /// Fraction of the span elapsed at `now`, clamped to `[0, 1]`.
    ///
    /// Returns 0 before `start` and 1 at or after `start + span`. A
    /// zero-length span is fully elapsed the moment it starts.
    pub fn elapsed_fraction(&self, start: Timestamp, now: Timestamp) -> Result<f64, CoreError> {
        if now <= start {
            return Ok(0.0);
        }
        let end = self.end(start)?;
        if now >= end {
            return Ok(1.0);
        }
        let total = (end - start).num_milliseconds();
        if total <= 0 {
            return Ok(1.0);
        }
        let elapsed = (now - start).num_milliseconds();
        Ok((elapsed as f64 / total as f64).clamp(0.0, 1.0))
    }

    /// Whole days spanned when anchored at `start`, partial days rounded
    /// up, minimum 1. Drives the day count of generated plans.
    pub fn day_count(&self, start: Timestamp) -> Result<i64, CoreError> {
        let end = self.end(start)?;
        let millis = (end - start).num_milliseconds();
        let days = (millis + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY;
        Ok(days.max(1))
    }
}

impl fmt::Display for Span {
    /// Canonical designator form; the zero span renders as `PT0S`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P")?;
        if self.years > 0 {
            write!(f, "{}Y", self.years)?;
        }
        if self.months > 0 {
            write!(f, "{}M", self.months)?;
        }
        if self.days > 0 {
            write!(f, "{}D", self.days)?;
        }
        if self.hours > 0 || self.minutes > 0 || self.seconds > 0 {
            write!(f, "T")?;
            if self.hours > 0 {
                write!(f, "{}H", self.hours)?;
            }
            if self.minutes > 0 {
                write!(f, "{}M", self.minutes)?;
            }
            if self.seconds > 0 {
                write!(f, "{}S", self.seconds)?;
            }
        } else if self.is_zero() {
            write!(f, "T0S")?;
        }
        Ok(())
    }
}

impl FromStr for Span {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Span::parse(s)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> Timestamp {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    // -----------------------------------------------------------------------
    // Parsing
    // -----------------------------------------------------------------------

    #[test]
    fn parse_full_expression() {
        let span = Span::parse("P1Y2M3DT4H5M6S").unwrap();
        assert_eq!(span.years, 1);
        assert_eq!(span.months, 2);
        assert_eq!(span.days, 3);
        assert_eq!(span.hours, 4);
        assert_eq!(span.minutes, 5);
        assert_eq!(span.seconds, 6);
    }

    #[test]
    fn parse_date_only() {
        let span = Span::parse("P10D").unwrap();
        assert_eq!(span.days, 10);
        assert_eq!(span.hours, 0);
    }

    #[test]
    fn parse_time_only() {
        let span = Span::parse("PT90M").unwrap();
        assert_eq!(span.minutes, 90);
    }

    #[test]
    fn parse_month_and_minute_disambiguated_by_t() {
        let span = Span::parse("P1MT1M").unwrap();
        assert_eq!(span.months, 1);
        assert_eq!(span.minutes, 1);
    }

    #[test]
    fn parse_empty_input_rejected() {
        assert!(matches!(
            Span::parse(""),
            Err(CoreError::MalformedDuration { .. })
        ));
    }

    #[test]
    fn parse_bare_p_rejected() {
        let err = Span::parse("P").unwrap_err();
        assert!(err.to_string().contains("at least one field"));
    }

    #[test]
    fn parse_empty_time_portion_rejected() {
        let err = Span::parse("P1DT").unwrap_err();
        assert!(err.to_string().contains("empty time portion"));
        assert!(Span::parse("PT").is_err());
    }

    #[test]
    fn parse_out_of_order_fields_rejected() {
        let err = Span::parse("P1D2Y").unwrap_err();
        assert!(err.to_string().contains("out of order"));
        assert!(Span::parse("PT5S4H").is_err());
    }

    #[test]
    fn parse_repeated_field_rejected() {
        assert!(Span::parse("P1D2D").is_err());
    }

    #[test]
    fn parse_time_designator_without_t_rejected() {
        let err = Span::parse("P3H").unwrap_err();
        assert!(err.to_string().contains("before 'T'"));
    }

    #[test]
    fn parse_unknown_designator_rejected() {
        assert!(Span::parse("P1W").is_err());
        assert!(Span::parse("P1X").is_err());
    }

    #[test]
    fn parse_number_without_designator_rejected() {
        assert!(Span::parse("P12").is_err());
    }

    #[test]
    fn parse_missing_leading_p_rejected() {
        assert!(Span::parse("1Y").is_err());
    }

    // -----------------------------------------------------------------------
    // End computation
    // -----------------------------------------------------------------------

    #[test]
    fn end_applies_calendar_months() {
        // One month from Jan 31 clamps to Feb 28 (2026 is not a leap year).
        let span = Span::parse("P1M").unwrap();
        let end = span.end(ts(2026, 1, 31, 0, 0, 0)).unwrap();
        assert_eq!(end, ts(2026, 2, 28, 0, 0, 0));
    }

    #[test]
    fn end_applies_fields_in_order() {
        let span = Span::parse("P1Y2DT3H4M5S").unwrap();
        let end = span.end(ts(2026, 1, 1, 0, 0, 0)).unwrap();
        assert_eq!(end, ts(2027, 1, 3, 3, 4, 5));
    }

    #[test]
    fn end_of_zero_span_is_start() {
        let span = Span::default();
        let start = ts(2026, 6, 1, 12, 0, 0);
        assert_eq!(span.end(start).unwrap(), start);
    }

    // -----------------------------------------------------------------------
    // Elapsed fraction
    // -----------------------------------------------------------------------

    #[test]
    fn fraction_zero_before_start() {
        let span = Span::parse("P10D").unwrap();
        let start = ts(2026, 3, 10, 0, 0, 0);
        let before = ts(2026, 3, 9, 0, 0, 0);
        assert_eq!(span.elapsed_fraction(start, before).unwrap(), 0.0);
        assert_eq!(span.elapsed_fraction(start, start).unwrap(), 0.0);
    }

    #[test]
    fn fraction_one_at_and_after_end() {
        let span = Span::parse("P10D").unwrap();
        let start = ts(2026, 3, 10, 0, 0, 0);
        assert_eq!(
            span.elapsed_fraction(start, ts(2026, 3, 20, 0, 0, 0)).unwrap(),
            1.0
        );
        assert_eq!(
            span.elapsed_fraction(start, ts(2026, 4, 1, 0, 0, 0)).unwrap(),
            1.0
        );
    }

    #[test]
    fn fraction_halfway() {
        let span = Span::parse("P10D").unwrap();
        let start = ts(2026, 3, 10, 0, 0, 0);
        let halfway = ts(2026, 3, 15, 0, 0, 0);
        let fraction = span.elapsed_fraction(start, halfway).unwrap();
        assert!((fraction - 0.5).abs() < 1e-9);
    }

    #[test]
    fn fraction_monotone_in_now() {
        let span = Span::parse("P1M").unwrap();
        let start = ts(2026, 2, 1, 0, 0, 0);
        let mut previous = 0.0;
        for day in 0..40 {
            let now = start + chrono::Duration::days(day);
            let fraction = span.elapsed_fraction(start, now).unwrap();
            assert!(fraction >= previous);
            assert!((0.0..=1.0).contains(&fraction));
            previous = fraction;
        }
    }

    #[test]
    fn fraction_one_day_into_long_span() {
        // "P1Y2DT3H4M5S" from 2026-01-01 ends 2027-01-03T03:04:05, i.e.
        // 367 days + 3h4m5s. One day in, the fraction is close to 1/367.13.
        let span = Span::parse("P1Y2DT3H4M5S").unwrap();
        let start = ts(2026, 1, 1, 0, 0, 0);
        let one_day_in = ts(2026, 1, 2, 0, 0, 0);
        let fraction = span.elapsed_fraction(start, one_day_in).unwrap();

        let total_days =
            (span.end(start).unwrap() - start).num_milliseconds() as f64 / 86_400_000.0;
        assert!((fraction - 1.0 / total_days).abs() < 1e-9);
        assert!(fraction > 0.002 && fraction < 0.003);
    }

    #[test]
    fn zero_span_fraction_steps_to_one() {
        let span = Span::default();
        let start = ts(2026, 5, 1, 0, 0, 0);
        assert_eq!(span.elapsed_fraction(start, start).unwrap(), 0.0);
        assert_eq!(
            span.elapsed_fraction(start, start + chrono::Duration::seconds(1))
                .unwrap(),
            1.0
        );
    }

    // -----------------------------------------------------------------------
    // Day count
    // -----------------------------------------------------------------------

    #[test]
    fn day_count_whole_days() {
        let span = Span::parse("P7D").unwrap();
        assert_eq!(span.day_count(ts(2026, 4, 1, 0, 0, 0)).unwrap(), 7);
    }

    #[test]
    fn day_count_rounds_partial_days_up() {
        let span = Span::parse("P2DT1H").unwrap();
        assert_eq!(span.day_count(ts(2026, 4, 1, 0, 0, 0)).unwrap(), 3);
    }

    #[test]
    fn day_count_minimum_is_one() {
        let span = Span::parse("PT30M").unwrap();
        assert_eq!(span.day_count(ts(2026, 4, 1, 0, 0, 0)).unwrap(), 1);
    }

    #[test]
    fn day_count_calendar_month() {
        let span = Span::parse("P1M").unwrap();
        assert_eq!(span.day_count(ts(2026, 2, 1, 0, 0, 0)).unwrap(), 28);
        assert_eq!(span.day_count(ts(2026, 3, 1, 0, 0, 0)).unwrap(), 31);
    }

    // -----------------------------------------------------------------------
    // Display round-trip
    // -----------------------------------------------------------------------

    #[test]
    fn display_round_trips() {
        for expr in ["P1Y2M3DT4H5M6S", "P10D", "PT90M", "P1MT1M"] {
            let span = Span::parse(expr).unwrap();
            assert_eq!(span.to_string(), expr);
            assert_eq!(span.to_string().parse::<Span>().unwrap(), span);
        }
    }

    #[test]
    fn display_zero_span() {
        assert_eq!(Span::default().to_string(), "PT0S");
    }
}

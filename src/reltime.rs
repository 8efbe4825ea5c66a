//! Relative timestamps ("9 minutes ago", "hace 9 minutos") resolved against a clock.
//!
//! Reddit only renders coarse ages, so a resolved [`Stamp`] keeps the precision of the unit
//! it came from: "3 days ago" is a date, "12 minutes ago" is a minute.

use core::{cmp::Ordering, fmt};

use chrono::{Local, NaiveDateTime, TimeDelta, Timelike};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Locale {
    /// `<amount> <unit> ago`
    #[default]
    English,
    /// `hace <amount> <unit>`
    Spanish,
}

/// Ordered from finest to coarsest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Precision {
    Second,
    Minute,
    Hour,
    Day,
}

impl Precision {
    const fn format(self) -> &'static str {
        match self {
            Self::Second => "%Y-%m-%d %H:%M:%S",
            Self::Minute => "%Y-%m-%d %H:%M",
            Self::Hour => "%Y-%m-%d %H",
            Self::Day => "%Y-%m-%d",
        }
    }

    fn offset(self, amount: i64) -> Option<TimeDelta> {
        match self {
            Self::Second => TimeDelta::try_seconds(amount),
            Self::Minute => TimeDelta::try_minutes(amount),
            Self::Hour => TimeDelta::try_hours(amount),
            Self::Day => TimeDelta::try_days(amount),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stamp {
    pub at: NaiveDateTime,
    pub precision: Precision,
}

impl Stamp {
    #[must_use]
    pub fn new(at: NaiveDateTime, precision: Precision) -> Self {
        Self {
            at: truncate(at, precision),
            precision,
        }
    }

    /// Compares at the coarser of the two precisions, so a post from this morning is not
    /// "before" a cutoff that only says "today".
    #[must_use]
    pub fn is_before(&self, cutoff: &Self) -> bool {
        let precision = self.precision.max(cutoff.precision);
        truncate(self.at, precision).cmp(&truncate(cutoff.at, precision)) == Ordering::Less
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.at.format(self.precision.format()))
    }
}

#[must_use]
pub fn truncate(at: NaiveDateTime, precision: Precision) -> NaiveDateTime {
    let (h, m, s) = match precision {
        Precision::Second => (at.hour(), at.minute(), at.second()),
        Precision::Minute => (at.hour(), at.minute(), 0),
        Precision::Hour => (at.hour(), 0, 0),
        Precision::Day => (0, 0, 0),
    };
    at.date().and_hms_opt(h, m, s).unwrap_or(at)
}

fn unit(locale: Locale, word: &str) -> Option<Precision> {
    let word = word.strip_suffix('.').unwrap_or(word);
    #[rustfmt::skip]
    let precision = match (locale, word) {
        (Locale::English, "s" | "sec" | "secs" | "second" | "seconds") => Precision::Second,
        (Locale::English, "m" | "min" | "mins" | "minute" | "minutes") => Precision::Minute,
        (Locale::English, "h" | "hr" | "hrs" | "hour" | "hours") => Precision::Hour,
        (Locale::English, "d" | "day" | "days") => Precision::Day,
        (Locale::Spanish, "s" | "segundo" | "segundos") => Precision::Second,
        (Locale::Spanish, "min" | "minuto" | "minutos") => Precision::Minute,
        (Locale::Spanish, "h" | "hora" | "horas") => Precision::Hour,
        (Locale::Spanish, "d" | "dia" | "dias" | "día" | "días") => Precision::Day,
        _ => return None,
    };
    Some(precision)
}

fn split(locale: Locale, text: &str) -> Option<(&str, &str)> {
    let mut words = text.split_whitespace();
    let parts = match locale {
        Locale::English => {
            let amount = words.next()?;
            let unit = words.next()?;
            (words.next()? == "ago").then_some((amount, unit))
        }
        Locale::Spanish => {
            if words.next()? != "hace" {
                return None;
            }
            Some((words.next()?, words.next()?))
        }
    };
    if words.next().is_some() {
        return None;
    }
    parts
}

/// Resolves `text` against `now`. Anything that does not parse is `None`.
///
/// A positive amount lands strictly before `now`. An amount of zero ("0 seconds ago")
/// resolves to `now` itself, truncated to the unit.
#[must_use]
pub fn resolve_at(text: &str, locale: Locale, now: NaiveDateTime) -> Option<Stamp> {
    let text = text.trim().to_lowercase();
    let (amount, word) = split(locale, &text)?;
    let amount = amount.parse::<u32>().ok()?;
    let precision = unit(locale, word)?;
    let at = now.checked_sub_signed(precision.offset(amount.into())?)?;
    Some(Stamp::new(at, precision))
}

#[must_use]
pub fn resolve(text: &str, locale: Locale) -> Option<Stamp> {
    resolve_at(text, locale, Local::now().naive_local())
}

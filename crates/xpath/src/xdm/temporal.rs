//! Lexical parsing and canonical formatting for the XML Schema date, time and
//! duration types.
//!
//! Parsers return `None` on any malformed lexical form; callers map that to
//! `err:FORG0001`.

use chrono::{Datelike, Duration as ChronoDuration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

pub const SECONDS_PER_DAY: i64 = 86_400;
const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Split a trailing timezone designator (`Z`, `+hh:mm`, `-hh:mm`) off `s`.
fn split_timezone(s: &str) -> Option<(&str, Option<FixedOffset>)> {
    if let Some(body) = s.strip_suffix('Z') {
        return Some((body, FixedOffset::east_opt(0)));
    }
    if s.len() >= 6 && s.is_char_boundary(s.len() - 6) {
        let (body, tz) = s.split_at(s.len() - 6);
        let bytes = tz.as_bytes();
        if (bytes[0] == b'+' || bytes[0] == b'-') && bytes[3] == b':' {
            let hours: i32 = tz[1..3].parse().ok()?;
            let minutes: i32 = tz[4..6].parse().ok()?;
            if hours > 14 || minutes > 59 || (hours == 14 && minutes != 0) {
                return None;
            }
            let mut secs = hours * 3600 + minutes * 60;
            if bytes[0] == b'-' {
                secs = -secs;
            }
            return Some((body, Some(FixedOffset::east_opt(secs)?)));
        }
    }
    Some((s, None))
}

fn all_digits(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_digit())
}

fn parse_date_body(s: &str) -> Option<NaiveDate> {
    let (negative, rest) = match s.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, s),
    };
    let mut parts = rest.splitn(3, '-');
    let year_s = parts.next()?;
    let month_s = parts.next()?;
    let day_s = parts.next()?;
    if year_s.len() < 4 || !year_s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if year_s.len() > 4 && year_s.starts_with('0') {
        return None;
    }
    if !all_digits(month_s, 2) || !all_digits(day_s, 2) {
        return None;
    }
    let mut year: i32 = year_s.parse().ok()?;
    if negative {
        year = -year;
    }
    NaiveDate::from_ymd_opt(year, month_s.parse().ok()?, day_s.parse().ok()?)
}

/// Parse `hh:mm:ss(.s+)?`. Returns the time and whether it was `24:00:00`.
fn parse_time_body(s: &str) -> Option<(NaiveTime, bool)> {
    let mut parts = s.splitn(3, ':');
    let h_s = parts.next()?;
    let m_s = parts.next()?;
    let sec_s = parts.next()?;
    if !all_digits(h_s, 2) || !all_digits(m_s, 2) {
        return None;
    }
    let (whole, frac) = match sec_s.split_once('.') {
        Some((w, f)) => {
            if f.is_empty() || !f.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            (w, Some(f))
        }
        None => (sec_s, None),
    };
    if !all_digits(whole, 2) {
        return None;
    }
    let h: u32 = h_s.parse().ok()?;
    let m: u32 = m_s.parse().ok()?;
    let sec: u32 = whole.parse().ok()?;
    let nanos: u32 = match frac {
        Some(f) => {
            let digits: String = f.chars().chain(core::iter::repeat('0')).take(9).collect();
            digits.parse().ok()?
        }
        None => 0,
    };
    if h == 24 {
        if m == 0 && sec == 0 && nanos == 0 {
            return Some((NaiveTime::MIN, true));
        }
        return None;
    }
    NaiveTime::from_hms_nano_opt(h, m, sec, nanos).map(|t| (t, false))
}

pub fn parse_date(s: &str) -> Option<(NaiveDate, Option<FixedOffset>)> {
    let (body, tz) = split_timezone(s.trim())?;
    Some((parse_date_body(body)?, tz))
}

pub fn parse_time(s: &str) -> Option<(NaiveTime, Option<FixedOffset>)> {
    let (body, tz) = split_timezone(s.trim())?;
    let (time, _) = parse_time_body(body)?;
    Some((time, tz))
}

/// Parse `xs:dateTime`. `24:00:00` rolls over to midnight of the next day.
pub fn parse_date_time(s: &str) -> Option<(NaiveDateTime, Option<FixedOffset>)> {
    let (body, tz) = split_timezone(s.trim())?;
    let (date_s, time_s) = body.split_once('T')?;
    let date = parse_date_body(date_s)?;
    let (time, end_of_day) = parse_time_body(time_s)?;
    let mut dt = date.and_time(time);
    if end_of_day {
        dt = dt.checked_add_signed(ChronoDuration::days(1))?;
    }
    Some((dt, tz))
}

/// Parse an `xs:duration` lexical form into `(months, seconds)`. Seconds
/// keep their fractional digits exactly.
pub fn parse_duration(s: &str) -> Option<(i32, Decimal)> {
    let s = s.trim();
    let (negative, rest) = match s.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, s),
    };
    let rest = rest.strip_prefix('P')?;
    let (date_part, time_part) = match rest.split_once('T') {
        Some((d, t)) => {
            if t.is_empty() {
                return None;
            }
            (d, Some(t))
        }
        None => (rest, None),
    };
    if date_part.is_empty() && time_part.is_none() {
        return None;
    }
    let mut months: i64 = 0;
    let mut seconds = Decimal::ZERO;
    let mut seen_any = false;

    let mut num = String::new();
    let mut order = 0;
    for c in date_part.chars() {
        if c.is_ascii_digit() {
            num.push(c);
            continue;
        }
        if num.is_empty() {
            return None;
        }
        let v: i64 = num.parse().ok()?;
        num.clear();
        let rank = match c {
            'Y' => 1,
            'M' => 2,
            'D' => 3,
            _ => return None,
        };
        if rank <= order {
            return None;
        }
        order = rank;
        seen_any = true;
        match c {
            'Y' => months = months.checked_add(v.checked_mul(12)?)?,
            'M' => months = months.checked_add(v)?,
            _ => {
                seconds = seconds.checked_add(Decimal::from(v).checked_mul(SECONDS_PER_DAY.into())?)?;
            }
        }
    }
    if !num.is_empty() {
        return None;
    }

    if let Some(t) = time_part {
        let mut order = 0;
        let mut time_seen = false;
        for c in t.chars() {
            if c.is_ascii_digit() || c == '.' {
                num.push(c);
                continue;
            }
            if num.is_empty() {
                return None;
            }
            let rank = match c {
                'H' => 1,
                'M' => 2,
                'S' => 3,
                _ => return None,
            };
            if rank <= order {
                return None;
            }
            order = rank;
            let v: Decimal = if c == 'S' {
                if let Some((whole, frac)) = num.split_once('.')
                    && (whole.is_empty() || frac.is_empty() || frac.contains('.'))
                {
                    return None;
                }
                num.parse().ok()?
            } else {
                if num.contains('.') {
                    return None;
                }
                Decimal::from(num.parse::<i64>().ok()?)
            };
            num.clear();
            time_seen = true;
            let factor: i64 = match c {
                'H' => 3600,
                'M' => 60,
                _ => 1,
            };
            seconds = seconds.checked_add(v.checked_mul(factor.into())?)?;
        }
        if !num.is_empty() || !time_seen {
            return None;
        }
        seen_any = true;
    }
    if !seen_any {
        return None;
    }
    if negative {
        months = -months;
        seconds = -seconds;
    }
    Some((i32::try_from(months).ok()?, seconds.normalize()))
}

pub fn parse_year_month_duration(s: &str) -> Option<i32> {
    if s.contains('T') || s.contains('D') {
        return None;
    }
    parse_duration(s).map(|(m, _)| m)
}

pub fn parse_day_time_duration(s: &str) -> Option<Decimal> {
    let body = s.trim().trim_start_matches('-');
    let date_part = body.strip_prefix('P')?.split('T').next().unwrap_or("");
    if date_part.contains('Y') || date_part.contains('M') {
        return None;
    }
    parse_duration(s).map(|(_, secs)| secs)
}

pub fn format_timezone(tz: Option<FixedOffset>) -> String {
    match tz {
        None => String::new(),
        Some(off) => {
            let secs = off.local_minus_utc();
            if secs == 0 {
                return "Z".to_string();
            }
            let sign = if secs < 0 { '-' } else { '+' };
            let abs = secs.abs();
            format!("{sign}{:02}:{:02}", abs / 3600, (abs % 3600) / 60)
        }
    }
}

pub fn format_date(date: &NaiveDate, tz: Option<FixedOffset>) -> String {
    format!(
        "{:04}-{:02}-{:02}{}",
        date.year(),
        date.month(),
        date.day(),
        format_timezone(tz)
    )
}

pub fn format_time(time: &NaiveTime, tz: Option<FixedOffset>) -> String {
    let mut out = format!("{:02}:{:02}:{:02}", time.hour(), time.minute(), time.second());
    let nanos = time.nanosecond();
    if nanos > 0 {
        let frac = format!("{nanos:09}");
        out.push('.');
        out.push_str(frac.trim_end_matches('0'));
    }
    out.push_str(&format_timezone(tz));
    out
}

pub fn format_date_time(dt: &NaiveDateTime, tz: Option<FixedOffset>) -> String {
    let date = format_date(&dt.date(), None);
    let time = format_time(&dt.time(), tz);
    format!("{date}T{time}")
}

pub fn format_duration(months: i32, seconds: Decimal) -> String {
    if months == 0 && seconds.is_zero() {
        return "PT0S".to_string();
    }
    let negative = months < 0 || (seconds.is_sign_negative() && !seconds.is_zero());
    let months = months.unsigned_abs();
    let seconds = seconds.abs();
    let whole = seconds.trunc().to_u128().unwrap_or_default();
    let frac = seconds.fract().normalize();
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push('P');
    let (years, rem_months) = (months / 12, months % 12);
    if years > 0 {
        out.push_str(&format!("{years}Y"));
    }
    if rem_months > 0 {
        out.push_str(&format!("{rem_months}M"));
    }
    let day = u128::from(SECONDS_PER_DAY.unsigned_abs());
    let days = whole / day;
    let rem = whole % day;
    if days > 0 {
        out.push_str(&format!("{days}D"));
    }
    if rem > 0 || !frac.is_zero() {
        out.push('T');
        let (h, m, s) = (rem / 3600, (rem % 3600) / 60, rem % 60);
        if h > 0 {
            out.push_str(&format!("{h}H"));
        }
        if m > 0 {
            out.push_str(&format!("{m}M"));
        }
        if frac.is_zero() {
            if s > 0 {
                out.push_str(&format!("{s}S"));
            }
        } else {
            // `frac` renders as "0.xyz"
            let digits = frac.to_string();
            out.push_str(&format!("{s}{}S", digits.trim_start_matches('0')));
        }
    }
    out
}

/// Exact seconds as a chrono duration, at nanosecond resolution.
pub fn seconds_to_chrono(seconds: Decimal) -> Option<ChronoDuration> {
    let whole = ChronoDuration::try_seconds(seconds.trunc().to_i64()?)?;
    let nanos = (seconds.fract() * Decimal::from(NANOS_PER_SECOND)).trunc().to_i64()?;
    whole.checked_add(&ChronoDuration::nanoseconds(nanos))
}

/// Exact seconds spanned by a chrono duration.
pub fn chrono_to_seconds(d: ChronoDuration) -> Decimal {
    let whole = d.num_seconds();
    let nanos = (d - ChronoDuration::seconds(whole)).num_nanoseconds().unwrap_or_default();
    Decimal::from(whole) + Decimal::new(nanos, 9)
}

/// Instant of a local date-time in UTC. Values without a timezone are taken
/// to be in UTC (the implicit timezone).
pub fn to_utc(dt: &NaiveDateTime, tz: Option<FixedOffset>) -> Option<NaiveDateTime> {
    let offset = tz.map_or(0, |t| t.local_minus_utc());
    dt.checked_sub_signed(ChronoDuration::try_seconds(i64::from(offset))?)
}

/// Add `delta` months to `date`, clamping the day to the target month's length.
pub fn add_months_saturating(date: NaiveDate, delta: i32) -> Option<NaiveDate> {
    let total = date.year().checked_mul(12)?.checked_add(date.month0() as i32)?.checked_add(delta)?;
    let year = total.div_euclid(12);
    let month = u32::try_from(total.rem_euclid(12)).ok()? + 1;
    let mut day = date.day();
    loop {
        if let Some(d) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(d);
        }
        if day <= 28 {
            return None;
        }
        day -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_with_and_without_timezone() {
        let (d, tz) = parse_date("2024-02-29").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert!(tz.is_none());
        let (_, tz) = parse_date("2024-02-29Z").unwrap();
        assert_eq!(tz.unwrap().local_minus_utc(), 0);
        let (_, tz) = parse_date("2024-02-29-05:00").unwrap();
        assert_eq!(tz.unwrap().local_minus_utc(), -5 * 3600);
        assert!(parse_date("2023-02-29").is_none());
        assert!(parse_date("24-01-01").is_none());
    }

    #[test]
    fn date_time_end_of_day_rolls_over() {
        let (dt, _) = parse_date_time("2023-12-31T24:00:00").unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert!(parse_date_time("2023-12-31T24:00:01").is_none());
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration("P1Y2M"), Some((14, Decimal::ZERO)));
        assert_eq!(parse_duration("-P1DT2H"), Some((0, Decimal::from(-(86_400 + 7200)))));
        assert_eq!(parse_duration("PT1.9S"), Some((0, Decimal::new(19, 1))));
        assert!(parse_duration("PT.5S").is_none());
        assert!(parse_duration("PT1.S").is_none());
        assert!(parse_duration("PT1.5M").is_none());
        assert!(parse_duration("P").is_none());
        assert!(parse_duration("P1DT").is_none());
        assert!(parse_duration("P1M1Y").is_none());
        assert_eq!(parse_year_month_duration("P3M"), Some(3));
        assert!(parse_year_month_duration("P3D").is_none());
        assert!(parse_day_time_duration("P1M").is_none());
        assert_eq!(format_duration(14, Decimal::ZERO), "P1Y2M");
        assert_eq!(format_duration(0, Decimal::from(90_061)), "P1DT1H1M1S");
    }

    #[test]
    fn fractional_seconds_survive_a_round_trip() {
        let (_, secs) = parse_duration("PT1.75S").unwrap();
        assert_eq!(format_duration(0, secs), "PT1.75S");
        let (_, secs) = parse_duration("-PT0.5S").unwrap();
        assert_eq!(format_duration(0, secs), "-PT0.5S");
        assert_eq!(format_duration(0, Decimal::new(3_600_250, 3)), "PT1H0.25S");
        let d = seconds_to_chrono(Decimal::new(-15, 1)).unwrap();
        assert_eq!(d.num_milliseconds(), -1500);
        assert_eq!(chrono_to_seconds(d), Decimal::new(-15, 1));
    }

    #[test]
    fn month_arithmetic_saturates() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert_eq!(add_months_saturating(d, 1), NaiveDate::from_ymd_opt(2024, 2, 29));
    }
}

//! Binary arithmetic over atomic values: the numeric tower plus date, time
//! and duration arithmetic.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::engine::runtime::{Error, ErrorCode};
use crate::ir::ArithOp;
use crate::xdm::temporal::{self, SECONDS_PER_DAY};
use crate::xdm::XdmAtomicValue;

use super::casting::parse_lexical;
use super::numeric::{NumKind, classify, numeric_arith};

fn overflow(what: &str) -> Error {
    Error::from_code(ErrorCode::FOAR0002, format!("{what} overflow"))
}

fn unsupported(op: ArithOp, a: &XdmAtomicValue, b: &XdmAtomicValue) -> Error {
    Error::type_error(format!(
        "operator {op:?} is not defined for {} and {}",
        a.type_name(),
        b.type_name()
    ))
}

/// Untyped operands of arithmetic are cast to `xs:double`.
fn untyped_to_double(v: &XdmAtomicValue) -> Result<XdmAtomicValue, Error> {
    match v {
        XdmAtomicValue::UntypedAtomic(s) => parse_lexical("double", s, &|_| None),
        other => Ok(other.clone()),
    }
}

pub(crate) fn arithmetic(
    op: ArithOp,
    a: &XdmAtomicValue,
    b: &XdmAtomicValue,
) -> Result<XdmAtomicValue, Error> {
    let a = untyped_to_double(a)?;
    let b = untyped_to_double(b)?;
    if let (Some(x), Some(y)) = (classify(&a), classify(&b)) {
        return numeric_arith(op, x, y);
    }
    temporal_arith(op, &a, &b)
}

fn shift_seconds(dt: &NaiveDateTime, secs: Decimal) -> Result<NaiveDateTime, Error> {
    temporal::seconds_to_chrono(secs)
        .and_then(|d| dt.checked_add_signed(d))
        .ok_or_else(|| overflow("dateTime"))
}

fn shift_months(dt: &NaiveDateTime, months: i32) -> Result<NaiveDateTime, Error> {
    temporal::add_months_saturating(dt.date(), months)
        .map(|d| d.and_time(dt.time()))
        .ok_or_else(|| overflow("date"))
}

fn midnight(d: &NaiveDate) -> NaiveDateTime {
    d.and_time(NaiveTime::MIN)
}

fn seconds_between(
    a: &NaiveDateTime,
    ta: Option<chrono::FixedOffset>,
    b: &NaiveDateTime,
    tb: Option<chrono::FixedOffset>,
) -> Result<Decimal, Error> {
    let (Some(x), Some(y)) = (temporal::to_utc(a, ta), temporal::to_utc(b, tb)) else {
        return Err(overflow("dateTime"));
    };
    Ok(temporal::chrono_to_seconds(x - y))
}

/// Month count with the sign `op` gives it.
fn signed_months(op: ArithOp, m: i32) -> Result<i32, Error> {
    match op {
        ArithOp::Sub => m.checked_neg().ok_or_else(|| overflow("yearMonthDuration")),
        _ => Ok(m),
    }
}

fn signed_seconds(op: ArithOp, s: Decimal) -> Decimal {
    if op == ArithOp::Sub { -s } else { s }
}

fn duration_ratio(x: Decimal, y: Decimal) -> Result<XdmAtomicValue, Error> {
    if y.is_zero() {
        return Err(Error::from_code(ErrorCode::FOAR0001, "division by zero duration"));
    }
    x.checked_div(y)
        .map(|q| XdmAtomicValue::Decimal(q.normalize()))
        .ok_or_else(|| overflow("duration"))
}

fn temporal_arith(
    op: ArithOp,
    a: &XdmAtomicValue,
    b: &XdmAtomicValue,
) -> Result<XdmAtomicValue, Error> {
    use ArithOp::*;
    use XdmAtomicValue as V;
    Ok(match (op, a, b) {
        (Add | Sub, V::DateTime { dt, tz }, V::DayTimeDuration(s)) => V::DateTime {
            dt: shift_seconds(dt, signed_seconds(op, *s))?,
            tz: *tz,
        },
        (Add, V::DayTimeDuration(s), V::DateTime { dt, tz }) => V::DateTime {
            dt: shift_seconds(dt, *s)?,
            tz: *tz,
        },
        (Add | Sub, V::DateTime { dt, tz }, V::YearMonthDuration(m)) => V::DateTime {
            dt: shift_months(dt, signed_months(op, *m)?)?,
            tz: *tz,
        },
        (Add, V::YearMonthDuration(m), V::DateTime { dt, tz }) => V::DateTime {
            dt: shift_months(dt, *m)?,
            tz: *tz,
        },
        (Add | Sub, V::Date { date, tz }, V::DayTimeDuration(s)) => V::Date {
            date: shift_seconds(&midnight(date), signed_seconds(op, *s))?.date(),
            tz: *tz,
        },
        (Add, V::DayTimeDuration(s), V::Date { date, tz }) => V::Date {
            date: shift_seconds(&midnight(date), *s)?.date(),
            tz: *tz,
        },
        (Add | Sub, V::Date { date, tz }, V::YearMonthDuration(m)) => V::Date {
            date: shift_months(&midnight(date), signed_months(op, *m)?)?.date(),
            tz: *tz,
        },
        (Add, V::YearMonthDuration(m), V::Date { date, tz }) => V::Date {
            date: shift_months(&midnight(date), *m)?.date(),
            tz: *tz,
        },
        (Add | Sub, V::Time { time, tz }, V::DayTimeDuration(s)) => {
            let day = Decimal::from(SECONDS_PER_DAY);
            let mut wrapped = signed_seconds(op, *s)
                .checked_rem(day)
                .ok_or_else(|| overflow("time"))?;
            if wrapped.is_sign_negative() && !wrapped.is_zero() {
                wrapped += day;
            }
            let delta = temporal::seconds_to_chrono(wrapped).ok_or_else(|| overflow("time"))?;
            let (t, _) = time.overflowing_add_signed(delta);
            V::Time { time: t, tz: *tz }
        }
        (Sub, V::DateTime { dt: x, tz: tx }, V::DateTime { dt: y, tz: ty }) => {
            V::DayTimeDuration(seconds_between(x, *tx, y, *ty)?)
        }
        (Sub, V::Date { date: x, tz: tx }, V::Date { date: y, tz: ty }) => {
            V::DayTimeDuration(seconds_between(&midnight(x), *tx, &midnight(y), *ty)?)
        }
        (Sub, V::Time { time: x, tz: tx }, V::Time { time: y, tz: ty }) => {
            let day = NaiveDate::from_ymd_opt(1972, 12, 31).unwrap_or_default();
            V::DayTimeDuration(seconds_between(&day.and_time(*x), *tx, &day.and_time(*y), *ty)?)
        }
        (Add, V::YearMonthDuration(x), V::YearMonthDuration(y)) => {
            V::YearMonthDuration(x.checked_add(*y).ok_or_else(|| overflow("duration"))?)
        }
        (Sub, V::YearMonthDuration(x), V::YearMonthDuration(y)) => {
            V::YearMonthDuration(x.checked_sub(*y).ok_or_else(|| overflow("duration"))?)
        }
        (Add, V::DayTimeDuration(x), V::DayTimeDuration(y)) => {
            V::DayTimeDuration(x.checked_add(*y).ok_or_else(|| overflow("duration"))?)
        }
        (Sub, V::DayTimeDuration(x), V::DayTimeDuration(y)) => {
            V::DayTimeDuration(x.checked_sub(*y).ok_or_else(|| overflow("duration"))?)
        }
        (Div, V::YearMonthDuration(x), V::YearMonthDuration(y)) => {
            duration_ratio(Decimal::from(*x), Decimal::from(*y))?
        }
        (Div, V::DayTimeDuration(x), V::DayTimeDuration(y)) => duration_ratio(*x, *y)?,
        (Mul | Div, V::YearMonthDuration(m), n) | (Mul, n, V::YearMonthDuration(m))
            if n.is_numeric() =>
        {
            V::YearMonthDuration(scale_months(*m, op, n)?)
        }
        (Mul | Div, V::DayTimeDuration(s), n) | (Mul, n, V::DayTimeDuration(s))
            if n.is_numeric() =>
        {
            V::DayTimeDuration(scale(*s, op, n, "dayTimeDuration")?)
        }
        _ => return Err(unsupported(op, a, b)),
    })
}

/// `total * n` or `total div n`, computed exactly.
fn scale(total: Decimal, op: ArithOp, n: &XdmAtomicValue, what: &str) -> Result<Decimal, Error> {
    let k = classify(n).ok_or_else(|| unsupported(op, &XdmAtomicValue::Decimal(total), n))?;
    if k.is_nan() {
        return Err(Error::from_code(
            ErrorCode::FOCA0002,
            format!("cannot scale a {what} by NaN"),
        ));
    }
    if op == ArithOp::Div && k.is_zero() {
        return Err(overflow(what));
    }
    let factor = match k {
        NumKind::Int(i) => Decimal::try_from_i128_with_scale(i, 0).ok(),
        NumKind::Dec(d) => Some(d),
        NumKind::Float(f) => Decimal::from_f32(f),
        NumKind::Double(d) => Decimal::from_f64(d),
    }
    .ok_or_else(|| overflow(what))?;
    let product = if op == ArithOp::Div {
        total.checked_div(factor)
    } else {
        total.checked_mul(factor)
    };
    product
        .map(|p| p.round_dp_with_strategy(9, RoundingStrategy::MidpointAwayFromZero).normalize())
        .ok_or_else(|| overflow(what))
}

/// Month scaling rounds half up to a whole month.
fn scale_months(m: i32, op: ArithOp, n: &XdmAtomicValue) -> Result<i32, Error> {
    let exact = scale(Decimal::from(m), op, n, "yearMonthDuration")?;
    exact
        .checked_add(Decimal::new(5, 1))
        .and_then(|r| r.floor().to_i32())
        .ok_or_else(|| overflow("yearMonthDuration"))
}

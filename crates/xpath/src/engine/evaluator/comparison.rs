//! Atomic value comparison for value and general comparisons.

use core::cmp::Ordering;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

use crate::engine::runtime::Error;
use crate::ir::ComparisonOp;
use crate::xdm::{XdmAtomicValue, temporal};

use super::casting::parse_lexical;
use super::numeric::{NumKind, classify, unify_numeric};

fn string_like(v: &XdmAtomicValue) -> Option<&str> {
    use XdmAtomicValue as V;
    match v {
        V::String(s) | V::UntypedAtomic(s) | V::AnyUri(s) | V::NormalizedString(s)
        | V::Token(s) | V::Language(s) | V::Name(s) | V::NCName(s) | V::NMTOKEN(s)
        | V::Id(s) | V::IdRef(s) | V::Entity(s) => Some(s),
        _ => None,
    }
}

fn incomparable(a: &XdmAtomicValue, b: &XdmAtomicValue) -> Error {
    Error::type_error(format!(
        "cannot compare {} with {}",
        a.type_name(),
        b.type_name()
    ))
}

fn numeric_order(a: NumKind, b: NumKind) -> Option<Ordering> {
    match unify_numeric(a, b) {
        (NumKind::Int(x), NumKind::Int(y)) => Some(x.cmp(&y)),
        (NumKind::Dec(x), NumKind::Dec(y)) => Some(x.cmp(&y)),
        (x, y) => x.to_f64().partial_cmp(&y.to_f64()),
    }
}

// Reference date for comparing times as instants.
fn time_instant(t: &NaiveTime) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1972, 12, 31)
        .unwrap_or_default()
        .and_time(*t)
}

fn instant_order(
    a: &NaiveDateTime,
    ta: Option<chrono::FixedOffset>,
    b: &NaiveDateTime,
    tb: Option<chrono::FixedOffset>,
) -> Option<Ordering> {
    Some(temporal::to_utc(a, ta)?.cmp(&temporal::to_utc(b, tb)?))
}

fn duration_parts(v: &XdmAtomicValue) -> Option<(i32, Decimal)> {
    match v {
        XdmAtomicValue::Duration { months, seconds } => Some((*months, *seconds)),
        XdmAtomicValue::YearMonthDuration(m) => Some((*m, Decimal::ZERO)),
        XdmAtomicValue::DayTimeDuration(s) => Some((0, *s)),
        _ => None,
    }
}

/// Compare two atomic values that already went through untyped
/// normalization. `Ok(false)` for every operator but `ne` when a NaN is
/// involved.
pub(crate) fn compare_atomic(
    a: &XdmAtomicValue,
    b: &XdmAtomicValue,
    op: ComparisonOp,
) -> Result<bool, Error> {
    use XdmAtomicValue as V;
    let eq_only = |equal: bool| match op {
        ComparisonOp::Eq => Ok(equal),
        ComparisonOp::Ne => Ok(!equal),
        _ => Err(Error::type_error(format!(
            "{} values are not ordered",
            a.type_name()
        ))),
    };

    if let (Some(x), Some(y)) = (classify(a), classify(b)) {
        return Ok(match numeric_order(x, y) {
            Some(ord) => op.test(ord),
            None => op == ComparisonOp::Ne,
        });
    }
    if let (Some(x), Some(y)) = (string_like(a), string_like(b)) {
        return Ok(op.test(x.cmp(y)));
    }
    let ordering = match (a, b) {
        (V::Boolean(x), V::Boolean(y)) => return eq_only(x == y),
        (
            V::QName { ns_uri: na, local: la, .. },
            V::QName { ns_uri: nb, local: lb, .. },
        ) => return eq_only(na == nb && la == lb),
        (V::Base64Binary(x), V::Base64Binary(y)) | (V::HexBinary(x), V::HexBinary(y)) => {
            return eq_only(x == y);
        }
        (V::DateTime { dt: x, tz: tx }, V::DateTime { dt: y, tz: ty }) => {
            instant_order(x, *tx, y, *ty)
        }
        (V::Date { date: x, tz: tx }, V::Date { date: y, tz: ty }) => instant_order(
            &x.and_time(NaiveTime::MIN),
            *tx,
            &y.and_time(NaiveTime::MIN),
            *ty,
        ),
        (V::Time { time: x, tz: tx }, V::Time { time: y, tz: ty }) => {
            instant_order(&time_instant(x), *tx, &time_instant(y), *ty)
        }
        (V::YearMonthDuration(x), V::YearMonthDuration(y)) => Some(x.cmp(y)),
        (V::DayTimeDuration(x), V::DayTimeDuration(y)) => Some(x.cmp(y)),
        _ => match (duration_parts(a), duration_parts(b)) {
            (Some(x), Some(y)) => return eq_only(x == y),
            _ => return Err(incomparable(a, b)),
        },
    };
    ordering
        .map(|ord| op.test(ord))
        .ok_or_else(|| Error::type_error("date/time value is out of range"))
}

/// Value comparison (`eq`, `lt`, ...): untyped operands compare as strings.
pub(crate) fn value_compare(
    a: &XdmAtomicValue,
    b: &XdmAtomicValue,
    op: ComparisonOp,
) -> Result<bool, Error> {
    compare_atomic(&untyped_as_string(a), &untyped_as_string(b), op)
}

fn untyped_as_string(v: &XdmAtomicValue) -> XdmAtomicValue {
    match v {
        XdmAtomicValue::UntypedAtomic(s) => XdmAtomicValue::String(s.clone()),
        other => other.clone(),
    }
}

fn no_prefixes(_: &str) -> Option<String> {
    None
}

/// One pairing of a general comparison. An untyped side is cast to double
/// against a number, to string against a string or untyped value, and to
/// the other side's type otherwise.
pub(crate) fn general_compare_pair(
    a: &XdmAtomicValue,
    b: &XdmAtomicValue,
    op: ComparisonOp,
) -> Result<bool, Error> {
    let coerce = |untyped: &str, other: &XdmAtomicValue| -> Result<XdmAtomicValue, Error> {
        if other.is_numeric() {
            parse_lexical("double", untyped, &no_prefixes)
        } else if matches!(other, XdmAtomicValue::UntypedAtomic(_)) || string_like(other).is_some() {
            Ok(XdmAtomicValue::String(untyped.to_string()))
        } else {
            parse_lexical(other.type_local_name(), untyped, &no_prefixes)
        }
    };
    match (a, b) {
        (XdmAtomicValue::UntypedAtomic(x), other) => compare_atomic(&coerce(x, other)?, other, op),
        (other, XdmAtomicValue::UntypedAtomic(y)) => compare_atomic(other, &coerce(y, other)?, op),
        _ => compare_atomic(a, b, op),
    }
}

//! Numeric classification, promotion and arithmetic.
//!
//! [`NumKind`] classifies an atomic value into the four arithmetic domains,
//! carrying the value. All integer subtypes share the `Int` domain.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::engine::runtime::{Error, ErrorCode};
use crate::ir::ArithOp;
use crate::xdm::XdmAtomicValue;

#[derive(Debug, Clone, Copy)]
pub(crate) enum NumKind {
    Int(i128),
    Dec(Decimal),
    Float(f32),
    Double(f64),
}

impl NumKind {
    /// Lossy for decimals beyond f64 precision.
    pub(crate) fn to_f64(self) -> f64 {
        match self {
            NumKind::Int(i) => i as f64,
            NumKind::Dec(d) => d.to_f64().unwrap_or(f64::NAN),
            NumKind::Float(f) => f64::from(f),
            NumKind::Double(d) => d,
        }
    }

    pub(crate) fn is_nan(self) -> bool {
        match self {
            NumKind::Float(f) => f.is_nan(),
            NumKind::Double(d) => d.is_nan(),
            _ => false,
        }
    }

    pub(crate) fn is_zero(self) -> bool {
        match self {
            NumKind::Int(i) => i == 0,
            NumKind::Dec(d) => d.is_zero(),
            NumKind::Float(f) => f == 0.0,
            NumKind::Double(d) => d == 0.0,
        }
    }
}

pub(crate) fn classify(v: &XdmAtomicValue) -> Option<NumKind> {
    match v {
        XdmAtomicValue::Decimal(d) => Some(NumKind::Dec(*d)),
        XdmAtomicValue::Float(f) => Some(NumKind::Float(*f)),
        XdmAtomicValue::Double(d) => Some(NumKind::Double(*d)),
        other => other.as_i128().map(NumKind::Int),
    }
}

/// Promote two operands to a common domain: integer < decimal < float < double.
/// A decimal meets a float as a float, never the reverse.
pub(crate) fn unify_numeric(a: NumKind, b: NumKind) -> (NumKind, NumKind) {
    use NumKind::*;
    match (a, b) {
        (Double(x), y) => (Double(x), Double(y.to_f64())),
        (y, Double(x)) => (Double(y.to_f64()), Double(x)),
        (Float(x), Float(y)) => (Float(x), Float(y)),
        (Float(x), Int(y)) => (Float(x), Float(y as f32)),
        (Int(x), Float(y)) => (Float(x as f32), Float(y)),
        (Float(x), Dec(y)) => (Float(x), Float(y.to_f32().unwrap_or(f32::NAN))),
        (Dec(x), Float(y)) => (Float(x.to_f32().unwrap_or(f32::NAN)), Float(y)),
        (Dec(x), Dec(y)) => (Dec(x), Dec(y)),
        (Dec(x), Int(y)) => (Dec(x), Dec(int_to_decimal(y).unwrap_or(Decimal::MAX))),
        (Int(x), Dec(y)) => (Dec(int_to_decimal(x).unwrap_or(Decimal::MAX)), Dec(y)),
        (Int(x), Int(y)) => (Int(x), Int(y)),
    }
}

pub(crate) fn int_to_decimal(i: i128) -> Option<Decimal> {
    Decimal::try_from_i128_with_scale(i, 0).ok()
}

fn overflow() -> Error {
    Error::from_code(ErrorCode::FOAR0002, "numeric overflow")
}

fn division_by_zero() -> Error {
    Error::from_code(ErrorCode::FOAR0001, "division by zero")
}

pub(crate) fn integer_result(i: i128) -> Result<XdmAtomicValue, Error> {
    i64::try_from(i)
        .map(XdmAtomicValue::Integer)
        .map_err(|_| overflow())
}

pub(crate) fn numeric_arith(op: ArithOp, a: NumKind, b: NumKind) -> Result<XdmAtomicValue, Error> {
    use NumKind::*;
    match unify_numeric(a, b) {
        (Int(x), Int(y)) => int_arith(op, x, y),
        (Dec(x), Dec(y)) => decimal_arith(op, x, y),
        (Float(x), Float(y)) => float_arith(op, f64::from(x), f64::from(y), |v| {
            XdmAtomicValue::Float(v as f32)
        }),
        (Double(x), Double(y)) => float_arith(op, x, y, XdmAtomicValue::Double),
        _ => Err(Error::type_error("numeric operands could not be promoted")),
    }
}

fn int_arith(op: ArithOp, x: i128, y: i128) -> Result<XdmAtomicValue, Error> {
    match op {
        ArithOp::Add => integer_result(x.checked_add(y).ok_or_else(overflow)?),
        ArithOp::Sub => integer_result(x.checked_sub(y).ok_or_else(overflow)?),
        ArithOp::Mul => integer_result(x.checked_mul(y).ok_or_else(overflow)?),
        // integer div integer is a decimal
        ArithOp::Div => {
            if y == 0 {
                return Err(division_by_zero());
            }
            let (dx, dy) = (
                int_to_decimal(x).ok_or_else(overflow)?,
                int_to_decimal(y).ok_or_else(overflow)?,
            );
            dx.checked_div(dy)
                .map(XdmAtomicValue::Decimal)
                .ok_or_else(overflow)
        }
        ArithOp::IDiv => {
            if y == 0 {
                return Err(division_by_zero());
            }
            integer_result(x.checked_div(y).ok_or_else(overflow)?)
        }
        ArithOp::Mod => {
            if y == 0 {
                return Err(division_by_zero());
            }
            integer_result(x.checked_rem(y).ok_or_else(overflow)?)
        }
    }
}

fn decimal_arith(op: ArithOp, x: Decimal, y: Decimal) -> Result<XdmAtomicValue, Error> {
    let dec = |r: Option<Decimal>| r.map(XdmAtomicValue::Decimal).ok_or_else(overflow);
    match op {
        ArithOp::Add => dec(x.checked_add(y)),
        ArithOp::Sub => dec(x.checked_sub(y)),
        ArithOp::Mul => dec(x.checked_mul(y)),
        ArithOp::Div => {
            if y.is_zero() {
                return Err(division_by_zero());
            }
            dec(x.checked_div(y))
        }
        ArithOp::IDiv => {
            if y.is_zero() {
                return Err(division_by_zero());
            }
            let q = x.checked_div(y).ok_or_else(overflow)?.trunc();
            integer_result(q.to_i128().ok_or_else(overflow)?)
        }
        ArithOp::Mod => {
            if y.is_zero() {
                return Err(division_by_zero());
            }
            dec(x.checked_rem(y))
        }
    }
}

fn float_arith(
    op: ArithOp,
    x: f64,
    y: f64,
    wrap: impl Fn(f64) -> XdmAtomicValue,
) -> Result<XdmAtomicValue, Error> {
    Ok(match op {
        ArithOp::Add => wrap(x + y),
        ArithOp::Sub => wrap(x - y),
        ArithOp::Mul => wrap(x * y),
        ArithOp::Div => wrap(x / y),
        ArithOp::Mod => {
            if y == 0.0 {
                return Err(division_by_zero());
            }
            wrap(x % y)
        }
        ArithOp::IDiv => {
            if y == 0.0 {
                return Err(division_by_zero());
            }
            if !x.is_finite() || y.is_nan() {
                return Err(Error::from_code(
                    ErrorCode::FOAR0002,
                    "integer division of NaN or infinity",
                ));
            }
            let q = (x / y).trunc();
            if q.abs() >= 1.0e38 {
                return Err(overflow());
            }
            return integer_result(q as i128);
        }
    })
}

pub(crate) fn negate(v: &XdmAtomicValue) -> Result<XdmAtomicValue, Error> {
    match classify(v) {
        Some(NumKind::Int(i)) => integer_result(-i),
        Some(NumKind::Dec(d)) => Ok(XdmAtomicValue::Decimal(-d)),
        Some(NumKind::Float(f)) => Ok(XdmAtomicValue::Float(-f)),
        Some(NumKind::Double(d)) => Ok(XdmAtomicValue::Double(-d)),
        None => match v {
            XdmAtomicValue::YearMonthDuration(m) => m
                .checked_neg()
                .map(XdmAtomicValue::YearMonthDuration)
                .ok_or_else(overflow),
            XdmAtomicValue::DayTimeDuration(s) => Ok(XdmAtomicValue::DayTimeDuration(-s)),
            other => Err(Error::type_error(format!(
                "unary minus is not defined for {}",
                other.type_name()
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(m: i64, s: u32) -> NumKind {
        NumKind::Dec(Decimal::new(m, s))
    }

    #[test]
    fn decimal_meets_float_as_float() {
        let r = numeric_arith(ArithOp::Add, dec(15, 1), NumKind::Float(1.0)).unwrap();
        assert!(matches!(r, XdmAtomicValue::Float(f) if (f - 2.5).abs() < 1e-6));
        let r = numeric_arith(ArithOp::Add, dec(15, 1), dec(25, 1)).unwrap();
        assert_eq!(r, XdmAtomicValue::Decimal(Decimal::new(4, 0)));
    }

    #[test]
    fn integer_division_yields_decimal() {
        let r = numeric_arith(ArithOp::Div, NumKind::Int(7), NumKind::Int(2)).unwrap();
        assert_eq!(r, XdmAtomicValue::Decimal(Decimal::new(35, 1)));
    }

    #[test]
    fn division_by_zero_policies() {
        let e = numeric_arith(ArithOp::Div, NumKind::Int(1), NumKind::Int(0)).unwrap_err();
        assert_eq!(e.code_enum(), ErrorCode::FOAR0001);
        let e = numeric_arith(ArithOp::Mod, dec(1, 0), dec(0, 0)).unwrap_err();
        assert_eq!(e.code_enum(), ErrorCode::FOAR0001);
        let r = numeric_arith(ArithOp::Div, NumKind::Double(1.0), NumKind::Double(0.0)).unwrap();
        assert_eq!(r, XdmAtomicValue::Double(f64::INFINITY));
        let e = numeric_arith(ArithOp::IDiv, NumKind::Double(1.0), NumKind::Double(0.0)).unwrap_err();
        assert_eq!(e.code_enum(), ErrorCode::FOAR0001);
    }

    #[test]
    fn integer_overflow_is_foar0002() {
        let e = numeric_arith(ArithOp::Mul, NumKind::Int(i128::from(i64::MAX)), NumKind::Int(2))
            .unwrap_err();
        assert_eq!(e.code_enum(), ErrorCode::FOAR0002);
    }

    #[test]
    fn negating_the_smallest_month_count_overflows() {
        let e = negate(&XdmAtomicValue::YearMonthDuration(i32::MIN)).unwrap_err();
        assert_eq!(e.code_enum(), ErrorCode::FOAR0002);
        assert_eq!(
            negate(&XdmAtomicValue::YearMonthDuration(-3)).unwrap(),
            XdmAtomicValue::YearMonthDuration(3)
        );
        assert_eq!(
            negate(&XdmAtomicValue::DayTimeDuration(Decimal::new(5, 1))).unwrap(),
            XdmAtomicValue::DayTimeDuration(Decimal::new(-5, 1))
        );
    }
}

//! Lexical coercion into built-in schema types, and casts between atomic
//! values.
//!
//! [`parse_lexical`] is the single coercion table: the atomizer uses it for
//! on-demand validation and casts from strings go through it, so both agree
//! on what a well-formed `xs:byte` or `xs:boolean` looks like.

use std::str::FromStr;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use chrono::NaiveTime;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use crate::engine::runtime::{Error, ErrorCode, ErrorKind};
use crate::schema::{TypeContent, TypeRegistry};
use crate::xdm::{ExpandedName, XdmAtomicValue, temporal};

use super::numeric::{NumKind, classify};
use super::xml_helpers::{
    collapse_whitespace, decode_hex, encode_hex_upper, is_language, is_name, is_ncname,
    is_nmtoken, replace_whitespace, split_qname,
};

fn invalid_lexical(target: &str, raw: &str) -> Error {
    Error::from_code(
        ErrorCode::FORG0001,
        format!("invalid lexical value '{raw}' for xs:{target}"),
    )
}

fn out_of_range(target: &str, value: impl std::fmt::Display) -> Error {
    Error::from_code(
        ErrorCode::FORG0001,
        format!("value {value} is out of range for xs:{target}"),
    )
    .with_kind(ErrorKind::Type)
}

/// Built-in types with a string value space; casts from any atomic value to
/// these go through the lexical form.
fn is_string_family(target: &str) -> bool {
    matches!(
        target,
        "string"
            | "normalizedString"
            | "token"
            | "language"
            | "Name"
            | "NCName"
            | "NMTOKEN"
            | "ID"
            | "IDREF"
            | "ENTITY"
    )
}

pub(crate) fn is_integer_type(target: &str) -> bool {
    matches!(
        target,
        "integer"
            | "long"
            | "int"
            | "short"
            | "byte"
            | "unsignedLong"
            | "unsignedInt"
            | "unsignedShort"
            | "unsignedByte"
            | "nonPositiveInteger"
            | "negativeInteger"
            | "nonNegativeInteger"
            | "positiveInteger"
    )
}

/// Wrap `i` as the integer subtype `target`, enforcing its value range.
pub(crate) fn integer_value(target: &str, i: i128) -> Result<XdmAtomicValue, Error> {
    use XdmAtomicValue as V;
    fn fit<T: TryFrom<i128>>(target: &str, i: i128) -> Result<T, Error> {
        T::try_from(i).map_err(|_| out_of_range(target, i))
    }
    Ok(match target {
        "integer" => V::Integer(fit(target, i)?),
        "long" => V::Long(fit(target, i)?),
        "int" => V::Int(fit(target, i)?),
        "short" => V::Short(fit(target, i)?),
        "byte" => V::Byte(fit(target, i)?),
        "unsignedLong" => V::UnsignedLong(fit(target, i)?),
        "unsignedInt" => V::UnsignedInt(fit(target, i)?),
        "unsignedShort" => V::UnsignedShort(fit(target, i)?),
        "unsignedByte" => V::UnsignedByte(fit(target, i)?),
        "nonNegativeInteger" => V::NonNegativeInteger(fit(target, i)?),
        "nonPositiveInteger" if i <= 0 => V::NonPositiveInteger(fit(target, i)?),
        "negativeInteger" if i < 0 => V::NegativeInteger(fit(target, i)?),
        "positiveInteger" if i > 0 => V::PositiveInteger(fit(target, i)?),
        "nonPositiveInteger" | "negativeInteger" | "positiveInteger" => {
            return Err(out_of_range(target, i));
        }
        other => {
            return Err(Error::type_error(format!("xs:{other} is not an integer type")));
        }
    })
}

fn is_float_lexical(s: &str) -> bool {
    let body = s.strip_prefix(['+', '-']).unwrap_or(s);
    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(i) => (&body[..i], Some(&body[i + 1..])),
        None => (body, None),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
    let mantissa_ok =
        !(int_part.is_empty() && frac_part.is_empty()) && digits(int_part) && digits(frac_part);
    let exponent_ok = exponent.is_none_or(|e| {
        let e = e.strip_prefix(['+', '-']).unwrap_or(e);
        !e.is_empty() && digits(e)
    });
    mantissa_ok && exponent_ok
}

fn parse_double(target: &str, s: &str) -> Result<f64, Error> {
    match s {
        "INF" | "+INF" => Ok(f64::INFINITY),
        "-INF" => Ok(f64::NEG_INFINITY),
        "NaN" => Ok(f64::NAN),
        _ if is_float_lexical(s) => s.parse::<f64>().map_err(|_| invalid_lexical(target, s)),
        _ => Err(invalid_lexical(target, s)),
    }
}

fn parse_decimal(s: &str) -> Result<Decimal, Error> {
    let body = s.strip_prefix(['+', '-']).unwrap_or(s);
    let (int_part, frac_part) = body.split_once('.').unwrap_or((body, ""));
    let well_formed = !(int_part.is_empty() && frac_part.is_empty())
        && int_part.bytes().all(|b| b.is_ascii_digit())
        && frac_part.bytes().all(|b| b.is_ascii_digit());
    if !well_formed {
        return Err(invalid_lexical("decimal", s));
    }
    let negative = s.starts_with('-');
    let int_part = if int_part.is_empty() { "0" } else { int_part };
    let normalized = if frac_part.is_empty() {
        format!("{}{int_part}", if negative { "-" } else { "" })
    } else {
        format!("{}{int_part}.{frac_part}", if negative { "-" } else { "" })
    };
    Decimal::from_str(&normalized).map_err(|_| invalid_lexical("decimal", s))
}

fn parse_integer(target: &str, s: &str) -> Result<XdmAtomicValue, Error> {
    let body = s.strip_prefix(['+', '-']).unwrap_or(s);
    if body.is_empty() || !body.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid_lexical(target, s));
    }
    let i = s
        .strip_prefix('+')
        .unwrap_or(s)
        .parse::<i128>()
        .map_err(|_| out_of_range(target, s))?;
    integer_value(target, i)
}

/// Coerce the raw text of a node (or a string being cast) into a value of the
/// built-in type `target` (an `xs` local name).
///
/// `resolve_prefix` maps a namespace prefix (`""` for the default namespace)
/// to its URI; for node content it must consult the owning element's
/// in-scope namespaces. Built-ins without a dedicated value representation
/// (`gYear`, `NOTATION`, `anySimpleType`, ...) yield `xs:untypedAtomic`.
pub(crate) fn parse_lexical(
    target: &str,
    raw: &str,
    resolve_prefix: &dyn Fn(&str) -> Option<String>,
) -> Result<XdmAtomicValue, Error> {
    use XdmAtomicValue as V;
    match target {
        "string" => return Ok(V::String(raw.to_string())),
        "normalizedString" => return Ok(V::NormalizedString(replace_whitespace(raw))),
        _ => {}
    }
    let s = collapse_whitespace(raw);
    let check = |ok: bool| if ok { Ok(s.clone()) } else { Err(invalid_lexical(target, raw)) };
    Ok(match target {
        "token" => V::Token(s),
        "language" => V::Language(check(is_language(&s))?),
        "Name" => V::Name(check(is_name(&s))?),
        "NCName" => V::NCName(check(is_ncname(&s))?),
        "ID" => V::Id(check(is_ncname(&s))?),
        "IDREF" => V::IdRef(check(is_ncname(&s))?),
        "ENTITY" => V::Entity(check(is_ncname(&s))?),
        "NMTOKEN" => V::NMTOKEN(check(is_nmtoken(&s))?),
        "anyURI" => V::AnyUri(s),
        "boolean" => match s.as_str() {
            "true" | "1" => V::Boolean(true),
            "false" | "0" => V::Boolean(false),
            _ => return Err(invalid_lexical(target, raw)),
        },
        "double" => V::Double(parse_double(target, &s)?),
        "float" => V::Float(parse_double(target, &s)? as f32),
        "decimal" => V::Decimal(parse_decimal(&s)?),
        t if is_integer_type(t) => parse_integer(t, &s)?,
        "QName" => {
            let (prefix, local) = split_qname(&s).ok_or_else(|| invalid_lexical(target, raw))?;
            let ns_uri = match prefix {
                Some(p) => Some(resolve_prefix(p).ok_or_else(|| {
                    Error::from_code(
                        ErrorCode::FONS0004,
                        format!("no namespace is bound to prefix '{p}'"),
                    )
                })?),
                None => resolve_prefix("").filter(|u| !u.is_empty()),
            };
            V::QName {
                ns_uri,
                prefix: prefix.map(str::to_string),
                local: local.to_string(),
            }
        }
        "dateTime" => {
            let (dt, tz) = temporal::parse_date_time(&s).ok_or_else(|| invalid_lexical(target, raw))?;
            V::DateTime { dt, tz }
        }
        "date" => {
            let (date, tz) = temporal::parse_date(&s).ok_or_else(|| invalid_lexical(target, raw))?;
            V::Date { date, tz }
        }
        "time" => {
            let (time, tz) = temporal::parse_time(&s).ok_or_else(|| invalid_lexical(target, raw))?;
            V::Time { time, tz }
        }
        "duration" => {
            let (months, seconds) =
                temporal::parse_duration(&s).ok_or_else(|| invalid_lexical(target, raw))?;
            V::Duration { months, seconds }
        }
        "yearMonthDuration" => V::YearMonthDuration(
            temporal::parse_year_month_duration(&s).ok_or_else(|| invalid_lexical(target, raw))?,
        ),
        "dayTimeDuration" => V::DayTimeDuration(
            temporal::parse_day_time_duration(&s).ok_or_else(|| invalid_lexical(target, raw))?,
        ),
        "base64Binary" => {
            let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
            let bytes = BASE64_STANDARD
                .decode(compact.as_bytes())
                .map_err(|_| invalid_lexical(target, raw))?;
            V::Base64Binary(BASE64_STANDARD.encode(bytes))
        }
        "hexBinary" => {
            let bytes = decode_hex(&s).ok_or_else(|| invalid_lexical(target, raw))?;
            V::HexBinary(encode_hex_upper(&bytes))
        }
        _ => V::UntypedAtomic(raw.to_string()),
    })
}

fn no_prefixes(prefix: &str) -> Option<String> {
    (prefix == "xml").then(|| crate::consts::XML_URI.to_string())
}

fn cannot_cast(value: &XdmAtomicValue, target: &str) -> Error {
    Error::type_error(format!(
        "cannot cast {} to xs:{target}",
        value.type_name()
    ))
}

fn float_to_integer(target: &str, f: f64) -> Result<XdmAtomicValue, Error> {
    if !f.is_finite() {
        return Err(Error::from_code(
            ErrorCode::FOCA0002,
            format!("cannot cast {f} to xs:{target}"),
        ));
    }
    let t = f.trunc();
    if t.abs() >= 1.0e38 {
        return Err(out_of_range(target, f));
    }
    integer_value(target, t as i128)
}

fn numeric_to(value: &XdmAtomicValue, n: NumKind, target: &str) -> Result<XdmAtomicValue, Error> {
    use XdmAtomicValue as V;
    Ok(match (target, n) {
        ("double", n) => V::Double(n.to_f64()),
        ("float", NumKind::Float(f)) => V::Float(f),
        ("float", n) => V::Float(n.to_f64() as f32),
        ("decimal", NumKind::Int(i)) => V::Decimal(
            Decimal::try_from_i128_with_scale(i, 0).map_err(|_| out_of_range(target, i))?,
        ),
        ("decimal", NumKind::Dec(d)) => V::Decimal(d),
        ("decimal", n) => {
            let f = n.to_f64();
            if !f.is_finite() {
                return Err(Error::from_code(
                    ErrorCode::FOCA0002,
                    format!("cannot cast {f} to xs:decimal"),
                ));
            }
            V::Decimal(Decimal::from_f64(f).ok_or_else(|| out_of_range(target, f))?)
        }
        (t, NumKind::Int(i)) if is_integer_type(t) => integer_value(t, i)?,
        (t, NumKind::Dec(d)) if is_integer_type(t) => {
            integer_value(t, d.trunc().to_i128().ok_or_else(|| out_of_range(t, d))?)?
        }
        (t, n) if is_integer_type(t) => float_to_integer(t, n.to_f64())?,
        ("boolean", n) => V::Boolean(!n.is_zero() && !n.is_nan()),
        (t, _) => return Err(cannot_cast(value, t)),
    })
}

/// Cast to a built-in type, named by its `xs` local name.
pub(crate) fn cast_to_builtin(value: &XdmAtomicValue, target: &str) -> Result<XdmAtomicValue, Error> {
    use XdmAtomicValue as V;
    if value.type_local_name() == target || target == "anyAtomicType" {
        return Ok(value.clone());
    }
    match target {
        "string" => return Ok(V::String(value.lexical())),
        "untypedAtomic" => return Ok(V::UntypedAtomic(value.lexical())),
        t if is_string_family(t) => return parse_lexical(t, &value.lexical(), &no_prefixes),
        _ => {}
    }
    match value {
        V::String(s) | V::UntypedAtomic(s) => return parse_lexical(target, s, &no_prefixes),
        other if is_string_family(other.type_local_name()) => {
            return parse_lexical(target, &other.lexical(), &no_prefixes);
        }
        _ => {}
    }
    if let Some(n) = classify(value) {
        return numeric_to(value, n, target);
    }
    Ok(match (value, target) {
        (V::Boolean(b), t) if is_integer_type(t) => integer_value(t, i128::from(*b))?,
        (V::Boolean(b), "decimal") => V::Decimal(Decimal::from(u8::from(*b))),
        (V::Boolean(b), "double") => V::Double(f64::from(u8::from(*b))),
        (V::Boolean(b), "float") => V::Float(f32::from(u8::from(*b))),
        (V::DateTime { dt, tz }, "date") => V::Date { date: dt.date(), tz: *tz },
        (V::DateTime { dt, tz }, "time") => V::Time { time: dt.time(), tz: *tz },
        (V::Date { date, tz }, "dateTime") => V::DateTime {
            dt: date.and_time(NaiveTime::MIN),
            tz: *tz,
        },
        (V::Duration { months, .. }, "yearMonthDuration") => V::YearMonthDuration(*months),
        (V::Duration { seconds, .. }, "dayTimeDuration") => V::DayTimeDuration(*seconds),
        (V::YearMonthDuration(m), "duration") => V::Duration { months: *m, seconds: Decimal::ZERO },
        (V::YearMonthDuration(_), "dayTimeDuration") => V::DayTimeDuration(Decimal::ZERO),
        (V::DayTimeDuration(s), "duration") => V::Duration { months: 0, seconds: *s },
        (V::DayTimeDuration(_), "yearMonthDuration") => V::YearMonthDuration(0),
        (V::Base64Binary(b), "hexBinary") => {
            let bytes = BASE64_STANDARD
                .decode(b.as_bytes())
                .map_err(|_| invalid_lexical("base64Binary", b))?;
            V::HexBinary(encode_hex_upper(&bytes))
        }
        (V::HexBinary(h), "base64Binary") => {
            let bytes = decode_hex(h).ok_or_else(|| invalid_lexical("hexBinary", h))?;
            V::Base64Binary(BASE64_STANDARD.encode(bytes))
        }
        _ => return Err(cannot_cast(value, target)),
    })
}

/// `value cast as target`, where `target` may be a registered simple type;
/// the result must also satisfy every facet along the derivation chain.
pub(crate) fn cast_atomic(
    types: &TypeRegistry,
    value: &XdmAtomicValue,
    target: &ExpandedName,
) -> Result<XdmAtomicValue, Error> {
    let resolved = types.resolve_simple(target)?;
    if resolved.content != TypeContent::Simple {
        return Err(Error::type_error(format!("{target} is not an atomic type")));
    }
    let out = cast_to_builtin(value, &resolved.builtin.local)?;
    resolved.check_facets(&out.lexical(), &out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Facets, TypeDefinition};

    fn parse(target: &str, raw: &str) -> Result<XdmAtomicValue, Error> {
        parse_lexical(target, raw, &|p| (p == "xbrli").then(|| "urn:xbrli".to_string()))
    }

    #[test]
    fn integer_subtypes_enforce_ranges() {
        assert_eq!(parse("byte", " 127 ").unwrap(), XdmAtomicValue::Byte(127));
        let e = parse("byte", "128").unwrap_err();
        assert_eq!(e.code_enum(), ErrorCode::FORG0001);
        assert!(e.is_kind(ErrorKind::Type));
        assert!(parse("unsignedShort", "-1").is_err());
        assert!(parse("positiveInteger", "0").is_err());
        assert_eq!(parse("negativeInteger", "-3").unwrap(), XdmAtomicValue::NegativeInteger(-3));
        assert!(parse("integer", "1.0").unwrap_err().is_kind(ErrorKind::Value));
    }

    #[test]
    fn floats_accept_special_values_only_verbatim() {
        assert!(matches!(parse("double", "INF").unwrap(), XdmAtomicValue::Double(d) if d.is_infinite()));
        assert!(matches!(parse("float", "NaN").unwrap(), XdmAtomicValue::Float(f) if f.is_nan()));
        assert_eq!(parse("double", "1.5e2").unwrap(), XdmAtomicValue::Double(150.0));
        assert!(parse("double", "inf").is_err());
        assert!(parse("double", "1e").is_err());
        assert!(parse("double", "0x10").is_err());
    }

    #[test]
    fn decimals_are_exact() {
        assert_eq!(parse("decimal", "+.5").unwrap(), XdmAtomicValue::Decimal(Decimal::new(5, 1)));
        assert_eq!(parse("decimal", "-12.").unwrap(), XdmAtomicValue::Decimal(Decimal::new(-12, 0)));
        assert!(parse("decimal", "1e3").is_err());
        assert!(parse("decimal", ".").is_err());
    }

    #[test]
    fn boolean_lexical_set() {
        assert_eq!(parse("boolean", "1").unwrap(), XdmAtomicValue::Boolean(true));
        assert_eq!(parse("boolean", " false ").unwrap(), XdmAtomicValue::Boolean(false));
        assert!(parse("boolean", "TRUE").is_err());
        assert!(parse("boolean", "yes").is_err());
    }

    #[test]
    fn qnames_resolve_through_the_callback() {
        let v = parse("QName", "xbrli:pure").unwrap();
        assert_eq!(
            v,
            XdmAtomicValue::QName {
                ns_uri: Some("urn:xbrli".into()),
                prefix: Some("xbrli".into()),
                local: "pure".into(),
            }
        );
        assert_eq!(parse("QName", "iso4217:EUR").unwrap_err().code_enum(), ErrorCode::FONS0004);
    }

    #[test]
    fn unsupported_primitives_stay_untyped() {
        assert_eq!(
            parse("gYear", "2024").unwrap(),
            XdmAtomicValue::UntypedAtomic("2024".into())
        );
    }

    #[test]
    fn binary_forms_are_canonicalised() {
        assert_eq!(parse("hexBinary", "0a1b").unwrap(), XdmAtomicValue::HexBinary("0A1B".into()));
        assert!(parse("hexBinary", "0a1").is_err());
        assert!(parse("base64Binary", "AQID").is_ok());
        assert!(parse("base64Binary", "A").is_err());
    }

    #[test]
    fn numeric_casts() {
        let d = cast_to_builtin(&XdmAtomicValue::Double(2.9), "integer").unwrap();
        assert_eq!(d, XdmAtomicValue::Integer(2));
        let e = cast_to_builtin(&XdmAtomicValue::Double(f64::NAN), "decimal").unwrap_err();
        assert_eq!(e.code_enum(), ErrorCode::FOCA0002);
        let b = cast_to_builtin(&XdmAtomicValue::Integer(0), "boolean").unwrap();
        assert_eq!(b, XdmAtomicValue::Boolean(false));
        let e = cast_to_builtin(&XdmAtomicValue::Integer(300), "unsignedByte").unwrap_err();
        assert_eq!(e.code_enum(), ErrorCode::FORG0001);
    }

    #[test]
    fn incompatible_casts_are_type_errors() {
        let e = cast_to_builtin(&XdmAtomicValue::Boolean(true), "date").unwrap_err();
        assert_eq!(e.code_enum(), ErrorCode::XPTY0004);
        let e = cast_to_builtin(&XdmAtomicValue::Integer(1), "date").unwrap_err();
        assert_eq!(e.code_enum(), ErrorCode::XPTY0004);
    }

    #[test]
    fn casts_check_derived_facets() {
        let percent = ExpandedName::local("percent");
        let types = TypeRegistry::new().with_type(
            TypeDefinition::simple(percent.clone(), ExpandedName::xs("decimal")).with_facets(
                Facets::new()
                    .min_inclusive(Decimal::ZERO)
                    .max_inclusive(Decimal::new(100, 0)),
            ),
        );
        let ok = cast_atomic(&types, &XdmAtomicValue::String("42.5".into()), &percent).unwrap();
        assert_eq!(ok, XdmAtomicValue::Decimal(Decimal::new(425, 1)));
        let e = cast_atomic(&types, &XdmAtomicValue::Integer(101), &percent).unwrap_err();
        assert_eq!(e.code_enum(), ErrorCode::FORG0001);
    }
}

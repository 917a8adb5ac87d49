use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use core::fmt;
use rust_decimal::Decimal;

pub mod temporal;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExpandedName {
    pub ns_uri: Option<String>,
    pub local: String,
}

impl ExpandedName {
    pub fn new(ns_uri: Option<String>, local: impl Into<String>) -> Self {
        Self {
            ns_uri,
            local: local.into(),
        }
    }

    /// Name in the XML Schema namespace (`xs:local`).
    pub fn xs(local: &str) -> Self {
        Self::new(Some(crate::consts::XS.to_string()), local)
    }

    /// Name in the `fn` namespace.
    pub fn fns(local: &str) -> Self {
        Self::new(Some(crate::consts::FNS.to_string()), local)
    }

    /// Unqualified name (no namespace).
    pub fn local(local: &str) -> Self {
        Self::new(None, local)
    }

    pub fn is_xs(&self) -> bool {
        self.ns_uri.as_deref() == Some(crate::consts::XS)
    }
}

impl fmt::Display for ExpandedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ns_uri {
            Some(ns) if ns == crate::consts::XS => write!(f, "xs:{}", self.local),
            Some(ns) => write!(f, "Q{{{}}}{}", ns, self.local),
            None => f.write_str(&self.local),
        }
    }
}

/// Atomic values of the XDM type universe, as far as XBRL instances use it.
///
/// Integer subtypes are stored distinctly so `instance of` and the atomizer's
/// range checks see the declared subtype; arithmetic treats them as one domain.
/// Decimals are exact (`rust_decimal`).
#[derive(Debug, Clone, PartialEq)]
pub enum XdmAtomicValue {
    Boolean(bool),
    String(String),
    UntypedAtomic(String),
    AnyUri(String),
    Integer(i64),
    Long(i64),
    Int(i32),
    Short(i16),
    Byte(i8),
    UnsignedLong(u64),
    UnsignedInt(u32),
    UnsignedShort(u16),
    UnsignedByte(u8),
    NonPositiveInteger(i64),
    NegativeInteger(i64),
    NonNegativeInteger(u64),
    PositiveInteger(u64),
    Decimal(Decimal),
    Double(f64),
    Float(f32),
    QName {
        ns_uri: Option<String>,
        prefix: Option<String>,
        local: String,
    },
    DateTime {
        dt: NaiveDateTime,
        tz: Option<FixedOffset>,
    },
    Date {
        date: NaiveDate,
        tz: Option<FixedOffset>,
    },
    Time {
        time: NaiveTime,
        tz: Option<FixedOffset>,
    },
    // Durations keep canonical totals: months for the year-month part,
    // exact seconds for the day-time part.
    Duration {
        months: i32,
        seconds: Decimal,
    },
    YearMonthDuration(i32),
    DayTimeDuration(Decimal),
    // Binary types keep their lexical form; the atomizer validates it.
    Base64Binary(String),
    HexBinary(String),
    NormalizedString(String),
    Token(String),
    Language(String),
    Name(String),
    NCName(String),
    NMTOKEN(String),
    Id(String),
    IdRef(String),
    Entity(String),
}

impl XdmAtomicValue {
    /// Local name of the value's dynamic type in the `xs` namespace.
    pub fn type_local_name(&self) -> &'static str {
        use XdmAtomicValue::*;
        match self {
            Boolean(_) => "boolean",
            String(_) => "string",
            UntypedAtomic(_) => "untypedAtomic",
            AnyUri(_) => "anyURI",
            Integer(_) => "integer",
            Long(_) => "long",
            Int(_) => "int",
            Short(_) => "short",
            Byte(_) => "byte",
            UnsignedLong(_) => "unsignedLong",
            UnsignedInt(_) => "unsignedInt",
            UnsignedShort(_) => "unsignedShort",
            UnsignedByte(_) => "unsignedByte",
            NonPositiveInteger(_) => "nonPositiveInteger",
            NegativeInteger(_) => "negativeInteger",
            NonNegativeInteger(_) => "nonNegativeInteger",
            PositiveInteger(_) => "positiveInteger",
            Decimal(_) => "decimal",
            Double(_) => "double",
            Float(_) => "float",
            QName { .. } => "QName",
            DateTime { .. } => "dateTime",
            Date { .. } => "date",
            Time { .. } => "time",
            Duration { .. } => "duration",
            YearMonthDuration(_) => "yearMonthDuration",
            DayTimeDuration(_) => "dayTimeDuration",
            Base64Binary(_) => "base64Binary",
            HexBinary(_) => "hexBinary",
            NormalizedString(_) => "normalizedString",
            Token(_) => "token",
            Language(_) => "language",
            Name(_) => "Name",
            NCName(_) => "NCName",
            NMTOKEN(_) => "NMTOKEN",
            Id(_) => "ID",
            IdRef(_) => "IDREF",
            Entity(_) => "ENTITY",
        }
    }

    pub fn type_name(&self) -> ExpandedName {
        ExpandedName::xs(self.type_local_name())
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer_family() || matches!(self, Self::Decimal(_) | Self::Double(_) | Self::Float(_))
    }

    pub fn is_integer_family(&self) -> bool {
        use XdmAtomicValue::*;
        matches!(
            self,
            Integer(_)
                | Long(_)
                | Int(_)
                | Short(_)
                | Byte(_)
                | UnsignedLong(_)
                | UnsignedInt(_)
                | UnsignedShort(_)
                | UnsignedByte(_)
                | NonPositiveInteger(_)
                | NegativeInteger(_)
                | NonNegativeInteger(_)
                | PositiveInteger(_)
        )
    }

    /// Integer payload widened to `i128`, for any integer-family value.
    pub fn as_i128(&self) -> Option<i128> {
        use XdmAtomicValue::*;
        Some(match self {
            Integer(i) | Long(i) | NonPositiveInteger(i) | NegativeInteger(i) => i128::from(*i),
            Int(i) => i128::from(*i),
            Short(i) => i128::from(*i),
            Byte(i) => i128::from(*i),
            UnsignedLong(i) | NonNegativeInteger(i) | PositiveInteger(i) => i128::from(*i),
            UnsignedInt(i) => i128::from(*i),
            UnsignedShort(i) => i128::from(*i),
            UnsignedByte(i) => i128::from(*i),
            _ => return None,
        })
    }

    /// Canonical lexical form, as produced by `fn:string` and casts to `xs:string`.
    pub fn lexical(&self) -> String {
        use XdmAtomicValue::*;
        match self {
            Boolean(b) => b.to_string(),
            String(s) | UntypedAtomic(s) | AnyUri(s) | Base64Binary(s) | HexBinary(s)
            | NormalizedString(s) | Token(s) | Language(s) | Name(s) | NCName(s) | NMTOKEN(s)
            | Id(s) | IdRef(s) | Entity(s) => s.clone(),
            Decimal(d) => {
                let n = d.normalize();
                n.to_string()
            }
            Double(d) => format_double(*d),
            Float(f) => format_double(f64::from(*f)),
            QName { prefix, local, .. } => match prefix {
                Some(p) if !p.is_empty() => format!("{p}:{local}"),
                _ => local.clone(),
            },
            DateTime { dt, tz } => temporal::format_date_time(dt, *tz),
            Date { date, tz } => temporal::format_date(date, *tz),
            Time { time, tz } => temporal::format_time(time, *tz),
            Duration { months, seconds } => temporal::format_duration(*months, *seconds),
            YearMonthDuration(m) => temporal::format_duration(*m, rust_decimal::Decimal::ZERO),
            DayTimeDuration(s) => temporal::format_duration(0, *s),
            other => other
                .as_i128()
                .map(|i| i.to_string())
                .unwrap_or_default(),
        }
    }
}

fn format_double(d: f64) -> String {
    if d.is_nan() {
        "NaN".to_string()
    } else if d.is_infinite() {
        if d > 0.0 { "INF".to_string() } else { "-INF".to_string() }
    } else if d == 0.0 {
        if d.is_sign_negative() { "-0".to_string() } else { "0".to_string() }
    } else {
        // `{}` never uses exponent notation and drops a trailing ".0".
        let s = format!("{d}");
        s.strip_suffix(".0").map(str::to_string).unwrap_or(s)
    }
}

impl fmt::Display for XdmAtomicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lexical())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum XdmItem<N> {
    Node(N),
    Atomic(XdmAtomicValue),
}

impl<N> XdmItem<N> {
    pub fn as_node(&self) -> Option<&N> {
        match self {
            XdmItem::Node(n) => Some(n),
            XdmItem::Atomic(_) => None,
        }
    }

    pub fn as_atomic(&self) -> Option<&XdmAtomicValue> {
        match self {
            XdmItem::Atomic(a) => Some(a),
            XdmItem::Node(_) => None,
        }
    }
}

impl<N> From<XdmAtomicValue> for XdmItem<N> {
    fn from(a: XdmAtomicValue) -> Self {
        XdmItem::Atomic(a)
    }
}

impl<N> fmt::Display for XdmItem<N>
where
    N: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XdmItem::Node(_) => write!(f, "<node>"),
            XdmItem::Atomic(a) => write!(f, "{a:?}"),
        }
    }
}

/// A flat, ordered sequence of items; the universal result of evaluation.
///
/// Items are `XdmItem`s, so a sequence can never contain another sequence.
/// Integer ranges produced by `to` stay unexpanded until iterated.
#[derive(Debug, Clone)]
pub struct XdmSequence<N> {
    repr: Repr<N>,
}

#[derive(Debug, Clone)]
enum Repr<N> {
    Items(Vec<XdmItem<N>>),
    // Closed interval [first, last], never empty.
    Range { first: i64, last: i64 },
}

impl<N> Default for XdmSequence<N> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<N> XdmSequence<N> {
    pub fn empty() -> Self {
        Self {
            repr: Repr::Items(Vec::new()),
        }
    }

    pub fn one(item: impl Into<XdmItem<N>>) -> Self {
        Self {
            repr: Repr::Items(vec![item.into()]),
        }
    }

    pub fn from_items(items: Vec<XdmItem<N>>) -> Self {
        Self {
            repr: Repr::Items(items),
        }
    }

    pub fn boolean(b: bool) -> Self {
        Self::one(XdmAtomicValue::Boolean(b))
    }

    /// Integer interval `start..end` (end exclusive). An inverted interval is empty.
    pub fn range(start: i64, end: i64) -> Self {
        if end <= start {
            return Self::empty();
        }
        Self::range_inclusive(start, end - 1)
    }

    /// Integer interval `first..=last`, so `last` may be `i64::MAX`.
    pub fn range_inclusive(first: i64, last: i64) -> Self {
        if last < first {
            return Self::empty();
        }
        Self {
            repr: Repr::Range { first, last },
        }
    }

    pub fn len(&self) -> usize {
        match &self.repr {
            Repr::Items(v) => v.len(),
            Repr::Range { first, last } => {
                usize::try_from(i128::from(*last) - i128::from(*first) + 1).unwrap_or(usize::MAX)
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_range(&self) -> bool {
        matches!(self.repr, Repr::Range { .. })
    }

    pub fn push(&mut self, item: XdmItem<N>) {
        let mut items = std::mem::take(self).into_items();
        items.push(item);
        *self = Self::from_items(items);
    }

    /// Append all items of `other`, keeping the sequence flat.
    pub fn extend_from(&mut self, other: XdmSequence<N>) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            *self = other;
            return;
        }
        let mut items = std::mem::take(self).into_items();
        items.extend(other);
        *self = Self::from_items(items);
    }

    /// Concatenate several sequences into one flat sequence.
    pub fn concat<I: IntoIterator<Item = XdmSequence<N>>>(parts: I) -> Self {
        let mut out = Self::empty();
        for part in parts {
            out.extend_from(part);
        }
        out
    }

    pub fn into_items(self) -> Vec<XdmItem<N>> {
        match self.repr {
            Repr::Items(v) => v,
            Repr::Range { first, last } => (first..=last)
                .map(|i| XdmItem::Atomic(XdmAtomicValue::Integer(i)))
                .collect(),
        }
    }

    pub fn into_single(self) -> Option<XdmItem<N>> {
        if self.len() != 1 {
            return None;
        }
        self.into_iter().next()
    }
}

impl<N: Clone> XdmSequence<N> {
    pub fn iter(&self) -> Iter<'_, N> {
        Iter {
            inner: match &self.repr {
                Repr::Items(v) => IterRepr::Items(v.iter()),
                Repr::Range { first, last } => IterRepr::Range(*first..=*last),
            },
        }
    }

    pub fn first(&self) -> Option<XdmItem<N>> {
        self.iter().next()
    }

    /// The item at 1-based `position`, without expanding a range.
    pub fn item_at(&self, position: usize) -> Option<XdmItem<N>> {
        let index = position.checked_sub(1)?;
        match &self.repr {
            Repr::Items(v) => v.get(index).cloned(),
            Repr::Range { first, last } => {
                let value = i64::try_from(i128::from(*first) + i128::try_from(index).ok()?).ok()?;
                (value <= *last).then(|| XdmItem::Atomic(XdmAtomicValue::Integer(value)))
            }
        }
    }
}

pub struct Iter<'a, N> {
    inner: IterRepr<'a, N>,
}

enum IterRepr<'a, N> {
    Items(core::slice::Iter<'a, XdmItem<N>>),
    Range(core::ops::RangeInclusive<i64>),
}

impl<N: Clone> Iterator for Iter<'_, N> {
    type Item = XdmItem<N>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            IterRepr::Items(it) => it.next().cloned(),
            IterRepr::Range(r) => r.next().map(|i| XdmItem::Atomic(XdmAtomicValue::Integer(i))),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.inner {
            IterRepr::Items(it) => it.size_hint(),
            IterRepr::Range(r) => r.size_hint(),
        }
    }
}

impl<N> IntoIterator for XdmSequence<N> {
    type Item = XdmItem<N>;
    type IntoIter = IntoIter<N>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            inner: match self.repr {
                Repr::Items(v) => IntoIterRepr::Items(v.into_iter()),
                Repr::Range { first, last } => IntoIterRepr::Range(first..=last),
            },
        }
    }
}

pub struct IntoIter<N> {
    inner: IntoIterRepr<N>,
}

enum IntoIterRepr<N> {
    Items(std::vec::IntoIter<XdmItem<N>>),
    Range(core::ops::RangeInclusive<i64>),
}

impl<N> Iterator for IntoIter<N> {
    type Item = XdmItem<N>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            IntoIterRepr::Items(it) => it.next(),
            IntoIterRepr::Range(r) => r.next().map(|i| XdmItem::Atomic(XdmAtomicValue::Integer(i))),
        }
    }
}

impl<N> FromIterator<XdmItem<N>> for XdmSequence<N> {
    fn from_iter<T: IntoIterator<Item = XdmItem<N>>>(iter: T) -> Self {
        Self::from_items(iter.into_iter().collect())
    }
}

impl<N> From<Vec<XdmItem<N>>> for XdmSequence<N> {
    fn from(v: Vec<XdmItem<N>>) -> Self {
        Self::from_items(v)
    }
}

impl<N> From<XdmItem<N>> for XdmSequence<N> {
    fn from(item: XdmItem<N>) -> Self {
        Self::one(item)
    }
}

impl<N> From<XdmAtomicValue> for XdmSequence<N> {
    fn from(a: XdmAtomicValue) -> Self {
        Self::one(a)
    }
}

impl<N: Clone + PartialEq> PartialEq for XdmSequence<N> {
    fn eq(&self, other: &Self) -> bool {
        if let (Repr::Range { first: a, last: b }, Repr::Range { first: c, last: d }) =
            (&self.repr, &other.repr)
        {
            return a == c && b == d;
        }
        self.len() == other.len() && self.iter().zip(other.iter()).all(|(x, y)| x == y)
    }
}

impl<N: Clone + PartialEq> PartialEq<Vec<XdmItem<N>>> for XdmSequence<N> {
    fn eq(&self, other: &Vec<XdmItem<N>>) -> bool {
        self.len() == other.len() && self.iter().zip(other.iter()).all(|(x, y)| &x == y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Seq = XdmSequence<()>;

    fn int(i: i64) -> XdmItem<()> {
        XdmItem::Atomic(XdmAtomicValue::Integer(i))
    }

    #[test]
    fn ranges_reach_the_largest_integer() {
        let r = Seq::range_inclusive(i64::MAX - 1, i64::MAX);
        assert_eq!(r.len(), 2);
        assert_eq!(r.iter().last(), Some(int(i64::MAX)));
        assert_eq!(r.item_at(2), Some(int(i64::MAX)));
        assert_eq!(r.item_at(3), None);
        assert!(Seq::range_inclusive(2, 1).is_empty());
    }

    #[test]
    fn item_at_is_one_based() {
        let r = Seq::range_inclusive(10, 20);
        assert_eq!(r.item_at(0), None);
        assert_eq!(r.item_at(1), Some(int(10)));
        assert_eq!(r.item_at(usize::MAX), None);
        let items = Seq::from_items(vec![int(7), int(8)]);
        assert_eq!(items.item_at(2), Some(int(8)));
    }

    #[test]
    fn pushing_onto_a_range_expands_it() {
        let mut r = Seq::range(1, 3);
        r.push(int(9));
        assert!(!r.is_range());
        assert_eq!(r, vec![int(1), int(2), int(9)]);
        r.extend_from(Seq::range(4, 5));
        assert_eq!(r.len(), 4);
        let mut e = Seq::empty();
        e.extend_from(Seq::range(1, 4));
        assert!(e.is_range());
    }
}

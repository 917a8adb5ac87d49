//! Schema type metadata consulted by the atomizer, casts and `instance of`.
//!
//! The XML Schema built-in hierarchy is known implicitly; user and XBRL types
//! are registered as [`TypeDefinition`]s deriving (directly or through other
//! registered types) from a built-in. A registry is built once, wrapped in an
//! `Arc` and shared read-only by every evaluation.
use std::collections::HashMap;

use fancy_regex::Regex;
use rust_decimal::Decimal;

use crate::consts::{XBRLI, XS};
use crate::engine::runtime::{Error, ErrorCode};
use crate::xdm::{ExpandedName, XdmAtomicValue};

const MAX_DERIVATION_CHAIN: usize = 64;

/// Base type of each built-in xs type (`None` for `xs:anyType`).
pub(crate) fn xs_parent(local: &str) -> Option<&'static str> {
    Some(match local {
        "anyType" => return None,
        "anySimpleType" | "untyped" => "anyType",
        "anyAtomicType" => "anySimpleType",
        "string" | "boolean" | "decimal" | "float" | "double" | "duration" | "dateTime"
        | "time" | "date" | "gYearMonth" | "gYear" | "gMonthDay" | "gDay" | "gMonth"
        | "hexBinary" | "base64Binary" | "anyURI" | "QName" | "NOTATION" | "untypedAtomic" => {
            "anyAtomicType"
        }
        "integer" => "decimal",
        "nonPositiveInteger" | "long" | "nonNegativeInteger" => "integer",
        "negativeInteger" => "nonPositiveInteger",
        "int" => "long",
        "short" => "int",
        "byte" => "short",
        "unsignedLong" | "positiveInteger" => "nonNegativeInteger",
        "unsignedInt" => "unsignedLong",
        "unsignedShort" => "unsignedInt",
        "unsignedByte" => "unsignedShort",
        "normalizedString" => "string",
        "token" => "normalizedString",
        "language" | "Name" | "NMTOKEN" => "token",
        "NCName" => "Name",
        "ID" | "IDREF" | "ENTITY" => "NCName",
        "yearMonthDuration" | "dayTimeDuration" => "duration",
        _ => return None,
    })
}

fn is_builtin(name: &ExpandedName) -> bool {
    name.is_xs() && (name.local == "anyType" || xs_parent(&name.local).is_some())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeContent {
    Simple,
    ComplexSimpleContent,
    /// Element-only content (XBRL tuples): such nodes have no typed value.
    ComplexElementOnly,
}

/// Constraining facets of one derivation step.
#[derive(Debug, Clone, Default)]
pub struct Facets {
    patterns: Vec<Regex>,
    enumeration: Vec<String>,
    length: Option<usize>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    min_inclusive: Option<Decimal>,
    max_inclusive: Option<Decimal>,
    min_exclusive: Option<Decimal>,
    max_exclusive: Option<Decimal>,
    total_digits: Option<u32>,
    fraction_digits: Option<u32>,
}

impl Facets {
    pub fn new() -> Self {
        Self::default()
    }

    /// XML Schema patterns match the whole lexical form.
    pub fn pattern(mut self, pattern: &str) -> Result<Self, Error> {
        self.patterns.push(Regex::new(&format!(r"\A(?:{pattern})\z"))?);
        Ok(self)
    }

    pub fn enumeration<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enumeration.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn length(mut self, n: usize) -> Self {
        self.length = Some(n);
        self
    }

    pub fn min_length(mut self, n: usize) -> Self {
        self.min_length = Some(n);
        self
    }

    pub fn max_length(mut self, n: usize) -> Self {
        self.max_length = Some(n);
        self
    }

    pub fn min_inclusive(mut self, d: Decimal) -> Self {
        self.min_inclusive = Some(d);
        self
    }

    pub fn max_inclusive(mut self, d: Decimal) -> Self {
        self.max_inclusive = Some(d);
        self
    }

    pub fn min_exclusive(mut self, d: Decimal) -> Self {
        self.min_exclusive = Some(d);
        self
    }

    pub fn max_exclusive(mut self, d: Decimal) -> Self {
        self.max_exclusive = Some(d);
        self
    }

    pub fn total_digits(mut self, n: u32) -> Self {
        self.total_digits = Some(n);
        self
    }

    pub fn fraction_digits(mut self, n: u32) -> Self {
        self.fraction_digits = Some(n);
        self
    }

    pub fn check(
        &self,
        type_name: &ExpandedName,
        lexical: &str,
        value: &XdmAtomicValue,
    ) -> Result<(), Error> {
        let violation = |facet: &str| {
            Error::from_code(
                ErrorCode::FORG0001,
                format!("value '{lexical}' violates the {facet} facet of {type_name}"),
            )
        };
        for re in &self.patterns {
            if !re.is_match(lexical)? {
                return Err(violation("pattern"));
            }
        }
        if !self.enumeration.is_empty() && !self.enumeration.iter().any(|e| e == lexical) {
            return Err(violation("enumeration"));
        }
        let len = lexical.chars().count();
        if self.length.is_some_and(|n| len != n) {
            return Err(violation("length"));
        }
        if self.min_length.is_some_and(|n| len < n) {
            return Err(violation("minLength"));
        }
        if self.max_length.is_some_and(|n| len > n) {
            return Err(violation("maxLength"));
        }
        let Some(d) = numeric_decimal(value) else {
            return Ok(());
        };
        if self.min_inclusive.is_some_and(|b| d < b) {
            return Err(violation("minInclusive"));
        }
        if self.max_inclusive.is_some_and(|b| d > b) {
            return Err(violation("maxInclusive"));
        }
        if self.min_exclusive.is_some_and(|b| d <= b) {
            return Err(violation("minExclusive"));
        }
        if self.max_exclusive.is_some_and(|b| d >= b) {
            return Err(violation("maxExclusive"));
        }
        if self.total_digits.is_some() || self.fraction_digits.is_some() {
            let n = d.normalize();
            let total = n.mantissa().unsigned_abs().to_string().len() as u32;
            if self.total_digits.is_some_and(|t| total > t) {
                return Err(violation("totalDigits"));
            }
            if self.fraction_digits.is_some_and(|f| n.scale() > f) {
                return Err(violation("fractionDigits"));
            }
        }
        Ok(())
    }
}

fn numeric_decimal(v: &XdmAtomicValue) -> Option<Decimal> {
    match v {
        XdmAtomicValue::Decimal(d) => Some(*d),
        XdmAtomicValue::Double(d) => Decimal::try_from(*d).ok(),
        XdmAtomicValue::Float(f) => Decimal::try_from(*f).ok(),
        other => other
            .as_i128()
            .and_then(|i| Decimal::try_from_i128_with_scale(i, 0).ok()),
    }
}

#[derive(Debug, Clone)]
pub struct TypeDefinition {
    pub name: ExpandedName,
    pub base: ExpandedName,
    pub content: TypeContent,
    pub facets: Facets,
}

impl TypeDefinition {
    pub fn simple(name: ExpandedName, base: ExpandedName) -> Self {
        Self {
            name,
            base,
            content: TypeContent::Simple,
            facets: Facets::default(),
        }
    }

    /// Complex type with simple content, the shape of every XBRL item type.
    pub fn simple_content(name: ExpandedName, base: ExpandedName) -> Self {
        Self {
            content: TypeContent::ComplexSimpleContent,
            ..Self::simple(name, base)
        }
    }

    pub fn element_only(name: ExpandedName) -> Self {
        Self {
            content: TypeContent::ComplexElementOnly,
            ..Self::simple(name, ExpandedName::xs("anyType"))
        }
    }

    pub fn with_facets(mut self, facets: Facets) -> Self {
        self.facets = facets;
        self
    }
}

/// A declared type walked down to the built-in it derives from.
#[derive(Debug, Clone)]
pub struct ResolvedType<'a> {
    pub name: ExpandedName,
    /// Nearest built-in xs type in the derivation chain.
    pub builtin: ExpandedName,
    pub content: TypeContent,
    /// Facets from the most derived step to the least derived.
    pub facets: Vec<&'a Facets>,
}

impl ResolvedType<'_> {
    pub fn check_facets(&self, lexical: &str, value: &XdmAtomicValue) -> Result<(), Error> {
        for f in &self.facets {
            f.check(&self.name, lexical, value)?;
        }
        Ok(())
    }
}

const XBRL_ITEM_TYPES: &[(&str, &str)] = &[
    ("decimalItemType", "decimal"),
    ("floatItemType", "float"),
    ("doubleItemType", "double"),
    ("monetaryItemType", "decimal"),
    ("sharesItemType", "decimal"),
    ("pureItemType", "decimal"),
    ("integerItemType", "integer"),
    ("nonPositiveIntegerItemType", "nonPositiveInteger"),
    ("negativeIntegerItemType", "negativeInteger"),
    ("longItemType", "long"),
    ("intItemType", "int"),
    ("shortItemType", "short"),
    ("byteItemType", "byte"),
    ("nonNegativeIntegerItemType", "nonNegativeInteger"),
    ("unsignedLongItemType", "unsignedLong"),
    ("unsignedIntItemType", "unsignedInt"),
    ("unsignedShortItemType", "unsignedShort"),
    ("unsignedByteItemType", "unsignedByte"),
    ("positiveIntegerItemType", "positiveInteger"),
    ("stringItemType", "string"),
    ("booleanItemType", "boolean"),
    ("hexBinaryItemType", "hexBinary"),
    ("base64BinaryItemType", "base64Binary"),
    ("anyURIItemType", "anyURI"),
    ("QNameItemType", "QName"),
    ("durationItemType", "duration"),
    ("dateTimeItemType", "dateTime"),
    ("timeItemType", "time"),
    ("dateItemType", "date"),
    ("gYearMonthItemType", "gYearMonth"),
    ("gYearItemType", "gYear"),
    ("gMonthDayItemType", "gMonthDay"),
    ("gDayItemType", "gDay"),
    ("gMonthItemType", "gMonth"),
    ("normalizedStringItemType", "normalizedString"),
    ("tokenItemType", "token"),
    ("languageItemType", "language"),
    ("NameItemType", "Name"),
    ("NCNameItemType", "NCName"),
];

#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<ExpandedName, TypeDefinition>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `xbrli` item types and the element-only shapes used
    /// by tuples and fractions.
    pub fn with_xbrl_item_types() -> Self {
        let mut reg = Self::new();
        let xbrli = |local: &str| ExpandedName::new(Some(XBRLI.to_string()), local);
        for (item, base) in XBRL_ITEM_TYPES {
            reg.register(TypeDefinition::simple_content(
                xbrli(item),
                ExpandedName::xs(base),
            ));
        }
        reg.register(TypeDefinition::element_only(xbrli("fractionItemType")));
        reg.register(TypeDefinition::element_only(xbrli("tuple")));
        reg
    }

    pub fn register(&mut self, def: TypeDefinition) -> &mut Self {
        self.types.insert(def.name.clone(), def);
        self
    }

    pub fn with_type(mut self, def: TypeDefinition) -> Self {
        self.register(def);
        self
    }

    pub fn get(&self, name: &ExpandedName) -> Option<&TypeDefinition> {
        self.types.get(name)
    }

    pub fn is_known(&self, name: &ExpandedName) -> bool {
        self.types.contains_key(name) || is_builtin(name)
    }

    pub fn base_of(&self, name: &ExpandedName) -> Option<ExpandedName> {
        if let Some(def) = self.types.get(name) {
            return Some(def.base.clone());
        }
        if name.ns_uri.as_deref() == Some(XS) {
            return xs_parent(&name.local).map(ExpandedName::xs);
        }
        None
    }

    /// `ty` equals `ancestor` or derives from it through any number of steps.
    pub fn derives_from(&self, ty: &ExpandedName, ancestor: &ExpandedName) -> bool {
        if ancestor.is_xs() && ancestor.local == "anyType" {
            return true;
        }
        let mut cur = ty.clone();
        for _ in 0..MAX_DERIVATION_CHAIN {
            if &cur == ancestor {
                return true;
            }
            match self.base_of(&cur) {
                Some(b) => cur = b,
                None => return false,
            }
        }
        false
    }

    pub fn resolve_simple(&self, ty: &ExpandedName) -> Result<ResolvedType<'_>, Error> {
        let mut facets = Vec::new();
        let mut content = None;
        let mut cur = ty.clone();
        for _ in 0..MAX_DERIVATION_CHAIN {
            if let Some(def) = self.types.get(&cur) {
                let c = *content.get_or_insert(def.content);
                if def.content == TypeContent::ComplexElementOnly {
                    return Ok(ResolvedType {
                        name: ty.clone(),
                        builtin: ExpandedName::xs("anyType"),
                        content: c,
                        facets,
                    });
                }
                facets.push(&def.facets);
                cur = def.base.clone();
                continue;
            }
            if is_builtin(&cur) {
                return Ok(ResolvedType {
                    name: ty.clone(),
                    builtin: cur,
                    content: content.unwrap_or(TypeContent::Simple),
                    facets,
                });
            }
            return Err(Error::type_error(format!("unknown schema type {cur}")));
        }
        Err(Error::type_error(format!(
            "derivation chain of {ty} is cyclic or too deep"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xbrli(local: &str) -> ExpandedName {
        ExpandedName::new(Some(XBRLI.to_string()), local)
    }

    #[test]
    fn builtin_chain_is_transitive() {
        let reg = TypeRegistry::new();
        assert!(reg.derives_from(&ExpandedName::xs("byte"), &ExpandedName::xs("integer")));
        assert!(reg.derives_from(&ExpandedName::xs("ID"), &ExpandedName::xs("string")));
        assert!(!reg.derives_from(&ExpandedName::xs("string"), &ExpandedName::xs("ID")));
    }

    #[test]
    fn item_types_resolve_to_builtins() {
        let reg = TypeRegistry::with_xbrl_item_types();
        let r = reg.resolve_simple(&xbrli("monetaryItemType")).unwrap();
        assert_eq!(r.builtin, ExpandedName::xs("decimal"));
        assert_eq!(r.content, TypeContent::ComplexSimpleContent);
        assert!(reg.derives_from(&xbrli("monetaryItemType"), &ExpandedName::xs("decimal")));
        let t = reg.resolve_simple(&xbrli("tuple")).unwrap();
        assert_eq!(t.content, TypeContent::ComplexElementOnly);
    }

    #[test]
    fn derived_facets_are_all_checked() {
        let base = ExpandedName::local("percent");
        let derived = ExpandedName::local("smallPercent");
        let reg = TypeRegistry::new()
            .with_type(
                TypeDefinition::simple(base.clone(), ExpandedName::xs("decimal"))
                    .with_facets(Facets::new().min_inclusive(Decimal::ZERO).fraction_digits(2)),
            )
            .with_type(
                TypeDefinition::simple(derived.clone(), base)
                    .with_facets(Facets::new().max_inclusive(Decimal::new(10, 0))),
            );
        let r = reg.resolve_simple(&derived).unwrap();
        assert_eq!(r.facets.len(), 2);
        let ok = XdmAtomicValue::Decimal(Decimal::new(525, 2));
        assert!(r.check_facets("5.25", &ok).is_ok());
        let neg = XdmAtomicValue::Decimal(Decimal::new(-1, 0));
        assert!(r.check_facets("-1", &neg).is_err());
        let precise = XdmAtomicValue::Decimal(Decimal::new(1234, 3));
        assert!(r.check_facets("1.234", &precise).is_err());
    }

    #[test]
    fn pattern_is_anchored() {
        let f = Facets::new().pattern("[A-Z]{3}").unwrap();
        let name = ExpandedName::local("currency");
        let v = XdmAtomicValue::String("EURO".into());
        assert!(f.check(&name, "EURO", &v).is_err());
        assert!(f.check(&name, "EUR", &v).is_ok());
    }

    #[test]
    fn unknown_type_is_an_error() {
        let reg = TypeRegistry::new();
        assert!(reg.resolve_simple(&ExpandedName::local("nope")).is_err());
    }

    #[test]
    fn invalid_pattern_reports_forg0001() {
        let err = Facets::new().pattern("(").unwrap_err();
        assert_eq!(err.code_enum(), ErrorCode::FORG0001);
        assert!(err.source.is_some());
    }
}

//! Namespace URIs used throughout the engine.

/// XML Schema namespace (`xs:` prefix).
pub const XS: &str = "http://www.w3.org/2001/XMLSchema";
/// XPath functions namespace (`fn:` prefix), the default function namespace.
pub const FNS: &str = "http://www.w3.org/2005/xpath-functions";
/// W3C error codes namespace (`err:` prefix).
pub const ERR_NS: &str = "http://www.w3.org/2005/xqt-errors";
/// Implicit `xml:` prefix binding.
pub const XML_URI: &str = "http://www.w3.org/XML/1998/namespace";
/// XBRL instance namespace (`xbrli:` prefix).
pub const XBRLI: &str = "http://www.xbrl.org/2003/instance";

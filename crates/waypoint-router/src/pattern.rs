//! Path and domain patterns.
//!
//! A pattern is an ordered sequence of [`Segment`]s. Path patterns are split
//! at `/`, domain patterns at `.`:
//!
//! ```text
//! /users/{id}/posts/{post?}      {tenant}.example.com
//!   │      │     │      │           │       │      │
//!   │      │     │      └ optional  │       └──────┴ literals
//!   │      │     └ literal          └ required param
//!   │      └ required param
//!   └ literal
//! ```
//!
//! Only trailing path segments may be optional. Constraints are regular
//! expressions that must match the whole decoded segment.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::fmt;

use percent_encoding::percent_decode_str;
use regex::Regex;

use crate::error::RouteError;
use crate::params::Params;

/// A compiled parameter constraint.
#[derive(Debug, Clone)]
pub struct Constraint {
    source: String,
    regex: Regex,
}

impl Constraint {
    /// Compiles `source` with full-match semantics.
    pub fn new(param: &str, source: &str) -> Result<Self, RouteError> {
        let regex = Regex::new(&format!("^(?:{source})$")).map_err(|source| {
            RouteError::InvalidConstraint {
                param: param.to_string(),
                source,
            }
        })?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    /// The expression as written by the route author.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns true when `value` satisfies the constraint.
    #[must_use]
    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

impl PartialEq for Constraint {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Constraint {}

/// A parameter segment (`{name}` or `{name?}`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Parameter name.
    pub name: String,
    /// Whether the segment may be omitted.
    pub optional: bool,
    /// Optional regex the decoded value must fully match.
    pub constraint: Option<Constraint>,
    /// Value bound when an optional segment is omitted.
    pub default: Option<String>,
}

impl Param {
    /// Returns true when `value` is acceptable for this parameter.
    #[must_use]
    pub fn accepts(&self, value: &str) -> bool {
        self.constraint.as_ref().map_or(true, |c| c.is_match(value))
    }
}

/// One segment of a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text (`users`, `example`).
    Literal(String),
    /// A named parameter.
    Param(Param),
}

impl Segment {
    fn is_optional(&self) -> bool {
        matches!(self, Self::Param(p) if p.optional)
    }

    fn param(&self) -> Option<&Param> {
        match self {
            Self::Param(p) => Some(p),
            Self::Literal(_) => None,
        }
    }
}

/// Per-parameter constraints and defaults applied while compiling patterns.
#[derive(Debug, Default)]
pub(crate) struct ParamRules {
    pub constraints: HashMap<String, Constraint>,
    pub defaults: HashMap<String, String>,
}

impl ParamRules {
    fn apply(&self, param: &mut Param) {
        param.constraint = self.constraints.get(&param.name).cloned();
        param.default = self.defaults.get(&param.name).cloned();
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_segment(pattern: &str, raw: &str) -> Result<Segment, RouteError> {
    if let Some(inner) = raw.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        let (name, optional) = match inner.strip_suffix('?') {
            Some(name) => (name, true),
            None => (inner, false),
        };
        if !is_valid_name(name) {
            return Err(RouteError::invalid_segment(pattern, raw));
        }
        return Ok(Segment::Param(Param {
            name: name.to_string(),
            optional,
            constraint: None,
            default: None,
        }));
    }

    if raw.contains(['{', '}']) {
        return Err(RouteError::invalid_segment(pattern, raw));
    }
    Ok(Segment::Literal(raw.to_string()))
}

fn check_duplicates(pattern: &str, segments: &[Segment]) -> Result<(), RouteError> {
    let mut seen = HashSet::new();
    for param in segments.iter().filter_map(Segment::param) {
        if !seen.insert(param.name.as_str()) {
            return Err(RouteError::DuplicateParam {
                pattern: pattern.to_string(),
                param: param.name.clone(),
            });
        }
    }
    Ok(())
}

/// Percent-decodes one segment. Invalid UTF-8 never matches.
fn decode(raw: &str) -> Option<Cow<'_, str>> {
    percent_decode_str(raw).decode_utf8().ok()
}

fn capture_param(param: &Param, value: &str, params: &mut Params) -> bool {
    if !param.accepts(value) {
        return false;
    }
    params.push(param.name.clone(), value);
    true
}

/// A compiled URL path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    /// Normalized pattern text, always starting with `/`.
    raw: String,
    segments: Vec<Segment>,
    /// Number of leading segments that must be present.
    required: usize,
}

impl PathPattern {
    pub(crate) fn parse(raw: &str, rules: &ParamRules) -> Result<Self, RouteError> {
        let mut segments = Vec::new();
        let mut trailing_optional: Option<String> = None;

        for piece in raw.split('/').filter(|s| !s.is_empty()) {
            let mut segment = parse_segment(raw, piece)?;

            if let Some(optional) = &trailing_optional {
                if !segment.is_optional() {
                    return Err(RouteError::OptionalNotTrailing {
                        pattern: raw.to_string(),
                        param: optional.clone(),
                    });
                }
            }

            if let Segment::Param(param) = &mut segment {
                rules.apply(param);
                if param.optional && trailing_optional.is_none() {
                    trailing_optional = Some(param.name.clone());
                }
            }
            segments.push(segment);
        }

        check_duplicates(raw, &segments)?;

        let required = segments.iter().take_while(|s| !s.is_optional()).count();
        Ok(Self {
            raw: normalize(&segments),
            segments,
            required,
        })
    }

    /// The normalized pattern text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The compiled segments.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Parameters in declaration order.
    pub fn params(&self) -> impl Iterator<Item = &Param> {
        self.segments.iter().filter_map(Segment::param)
    }

    /// Matches already-split path segments, appending captures to `params`.
    ///
    /// Returns false on any mismatch; `params` may then hold partial captures
    /// and must be discarded by the caller.
    pub(crate) fn capture(&self, inputs: &[&str], params: &mut Params) -> bool {
        if inputs.len() < self.required || inputs.len() > self.segments.len() {
            return false;
        }

        for (index, segment) in self.segments.iter().enumerate() {
            match (segment, inputs.get(index)) {
                (Segment::Literal(literal), Some(input)) => match decode(input) {
                    Some(decoded) if decoded == literal.as_str() => {}
                    _ => return false,
                },
                (Segment::Param(param), Some(input)) => match decode(input) {
                    Some(decoded) if capture_param(param, &decoded, params) => {}
                    _ => return false,
                },
                (Segment::Param(param), None) => {
                    if let Some(default) = &param.default {
                        params.push(param.name.clone(), default.clone());
                    }
                }
                (Segment::Literal(_), None) => return false,
            }
        }
        true
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn normalize(segments: &[Segment]) -> String {
    if segments.is_empty() {
        return "/".to_string();
    }
    let mut out = String::new();
    for segment in segments {
        out.push('/');
        match segment {
            Segment::Literal(literal) => out.push_str(literal),
            Segment::Param(param) if param.optional => {
                out.push('{');
                out.push_str(&param.name);
                out.push_str("?}");
            }
            Segment::Param(param) => {
                out.push('{');
                out.push_str(&param.name);
                out.push('}');
            }
        }
    }
    out
}

/// Splits a request path into raw (still encoded) segments.
pub(crate) fn split_path(path: &str) -> Vec<&str> {
    let path = path.split_once('?').map_or(path, |(p, _)| p);
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// A compiled host pattern such as `{account}.example.com`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl DomainPattern {
    pub(crate) fn parse(raw: &str, rules: &ParamRules) -> Result<Self, RouteError> {
        let mut segments = Vec::new();
        for piece in raw.split('.').filter(|s| !s.is_empty()) {
            let mut segment = parse_segment(raw, piece)?;
            if let Segment::Param(param) = &mut segment {
                if param.optional {
                    return Err(RouteError::OptionalInDomain {
                        domain: raw.to_string(),
                        param: param.name.clone(),
                    });
                }
                rules.apply(param);
            }
            segments.push(segment);
        }
        check_duplicates(raw, &segments)?;

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The pattern text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The compiled labels.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Parameters in declaration order.
    pub fn params(&self) -> impl Iterator<Item = &Param> {
        self.segments.iter().filter_map(Segment::param)
    }

    /// Matches a `Host` value (port ignored), appending captures to `params`.
    pub(crate) fn capture(&self, host: &str, params: &mut Params) -> bool {
        let labels: Vec<&str> = strip_port(host)
            .split('.')
            .filter(|s| !s.is_empty())
            .collect();
        if labels.len() != self.segments.len() {
            return false;
        }

        self.segments
            .iter()
            .zip(labels)
            .all(|(segment, label)| match segment {
                Segment::Literal(literal) => literal.eq_ignore_ascii_case(label),
                Segment::Param(param) => capture_param(param, label, params),
            })
    }
}

fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port))
            if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) && !name.ends_with(':') =>
        {
            name
        }
        _ => host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
    use proptest::prelude::*;

    fn parse(raw: &str) -> Result<PathPattern, RouteError> {
        PathPattern::parse(raw, &ParamRules::default())
    }

    fn parse_with(raw: &str, constraints: &[(&str, &str)], defaults: &[(&str, &str)]) -> PathPattern {
        let mut rules = ParamRules::default();
        for (name, re) in constraints {
            rules
                .constraints
                .insert((*name).to_string(), Constraint::new(name, re).unwrap());
        }
        for (name, value) in defaults {
            rules
                .defaults
                .insert((*name).to_string(), (*value).to_string());
        }
        PathPattern::parse(raw, &rules).unwrap()
    }

    fn capture(pattern: &PathPattern, path: &str) -> Option<Params> {
        let mut params = Params::new();
        pattern
            .capture(&split_path(path), &mut params)
            .then_some(params)
    }

    #[test]
    fn test_parse_literal_and_param_segments() {
        let pattern = parse("/users/{id}").unwrap();
        assert_eq!(pattern.segments().len(), 2);
        assert_eq!(pattern.segments()[0], Segment::Literal("users".to_string()));
        assert!(matches!(&pattern.segments()[1], Segment::Param(p) if p.name == "id" && !p.optional));
    }

    #[test]
    fn test_parse_normalizes_slashes() {
        assert_eq!(parse("users//{id}/").unwrap().as_str(), "/users/{id}");
        assert_eq!(parse("/").unwrap().as_str(), "/");
        assert_eq!(parse("").unwrap().as_str(), "/");
    }

    #[test]
    fn test_non_trailing_optional_is_rejected() {
        let err = parse("/posts/{id?}/comments").unwrap_err();
        assert!(matches!(err, RouteError::OptionalNotTrailing { ref param, .. } if param == "id"));

        let err = parse("/a/{x?}/{y}").unwrap_err();
        assert!(matches!(err, RouteError::OptionalNotTrailing { .. }));
    }

    #[test]
    fn test_multiple_trailing_optionals_are_allowed() {
        let pattern = parse_with("/archive/{year?}/{month?}", &[], &[("year", "2024"), ("month", "01")]);
        let params = capture(&pattern, "/archive/2020").unwrap();
        assert_eq!(params.get("year"), Some("2020"));
        assert_eq!(params.get("month"), Some("01"));
    }

    #[test]
    fn test_duplicate_param_is_rejected() {
        let err = parse("/{id}/x/{id}").unwrap_err();
        assert!(matches!(err, RouteError::DuplicateParam { .. }));
    }

    #[test]
    fn test_invalid_segments_are_rejected() {
        assert!(matches!(parse("/user-{id}").unwrap_err(), RouteError::InvalidSegment { .. }));
        assert!(matches!(parse("/{}").unwrap_err(), RouteError::InvalidSegment { .. }));
        assert!(matches!(parse("/{a-b}").unwrap_err(), RouteError::InvalidSegment { .. }));
    }

    #[test]
    fn test_capture_required_param() {
        let pattern = parse("/user/{id}").unwrap();
        let params = capture(&pattern, "/user/42").unwrap();
        assert_eq!(params.get("id"), Some("42"));
        assert!(capture(&pattern, "/user").is_none());
        assert!(capture(&pattern, "/user/42/extra").is_none());
    }

    #[test]
    fn test_capture_optional_with_default() {
        let pattern = parse_with("/posts/{id?}", &[], &[("id", "1")]);
        assert_eq!(capture(&pattern, "/posts").unwrap().get("id"), Some("1"));
        assert_eq!(capture(&pattern, "/posts/7").unwrap().get("id"), Some("7"));
    }

    #[test]
    fn test_capture_optional_without_default_is_absent() {
        let pattern = parse("/posts/{id?}").unwrap();
        let params = capture(&pattern, "/posts").unwrap();
        assert!(!params.contains("id"));
    }

    #[test]
    fn test_constraint_rejects_segment() {
        let pattern = parse_with("/user/{id}", &[("id", "[0-9]+")], &[]);
        assert!(capture(&pattern, "/user/abc").is_none());
        assert!(capture(&pattern, "/user/12a").is_none());
        assert_eq!(capture(&pattern, "/user/123").unwrap().get("id"), Some("123"));
    }

    #[test]
    fn test_constraint_alternation_is_anchored() {
        let pattern = parse_with("/f/{kind}", &[("kind", "png|jpg")], &[]);
        assert!(capture(&pattern, "/f/png").is_some());
        assert!(capture(&pattern, "/f/xpng").is_none());
        assert!(capture(&pattern, "/f/jpgx").is_none());
    }

    #[test]
    fn test_invalid_constraint() {
        let err = Constraint::new("id", "[0-9").unwrap_err();
        assert!(matches!(err, RouteError::InvalidConstraint { ref param, .. } if param == "id"));
    }

    #[test]
    fn test_capture_percent_decodes() {
        let pattern = parse("/files/{name}").unwrap();
        let params = capture(&pattern, "/files/hello%20world").unwrap();
        assert_eq!(params.get("name"), Some("hello world"));

        let literal = parse("/caf\u{e9}").unwrap();
        assert!(capture(&literal, "/caf%C3%A9").is_some());
    }

    #[test]
    fn test_capture_rejects_invalid_utf8() {
        let pattern = parse("/files/{name}").unwrap();
        assert!(capture(&pattern, "/files/%FF").is_none());
    }

    #[test]
    fn test_query_string_is_ignored() {
        let pattern = parse("/search/{term}").unwrap();
        let params = capture(&pattern, "/search/rust?page=2").unwrap();
        assert_eq!(params.get("term"), Some("rust"));
    }

    #[test]
    fn test_root_pattern() {
        let pattern = parse("/").unwrap();
        assert!(capture(&pattern, "/").is_some());
        assert!(capture(&pattern, "").is_some());
        assert!(capture(&pattern, "/x").is_none());
    }

    #[test]
    fn test_domain_capture() {
        let domain = DomainPattern::parse("{tenant}.example.com", &ParamRules::default()).unwrap();
        let mut params = Params::new();
        assert!(domain.capture("acme.Example.COM:8080", &mut params));
        assert_eq!(params.get("tenant"), Some("acme"));

        let mut params = Params::new();
        assert!(!domain.capture("example.com", &mut params));
    }

    #[test]
    fn test_domain_rejects_optional() {
        let err = DomainPattern::parse("{sub?}.example.com", &ParamRules::default()).unwrap_err();
        assert!(matches!(err, RouteError::OptionalInDomain { .. }));
    }

    #[test]
    fn test_strip_port() {
        assert_eq!(strip_port("example.com:443"), "example.com");
        assert_eq!(strip_port("example.com"), "example.com");
        assert_eq!(strip_port("example.com:"), "example.com:");
    }

    proptest! {
        #[test]
        fn prop_param_captures_literal_value(prefix in "[a-z]{1,8}", value in "[a-zA-Z0-9_-]{1,16}") {
            let pattern = parse(&format!("/{prefix}/{{value}}")).unwrap();
            let params = capture(&pattern, &format!("/{prefix}/{value}")).unwrap();
            prop_assert_eq!(params.get("value"), Some(value.as_str()));
        }

        #[test]
        fn prop_encoded_values_decode_to_original(value in "\\PC{1,12}") {
            let pattern = parse("/v/{value}").unwrap();
            let encoded = utf8_percent_encode(&value, NON_ALPHANUMERIC).to_string();
            let params = capture(&pattern, &format!("/v/{encoded}")).unwrap();
            prop_assert_eq!(params.get("value"), Some(value.as_str()));
        }

        #[test]
        fn prop_numeric_constraint_matches_digits_only(value in "[a-z0-9]{1,10}") {
            let pattern = parse_with("/n/{id}", &[("id", "[0-9]+")], &[]);
            let matched = capture(&pattern, &format!("/n/{value}")).is_some();
            prop_assert_eq!(matched, value.bytes().all(|b| b.is_ascii_digit()));
        }
    }
}

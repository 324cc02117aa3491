//! Hierarchical resource identifier parsing.
//!
//! An identifier addresses either a collection (`tracks`, `albums/3/tracks`)
//! or a single item (`tracks/5`, `albums/3/tracks/7`). Path segments alternate
//! relation-name and row-key positions, so an even segment count means the
//! trailing segment is an item key. Query parameters carry the recognized
//! modifiers (`expand`, `groupBy`, `having`, `limit`, `distinct`).

use nom::bytes::complete::{take_while, take_while1};
use nom::character::complete::char;
use nom::combinator::opt;
use nom::multi::separated_list0;
use nom::sequence::preceded;
use nom::{IResult, Parser};
use std::fmt;

use crate::table_catalog::TableCatalog;

pub use errors::ResourceUriError;

pub mod errors;

const EXPAND: &str = "expand";
const GROUP_BY: &str = "groupBy";
const HAVING: &str = "having";
const LIMIT: &str = "limit";
const DISTINCT: &str = "distinct";

/// `distinct` is honored only for this exact literal. `"TRUE"`, `"1"` and the
/// empty string all mean false.
const IS_TRUE: &str = "true";

/// Query modifiers extracted from the identifier's query component.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Modifiers {
    /// Requested expand relations, in request order, duplicates preserved.
    pub expand: Vec<String>,
    pub group_by: Option<String>,
    pub having: Option<String>,
    pub limit: Option<String>,
    pub distinct: bool,
    /// Unrecognized parameters, order and duplicates preserved. They carry no
    /// semantics here but stay inspectable for callers layered above.
    pub extra: Vec<(String, String)>,
}

/// Scope of a collection nested under a parent item, e.g. `(albums, 3)` for
/// `albums/3/tracks`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParentScope {
    pub relation: String,
    pub key: i64,
}

/// A parsed hierarchical resource identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceUri {
    segments: Vec<String>,
    item_key: Option<i64>,
    parent_scope: Option<ParentScope>,
    modifiers: Modifiers,
}

impl ResourceUri {
    pub fn path(&self) -> &[String] {
        &self.segments
    }

    /// The relation the identifier ultimately addresses: the trailing segment
    /// for a collection, the segment before the key for an item.
    pub fn base_relation(&self) -> &str {
        let idx = if self.item_key.is_some() {
            self.segments.len() - 2
        } else {
            self.segments.len() - 1
        };
        &self.segments[idx]
    }

    pub fn is_item(&self) -> bool {
        self.item_key.is_some()
    }

    pub fn item_key(&self) -> Option<i64> {
        self.item_key
    }

    pub fn parent_scope(&self) -> Option<&ParentScope> {
        self.parent_scope.as_ref()
    }

    pub fn modifiers(&self) -> &Modifiers {
        &self.modifiers
    }

    /// Canonical identifier for a freshly inserted row: the collection path
    /// with the generated key appended. Modifiers are not carried over.
    pub fn with_appended_key(&self, key: i64) -> ResourceUri {
        let mut segments = self.segments.clone();
        segments.push(key.to_string());
        let parent_scope = derive_parent_scope(&segments, true);
        ResourceUri {
            segments,
            item_key: Some(key),
            parent_scope,
            modifiers: Modifiers::default(),
        }
    }
}

impl fmt::Display for ResourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

/// Parse a raw identifier and validate it against the catalog.
///
/// Shape rule: segment count even = item (trailing segment is the key),
/// odd = collection. Every relation-position segment must be registered;
/// every key-position segment must be a decimal integer.
pub fn parse_resource_uri(
    raw: &str,
    catalog: &TableCatalog,
) -> Result<ResourceUri, ResourceUriError> {
    let (segments, params) = split_raw(raw)?;

    for (i, segment) in segments.iter().enumerate() {
        if i % 2 == 0 {
            if !catalog.contains(segment) {
                return Err(ResourceUriError::UnknownResource {
                    segment: segment.clone(),
                    uri: raw.to_string(),
                });
            }
        } else if segment.parse::<i64>().is_err() {
            return Err(ResourceUriError::MalformedItemKey {
                segment: segment.clone(),
                uri: raw.to_string(),
            });
        }
    }

    let is_item = segments.len() % 2 == 0;
    let item_key = if is_item {
        // Validated numeric above.
        segments.last().and_then(|s| s.parse::<i64>().ok())
    } else {
        None
    };
    let parent_scope = derive_parent_scope(&segments, is_item);
    let modifiers = collect_modifiers(params);

    Ok(ResourceUri {
        segments,
        item_key,
        parent_scope,
        modifiers,
    })
}

fn derive_parent_scope(segments: &[String], is_item: bool) -> Option<ParentScope> {
    let base_idx = segments.len() - if is_item { 2 } else { 1 };
    if base_idx < 2 {
        return None;
    }
    let key = segments[base_idx - 1].parse::<i64>().ok()?;
    Some(ParentScope {
        relation: segments[base_idx - 2].clone(),
        key,
    })
}

fn collect_modifiers(params: Vec<(String, String)>) -> Modifiers {
    let mut modifiers = Modifiers::default();
    for (key, value) in params {
        match key.as_str() {
            EXPAND => modifiers.expand.push(value),
            GROUP_BY => modifiers.group_by = Some(value),
            HAVING => modifiers.having = Some(value),
            LIMIT => modifiers.limit = Some(value),
            DISTINCT => modifiers.distinct = IS_TRUE == value,
            _ => modifiers.extra.push((key, value)),
        }
    }
    modifiers
}

/// Split a raw identifier into decoded path segments and query pairs.
fn split_raw(raw: &str) -> Result<(Vec<String>, Vec<(String, String)>), ResourceUriError> {
    let (rest, (raw_segments, raw_params)) = identifier(raw)
        .map_err(|_| ResourceUriError::malformed(raw, "expected <path>[?<query>]"))?;
    if !rest.is_empty() {
        return Err(ResourceUriError::malformed(
            raw,
            format!("trailing input `{}`", rest),
        ));
    }
    let mut segments = Vec::with_capacity(raw_segments.len());
    for s in raw_segments {
        segments.push(percent_decode(s, false).ok_or_else(|| {
            ResourceUriError::malformed(raw, format!("invalid percent escape in `{}`", s))
        })?);
    }
    if segments.is_empty() {
        return Err(ResourceUriError::malformed(raw, "empty path"));
    }
    let mut params = Vec::with_capacity(raw_params.len());
    for (k, v) in raw_params {
        let key = percent_decode(k, true).ok_or_else(|| {
            ResourceUriError::malformed(raw, format!("invalid percent escape in `{}`", k))
        })?;
        let value = percent_decode(v, true).ok_or_else(|| {
            ResourceUriError::malformed(raw, format!("invalid percent escape in `{}`", v))
        })?;
        params.push((key, value));
    }
    Ok((segments, params))
}

fn segment(input: &str) -> IResult<&str, &str> {
    take_while1(|c| c != '/' && c != '?').parse(input)
}

fn path(input: &str) -> IResult<&str, Vec<&str>> {
    let (input, _) = opt(char('/')).parse(input)?;
    separated_list0(char('/'), segment).parse(input)
}

fn query_pair(input: &str) -> IResult<&str, (&str, &str)> {
    let (input, key) = take_while1(|c| c != '=' && c != '&').parse(input)?;
    let (input, value) = opt(preceded(char('='), take_while(|c| c != '&'))).parse(input)?;
    Ok((input, (key, value.unwrap_or(""))))
}

fn query(input: &str) -> IResult<&str, Vec<(&str, &str)>> {
    preceded(char('?'), separated_list0(char('&'), query_pair)).parse(input)
}

fn identifier(input: &str) -> IResult<&str, (Vec<&str>, Vec<(&str, &str)>)> {
    let (input, segments) = path(input)?;
    let (input, params) = opt(query).parse(input)?;
    Ok((input, (segments, params.unwrap_or_default())))
}

/// Decode `%XX` escapes; in the query component `+` also decodes to a space.
/// Returns None on a truncated or non-hex escape.
fn percent_decode(input: &str, plus_as_space: bool) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hi = hex_val(*bytes.get(i + 1)?)?;
                let lo = hex_val(*bytes.get(i + 2)?)?;
                out.push(hi * 16 + lo);
                i += 3;
            }
            b'+' if plus_as_space => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).ok()
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

//! Decoding of list-endpoint query parameters.
//!
//! `where`, `sort` and `select` carry JSON objects; a value that fails to
//! decode is reported as an [`InvalidParam`] so the handler can answer 400.
//! `skip` and `limit` are parsed leniently and never fail.

mod document;

pub use document::{Filter, FindOptions, Projection};

use document::Sort;

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid JSON in {name} parameter")]
pub struct InvalidParam {
    pub name: &'static str,
}

fn decode_object(name: &'static str, raw: Option<&str>) -> Result<Option<Map<String, Value>>, InvalidParam> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(Some(map)),
        Ok(other) => {
            tracing::debug!("{} parameter is not an object: {}", name, other);
            Err(InvalidParam { name })
        }
        Err(e) => {
            tracing::debug!("Failed to decode {} parameter: {}", name, e);
            Err(InvalidParam { name })
        }
    }
}

pub fn parse_filter(raw: Option<&str>) -> Result<Option<Filter>, InvalidParam> {
    Ok(decode_object("where", raw)?.map(Filter::new))
}

pub fn parse_sort(raw: Option<&str>) -> Result<Option<Sort>, InvalidParam> {
    Ok(decode_object("sort", raw)?.map(Sort::from_object))
}

pub fn parse_projection(raw: Option<&str>) -> Result<Option<Projection>, InvalidParam> {
    Ok(decode_object("select", raw)?.map(Projection::from_object))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

// Leading integer of the input, the way `parseInt` reads "10abc" as 10
fn parse_int_prefix(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let digits: &str = &rest[..rest.bytes().take_while(u8::is_ascii_digit).count()];
    if digits.is_empty() {
        return None;
    }
    let magnitude = digits.parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

/// Non-numeric values are ignored rather than rejected. A negative skip is
/// dropped, a negative limit counts by magnitude and a zero limit means none.
pub fn parse_pagination(skip_raw: Option<&str>, limit_raw: Option<&str>) -> Pagination {
    let skip = skip_raw
        .and_then(parse_int_prefix)
        .filter(|n| *n > 0)
        .map(|n| n as u64);
    let limit = limit_raw
        .and_then(parse_int_prefix)
        .map(i64::unsigned_abs)
        .filter(|n| *n > 0);
    Pagination { skip, limit }
}

pub fn parse_count(raw: Option<&Value>) -> bool {
    match raw {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(s)) => s == "true",
        _ => false,
    }
}

/// Query string accepted by the list endpoints.
#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
    #[serde(rename = "where")]
    pub filter: Option<String>,
    pub sort: Option<String>,
    pub select: Option<String>,
    pub skip: Option<String>,
    pub limit: Option<String>,
    pub count: Option<String>,
}

impl ListParams {
    /// `default_limit` only applies when the request has no `limit` at all.
    pub fn find_options(&self, default_limit: Option<u64>) -> Result<FindOptions, InvalidParam> {
        let filter = parse_filter(self.filter.as_deref())?.unwrap_or_default();
        let sort = parse_sort(self.sort.as_deref())?;
        let projection = parse_projection(self.select.as_deref())?;
        let page = parse_pagination(self.skip.as_deref(), self.limit.as_deref());
        let limit = match self.limit {
            None => default_limit,
            Some(_) => page.limit,
        };

        Ok(FindOptions { filter, sort, projection, skip: page.skip, limit })
    }

    pub fn wants_count(&self) -> bool {
        parse_count(self.count.clone().map(Value::String).as_ref())
    }
}

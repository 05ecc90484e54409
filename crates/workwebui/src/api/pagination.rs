use axum::extract::Query;
use axum::http::Uri;

use crate::error::ApiError;

/// 1-indexed page of a paginated job set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page(u64);

impl Page {
    pub const FIRST: Page = Page(1);

    pub fn get(self) -> u64 {
        self.0
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::FIRST
    }
}

/// Validate the raw `page` parameter.
///
/// Absent or empty means page 1. Anything else must be a plain base-10
/// unsigned integer of at least 1; no sign, no whitespace, no clamping.
/// There is no upper bound: a page past the end is the engine's business.
pub fn parse_page(raw: Option<&str>) -> Result<Page, ApiError> {
    let raw = match raw {
        None | Some("") => return Ok(Page::FIRST),
        Some(s) => s,
    };

    let invalid = |reason: &str| ApiError::InvalidPage {
        value: raw.to_string(),
        reason: reason.to_string(),
    };

    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("not a base-10 unsigned integer"));
    }

    let n: u64 = raw.parse().map_err(|e: std::num::ParseIntError| invalid(&e.to_string()))?;
    if n == 0 {
        return Err(invalid("pages start at 1"));
    }

    Ok(Page(n))
}

/// Pull `page` out of a request URI's query string. When `page` is
/// repeated the first occurrence wins.
pub fn page_from_uri(uri: &Uri) -> Result<Page, ApiError> {
    let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(uri)
        .map_err(|rejection| ApiError::InvalidQuery(rejection.body_text()))?;
    let page = pairs.iter().find(|(key, _)| key == "page").map(|(_, v)| v.as_str());
    parse_page(page)
}

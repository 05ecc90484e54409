//! Authorization gate evaluated before any API handler runs.
//!
//! The management API can delete and re-enqueue dead jobs in bulk, so the
//! decision of who may call it is a pluggable policy rather than something
//! assumed to happen upstream.

use std::str::FromStr;

use axum::http::{HeaderMap, Method};
use thiserror::Error;

/// What the policy gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct AccessRequest<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    pub bearer: Option<&'a str>,
}

impl AccessRequest<'_> {
    /// POST routes mutate the dead set.
    pub fn is_destructive(&self) -> bool {
        *self.method == Method::POST
    }
}

pub trait Authorizer: Send + Sync {
    fn authorize(&self, req: &AccessRequest<'_>) -> bool;
}

/// No gate at all; the source behaviour.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn authorize(&self, _req: &AccessRequest<'_>) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenScope {
    /// Every API route needs the token.
    #[default]
    All,
    /// Only mutating routes need the token; reads stay open.
    Destructive,
}

#[derive(Debug, Error)]
#[error("unknown token scope {0:?} (expected \"all\" or \"destructive\")")]
pub struct UnknownTokenScope(String);

impl FromStr for TokenScope {
    type Err = UnknownTokenScope;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(TokenScope::All),
            "destructive" => Ok(TokenScope::Destructive),
            other => Err(UnknownTokenScope(other.to_string())),
        }
    }
}

/// Static shared-secret bearer token.
#[derive(Debug, Clone)]
pub struct BearerToken {
    token: String,
    scope: TokenScope,
}

impl BearerToken {
    pub fn new(token: impl Into<String>, scope: TokenScope) -> Self {
        Self {
            token: token.into(),
            scope,
        }
    }
}

impl Authorizer for BearerToken {
    fn authorize(&self, req: &AccessRequest<'_>) -> bool {
        if self.scope == TokenScope::Destructive && !req.is_destructive() {
            return true;
        }
        req.bearer.is_some_and(|t| constant_time_eq(t.as_bytes(), self.token.as_bytes()))
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Token from `Authorization: Bearer <token>`, if well formed.
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let header = header.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn req<'a>(method: &'a Method, bearer: Option<&'a str>) -> AccessRequest<'a> {
        AccessRequest {
            method,
            path: "/acme/delete_all_dead_jobs",
            bearer,
        }
    }

    #[test]
    fn allow_all_allows() {
        assert!(AllowAll.authorize(&req(&Method::POST, None)));
    }

    #[test]
    fn bearer_all_scope_guards_reads_and_writes() {
        let policy = BearerToken::new("s3cret", TokenScope::All);

        assert!(!policy.authorize(&req(&Method::GET, None)));
        assert!(!policy.authorize(&req(&Method::POST, Some("wrong"))));
        assert!(policy.authorize(&req(&Method::GET, Some("s3cret"))));
        assert!(policy.authorize(&req(&Method::POST, Some("s3cret"))));
    }

    #[test]
    fn bearer_destructive_scope_leaves_reads_open() {
        let policy = BearerToken::new("s3cret", TokenScope::Destructive);

        assert!(policy.authorize(&req(&Method::GET, None)));
        assert!(!policy.authorize(&req(&Method::POST, None)));
        assert!(policy.authorize(&req(&Method::POST, Some("s3cret"))));
    }

    #[test]
    fn extracts_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer(&headers), None);

        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer  abc "),
        );
        assert_eq!(extract_bearer(&headers), Some("abc"));

        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Basic abc"),
        );
        assert_eq!(extract_bearer(&headers), None);

        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer   "),
        );
        assert_eq!(extract_bearer(&headers), None);
    }

    #[test]
    fn token_scope_parses() {
        assert_eq!("ALL".parse::<TokenScope>().unwrap(), TokenScope::All);
        assert_eq!(
            " destructive ".parse::<TokenScope>().unwrap(),
            TokenScope::Destructive
        );
        assert!("reads".parse::<TokenScope>().is_err());
    }
}

//! Script-injection stripping for request parameters.
//!
//! The [`sanitize_params`] middleware runs first in the pipeline. It reads the
//! query string and, for urlencoded form posts, the body; strips every
//! parameter name and value; and stores the result in the request extensions
//! as [`SanitizedParams`]. Later stages and handlers read parameters from
//! there (through the [`Params`] extractor), never from the raw URI or body.
//! The raw URI and body bytes are passed on unchanged.

use std::collections::HashMap;
use std::sync::LazyLock;

use axum::{
    body::Body,
    extract::{FromRequestParts, Request},
    http::{HeaderMap, header::CONTENT_TYPE, request::Parts},
    middleware::Next,
    response::Response,
};
use regex::Regex;
use tracing::warn;
use unicode_normalization::UnicodeNormalization;
use url::form_urlencoded;

use crate::error::{Failure, InterceptionPoint, Origin};

/// Largest urlencoded form body the sanitizer will buffer.
pub const MAX_FORM_BYTES: usize = 64 * 1024;

/// Passes allowed before a value must stop changing. Anything still changing
/// after that is nested on purpose and gets rejected.
pub const MAX_STRIP_PASSES: usize = 4;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Removal patterns, applied in this order.
static PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // <script>...</script> including the body
        r"(?i)<script>(.*?)</script>",
        // src='...' and src="..."
        r"(?is)src[\r\n]*=[\r\n]*'(.*?)'",
        r#"(?is)src[\r\n]*=[\r\n]*"(.*?)""#,
        // lone tags
        r"(?i)</script>",
        r"(?is)<script(.*?)>",
        r"(?is)eval\((.*?)\)",
        r"(?is)expression\((.*?)\)",
        r"(?i)javascript:",
        r"(?i)vbscript:",
        r"(?is)onload(.*?)=",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("sanitizer pattern is valid"))
    .collect()
});

fn strip_once(value: &str) -> String {
    let mut out = value.replace('\0', "");
    for pattern in PATTERNS.iter() {
        out = pattern.replace_all(&out, "").into_owned();
    }
    out
}

/// Strip script-injection patterns from `value`.
///
/// The value is NFD-normalized, NUL characters are dropped, then the
/// patterns are removed in order. Passes repeat until nothing changes, so a
/// removal can never splice a new match together and the result is a fixed
/// point. Returns `None` when the value is still changing after
/// [`MAX_STRIP_PASSES`] passes.
pub fn strip_xss(value: &str) -> Option<String> {
    let mut current: String = value.nfd().collect();
    for _ in 0..MAX_STRIP_PASSES {
        let next = strip_once(&current);
        if next == current {
            return Some(current);
        }
        current = next;
    }
    None
}

fn unsettled(name: &str) -> Failure {
    Failure::invalid_parameter(name, "nested script content")
}

/// Request parameters after stripping. Names are stripped too; parameters
/// whose stripped names collide are merged in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanitizedParams {
    values: HashMap<String, Vec<String>>,
    rewritten: usize,
}

impl SanitizedParams {
    /// Strip every pair. Fails on the first name or value that does not
    /// settle within [`MAX_STRIP_PASSES`].
    pub fn from_pairs<I>(pairs: I) -> Result<Self, Failure>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut params = Self::default();
        for (name, value) in pairs {
            let clean_name = strip_xss(&name).ok_or_else(|| unsettled("name"))?;
            let clean_value = strip_xss(&value).ok_or_else(|| unsettled(&clean_name))?;
            if clean_name != name || clean_value != value {
                params.rewritten += 1;
            }
            params
                .values
                .entry(clean_name)
                .or_default()
                .push(clean_value);
        }
        Ok(params)
    }

    pub fn from_query(query: Option<&str>) -> Result<Self, Failure> {
        let pairs = query
            .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect::<Vec<_>>())
            .unwrap_or_default();
        Self::from_pairs(pairs)
    }

    /// First value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    pub fn get_all(&self, name: &str) -> &[String] {
        self.values.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First non-empty value of `name`, or a missing-parameter failure.
    pub fn require(&self, name: &str) -> Result<&str, Failure> {
        match self.get(name) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(Failure::missing_parameter(name)),
        }
    }

    /// How many parameters had their name or value changed.
    pub fn rewritten(&self) -> usize {
        self.rewritten
    }
}

/// Pipeline stage identity used when the sanitizer rejects a request.
#[derive(Debug, Clone, Copy, Default)]
pub struct SanitizerStage;

impl InterceptionPoint for SanitizerStage {
    fn origin(&self) -> Origin {
        Origin::Pipeline("sanitizer")
    }
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with(FORM_CONTENT_TYPE))
}

/// Middleware computing [`SanitizedParams`] once per request.
pub async fn sanitize_params(request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();

    let mut pairs: Vec<(String, String)> = parts
        .uri
        .query()
        .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    let body = if is_form(&parts.headers) {
        let bytes = match axum::body::to_bytes(body, MAX_FORM_BYTES).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return SanitizerStage.reject(Failure::invalid_parameter(
                    "body",
                    format!("unreadable form body: {}", e),
                ));
            }
        };
        pairs.extend(form_urlencoded::parse(&bytes).into_owned());
        Body::from(bytes)
    } else {
        body
    };

    let params = match SanitizedParams::from_pairs(pairs) {
        Ok(params) => params,
        Err(failure) => return SanitizerStage.reject(failure),
    };
    if params.rewritten() > 0 {
        warn!(
            path = %parts.uri.path(),
            rewritten = params.rewritten(),
            "Stripped suspicious content from request parameters"
        );
    }
    parts.extensions.insert(params);

    next.run(Request::from_parts(parts, body)).await
}

/// Extractor for the sanitized parameters of the current request.
///
/// Falls back to sanitizing the query string when the middleware did not
/// run (e.g. a router built without it).
pub struct Params(pub SanitizedParams);

impl<S> FromRequestParts<S> for Params
where
    S: Send + Sync,
{
    type Rejection = Failure;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(params) = parts.extensions.get::<SanitizedParams>() {
            return Ok(Params(params.clone()));
        }
        let params = SanitizedParams::from_query(parts.uri.query())?;
        parts.extensions.insert(params.clone());
        Ok(Params(params))
    }
}

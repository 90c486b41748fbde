//! Public-path allow-list.
//!
//! Pattern forms:
//! - `/index.html`: exact match
//! - `/static/**`: `/static` itself and anything below it
//! - `/api/pub*`: plain prefix match

/// Paths exempt from authentication when none are configured.
pub const DEFAULT_PUBLIC_PATHS: &[&str] = &["/api/token", "/static/**", "/index.html", "/"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathPattern {
    Exact(String),
    Subtree(String),
    Prefix(String),
}

impl PathPattern {
    fn parse(pattern: &str) -> Self {
        if let Some(base) = pattern.strip_suffix("/**") {
            PathPattern::Subtree(base.to_string())
        } else if let Some(prefix) = pattern.strip_suffix('*') {
            PathPattern::Prefix(prefix.to_string())
        } else {
            PathPattern::Exact(pattern.to_string())
        }
    }

    fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(p) => path == p,
            PathPattern::Prefix(p) => path.starts_with(p.as_str()),
            PathPattern::Subtree(base) => {
                base.is_empty()
                    || path == base
                    || path
                        .strip_prefix(base.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
        }
    }
}

/// Compiled set of public path patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicPaths {
    patterns: Vec<PathPattern>,
}

impl PublicPaths {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| PathPattern::parse(p.as_ref()))
                .collect(),
        }
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }
}

impl Default for PublicPaths {
    fn default() -> Self {
        Self::new(DEFAULT_PUBLIC_PATHS)
    }
}

/// Validate a public path pattern from the command line.
pub fn validate_public_path(s: &str) -> Result<String, String> {
    if !s.starts_with('/') {
        return Err(format!("Public path must start with '/': {}", s));
    }
    if s.chars().any(|c| !c.is_ascii() || c.is_whitespace()) {
        return Err(format!("Public path contains invalid characters: {}", s));
    }
    if s.trim_end_matches('*').contains('*') {
        return Err(format!(
            "Wildcards are only allowed at the end of a public path: {}",
            s
        ));
    }
    Ok(s.to_string())
}

//! Principal and role types.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Separator used when a role set is flattened into a token claim.
pub const ROLE_DELIMITER: &str = ",";

/// Prefix of the authority tag derived from each role.
pub const AUTHORITY_PREFIX: &str = "ROLE_";

/// Set of role names held by an identity.
///
/// Roles are kept as a set internally and only become a comma-joined string
/// at the claim boundary (see the `Serialize`/`Deserialize` impls).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSet(BTreeSet<String>);

impl RoleSet {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            roles
                .into_iter()
                .map(|r| r.as_ref().trim().to_string())
                .filter(|r| !r.is_empty())
                .collect(),
        )
    }

    /// Parse a delimiter-joined role list. Blank entries are dropped.
    pub fn parse(joined: &str) -> Self {
        Self::new(joined.split(ROLE_DELIMITER))
    }

    pub fn to_claim(&self) -> String {
        self.0
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(ROLE_DELIMITER)
    }

    pub fn contains(&self, role: &str) -> bool {
        self.0.iter().any(|r| r.eq_ignore_ascii_case(role))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Authority tags for each role, e.g. `admin` becomes `ROLE_ADMIN`.
    pub fn authorities(&self) -> Vec<String> {
        self.0
            .iter()
            .map(|r| format!("{}{}", AUTHORITY_PREFIX, r.to_uppercase()))
            .collect()
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_claim())
    }
}

impl Serialize for RoleSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_claim())
    }
}

impl<'de> Deserialize<'de> for RoleSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let joined = String::deserialize(deserializer)?;
        Ok(RoleSet::parse(&joined))
    }
}

/// Identity attached to a request after the gate accepts its token.
///
/// Lives in the request extensions for one request only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub identity: String,
    pub roles: RoleSet,
    /// Authority tags derived from `roles`.
    pub authorities: Vec<String>,
    /// Expiry of the token that authenticated this request (Unix seconds).
    pub token_expires_at: u64,
}

impl Principal {
    pub fn new(identity: impl Into<String>, roles: RoleSet, token_expires_at: u64) -> Self {
        let authorities = roles.authorities();
        Self {
            identity: identity.into(),
            roles,
            authorities,
            token_expires_at,
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_blank_entries() {
        let roles = RoleSet::parse("admin, user,,test ,");
        assert_eq!(roles.to_claim(), "admin,test,user");
    }

    #[test]
    fn test_authorities_are_prefixed_and_uppercased() {
        let roles = RoleSet::parse("admin,user");
        assert_eq!(roles.authorities(), vec!["ROLE_ADMIN", "ROLE_USER"]);
    }

    #[test]
    fn test_contains_ignores_case() {
        let roles = RoleSet::parse("Admin");
        assert!(roles.contains("admin"));
        assert!(!roles.contains("user"));
    }

    #[test]
    fn test_serializes_as_joined_string() {
        let roles = RoleSet::parse("user,admin");
        let json = serde_json::to_string(&roles).unwrap();
        assert_eq!(json, "\"admin,user\"");

        let back: RoleSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, roles);
    }

    #[test]
    fn test_empty_claim_gives_empty_set() {
        assert!(RoleSet::parse("").is_empty());
    }
}

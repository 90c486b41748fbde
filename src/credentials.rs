//! Identity and password directory consulted when issuing tokens.

use std::collections::HashMap;
use std::fmt;

use crate::auth::RoleSet;
use crate::error::CredentialError;

/// Account used when none are configured.
pub const DEFAULT_USER: &str = "jason:123:admin,user,test";

/// Source of truth for identities, passwords and roles.
pub trait CredentialStore: Send + Sync {
    /// Check `password` for `identity` and return the identity's roles.
    fn verify(&self, identity: &str, password: &str) -> Result<RoleSet, CredentialError>;
}

/// One configured account.
#[derive(Clone)]
pub struct Account {
    password: String,
    pub roles: RoleSet,
}

impl Account {
    pub fn new(password: impl Into<String>, roles: RoleSet) -> Self {
        Self {
            password: password.into(),
            roles,
        }
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("password", &"[REDACTED]")
            .field("roles", &self.roles)
            .finish()
    }
}

/// Fixed in-memory account list, built from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    accounts: HashMap<String, Account>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, identity: impl Into<String>, account: Account) -> Self {
        self.accounts.insert(identity.into(), account);
        self
    }

    /// Build from `name:password:role1,role2` specs. Later specs for the same
    /// name replace earlier ones.
    pub fn from_specs<S: AsRef<str>>(specs: &[S]) -> Result<Self, String> {
        specs.iter().try_fold(Self::new(), |creds, spec| {
            let (identity, account) = parse_user_spec(spec.as_ref())?;
            Ok(creds.with_account(identity, account))
        })
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl CredentialStore for StaticCredentials {
    fn verify(&self, identity: &str, password: &str) -> Result<RoleSet, CredentialError> {
        let account = self
            .accounts
            .get(identity)
            .ok_or(CredentialError::IdentityUnknown)?;
        if account.password != password {
            return Err(CredentialError::SecretMismatch);
        }
        Ok(account.roles.clone())
    }
}

/// Parse a `name:password:roles` account spec. The password may not contain
/// `:`; the role list may be empty.
pub fn parse_user_spec(spec: &str) -> Result<(String, Account), String> {
    let mut fields = spec.splitn(3, ':');
    let (Some(name), Some(password), Some(roles)) = (fields.next(), fields.next(), fields.next())
    else {
        return Err(format!(
            "User spec must look like name:password:role1,role2 (got {:?})",
            spec.split(':').next().unwrap_or_default()
        ));
    };

    if name.is_empty() {
        return Err("User name must not be empty".to_string());
    }
    if password.is_empty() {
        return Err(format!("Password for user {} must not be empty", name));
    }

    Ok((
        name.to_string(),
        Account::new(password, RoleSet::parse(roles)),
    ))
}

/// Clap value parser for `--user`, checking the spec without keeping it parsed.
pub fn validate_user_spec(s: &str) -> Result<String, String> {
    parse_user_spec(s).map(|_| s.to_string())
}

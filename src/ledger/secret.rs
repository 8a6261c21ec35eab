//! Secret Provision
//!
//! The hashing secret is an explicit value handed to each verification
//! run, fetched fresh from a provider so rotation takes effect on the next
//! run. It is never cached, logged, or read from configuration.

use std::fmt;

/// Shared secret prefixed to the canonical blob when hashing.
#[derive(Clone, PartialEq, Eq)]
pub struct LedgerSecret(String);

impl LedgerSecret {
    /// Wrap a secret value; an empty value is treated as absent.
    ///
    /// Whitespace is a valid key and is kept as given.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for LedgerSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LedgerSecret(<redacted>)")
    }
}

/// Source of the hashing secret, consulted once per verification run.
pub trait SecretProvider {
    fn secret(&self) -> Option<LedgerSecret>;
}

/// Reads the secret from an environment variable on every call.
#[derive(Debug, Clone)]
pub struct EnvSecretProvider {
    var: String,
}

impl EnvSecretProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    pub fn var(&self) -> &str {
        &self.var
    }
}

impl SecretProvider for EnvSecretProvider {
    fn secret(&self) -> Option<LedgerSecret> {
        std::env::var(&self.var).ok().and_then(LedgerSecret::new)
    }
}

/// Fixed secret, mainly for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSecretProvider(Option<LedgerSecret>);

impl StaticSecretProvider {
    pub fn new(value: &str) -> Self {
        Self(LedgerSecret::new(value))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl SecretProvider for StaticSecretProvider {
    fn secret(&self) -> Option<LedgerSecret> {
        self.0.clone()
    }
}

use std::fmt;
use std::sync::Arc;

use crate::utils::{RealtimeError, Result};

type Accessor = Arc<dyn Fn() -> String + Send + Sync>;

/// Supplies the auth token or API key placed on the realtime URL.
///
/// The credential is resolved on every connect, so a dynamic accessor picks up
/// rotated tokens on the next reconnect.
#[derive(Clone)]
pub enum Credential {
    Fixed(String),
    Dynamic(Accessor),
}

impl Credential {
    pub fn fixed(value: impl Into<String>) -> Self {
        Self::Fixed(value.into())
    }

    pub fn dynamic<F>(accessor: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Self::Dynamic(Arc::new(accessor))
    }

    /// Reads `var` from the environment each time the credential is resolved.
    pub fn from_env(var: impl Into<String>) -> Self {
        let var = var.into();
        Self::dynamic(move || std::env::var(&var).unwrap_or_default())
    }

    pub fn resolve(&self) -> Result<String> {
        let value = match self {
            Self::Fixed(value) => value.clone(),
            Self::Dynamic(accessor) => accessor(),
        };
        if value.trim().is_empty() {
            return Err(RealtimeError::MissingCredential);
        }
        Ok(value)
    }
}

impl From<String> for Credential {
    fn from(value: String) -> Self {
        Self::Fixed(value)
    }
}

impl From<&str> for Credential {
    fn from(value: &str) -> Self {
        Self::Fixed(value.to_string())
    }
}

// never print the secret itself
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(_) => f.write_str("Credential::Fixed(..)"),
            Self::Dynamic(_) => f.write_str("Credential::Dynamic(..)"),
        }
    }
}

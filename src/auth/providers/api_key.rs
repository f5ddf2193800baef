use std::collections::HashMap;
use std::fmt;

use super::redact;
use crate::auth::AuthProvider;

/// Sends a fixed API key under a caller-chosen header name.
///
/// # Example
/// ```
/// use mcp_bridge::auth::{ApiKeyAuthProvider, AuthProvider};
///
/// let provider = ApiKeyAuthProvider::new("X-API-Key", "secret");
/// assert_eq!(provider.headers()["X-API-Key"], "secret");
/// ```
#[derive(Clone)]
pub struct ApiKeyAuthProvider {
    header_name: String,
    value: String,
}

impl ApiKeyAuthProvider {
    pub fn new(header_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            header_name: header_name.into(),
            value: value.into(),
        }
    }

    pub fn header_name(&self) -> &str {
        &self.header_name
    }
}

impl AuthProvider for ApiKeyAuthProvider {
    fn headers(&self) -> HashMap<String, String> {
        HashMap::from([(self.header_name.clone(), self.value.clone())])
    }
}

impl fmt::Debug for ApiKeyAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyAuthProvider")
            .field("header_name", &self.header_name)
            .field("value", &redact(&self.value))
            .finish()
    }
}

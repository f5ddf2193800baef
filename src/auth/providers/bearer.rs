use std::collections::HashMap;
use std::fmt;

use super::redact;
use crate::auth::AuthProvider;

/// Sends `Authorization: Bearer <token>`.
#[derive(Clone)]
pub struct BearerAuthProvider {
    token: String,
}

impl BearerAuthProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl AuthProvider for BearerAuthProvider {
    fn headers(&self) -> HashMap<String, String> {
        HashMap::from([(
            "Authorization".to_string(),
            format!("Bearer {}", self.token),
        )])
    }
}

impl fmt::Debug for BearerAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerAuthProvider")
            .field("token", &redact(&self.token))
            .finish()
    }
}

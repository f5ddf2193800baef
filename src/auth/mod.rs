//! Authentication header suppliers for network transports.
//!
//! An [`AuthProvider`] is queried every time a transport needs request
//! headers, so implementations may rotate credentials between calls.

pub mod providers;

pub use providers::{ApiKeyAuthProvider, BearerAuthProvider, HeaderFnProvider};

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::BridgeError;

/// Supplies authentication headers for outbound requests.
///
/// Every call returns a fresh map; callers may mutate it freely.
pub trait AuthProvider: Send + Sync + fmt::Debug {
    fn headers(&self) -> HashMap<String, String>;
}

/// Headers for an optional provider. No provider means no headers.
pub fn get_auth_headers(provider: Option<&dyn AuthProvider>) -> HashMap<String, String> {
    provider.map(|p| p.headers()).unwrap_or_default()
}

/// Merge static headers with provider headers into a reqwest [`HeaderMap`].
///
/// Provider headers win over static headers with the same name.
pub fn build_header_map(
    static_headers: &BTreeMap<String, String>,
    provider: Option<&dyn AuthProvider>,
) -> Result<HeaderMap, BridgeError> {
    let mut map = HeaderMap::new();
    let dynamic = get_auth_headers(provider);
    for (name, value) in static_headers.iter().chain(dynamic.iter()) {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| BridgeError::Configuration(format!("invalid header name '{name}': {e}")))?;
        let mut header_value = HeaderValue::from_str(value).map_err(|e| {
            BridgeError::Configuration(format!("invalid value for header '{name}': {e}"))
        })?;
        if is_sensitive(&header_name) {
            header_value.set_sensitive(true);
        }
        map.insert(header_name, header_value);
    }
    Ok(map)
}

fn is_sensitive(name: &HeaderName) -> bool {
    let name = name.as_str();
    name == "authorization" || name.contains("key") || name.contains("token")
}

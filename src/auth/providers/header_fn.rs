use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::auth::AuthProvider;

type HeaderFn = dyn Fn() -> HashMap<String, String> + Send + Sync;

/// Closure-backed supplier for credentials that change over time,
/// e.g. OAuth access tokens refreshed by the host application.
#[derive(Clone)]
pub struct HeaderFnProvider {
    supplier: Arc<HeaderFn>,
}

impl HeaderFnProvider {
    pub fn new<F>(supplier: F) -> Self
    where
        F: Fn() -> HashMap<String, String> + Send + Sync + 'static,
    {
        Self {
            supplier: Arc::new(supplier),
        }
    }
}

impl AuthProvider for HeaderFnProvider {
    fn headers(&self) -> HashMap<String, String> {
        (self.supplier)()
    }
}

impl fmt::Debug for HeaderFnProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderFnProvider").finish_non_exhaustive()
    }
}

//! Built-in header suppliers.

mod api_key;
mod bearer;
mod header_fn;

pub use api_key::ApiKeyAuthProvider;
pub use bearer::BearerAuthProvider;
pub use header_fn::HeaderFnProvider;

fn redact(secret: &str) -> String {
    match secret.char_indices().nth(4) {
        Some((idx, _)) => format!("{}***", &secret[..idx]),
        None => "***".to_string(),
    }
}

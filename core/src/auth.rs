//! HTTP Basic credentials for the Streak API.
//!
//! Streak authenticates with the API key as the username and an empty
//! password.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// Build the `authorization` header value for an API key.
pub fn basic_auth_header(api_key: &str) -> String {
    let credentials = format!("{api_key}:");
    format!("Basic {}", BASE64.encode(credentials.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_key_with_empty_password() {
        let header = basic_auth_header("sk_test_123");
        let encoded = header.strip_prefix("Basic ").unwrap();
        let decoded = String::from_utf8(BASE64.decode(encoded).unwrap()).unwrap();
        assert_eq!(decoded, "sk_test_123:");
    }

    #[test]
    fn empty_key_still_produces_header() {
        assert_eq!(basic_auth_header(""), format!("Basic {}", BASE64.encode(":")));
    }
}

//! Master-key request signing.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use cosmo_core::BackendError;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// `x-ms-date` value: RFC 1123 in GMT.
pub fn http_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Build the `authorization` header value for one request.
///
/// `resource_link` is case-sensitive and must not be URL-encoded; every
/// other component is lowercased before signing.
pub fn authorization_token(
    key: &[u8],
    verb: &str,
    resource_type: &str,
    resource_link: &str,
    date: &str,
) -> Result<String, BackendError> {
    let payload = format!(
        "{}\n{}\n{}\n{}\n\n",
        verb.to_lowercase(),
        resource_type.to_lowercase(),
        resource_link,
        date.to_lowercase()
    );

    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| BackendError::new(format!("invalid account key: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());

    Ok(urlencoding::encode(&format!("type=master&ver=1.0&sig={}", signature)).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_http_date() {
        let at = Utc.with_ymd_and_hms(2017, 4, 27, 0, 51, 12).unwrap();
        assert_eq!(http_date(at), "Thu, 27 Apr 2017 00:51:12 GMT");
    }

    #[test]
    fn test_known_signature() {
        let key = STANDARD
            .decode("dsZQi3KtZmCv1ljt3VNWNm7sQUF1y5rJfC6kv5JiwvW0EndXdDku/dkKBp8/ufDToSxL")
            .unwrap();
        let token = authorization_token(
            &key,
            "GET",
            "dbs",
            "dbs/ToDoList",
            "Thu, 27 Apr 2017 00:51:12 GMT",
        )
        .unwrap();
        assert_eq!(
            token,
            "type%3Dmaster%26ver%3D1.0%26sig%3DKvBM8vONofkv3yKm%2F8zD9MEGlbu6jjHDJBp4E9c2ZZI%3D"
        );
    }

    #[test]
    fn test_resource_link_is_case_sensitive() {
        let a = authorization_token(b"k", "get", "dbs", "dbs/A", "d").unwrap();
        let b = authorization_token(b"k", "get", "dbs", "dbs/a", "d").unwrap();
        assert_ne!(a, b);
    }
}

//! Account connection strings (`AccountEndpoint=https://...;AccountKey=...;`).

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use cosmo_core::BackendError;

/// Parsed account endpoint and decoded master key.
#[derive(Clone, PartialEq, Eq)]
pub struct AccountCredentials {
    /// Endpoint without trailing slash.
    pub endpoint: String,
    pub key: Vec<u8>,
}

impl std::fmt::Debug for AccountCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountCredentials")
            .field("endpoint", &self.endpoint)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl AccountCredentials {
    pub fn parse(connection_string: &str) -> Result<Self, BackendError> {
        let mut endpoint = None;
        let mut key = None;

        for part in connection_string.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            // Keys are base64 and may end in '=', so split on the first one only.
            let Some((name, value)) = part.split_once('=') else {
                return Err(invalid("segment without '='"));
            };
            match name.trim().to_ascii_lowercase().as_str() {
                "accountendpoint" => endpoint = Some(value.trim().to_string()),
                "accountkey" => key = Some(value.trim().to_string()),
                _ => {}
            }
        }

        let endpoint = endpoint
            .filter(|e| e.starts_with("http://") || e.starts_with("https://"))
            .ok_or_else(|| invalid("missing or malformed AccountEndpoint"))?;
        let key = key.ok_or_else(|| invalid("missing AccountKey"))?;
        let key = STANDARD
            .decode(key.as_bytes())
            .map_err(|_| invalid("AccountKey is not valid base64"))?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            key,
        })
    }
}

fn invalid(reason: &str) -> BackendError {
    BackendError::new(format!("invalid connection string: {}", reason))
}

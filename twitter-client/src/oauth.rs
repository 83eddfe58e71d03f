//! OAuth 1.0a request signing (HMAC-SHA1) for the X API.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use persona_core::{CoreError, TwitterCredentials};
use sha1::Sha1;
use std::time::{SystemTime, UNIX_EPOCH};
use url::Url;

type HmacSha1 = Hmac<Sha1>;

/// RFC 3986 unreserved characters stay as-is; everything else is encoded.
const OAUTH_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

pub fn encode(value: &str) -> String {
    utf8_percent_encode(value, OAUTH_ENCODE).to_string()
}

#[derive(Debug, Clone)]
pub struct OAuthSigner {
    credentials: TwitterCredentials,
}

impl OAuthSigner {
    pub fn new(credentials: TwitterCredentials) -> Self {
        Self { credentials }
    }

    /// Builds the `Authorization` header for a request.
    ///
    /// `form_params` are urlencoded body parameters; JSON bodies are not signed.
    pub fn authorization_header(
        &self,
        method: &str,
        url: &Url,
        form_params: &[(String, String)],
    ) -> Result<String, CoreError> {
        let nonce: String = std::iter::repeat_with(fastrand::alphanumeric)
            .take(32)
            .collect();
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();

        self.authorization_header_with(method, url, form_params, &nonce, timestamp)
    }

    pub fn authorization_header_with(
        &self,
        method: &str,
        url: &Url,
        form_params: &[(String, String)],
        nonce: &str,
        timestamp: u64,
    ) -> Result<String, CoreError> {
        let mut oauth_params = vec![
            ("oauth_consumer_key".to_string(), self.credentials.api_key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_token".to_string(), self.credentials.access_token.clone()),
            ("oauth_version".to_string(), "1.0".to_string()),
        ];

        let signature = self.signature(method, url, &oauth_params, form_params)?;
        oauth_params.push(("oauth_signature".to_string(), signature));
        oauth_params.sort();

        let fields: Vec<String> = oauth_params
            .iter()
            .map(|(key, value)| format!("{}=\"{}\"", encode(key), encode(value)))
            .collect();
        Ok(format!("OAuth {}", fields.join(", ")))
    }

    fn signature(
        &self,
        method: &str,
        url: &Url,
        oauth_params: &[(String, String)],
        form_params: &[(String, String)],
    ) -> Result<String, CoreError> {
        let mut params: Vec<(String, String)> = url
            .query_pairs()
            .map(|(key, value)| (encode(&key), encode(&value)))
            .chain(
                oauth_params
                    .iter()
                    .chain(form_params)
                    .map(|(key, value)| (encode(key), encode(value))),
            )
            .collect();
        params.sort();

        let parameter_string = params
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join("&");

        let base_string = format!(
            "{}&{}&{}",
            method.to_uppercase(),
            encode(&base_url(url)),
            encode(&parameter_string)
        );
        let signing_key = format!(
            "{}&{}",
            encode(&self.credentials.api_secret_key),
            encode(&self.credentials.access_token_secret)
        );

        let mut mac =
            HmacSha1::new_from_slice(signing_key.as_bytes()).map_err(|e| CoreError::Internal {
                message: format!("Failed to initialise OAuth signer: {e}"),
            })?;
        mac.update(base_string.as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }
}

/// Scheme, host, optional non-default port and path; no query or fragment.
fn base_url(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_lowercase();
    match url.port() {
        Some(port) => format!("{}://{}:{}{}", url.scheme(), host, port, url.path()),
        None => format!("{}://{}{}", url.scheme(), host, url.path()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn documented_credentials() -> TwitterCredentials {
        TwitterCredentials {
            api_key: "xvz1evFS4wEEPTGEFPHBog".to_string(),
            api_secret_key: "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw".to_string(),
            access_token: "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb".to_string(),
            access_token_secret: "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE".to_string(),
        }
    }

    #[test]
    fn test_encode_unreserved() {
        assert_eq!(encode("Ladies + Gentlemen"), "Ladies%20%2B%20Gentlemen");
        assert_eq!(encode("a-b.c_d~e"), "a-b.c_d~e");
        assert_eq!(encode("$GODL"), "%24GODL");
        assert_eq!(encode("☃"), "%E2%98%83");
    }

    #[test]
    fn test_signature_matches_published_example() {
        let signer = OAuthSigner::new(documented_credentials());
        let url =
            Url::parse("https://api.twitter.com/1.1/statuses/update.json?include_entities=true")
                .unwrap();
        let form = vec![(
            "status".to_string(),
            "Hello Ladies + Gentlemen, a signed OAuth request!".to_string(),
        )];

        let header = signer
            .authorization_header_with(
                "POST",
                &url,
                &form,
                "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg",
                1318622958,
            )
            .unwrap();

        assert!(header.starts_with("OAuth "));
        assert!(header.contains("oauth_signature=\"hCtSmYh%2BiHYCEqBWrE7C7hYmtUk%3D\""));
        assert!(header.contains("oauth_consumer_key=\"xvz1evFS4wEEPTGEFPHBog\""));
        assert!(header.contains("oauth_timestamp=\"1318622958\""));
    }

    #[test]
    fn test_fresh_nonce_per_request() {
        let signer = OAuthSigner::new(documented_credentials());
        let url = Url::parse("https://api.twitter.com/2/users/me").unwrap();
        let first = signer.authorization_header("GET", &url, &[]).unwrap();
        let second = signer.authorization_header("GET", &url, &[]).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_base_url_drops_query_and_default_port() {
        let url = Url::parse("HTTPS://API.Twitter.com:443/2/tweets?x=1#frag").unwrap();
        assert_eq!(base_url(&url), "https://api.twitter.com/2/tweets");

        let url = Url::parse("http://localhost:8080/2/tweets").unwrap();
        assert_eq!(base_url(&url), "http://localhost:8080/2/tweets");
    }
}

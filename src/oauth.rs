/// OAuth 1.0a request signing (HMAC-SHA1)
///
/// User-context endpoints (the authenticated account, its home timeline,
/// likes and reposts) require a signed `Authorization` header. Query
/// parameters take part in the signature; JSON bodies do not.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha1::Sha1;

use crate::config::Credentials;

type HmacSha1 = Hmac<Sha1>;

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const OAUTH_VERSION: &str = "1.0";

/// RFC 3986 percent-encoding, which leaves only `A-Za-z0-9-._~` untouched
fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Build the `Authorization` header value for a request.
///
/// `url` must not carry a query string; pass query pairs in `params`.
pub fn authorization_header(
    credentials: &Credentials,
    method: &str,
    url: &str,
    params: &[(&str, String)],
) -> String {
    let nonce: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    let timestamp = chrono::Utc::now().timestamp().to_string();

    signed_header(credentials, method, url, params, &nonce, &timestamp)
}

fn signed_header(
    credentials: &Credentials,
    method: &str,
    url: &str,
    params: &[(&str, String)],
    nonce: &str,
    timestamp: &str,
) -> String {
    let mut oauth_params: Vec<(&str, String)> = vec![
        ("oauth_consumer_key", credentials.api_key.clone()),
        ("oauth_nonce", nonce.to_string()),
        ("oauth_signature_method", SIGNATURE_METHOD.to_string()),
        ("oauth_timestamp", timestamp.to_string()),
        ("oauth_token", credentials.access_token.clone()),
        ("oauth_version", OAUTH_VERSION.to_string()),
    ];

    let all_params: Vec<(&str, String)> = oauth_params
        .iter()
        .cloned()
        .chain(params.iter().cloned())
        .collect();
    let base = signature_base(method, url, &all_params);
    let signature = sign(&base, &credentials.api_secret, &credentials.access_secret);

    oauth_params.push(("oauth_signature", signature));
    let fields = oauth_params
        .iter()
        .map(|(key, value)| format!("{}=\"{}\"", encode(key), encode(value)))
        .collect::<Vec<_>>()
        .join(", ");

    format!("OAuth {}", fields)
}

fn signature_base(method: &str, url: &str, params: &[(&str, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(key, value)| (encode(key), encode(value)))
        .collect();
    encoded.sort();

    let parameter_string = encoded
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        encode(url),
        encode(&parameter_string)
    )
}

fn sign(base: &str, consumer_secret: &str, token_secret: &str) -> String {
    let key = format!("{}&{}", encode(consumer_secret), encode(token_secret));
    let mut mac = HmacSha1::new_from_slice(key.as_bytes()).expect("HMAC takes any key length");
    mac.update(base.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn documented_credentials() -> Credentials {
        Credentials {
            api_key: "xvz1evFS4wEEPTGEFPHBog".to_string(),
            api_secret: "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw".to_string(),
            access_token: "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb".to_string(),
            access_secret: "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE".to_string(),
            bearer_token: String::new(),
        }
    }

    fn documented_params() -> Vec<(&'static str, String)> {
        vec![
            ("include_entities", "true".to_string()),
            (
                "status",
                "Hello Ladies + Gentlemen, a signed OAuth request!".to_string(),
            ),
        ]
    }

    #[test]
    fn test_encode_reserved_characters() {
        assert_eq!(encode("Ladies + Gentlemen"), "Ladies%20%2B%20Gentlemen");
        assert_eq!(encode("a-b_c.d~e"), "a-b_c.d~e");
        assert_eq!(encode("!*'()"), "%21%2A%27%28%29");
    }

    #[test]
    fn test_signature_matches_published_example() {
        let header = signed_header(
            &documented_credentials(),
            "post",
            "https://api.twitter.com/1.1/statuses/update.json",
            &documented_params(),
            "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg",
            "1318622958",
        );

        assert!(header.starts_with("OAuth "));
        assert!(header.contains("oauth_signature=\"hCtSmYh%2BiHYCEqBWrE7C7hYmtUk%3D\""));
        assert!(header.contains("oauth_consumer_key=\"xvz1evFS4wEEPTGEFPHBog\""));
        // Request parameters are signed but not sent in the header
        assert!(!header.contains("include_entities"));
    }

    #[test]
    fn test_signature_base_sorts_parameters() {
        let base = signature_base(
            "GET",
            "https://api.twitter.com/2/users/me",
            &[("b", "2".to_string()), ("a", "1".to_string())],
        );
        assert_eq!(
            base,
            "GET&https%3A%2F%2Fapi.twitter.com%2F2%2Fusers%2Fme&a%3D1%26b%3D2"
        );
    }

    #[test]
    fn test_fresh_nonce_per_header() {
        let creds = documented_credentials();
        let url = "https://api.twitter.com/2/users/me";
        let first = authorization_header(&creds, "GET", url, &[]);
        let second = authorization_header(&creds, "GET", url, &[]);
        assert_ne!(first, second);
    }
}

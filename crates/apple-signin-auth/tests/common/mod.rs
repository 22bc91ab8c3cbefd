//! Common test utilities for integration tests
//!
//! A wiremock stand-in for `appleid.apple.com`, key generation, and token
//! minting helpers.

#![allow(dead_code)]

use std::time::{SystemTime, UNIX_EPOCH};

use apple_signin_auth::{AppleClient, AppleConfig};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

/// Mock of Apple's identity service
pub struct MockAppleServer {
    pub server: MockServer,
}

impl MockAppleServer {
    /// Start a new mock server
    pub async fn start() -> Self {
        init_tracing();
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL to use as `endpoint_url`
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Client configuration pointing at this server
    pub fn config(&self) -> AppleConfig {
        AppleConfig::default().with_endpoint_url(self.uri())
    }

    /// A client using the default transport against this server
    pub fn client(&self) -> AppleClient {
        AppleClient::new(self.config()).expect("Failed to build client")
    }

    /// Mock the keys endpoint with the given RSA keys
    pub async fn mock_keys(&self, keys: &[&TestRsaKey]) {
        let keys: Vec<_> = keys.iter().map(|key| key.jwk()).collect();
        let body = json!({ "keys": keys });
        Mock::given(method("GET"))
            .and(path("/auth/keys"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Mock the keys endpoint for a single request; later mocks answer afterwards
    pub async fn mock_keys_once(&self, keys: &[&TestRsaKey]) {
        let keys: Vec<_> = keys.iter().map(|key| key.jwk()).collect();
        let body = json!({ "keys": keys });
        Mock::given(method("GET"))
            .and(path("/auth/keys"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .up_to_n_times(1)
            .mount(&self.server)
            .await;
    }

    /// Mock the keys endpoint with an error status
    pub async fn mock_keys_status(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path("/auth/keys"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Mock the token endpoint with a JSON body
    pub async fn mock_token(&self, status: u16, body: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/auth/token"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Mock the revoke endpoint with an empty body
    pub async fn mock_revoke(&self) {
        Mock::given(method("POST"))
            .and(path("/auth/revoke"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&self.server)
            .await;
    }

    /// Number of requests received on `endpoint`
    pub async fn request_count(&self, endpoint: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == endpoint)
            .count()
    }
}

/// RSA signing key as Apple would hold it
pub struct TestRsaKey {
    pub kid: String,
    pub private_pem: Vec<u8>,
    pub n: String,
    pub e: String,
}

impl TestRsaKey {
    /// The key as published on the keys endpoint
    pub fn jwk(&self) -> serde_json::Value {
        json!({
            "kty": "RSA",
            "kid": self.kid,
            "use": "sig",
            "alg": "RS256",
            "n": self.n,
            "e": self.e,
        })
    }

    /// Sign `claims` with this key, `kid` in the header
    pub fn sign(&self, claims: &serde_json::Value) -> String {
        generate_test_jwt(
            claims,
            &self.private_pem,
            jsonwebtoken::Algorithm::RS256,
            Some(&self.kid),
        )
    }
}

/// Generate a test RSA key pair
pub fn generate_test_rsa_key(kid: &str) -> TestRsaKey {
    use rsa::RsaPrivateKey;
    use rsa::pkcs8::{EncodePrivateKey, LineEnding};
    use rsa::traits::PublicKeyParts;

    let mut rng = rand::thread_rng();
    let private_key = RsaPrivateKey::new(&mut rng, 2048)
        .expect("Failed to generate RSA key");

    let private_pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .expect("Failed to encode private key")
        .as_bytes()
        .to_vec();

    TestRsaKey {
        kid: kid.to_string(),
        private_pem,
        n: URL_SAFE_NO_PAD.encode(private_key.n().to_bytes_be()),
        e: URL_SAFE_NO_PAD.encode(private_key.e().to_bytes_be()),
    }
}

/// Generate a P-256 key pair (private PKCS#8 PEM, public SPKI PEM), like a `.p8` from Apple
pub fn generate_test_ec_keypair() -> (String, String) {
    use p256::SecretKey;
    use p256::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};

    let mut rng = rand::thread_rng();
    let secret = SecretKey::random(&mut rng);

    let private_pem = secret
        .to_pkcs8_pem(LineEnding::LF)
        .expect("Failed to encode EC private key")
        .to_string();
    let public_pem = secret
        .public_key()
        .to_public_key_pem(LineEnding::LF)
        .expect("Failed to encode EC public key");

    (private_pem, public_pem)
}

/// Generate a test JWT with custom claims
pub fn generate_test_jwt(
    claims: &serde_json::Value,
    private_key: &[u8],
    algorithm: jsonwebtoken::Algorithm,
    kid: Option<&str>,
) -> String {
    use jsonwebtoken::{EncodingKey, Header, encode};

    let key = match algorithm {
        jsonwebtoken::Algorithm::RS256 => {
            EncodingKey::from_rsa_pem(private_key).expect("Invalid RSA key")
        }
        jsonwebtoken::Algorithm::ES256 => {
            EncodingKey::from_ec_pem(private_key).expect("Invalid EC key")
        }
        jsonwebtoken::Algorithm::HS256 => EncodingKey::from_secret(private_key),
        _ => panic!("Unsupported algorithm for test JWT"),
    };

    let mut header = Header::new(algorithm);
    header.kid = kid.map(str::to_string);

    encode(&header, claims, &key).expect("Failed to encode test JWT")
}

/// Route library logs to the test output; `RUST_LOG=apple_signin_auth=debug` to see them
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Get current Unix timestamp
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs()
}

/// Identity token claims as Apple issues them
pub fn identity_claims(sub: &str, aud: &str, exp_offset_secs: i64) -> serde_json::Value {
    let now = current_timestamp();
    json!({
        "iss": "https://appleid.apple.com",
        "sub": sub,
        "aud": aud,
        "exp": (now as i64 + exp_offset_secs) as u64,
        "iat": now,
        "auth_time": now,
        "nonce_supported": true,
    })
}

/// Webhook token claims with `events` embedded as a JSON string
pub fn webhook_claims(aud: &str, events: &str) -> serde_json::Value {
    let now = current_timestamp();
    json!({
        "iss": "https://appleid.apple.com",
        "aud": aud,
        "exp": now + 600,
        "iat": now,
        "jti": "Yd1WUxSdMB9oTi7ATkaYEw",
        "events": events,
    })
}

//! Client secret signing with real P-256 keys

mod common;

use std::io::Write;

use apple_signin_auth::{
    AppleAuthError, ClientSecretClaims, ClientSecretOptions, ErrorCategory, create_client_secret,
};
use common::*;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use pretty_assertions::assert_eq;

fn verify(secret: &str, public_pem: &str) -> ClientSecretClaims {
    let mut validation = Validation::new(Algorithm::ES256);
    validation.set_audience(&["https://appleid.apple.com"]);
    validation.set_issuer(&["TEAM123456"]);

    decode::<ClientSecretClaims>(
        secret,
        &DecodingKey::from_ec_pem(public_pem.as_bytes()).unwrap(),
        &validation,
    )
    .unwrap()
    .claims
}

#[test]
fn test_secret_round_trip() {
    let (private_pem, public_pem) = generate_test_ec_keypair();
    let options = ClientSecretOptions::new("com.example.app", "TEAM123456", "KEY123456")
        .with_private_key(private_pem);

    let secret = create_client_secret(&options).unwrap();

    let header = decode_header(&secret).unwrap();
    assert_eq!(header.alg, Algorithm::ES256);
    assert_eq!(header.kid.as_deref(), Some("KEY123456"));

    let claims = verify(&secret, &public_pem);
    assert_eq!(claims.iss, "TEAM123456");
    assert_eq!(claims.sub, "com.example.app");
    assert_eq!(claims.aud, "https://appleid.apple.com");
    assert_eq!(claims.exp - claims.iat, 300);
}

#[test]
fn test_secret_from_key_file() {
    let (private_pem, public_pem) = generate_test_ec_keypair();
    let mut key_file = tempfile::NamedTempFile::new().unwrap();
    key_file.write_all(private_pem.as_bytes()).unwrap();

    let options = ClientSecretOptions::new("com.example.app", "TEAM123456", "KEY123456")
        .with_private_key_path(key_file.path())
        .with_exp_after(3600);

    let secret = create_client_secret(&options).unwrap();

    let claims = verify(&secret, &public_pem);
    assert_eq!(claims.exp - claims.iat, 3600);
}

#[test]
fn test_legacy_team_id_from_config() {
    let (private_pem, public_pem) = generate_test_ec_keypair();
    let options: ClientSecretOptions = serde_json::from_value(serde_json::json!({
        "clientID": "com.example.app",
        "teamId": "TEAM123456",
        "keyIdentifier": "KEY123456",
        "privateKey": private_pem,
    }))
    .unwrap();

    let secret = create_client_secret(&options).unwrap();

    assert_eq!(verify(&secret, &public_pem).iss, "TEAM123456");
}

#[test]
fn test_key_form_conflicts() {
    let (private_pem, _) = generate_test_ec_keypair();
    let key_file = tempfile::NamedTempFile::new().unwrap();

    let both = ClientSecretOptions::new("com.example.app", "TEAM123456", "KEY123456")
        .with_private_key(private_pem)
        .with_private_key_path(key_file.path());
    let neither = ClientSecretOptions::new("com.example.app", "TEAM123456", "KEY123456");

    for options in [both, neither] {
        let err = create_client_secret(&options).unwrap_err();
        assert!(matches!(err, AppleAuthError::InvalidInput(_)));
        assert_eq!(err.category(), ErrorCategory::InvalidInput);
    }
}

#[test]
fn test_missing_key_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("AuthKey_KEY123456.p8");

    let options = ClientSecretOptions::new("com.example.app", "TEAM123456", "KEY123456")
        .with_private_key_path(&missing);

    match create_client_secret(&options) {
        Err(AppleAuthError::PrivateKeyNotFound(path)) => assert_eq!(path, missing),
        other => panic!("expected PrivateKeyNotFound, got {other:?}"),
    }
}

#[test]
fn test_rsa_key_is_not_accepted() {
    let rsa = generate_test_rsa_key("K1");
    let options = ClientSecretOptions::new("com.example.app", "TEAM123456", "KEY123456")
        .with_private_key(String::from_utf8(rsa.private_pem).unwrap());

    let err = create_client_secret(&options).unwrap_err();
    assert!(matches!(err, AppleAuthError::Signing(_)));
}

#[test]
fn test_blank_private_key_from_config_is_absent() {
    let (private_pem, public_pem) = generate_test_ec_keypair();
    let mut key_file = tempfile::NamedTempFile::new().unwrap();
    key_file.write_all(private_pem.as_bytes()).unwrap();

    let with_path: ClientSecretOptions = serde_json::from_value(serde_json::json!({
        "clientID": "com.example.app",
        "teamID": "TEAM123456",
        "keyIdentifier": "KEY123456",
        "privateKey": "",
        "privateKeyPath": key_file.path(),
    }))
    .unwrap();
    let secret = create_client_secret(&with_path).unwrap();
    assert_eq!(verify(&secret, &public_pem).sub, "com.example.app");

    let without_path: ClientSecretOptions = serde_json::from_value(serde_json::json!({
        "clientID": "com.example.app",
        "teamID": "TEAM123456",
        "keyIdentifier": "KEY123456",
        "privateKey": "  ",
    }))
    .unwrap();
    match create_client_secret(&without_path) {
        Err(AppleAuthError::InvalidInput(message)) => {
            assert_eq!(message, "private_key and private_key_path are empty")
        }
        other => panic!("expected InvalidInput, got {other:?}"),
    }
}

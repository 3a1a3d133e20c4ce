use super::*;

fn test_config() -> AuthConfig {
    AuthConfig {
        signing_key: "unit-test-signing-key".into(),
        issuer: "tendly".into(),
        audience: "tendly-clients".into(),
        cipher_key: [0u8; 32],
        access_token_ttl_minutes: 30,
        refresh_token_ttl_days: 30,
    }
}

fn config_with(f: impl FnOnce(&mut AuthConfig)) -> AuthConfig {
    let mut config = test_config();
    f(&mut config);
    config
}

// =============================================================================
// issue + validate round trip
// =============================================================================

#[test]
fn issue_then_validate_round_trip() {
    let signer = TokenSigner::new(&test_config());
    let token = signer.issue(42, 7).unwrap();
    let claims = signer.validate(&token).unwrap();
    assert_eq!(claims.sub, "42");
    assert_eq!(claims.sid, "7");
    assert_eq!(claims.iss, "tendly");
    assert_eq!(claims.aud, "tendly-clients");
}

#[test]
fn issued_expiry_matches_configured_ttl() {
    let signer = TokenSigner::new(&test_config());
    let token = signer.issue(1, 1).unwrap();
    let claims = signer.validate(&token).unwrap();
    assert_eq!(claims.exp - claims.iat, 30 * 60);
}

#[test]
fn issued_tokens_for_different_sessions_differ() {
    let signer = TokenSigner::new(&test_config());
    let a = signer.issue(1, 1).unwrap();
    let b = signer.issue(1, 2).unwrap();
    assert_ne!(a, b);
}

// =============================================================================
// validate — rejection paths
// =============================================================================

#[test]
fn validate_rejects_wrong_secret() {
    let signer = TokenSigner::new(&test_config());
    let other = TokenSigner::new(&config_with(|c| c.signing_key = "different-secret".into()));
    let token = signer.issue(1, 1).unwrap();
    assert!(matches!(other.validate(&token), Err(TokenError::Validate(_))));
}

#[test]
fn validate_rejects_wrong_audience() {
    let signer = TokenSigner::new(&test_config());
    let other = TokenSigner::new(&config_with(|c| c.audience = "other-service".into()));
    let token = signer.issue(1, 1).unwrap();
    assert!(other.validate(&token).is_err());
}

#[test]
fn validate_rejects_wrong_issuer() {
    let signer = TokenSigner::new(&test_config());
    let other = TokenSigner::new(&config_with(|c| c.issuer = "someone-else".into()));
    let token = signer.issue(1, 1).unwrap();
    assert!(other.validate(&token).is_err());
}

#[test]
fn validate_rejects_garbage() {
    let signer = TokenSigner::new(&test_config());
    assert!(signer.validate("not.a.token").is_err());
    assert!(signer.validate("").is_err());
}

// =============================================================================
// expired tokens — strict vs refresh-flow decode
// =============================================================================

#[test]
fn validate_rejects_expired_token() {
    // Negative TTL puts the expiry well past the default leeway.
    let signer = TokenSigner::new(&config_with(|c| c.access_token_ttl_minutes = -5));
    let token = signer.issue(1, 1).unwrap();
    assert!(matches!(signer.validate(&token), Err(TokenError::Validate(_))));
}

#[test]
fn expired_tolerant_decode_accepts_expired_token() {
    let signer = TokenSigner::new(&config_with(|c| c.access_token_ttl_minutes = -5));
    let token = signer.issue(42, 7).unwrap();
    let claims = signer.decode_expired_tolerant(&token).unwrap();
    assert_eq!(claims.sub, "42");
    assert_eq!(claims.sid, "7");
}

#[test]
fn expired_tolerant_decode_still_rejects_bad_signature() {
    let signer = TokenSigner::new(&test_config());
    let other = TokenSigner::new(&config_with(|c| c.signing_key = "different-secret".into()));
    let token = signer.issue(1, 1).unwrap();
    assert!(other.decode_expired_tolerant(&token).is_err());
}

#[test]
fn expired_tolerant_decode_still_rejects_wrong_audience() {
    let signer = TokenSigner::new(&test_config());
    let other = TokenSigner::new(&config_with(|c| c.audience = "other-service".into()));
    let token = signer.issue(1, 1).unwrap();
    assert!(other.decode_expired_tolerant(&token).is_err());
}

#[test]
fn expired_tolerant_decode_rejects_tampered_payload() {
    let signer = TokenSigner::new(&test_config());
    let token = signer.issue(1, 1).unwrap();
    let mut tampered: Vec<String> = token.split('.').map(String::from).collect();
    tampered[1] = tampered[1].replacen(|c: char| c.is_ascii_alphanumeric(), "x", 1);
    assert!(signer.decode_expired_tolerant(&tampered.join(".")).is_err());
}

// =============================================================================
// claims serde
// =============================================================================

#[test]
fn claims_serialize_with_all_fields() {
    let claims = AccessClaims {
        sub: "42".into(),
        sid: "7".into(),
        iss: "tendly".into(),
        aud: "tendly-clients".into(),
        iat: 1_700_000_000,
        exp: 1_700_001_800,
    };
    let json = serde_json::to_value(&claims).unwrap();
    assert_eq!(json["sub"], "42");
    assert_eq!(json["sid"], "7");
    assert_eq!(json["iss"], "tendly");
    assert_eq!(json["aud"], "tendly-clients");
    assert_eq!(json["iat"], 1_700_000_000);
    assert_eq!(json["exp"], 1_700_001_800);
}

// =============================================================================
// TokenError codes
// =============================================================================

#[test]
fn token_error_codes() {
    let signer = TokenSigner::new(&test_config());
    let err = signer.validate("garbage").unwrap_err();
    assert_eq!(err.error_code(), "E_TOKEN_VALIDATE");
    assert!(!err.retryable());
}

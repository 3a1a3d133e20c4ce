use super::*;

use std::sync::Mutex;

/// Serializes env-touching tests so they pass under the default parallel
/// test runner.
static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_auth_env() {
    unsafe {
        std::env::remove_var("AUTH_SIGNING_KEY");
        std::env::remove_var("AUTH_TOKEN_ISSUER");
        std::env::remove_var("AUTH_TOKEN_AUDIENCE");
        std::env::remove_var("AUTH_CIPHER_KEY");
        std::env::remove_var("ACCESS_TOKEN_TTL_MINUTES");
        std::env::remove_var("REFRESH_TOKEN_TTL_DAYS");
    }
}

fn set_required_vars() {
    unsafe {
        std::env::set_var("AUTH_SIGNING_KEY", "signing-secret");
        std::env::set_var("AUTH_TOKEN_ISSUER", "tendly");
        std::env::set_var("AUTH_TOKEN_AUDIENCE", "tendly-clients");
        std::env::set_var("AUTH_CIPHER_KEY", BASE64.encode([9u8; 32]));
    }
}

// =============================================================================
// AuthConfig::from_env
// =============================================================================

#[test]
fn from_env_all_set() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    clear_auth_env();
    set_required_vars();

    let config = AuthConfig::from_env().unwrap();
    assert_eq!(config.signing_key, "signing-secret");
    assert_eq!(config.issuer, "tendly");
    assert_eq!(config.audience, "tendly-clients");
    assert_eq!(config.cipher_key, [9u8; 32]);
    assert_eq!(config.access_token_ttl_minutes, DEFAULT_ACCESS_TOKEN_TTL_MINUTES);
    assert_eq!(config.refresh_token_ttl_days, DEFAULT_REFRESH_TOKEN_TTL_DAYS);

    clear_auth_env();
}

#[test]
fn from_env_missing_signing_key() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    clear_auth_env();
    set_required_vars();
    unsafe {
        std::env::remove_var("AUTH_SIGNING_KEY");
    }

    let err = AuthConfig::from_env().unwrap_err();
    assert!(matches!(err, ConfigError::MissingVar { var: "AUTH_SIGNING_KEY" }));

    clear_auth_env();
}

#[test]
fn from_env_rejects_non_base64_cipher_key() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    clear_auth_env();
    set_required_vars();
    unsafe {
        std::env::set_var("AUTH_CIPHER_KEY", "!!! not base64 !!!");
    }

    let err = AuthConfig::from_env().unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { var: "AUTH_CIPHER_KEY", .. }));

    clear_auth_env();
}

#[test]
fn from_env_rejects_wrong_length_cipher_key() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    clear_auth_env();
    set_required_vars();
    unsafe {
        std::env::set_var("AUTH_CIPHER_KEY", BASE64.encode([9u8; 16]));
    }

    let err = AuthConfig::from_env().unwrap_err();
    match err {
        ConfigError::Invalid { var, reason } => {
            assert_eq!(var, "AUTH_CIPHER_KEY");
            assert!(reason.contains("16"));
        }
        other => panic!("expected Invalid, got {other:?}"),
    }

    clear_auth_env();
}

#[test]
fn from_env_reads_ttl_overrides() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    clear_auth_env();
    set_required_vars();
    unsafe {
        std::env::set_var("ACCESS_TOKEN_TTL_MINUTES", "5");
        std::env::set_var("REFRESH_TOKEN_TTL_DAYS", "7");
    }

    let config = AuthConfig::from_env().unwrap();
    assert_eq!(config.access_token_ttl_minutes, 5);
    assert_eq!(config.refresh_token_ttl_days, 7);

    clear_auth_env();
}

// =============================================================================
// env_parse
// =============================================================================

#[test]
fn env_parse_returns_default_when_unset() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        std::env::remove_var("TENDLY_TEST_ENV_PARSE_UNSET");
    }
    assert_eq!(env_parse("TENDLY_TEST_ENV_PARSE_UNSET", 42u32), 42);
}

#[test]
fn env_parse_reads_valid_value() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        std::env::set_var("TENDLY_TEST_ENV_PARSE_VALID", "17");
    }
    assert_eq!(env_parse("TENDLY_TEST_ENV_PARSE_VALID", 42u32), 17);
    unsafe {
        std::env::remove_var("TENDLY_TEST_ENV_PARSE_VALID");
    }
}

#[test]
fn env_parse_falls_back_on_garbage() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        std::env::set_var("TENDLY_TEST_ENV_PARSE_GARBAGE", "not-a-number");
    }
    assert_eq!(env_parse("TENDLY_TEST_ENV_PARSE_GARBAGE", 42u32), 42);
    unsafe {
        std::env::remove_var("TENDLY_TEST_ENV_PARSE_GARBAGE");
    }
}

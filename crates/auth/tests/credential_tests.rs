use kinnect_auth::{hash_password, verify_password, AuthError, JwtManager};
use kinnect_config::AuthConfig;

#[test]
fn password_round_trip_through_stored_hash() {
    let stored = hash_password("family-time-42").expect("hashing should succeed");

    assert!(verify_password("family-time-42", &stored).unwrap());
    assert!(!verify_password("family-time-43", &stored).unwrap());
}

#[test]
fn tokens_from_default_config_validate() {
    let jwt = JwtManager::from_config(&AuthConfig::default());
    let token = jwt.generate_token("0b9d7c1e", "member@example.com").unwrap();

    let claims = jwt.validate_token(&token).unwrap();
    assert_eq!(claims.sub, "0b9d7c1e");
    assert_eq!(claims.iss, "kinnect");
}

#[test]
fn garbage_token_is_invalid() {
    let jwt = JwtManager::from_config(&AuthConfig::default());
    assert!(matches!(
        jwt.validate_token("definitely.not.ajwt"),
        Err(AuthError::InvalidToken(_))
    ));
}

#[test]
fn rotated_secret_invalidates_existing_tokens() {
    let old = JwtManager::from_config(&AuthConfig::default());
    let token = old.generate_token("user", "user@example.com").unwrap();

    let rotated = JwtManager::from_config(&AuthConfig {
        jwt_secret: "rotated".to_string(),
        ..AuthConfig::default()
    });
    assert!(rotated.validate_token(&token).is_err());
}

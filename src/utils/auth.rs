use crate::models::user::{Claims, ResetClaims};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand_core::OsRng;

/// Characters accepted as the "special" class by the password policy.
const SPECIAL_CHARS: &str = "@.#$!%*?&";

const SESSION_TOKEN_TTL_HOURS: i64 = 1;
const RESET_TOKEN_TTL_MINUTES: i64 = 15;

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(password_hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(password_hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Checks the password policy: at least one lowercase letter, one uppercase
/// letter, one digit and one special character, with no characters outside
/// those classes.
pub fn password_meets_policy(password: &str) -> bool {
    let mut lower = false;
    let mut upper = false;
    let mut digit = false;
    let mut special = false;

    for c in password.chars() {
        if c.is_ascii_lowercase() {
            lower = true;
        } else if c.is_ascii_uppercase() {
            upper = true;
        } else if c.is_ascii_digit() {
            digit = true;
        } else if SPECIAL_CHARS.contains(c) {
            special = true;
        } else {
            return false;
        }
    }

    lower && upper && digit && special
}

/// Create a signed session token (1 hour)
pub fn create_jwt(
    user_id: &str,
    email: &str,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now();
    let expiration = now
        .checked_add_signed(chrono::Duration::hours(SESSION_TOKEN_TTL_HOURS))
        .expect("valid timestamp")
        .timestamp() as usize;

    let claims = Claims {
        sub: user_id.to_owned(),
        email: email.to_owned(),
        exp: expiration,
        iat: now.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
}

/// Decode and validate a session token
pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

/// Create a short-lived password-reset token (15 minutes)
pub fn create_reset_jwt(
    user_id: &str,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now();
    let expiration = now
        .checked_add_signed(chrono::Duration::minutes(RESET_TOKEN_TTL_MINUTES))
        .expect("valid timestamp")
        .timestamp() as usize;

    let claims = ResetClaims {
        sub: user_id.to_owned(),
        exp: expiration,
        iat: now.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
}

/// Decode and validate a password-reset token
pub fn decode_reset_jwt(
    token: &str,
    secret: &str,
) -> Result<ResetClaims, jsonwebtoken::errors::Error> {
    let token_data = decode::<ResetClaims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key";

    #[test]
    fn test_hash_password_returns_hash() {
        let password = "test_password_123";
        let result = hash_password(password);

        assert!(result.is_ok());
        let hash = result.unwrap();
        assert!(!hash.is_empty());
        assert_ne!(hash, password);
    }

    #[test]
    fn test_hash_password_different_each_time() {
        let password = "test_password_123";
        let hash1 = hash_password(password).unwrap();
        let hash2 = hash_password(password).unwrap();

        // Even with same password, hashes should differ due to salt
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_verify_password_correct() {
        let password = "correct_password";
        let hash = hash_password(password).unwrap();

        assert!(verify_password(password, &hash));
    }

    #[test]
    fn test_verify_password_incorrect() {
        let password = "correct_password";
        let hash = hash_password(password).unwrap();

        assert!(!verify_password("wrong_password", &hash));
    }

    #[test]
    fn test_create_jwt_returns_token() {
        let result = create_jwt("test-user-123", "test@example.com", SECRET);
        assert!(result.is_ok());

        let token = result.unwrap();
        assert!(!token.is_empty());
        assert!(token.contains('.'));
    }

    #[test]
    fn test_decode_jwt_valid_token() {
        let user_id = "test-user-456";
        let email = "decode@example.com";

        let token = create_jwt(user_id, email, SECRET).unwrap();
        let claims = decode_jwt(&token, SECRET).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, email);
    }

    #[test]
    fn test_decode_jwt_invalid_token() {
        let result = decode_jwt("invalid.token.here", SECRET);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_jwt_wrong_secret() {
        let token = create_jwt("user", "test@example.com", "secret1").unwrap();
        let result = decode_jwt(&token, "secret2");
        assert!(result.is_err());
    }

    #[test]
    fn test_jwt_expiration_is_future() {
        let token = create_jwt("user", "test@example.com", SECRET).unwrap();
        let claims = decode_jwt(&token, SECRET).unwrap();

        let now = chrono::Utc::now().timestamp() as usize;
        assert!(claims.exp > now);
        assert!(claims.iat <= now);
    }

    #[test]
    fn test_reset_jwt_roundtrip() {
        let token = create_reset_jwt("user-789", SECRET).unwrap();
        let claims = decode_reset_jwt(&token, SECRET).unwrap();

        assert_eq!(claims.sub, "user-789");
        let now = chrono::Utc::now().timestamp() as usize;
        // 15 minute window, not the 1 hour session TTL.
        assert!(claims.exp <= now + 15 * 60 + 5);
    }

    #[test]
    fn test_reset_jwt_rejects_tampering() {
        let token = create_reset_jwt("user-789", "secret1").unwrap();
        assert!(decode_reset_jwt(&token, "secret2").is_err());
    }

    #[test]
    fn test_password_policy_accepts_all_classes() {
        assert!(password_meets_policy("Str0ng!pass"));
        assert!(password_meets_policy("aB3@"));
    }

    #[test]
    fn test_password_policy_requires_every_class() {
        assert!(!password_meets_policy("weakpassword"));
        assert!(!password_meets_policy("NOLOWER1!"));
        assert!(!password_meets_policy("noupper1!"));
        assert!(!password_meets_policy("NoDigits!"));
        assert!(!password_meets_policy("NoSpecial1"));
        assert!(!password_meets_policy(""));
    }

    #[test]
    fn test_password_policy_rejects_characters_outside_the_set() {
        // Space and dash are not in the accepted special set.
        assert!(!password_meets_policy("Str0ng! pass"));
        assert!(!password_meets_policy("Str0ng-pass!"));
    }
}

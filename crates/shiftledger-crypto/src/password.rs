//! Argon2id hashing for passwords and kiosk PINs.
//!
//! Hashes are PHC strings carrying their own salt and parameters; verify is
//! the crate's constant-time comparison. PINs use the same scheme as
//! passwords — a 4-digit PIN is low-entropy either way, so the cost factor
//! is what slows an offline sweep.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};

use shiftledger_core::constants::KIOSK_PIN_LENGTH;
use shiftledger_core::error::ShiftledgerError;

pub fn hash_password(password: &str) -> Result<String, ShiftledgerError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ShiftledgerError::Internal(format!("argon2 hash: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// PINs and OTP codes share the password hashing scheme.
pub fn hash_pin(pin: &str) -> Result<String, ShiftledgerError> {
    hash_password(pin)
}

pub fn verify_pin(pin: &str, hash: &str) -> bool {
    verify_password(pin, hash)
}

/// Kiosk PINs are exactly four ASCII digits.
pub fn validate_pin_format(pin: &str) -> Result<(), ShiftledgerError> {
    if pin.len() != KIOSK_PIN_LENGTH || !pin.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ShiftledgerError::InvalidPinFormat);
    }
    Ok(())
}

/// Minimum 8 chars, at least one upper, one lower, one digit.
pub fn validate_password_strength(password: &str) -> Result<(), ShiftledgerError> {
    if password.len() < 8 {
        return Err(ShiftledgerError::WeakPassword(
            "password must be at least 8 characters long".to_string(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(ShiftledgerError::WeakPassword(
            "password must contain at least one uppercase letter".to_string(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(ShiftledgerError::WeakPassword(
            "password must contain at least one lowercase letter".to_string(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(ShiftledgerError::WeakPassword(
            "password must contain at least one number".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_round_trip() {
        let hash = hash_password("Sup3rSecret").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("Sup3rSecret", &hash));
        assert!(!verify_password("Sup3rSecreT", &hash));
    }

    #[test]
    fn verify_tolerates_garbage_hash() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn same_pin_hashes_differently() {
        // Argon2 salts per hash, so equality of hashes can never be used as
        // a duplicate-PIN check.
        let a = hash_pin("1234").unwrap();
        let b = hash_pin("1234").unwrap();
        assert_ne!(a, b);
        assert!(verify_pin("1234", &a));
        assert!(verify_pin("1234", &b));
    }

    #[test]
    fn pin_format() {
        assert!(validate_pin_format("0042").is_ok());
        assert!(validate_pin_format("123").is_err());
        assert!(validate_pin_format("12345").is_err());
        assert!(validate_pin_format("12a4").is_err());
    }

    #[test]
    fn password_strength_rules() {
        assert!(validate_password_strength("Abcdef12").is_ok());
        assert!(validate_password_strength("short1A").is_err());
        assert!(validate_password_strength("alllower1").is_err());
        assert!(validate_password_strength("ALLUPPER1").is_err());
        assert!(validate_password_strength("NoDigitsHere").is_err());
    }
}

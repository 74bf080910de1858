//! Credential primitives: Argon2id hashing, the JWT token codec, and
//! one-time-code generation.

pub mod otp;
pub mod password;
pub mod token;

pub use otp::generate_otp;
pub use password::{
    hash_password, hash_pin, validate_password_strength, validate_pin_format, verify_password,
    verify_pin,
};
pub use token::{Claims, TokenCodec, TokenKind};

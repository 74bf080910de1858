use rand::rngs::OsRng;
use rand::Rng;

use shiftledger_core::constants::OTP_DIGITS;

/// Generate a cryptographically random 6-digit one-time code,
/// zero-padded ("004217" is a valid code).
pub fn generate_otp() -> String {
    let n: u32 = OsRng.gen_range(0..1_000_000);
    format!("{n:0width$}", width = OTP_DIGITS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otp_is_six_digits() {
        for _ in 0..64 {
            let code = generate_otp();
            assert_eq!(code.len(), 6);
            assert!(code.bytes().all(|b| b.is_ascii_digit()));
        }
    }
}

//! Identity conventions shared with the hosted auth provider.

use rand::Rng;

use crate::constants::{DISPLAY_CODE_ALPHABET, DISPLAY_CODE_LEN, LOGIN_EMAIL_DOMAIN};

/// Synthesize the login email for a NIK/NIS identifier.
///
/// The auth provider is email-based; the portal's login UX is not. Every
/// stored identity was created through this mapping, so it is fixed.
pub fn login_email(identifier: &str) -> String {
    format!("{}@{}", identifier.trim(), LOGIN_EMAIL_DOMAIN)
}

/// Generate a candidate display code.
///
/// Codes are random and collision-prone by design (8 chars); callers must
/// confirm uniqueness against the `users` table and retry until an unused
/// code is found before creating the identity.
pub fn generate_display_code<R: Rng>(rng: &mut R) -> String {
    (0..DISPLAY_CODE_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..DISPLAY_CODE_ALPHABET.len());
            DISPLAY_CODE_ALPHABET[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_email_uses_fixed_domain() {
        assert_eq!(login_email("1234567890"), "1234567890@suarasekolah.id");
        assert_eq!(login_email("  007  "), "007@suarasekolah.id");
    }

    #[test]
    fn display_codes_match_issued_format() {
        let mut rng = rand::thread_rng();
        for _ in 0..32 {
            let code = generate_display_code(&mut rng);
            assert_eq!(code.len(), DISPLAY_CODE_LEN);
            assert!(code.bytes().all(|b| DISPLAY_CODE_ALPHABET.contains(&b)));
        }
    }
}

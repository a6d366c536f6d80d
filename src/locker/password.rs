//! Lock secret handling.
//!
//! The persisted `secret` column serves two purposes: a lock created with a
//! password stores the SHA-256 digest of that password (32 bytes); a lock
//! without one stores a random 4-byte "color pass" that only exists to be
//! embedded into KeyBooks. `Lock::has_password` distinguishes the two by
//! length.
//!
//! Digesting is a stateless one-shot call, so concurrent checks need no
//! shared hashing context or external synchronization.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Alphabet of the generated color pass (digits plus chat color codes).
const COLOR_PASS_ALPHABET: &[u8] = b"0123456789abcdefklmnor";

/// Length below or at which a secret is a color pass, not a digest.
pub const COLOR_PASS_LEN: usize = 4;

/// Digests a user-supplied password into the persisted secret form.
pub fn digest_password(password: &str) -> Vec<u8> {
    Sha256::digest(password.as_bytes()).to_vec()
}

/// Constant-shape comparison of a supplied password against a stored
/// secret. Returns false for color-pass secrets (no password set).
pub fn check_password(secret: &[u8], supplied: &str) -> bool {
    if secret.len() <= COLOR_PASS_LEN {
        return false;
    }
    Sha256::digest(supplied.as_bytes()).as_slice() == secret
}

/// Generates a fresh color pass. Called on creation of password-less locks
/// and whenever outstanding KeyBooks are invalidated.
pub fn generate_color_pass() -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..COLOR_PASS_LEN)
        .map(|_| COLOR_PASS_ALPHABET[rng.gen_range(0..COLOR_PASS_ALPHABET.len())])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_round_trip() {
        let secret = digest_password("hunter2");
        assert_eq!(secret.len(), 32);
        assert!(check_password(&secret, "hunter2"));
        assert!(!check_password(&secret, "hunter3"));
    }

    #[test]
    fn test_color_pass_is_not_a_password() {
        let secret = generate_color_pass();
        assert_eq!(secret.len(), COLOR_PASS_LEN);
        assert!(!check_password(&secret, ""));
        assert!(!check_password(&secret, "anything"));
    }

    #[test]
    fn test_color_pass_alphabet() {
        for _ in 0..32 {
            let pass = generate_color_pass();
            assert!(pass.iter().all(|b| COLOR_PASS_ALPHABET.contains(b)));
        }
    }
}

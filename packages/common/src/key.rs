use rand::Rng;

const KEY_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const KEY_LENGTH: usize = 28;

/// Generate a random base36 storage key.
///
/// Keys are opaque; they carry no information about the blob's content or
/// owner. 28 base36 characters give ~144 bits of entropy, enough that
/// collisions within a service are not a practical concern.
pub fn generate_key() -> String {
    let mut rng = rand::rng();
    (0..KEY_LENGTH)
        .map(|_| KEY_ALPHABET[rng.random_range(0..KEY_ALPHABET.len())] as char)
        .collect()
}

/// Validate a storage key received from the outside.
///
/// Rejects path traversal and anything outside the generated alphabet plus
/// the `/` used by variant keys (`variants/{blob_key}/{digest}`).
pub fn validate_key(key: &str) -> bool {
    key.len() >= 4
        && key.len() <= 256
        && !key.contains("..")
        && !key.starts_with('/')
        && key
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'/' || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_have_expected_shape() {
        let key = generate_key();
        assert_eq!(key.len(), KEY_LENGTH);
        assert!(key.bytes().all(|b| KEY_ALPHABET.contains(&b)));
    }

    #[test]
    fn generated_keys_are_unique() {
        let a = generate_key();
        let b = generate_key();
        assert_ne!(a, b);
    }

    #[test]
    fn generated_keys_validate() {
        assert!(validate_key(&generate_key()));
    }

    #[test]
    fn variant_keys_validate() {
        assert!(validate_key(&format!(
            "variants/{}/0123456789abcdef",
            generate_key()
        )));
    }

    #[test]
    fn traversal_is_rejected() {
        assert!(!validate_key("../etc/passwd"));
        assert!(!validate_key("/absolute"));
        assert!(!validate_key(""));
        assert!(!validate_key("UPPER"));
    }
}

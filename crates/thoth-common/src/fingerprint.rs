//! Content-addressed fingerprinting for cache keys.
//!
//! Fingerprints must include every input whose change would alter the
//! artifact (§4.1). Callers supply the parts; this module never guesses
//! what belongs in a fingerprint.

use sha2::{Digest, Sha256};

/// Hash an ordered sequence of string parts into a single hex fingerprint.
/// Parts are joined with a `\x1f` (unit separator) so that e.g.
/// `fingerprint(&["ab", "c"])` cannot collide with `fingerprint(&["a", "bc"])`.
pub fn fingerprint(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update([0x1f]);
        }
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Fingerprint raw bytes (e.g. PDF content) directly.
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_deterministic() {
        let a = fingerprint(&["gpt-4", "schema-v1", "hello world"]);
        let b = fingerprint(&["gpt-4", "schema-v1", "hello world"]);
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_distinguishes_part_boundaries() {
        let a = fingerprint(&["ab", "c"]);
        let b = fingerprint(&["a", "bc"]);
        assert_ne!(a, b);
    }

    #[test]
    fn fingerprint_changes_with_any_part() {
        let a = fingerprint(&["gpt-4", "schema-v1", "hello"]);
        let b = fingerprint(&["gpt-4", "schema-v2", "hello"]);
        assert_ne!(a, b);
    }
}

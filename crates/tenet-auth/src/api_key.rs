//! API key parsing and comparison helpers.
//!
//! A full key reads `tenet_<key_id>_<secret>`. The key id is public lookup
//! material; only a SHA-256 hash of the secret ever touches storage, so
//! verification hashes the presented secret and compares hex strings.

use sha2::{Digest, Sha256};

/// Prefix of every full key string.
pub const API_KEY_PREFIX: &str = "tenet";

/// Sentinel a missing request referer normalizes to. A key bound to this
/// value only admits requests that present no referer at all.
pub const UNKNOWN_REFERER: &str = "UNKNOWN";

/// Split a full key into `(key_id, secret)`.
///
/// The secret may itself contain underscores, so only the first two are
/// separators. Returns `None` when the prefix or either part is missing.
pub fn parse_api_key(full_key: &str) -> Option<(&str, &str)> {
    let mut parts = full_key.splitn(3, '_');
    let prefix = parts.next()?;
    let key_id = parts.next()?;
    let secret = parts.next()?;
    if prefix != API_KEY_PREFIX || key_id.is_empty() || secret.is_empty() {
        return None;
    }
    Some((key_id, secret))
}

/// Hash a key secret into its stored comparison form.
pub fn hash_key_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Normalize a presented referer; absent or empty becomes the sentinel.
pub fn normalize_referer(referer: Option<&str>) -> &str {
    match referer {
        Some(value) if !value.is_empty() => value,
        _ => UNKNOWN_REFERER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_key() {
        let (key_id, secret) = parse_api_key("tenet_0a1b2c3d4e5f6071_s3cr3t").unwrap();
        assert_eq!(key_id, "0a1b2c3d4e5f6071");
        assert_eq!(secret, "s3cr3t");
    }

    #[test]
    fn secret_keeps_its_own_underscores() {
        let (_, secret) = parse_api_key("tenet_abcd_se_cr_et").unwrap();
        assert_eq!(secret, "se_cr_et");
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(parse_api_key("").is_none());
        assert!(parse_api_key("tenet").is_none());
        assert!(parse_api_key("tenet_onlyone").is_none());
        assert!(parse_api_key("tenet__secret").is_none());
        assert!(parse_api_key("tenet_abcd_").is_none());
        assert!(parse_api_key("other_abcd_secret").is_none());
    }

    #[test]
    fn hashing_is_deterministic_and_hex() {
        let a = hash_key_secret("secret");
        let b = hash_key_secret("secret");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, hash_key_secret("Secret"));
    }

    #[test]
    fn missing_referer_normalizes_to_the_sentinel() {
        assert_eq!(normalize_referer(None), UNKNOWN_REFERER);
        assert_eq!(normalize_referer(Some("")), UNKNOWN_REFERER);
        assert_eq!(normalize_referer(Some("https://app.example")), "https://app.example");
    }
}

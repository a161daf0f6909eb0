//! Namespace identity derivation.
//!
//! One device's bucket files are segregated from another's under a shared
//! parent directory by a per-device namespace identity. The identity is a
//! stable, one-way function of the encryption seed: the same seed always
//! lands in the same directory, and the directory name reveals nothing
//! about the seed.

use std::fmt;

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

const NAMESPACE_SALT: &[u8] = b"chunkbd/namespace/v1";
const NAMESPACE_INFO: &[u8] = b"public identity";

/// Length of the rendered identity in hex characters.
const IDENTITY_LEN: usize = 32;

/// Public, filesystem-safe identity of one device's namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespaceId(String);

impl NamespaceId {
    /// Derive the identity from the device's encryption seed.
    ///
    /// HKDF-SHA256 stretches the seed into key material, which is then
    /// hashed with BLAKE3; only the hash ever reaches disk.
    pub fn derive(seed: &str) -> Self {
        let hk = Hkdf::<Sha256>::new(Some(NAMESPACE_SALT), seed.as_bytes());
        let mut okm = Zeroizing::new([0u8; 32]);
        hk.expand(NAMESPACE_INFO, okm.as_mut())
            .expect("32 bytes is a valid HKDF-SHA256 output length");
        let digest = blake3::hash(okm.as_ref());
        Self(digest.to_hex()[..IDENTITY_LEN].to_string())
    }

    /// The identity as a directory-name-safe string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_is_deterministic() {
        let a = NamespaceId::derive("my device seed");
        let b = NamespaceId::derive("my device seed");
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seeds_get_different_namespaces() {
        let a = NamespaceId::derive("device one");
        let b = NamespaceId::derive("device two");
        assert_ne!(a, b);
    }

    #[test]
    fn test_identity_is_filesystem_safe_hex() {
        let id = NamespaceId::derive("test");
        assert_eq!(id.as_str().len(), IDENTITY_LEN);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_identity_does_not_contain_seed() {
        let seed = "deadbeef";
        let id = NamespaceId::derive(seed);
        assert!(!id.as_str().contains(seed));
    }
}

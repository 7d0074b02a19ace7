//! Content fingerprints for mirrored files

use sha2::{Digest, Sha256};

/// Tag prepended to every fingerprint
pub const FINGERPRINT_PREFIX: &str = "sha256:";

/// Digest of the exact bytes, as `sha256:<hex>`.
pub fn fingerprint(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("{FINGERPRINT_PREFIX}{}", hex::encode(digest))
}

//! Content ids for source documents.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of the source bytes.
pub fn document_id(bytes: &[u8]) -> String {
    let digest: [u8; 32] = Sha256::digest(bytes).into();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

use sha2::Digest;

pub fn sha2_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = sha2::Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// SHA-256 over a domain tag followed by `data`.
pub fn sha2_256_tagged(tag: &[u8], data: &[u8]) -> [u8; 32] {
    let mut hasher = sha2::Sha256::new();
    hasher.update(tag);
    hasher.update(data);
    hasher.finalize().into()
}

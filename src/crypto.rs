//! Digest support for the protocol's legacy integrity signature.

use crate::errors::{CryptoError, CustomResult};

/// Types which can generate a message digest.
pub trait GenerateDigest {
    fn generate_digest(&self, message: &[u8]) -> CustomResult<Vec<u8>, CryptoError>;
}

/// MD5 hash function.
///
/// The gateway signs notifications with MD5; this is an interoperability
/// requirement of the wire protocol, not an integrity primitive chosen here.
#[derive(Debug)]
pub struct Md5;

impl GenerateDigest for Md5 {
    fn generate_digest(&self, message: &[u8]) -> CustomResult<Vec<u8>, CryptoError> {
        let digest = md5::compute(message);
        Ok(digest.as_ref().to_vec())
    }
}

/// MD5 digest of `message` rendered as lower-case hex.
pub fn md5_hex(message: &[u8]) -> CustomResult<String, CryptoError> {
    Ok(hex::encode(Md5.generate_digest(message)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_md5_digest() {
        let message = "abcdefghijklmnopqrstuvwxyz".as_bytes();
        assert_eq!(
            hex::encode(Md5.generate_digest(message).expect("Digest")),
            "c3fcd3d76192e4007dfb496cca67e13b"
        );
    }

    #[test]
    fn test_md5_hex_matches_digest() {
        let message = "abcdefghijklmnopqrstuvwxyz".as_bytes();
        assert_eq!(
            md5_hex(message).expect("Digest"),
            "c3fcd3d76192e4007dfb496cca67e13b"
        );
    }
}

use crate::error::{FilterError, Result};
use rand::RngCore;
use sha1::{Digest, Sha1};

/// Size of one packed key record on disk: 16-byte ribbon value + 4-byte index.
pub const KEY_RECORD_SIZE: usize = 20;

/// A fixed-width filter key derived from a hashed credential.
///
/// The 128-bit `ribbon` value carries the membership information; `index`
/// only places the key's row in the ribbon filter's band. Both come from the
/// 20-byte SHA-1 digest of the credential: bytes 0..16 become `ribbon`
/// (little-endian), bytes 16..20 become `index`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FilterKey {
    pub ribbon: u128,
    pub index: u32,
}

impl FilterKey {
    /// Derives a key from a raw (unhashed) credential.
    pub fn from_credential(credential: &str) -> Self {
        let digest = Sha1::digest(credential.as_bytes());
        Self::from_record(digest.as_slice().try_into().expect("SHA-1 digest is 20 bytes"))
    }

    /// Parses a 40-character hex SHA-1 digest into a key.
    pub fn from_hex(digest: &str) -> Result<Self> {
        if digest.len() != 2 * KEY_RECORD_SIZE {
            return Err(FilterError::InvalidHex(format!(
                "expected {} hex characters, got {}",
                2 * KEY_RECORD_SIZE,
                digest.len()
            )));
        }
        let bytes = hex::decode(digest)
            .map_err(|e| FilterError::InvalidHex(e.to_string()))?;
        Ok(Self::from_record(
            bytes.as_slice().try_into().expect("length checked above"),
        ))
    }

    /// Renders the key back as a lowercase hex digest.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_record())
    }

    /// Draws a uniformly random key, used for synthetic key files and
    /// false-positive sampling.
    pub fn random<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        let mut record = [0u8; KEY_RECORD_SIZE];
        rng.fill_bytes(&mut record);
        Self::from_record(record)
    }

    pub fn from_record(record: [u8; KEY_RECORD_SIZE]) -> Self {
        let ribbon = u128::from_le_bytes(record[..16].try_into().expect("16 bytes"));
        let index = u32::from_le_bytes(record[16..].try_into().expect("4 bytes"));
        Self { ribbon, index }
    }

    pub fn to_record(&self) -> [u8; KEY_RECORD_SIZE] {
        let mut record = [0u8; KEY_RECORD_SIZE];
        record[..16].copy_from_slice(&self.ribbon.to_le_bytes());
        record[16..].copy_from_slice(&self.index.to_le_bytes());
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn credential_and_hex_paths_agree() {
        // SHA-1("password") is a well-known digest.
        let from_pass = FilterKey::from_credential("password");
        let from_hex =
            FilterKey::from_hex("5baa61e4c9b93f3f0682250b6cf8331b7ee68fd8")
                .unwrap();
        assert_eq!(from_pass, from_hex);
        assert_eq!(
            from_pass.to_hex(),
            "5baa61e4c9b93f3f0682250b6cf8331b7ee68fd8"
        );
    }

    #[test]
    fn record_round_trip() {
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..100 {
            let key = FilterKey::random(&mut rng);
            assert_eq!(FilterKey::from_record(key.to_record()), key);
        }
    }

    #[test]
    fn rejects_malformed_hex() {
        assert!(FilterKey::from_hex("abc").is_err());
        assert!(
            FilterKey::from_hex("zz aa61e4c9b93f3f0682250b6cf8331b7ee68fd8")
                .is_err()
        );
    }
}

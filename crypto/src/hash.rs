//! Blake2b hashing for headers, transactions and state digests.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use pof_types::Hash256;
use serde::Serialize;

type Blake2b256 = Blake2b<U32>;

/// Compute a 256-bit Blake2b hash of arbitrary data.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    finish(hasher)
}

/// Hash multiple byte slices in sequence (avoids concatenation allocation).
pub fn blake2b_256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    finish(hasher)
}

/// Hash of the hash. State digests use this form.
pub fn double_hash(data: &[u8]) -> Hash256 {
    Hash256::new(blake2b_256(&blake2b_256(data)))
}

/// Hash the canonical bincode encoding of a value.
pub fn hash_of<T: Serialize + ?Sized>(value: &T) -> Hash256 {
    let mut writer = HashWriter(Blake2b256::new());
    // Encoding plain derive types into an in-memory sink has no failure path.
    bincode::serialize_into(&mut writer, value).expect("bincode encoding into a hasher");
    Hash256::new(finish(writer.0))
}

fn finish(hasher: Blake2b256) -> [u8; 32] {
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

struct HashWriter(Blake2b256);

impl std::io::Write for HashWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blake2b_deterministic() {
        assert_eq!(blake2b_256(b"hello pof"), blake2b_256(b"hello pof"));
    }

    #[test]
    fn blake2b_multi_equivalent() {
        let single = blake2b_256(b"helloworld");
        let multi = blake2b_256_multi(&[b"hello", b"world"]);
        assert_eq!(single, multi);
    }

    #[test]
    fn double_hash_differs_from_single() {
        let single = Hash256::new(blake2b_256(b"state"));
        assert_ne!(double_hash(b"state"), single);
    }

    #[test]
    fn hash_of_matches_hash_of_encoding() {
        let value = (7u32, vec![1u8, 2, 3], String::from("x"));
        let bytes = bincode::serialize(&value).unwrap();
        assert_eq!(hash_of(&value), Hash256::new(blake2b_256(&bytes)));
    }
}

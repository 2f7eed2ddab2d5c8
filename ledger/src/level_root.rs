//! The level root: transaction hashes folded 16 at a time, four levels deep.

use pof_crypto::double_hash;
use pof_types::Hash256;

use crate::LedgerError;

const HASHES_PER_LEVEL: usize = 16;
const LEVELS: u32 = 4;
/// Most transaction hashes a level root can cover.
pub const MAX_LEVEL_HASHES: usize = HASHES_PER_LEVEL.pow(LEVELS);
const LEVEL_SEPARATOR: &[u8] = b"pof-level-root!";

/// Hash up to 16 hashes, zero-padded, each followed by one separator byte.
fn hash16(hashes: &[Hash256]) -> Hash256 {
    let mut buf = Vec::with_capacity(HASHES_PER_LEVEL * 33);
    for i in 0..HASHES_PER_LEVEL {
        let h = hashes.get(i).copied().unwrap_or(Hash256::ZERO);
        buf.extend_from_slice(h.as_bytes());
        if let Some(sep) = LEVEL_SEPARATOR.get(i) {
            buf.push(*sep);
        }
    }
    double_hash(&buf)
}

fn build_level(hashes: &[Hash256]) -> Vec<Hash256> {
    hashes.chunks(HASHES_PER_LEVEL).map(hash16).collect()
}

/// The level root of a block's transaction hashes. A block without
/// transactions has the zero hash.
pub fn level_root(hashes: &[Hash256]) -> Result<Hash256, LedgerError> {
    if hashes.len() > MAX_LEVEL_HASHES {
        return Err(LedgerError::TooManyTransactions(hashes.len()));
    }
    if hashes.is_empty() {
        return Ok(Hash256::ZERO);
    }
    let lv3 = build_level(hashes);
    let lv2 = build_level(&lv3);
    let lv1 = build_level(&lv2);
    Ok(hash16(&lv1))
}

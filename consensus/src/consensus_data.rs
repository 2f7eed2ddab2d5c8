//! The header's consensus data is the timeout count as a little-endian u32.

use crate::ConsensusError;

pub fn encode_timeout_count(timeout_count: u32) -> Vec<u8> {
    timeout_count.to_le_bytes().to_vec()
}

pub fn decode_timeout_count(data: &[u8]) -> Result<u32, ConsensusError> {
    let bytes: [u8; 4] = data
        .try_into()
        .map_err(|_| ConsensusError::InvalidConsensusData)?;
    Ok(u32::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_length() {
        assert_eq!(decode_timeout_count(&encode_timeout_count(7)).unwrap(), 7);
        assert!(matches!(
            decode_timeout_count(&[1, 0, 0]),
            Err(ConsensusError::InvalidConsensusData)
        ));
        assert!(decode_timeout_count(&[]).is_err());
    }
}

use proptest::prelude::*;

use pof_types::{utxo_id, Address, Hash256};

proptest! {
    /// Address fields survive packing.
    #[test]
    fn address_fields_roundtrip(height in any::<u32>(), index in any::<u16>(), nonce in any::<u64>()) {
        let addr = Address::new(height, index, nonce);
        prop_assert_eq!(addr.height(), height);
        prop_assert_eq!(addr.index(), index);
        prop_assert_eq!(addr.nonce(), nonce);
    }

    /// Address ordering follows creation height first.
    #[test]
    fn address_orders_by_height(h1 in 0u32..1_000_000, h2 in 0u32..1_000_000, i in any::<u16>()) {
        prop_assume!(h1 < h2);
        prop_assert!(Address::new(h1, u16::MAX, u64::MAX) < Address::new(h2, i, 0));
    }

    /// Hash256::is_zero is true only for all-zero bytes.
    #[test]
    fn hash_is_zero_correct(bytes in prop::array::uniform32(0u8..)) {
        let hash = Hash256::new(bytes);
        prop_assert_eq!(hash.is_zero(), bytes == [0u8; 32]);
    }

    /// Distinct coordinates give distinct utxo ids.
    #[test]
    fn utxo_ids_are_injective(h in any::<u32>(), i in any::<u16>(), n1 in any::<u16>(), n2 in any::<u16>()) {
        prop_assume!(n1 != n2);
        prop_assert_ne!(utxo_id(h, i, n1), utxo_id(h, i, n2));
    }
}

//! Property tests for the rank schedule and block reconciliation.

use pof_consensus::{GenItemTable, Rank, RankPolicy, RankSchedule};
use pof_crypto::{keypair_from_seed, sign_hash};
use pof_messages::{BlockGenMessage, BlockObSignMessage};
use pof_transactions::Block;
use pof_types::{Address, Hash256, Header, PublicHash, Timestamp};
use proptest::prelude::*;

fn schedule(n: u16) -> RankSchedule {
    RankSchedule::new(
        (0..n)
            .map(|i| Rank::new(Address::new(0, i, 0), PublicHash([i as u8; 32])))
            .collect(),
    )
}

fn gen(height: u32, seed: u8) -> BlockGenMessage {
    let block = Block::new(Header {
        chain_id: 1,
        version: 1,
        height,
        prev_hash: Hash256::new([seed; 32]),
        level_root_hash: Hash256::ZERO,
        context_hash: Hash256::ZERO,
        timestamp: Timestamp::from_nanos(u64::from(seed)),
        generator: Address::new(0, 0, 1),
        consensus_data: vec![0; 4],
    });
    let generator_signature = sign_hash(&block.hash(), &keypair_from_seed(&[1; 32]));
    BlockGenMessage {
        block,
        generator_signature,
        is_reply: false,
    }
}

fn ob_sign(g: &BlockGenMessage) -> BlockObSignMessage {
    let block_sign = g.block_sign();
    BlockObSignMessage {
        target_height: g.target_height(),
        observer_signatures: vec![pof_consensus::observer_sign(&block_sign, &keypair_from_seed(&[2; 32]))],
        block_sign,
    }
}

proptest! {
    /// The same schedule yields the same leader sequence every time.
    #[test]
    fn top_rank_is_deterministic(n in 1u16..20, history in prop::collection::vec(0u32..4, 0..30)) {
        let policy = RankPolicy { max_blocks_per_formulator: 3, max_timeout_count: 16 };
        let run = || {
            let mut s = schedule(n);
            let mut leaders = Vec::new();
            for &t in &history {
                let leader = s.top_rank(t, &policy).unwrap().address;
                leaders.push(leader);
                s.advance(&leader, t, &policy).unwrap();
            }
            (leaders, s)
        };
        let (a, sa) = run();
        let (b, sb) = run();
        prop_assert_eq!(a, b);
        prop_assert_eq!(sa, sb);
    }

    /// Timeouts beyond the ceiling are always rejected.
    #[test]
    fn timeout_ceiling(n in 1u16..10, t in 17u32..1000) {
        let policy = RankPolicy { max_blocks_per_formulator: 3, max_timeout_count: 16 };
        prop_assert!(schedule(n).top_rank(t, &policy).is_err());
    }

    /// Arrival order of a block and its observer signatures does not change
    /// the assembled block, even with duplicates and a competing block first.
    #[test]
    fn merge_order_is_irrelevant(order in prop::collection::vec(0u8..3, 1..8)) {
        let winner = gen(10, 1);
        let loser = gen(10, 2);
        let sign = ob_sign(&winner);

        let mut table = GenItemTable::new();
        for step in &order {
            match step {
                0 => { let _ = table.merge_block_gen(winner.clone()); }
                1 => { table.merge_ob_sign(sign.clone()); }
                _ => { let _ = table.merge_block_gen(loser.clone()); }
            }
        }
        table.merge_block_gen(winner.clone()).unwrap();
        table.merge_ob_sign(sign.clone());

        let mut reference = GenItemTable::new();
        reference.merge_block_gen(winner.clone()).unwrap();
        reference.merge_ob_sign(sign);

        prop_assert_eq!(
            table.get(10).and_then(|i| i.assemble()),
            reference.get(10).and_then(|i| i.assemble())
        );
        prop_assert!(table.get(10).and_then(|i| i.assemble()).is_some());
    }
}

use std::sync::Arc;

use pof_consensus::{observer_sign, ConsensusError, ObserverSet, RankPolicy};
use pof_crypto::{keypair_from_seed, public_hash, sign_hash};
use pof_ledger::{
    genesis_address, genesis_block, BlockCreator, Chain, GenesisAccount, GenesisConfig,
    GenesisFormulator, LedgerError, SignerMap,
};
use pof_nullables::NullChainStore;
use pof_store::ChainStore;
use pof_transactions::vault::{self, Transfer};
use pof_transactions::{Block, Transaction, VaultTx};
use pof_types::{Amount, BlockSign, ChainParams, KeyPair, Timestamp};

const GENESIS_TS: u64 = 1_000_000_000;

struct Fixture {
    chain: Chain,
    generators: Vec<KeyPair>,
    observers: Vec<KeyPair>,
    treasury: KeyPair,
}

fn fixture() -> Fixture {
    let generators: Vec<KeyPair> = (0..2).map(|i| keypair_from_seed(&[10 + i; 32])).collect();
    let observers: Vec<KeyPair> = (0..3).map(|i| keypair_from_seed(&[20 + i; 32])).collect();
    let treasury = keypair_from_seed(&[30; 32]);

    let config = GenesisConfig {
        params: ChainParams::default(),
        timestamp: Timestamp::from_nanos(GENESIS_TS),
        formulators: generators
            .iter()
            .enumerate()
            .map(|(i, kp)| GenesisFormulator {
                name: format!("f{i}"),
                key_hash: public_hash(&kp.public),
                generator_hash: public_hash(&kp.public),
            })
            .collect(),
        accounts: vec![GenesisAccount {
            name: "treasury".into(),
            key_hash: public_hash(&treasury.public),
            balance: Amount::new(1_000),
        }],
    };
    let (genesis, state) = genesis_block(&config).unwrap();
    let store = Arc::new(NullChainStore::new(config.params.clone()));
    store.init_genesis(&genesis, &state).unwrap();

    let observer_set = ObserverSet::new(observers.iter().map(|kp| public_hash(&kp.public)));
    Fixture {
        chain: Chain::new(store, observer_set, RankPolicy::default()),
        generators,
        observers,
        treasury,
    }
}

fn transfer(f: &Fixture, seq: u64, amount: u128) -> (Transaction, pof_types::Hash256, Vec<pof_types::Signature>) {
    let tx = Transaction::Vault(VaultTx::Transfer(Transfer {
        timestamp: Timestamp::from_nanos(GENESIS_TS),
        seq,
        from: genesis_address(2),
        to: genesis_address(0),
        amount: Amount::new(amount),
    }));
    let hash = tx.hash(ChainParams::default().chain_id);
    let sig = sign_hash(&hash, &f.treasury);
    (tx, hash, vec![sig])
}

/// Sign as the leader and attach a quorum of observer signatures.
fn seal(f: &Fixture, mut block: Block, generator: usize, observers: usize) -> Block {
    let header_hash = block.hash();
    let generator_signature = sign_hash(&header_hash, &f.generators[generator]);
    let block_sign = BlockSign {
        header_hash,
        generator_signature,
    };
    block.signatures.push(generator_signature);
    for kp in f.observers.iter().take(observers) {
        block.signatures.push(observer_sign(&block_sign, kp));
    }
    block
}

fn build(f: &Fixture, ts: u64, with_tx: bool) -> (Block, pof_state::Context) {
    let top = f.chain.top_rank(0).unwrap();
    let mut creator = BlockCreator::new(f.chain.new_context(), top.address, 0, RankPolicy::default());
    if with_tx {
        let (tx, hash, sigs) = transfer(f, 1, 100);
        let signer = public_hash(&f.treasury.public);
        creator.add_tx(tx, hash, sigs, &[signer]).unwrap();
    }
    creator.finalize(Timestamp::from_nanos(ts)).unwrap()
}

fn balance(chain: &Chain, index: u16) -> Amount {
    let mut ctx = chain.new_context();
    vault::balance(&mut ctx, genesis_address(index)).unwrap()
}

#[test]
fn connect_block_executes_transactions() {
    let f = fixture();
    let (block, _) = build(&f, GENESIS_TS + 1, true);
    let block = seal(&f, block, 0, 2);

    f.chain.connect_block(&block, &SignerMap::new()).unwrap();

    assert_eq!(f.chain.height(), 1);
    assert_eq!(f.chain.last_hash(), block.hash());
    assert_eq!(balance(&f.chain, 2), Amount::new(900));
    assert_eq!(balance(&f.chain, 0), Amount::new(100));
}

#[test]
fn fast_path_matches_slow_path() {
    let slow = fixture();
    let fast = fixture();
    let (block, ctx) = build(&fast, GENESIS_TS + 1, true);
    let block = seal(&fast, block, 0, 2);

    slow.chain.connect_block(&block, &SignerMap::new()).unwrap();
    fast.chain.connect_block_with_context(&block, &ctx).unwrap();

    assert_eq!(slow.chain.last_hash(), fast.chain.last_hash());
    assert_eq!(balance(&slow.chain, 0), balance(&fast.chain, 0));
    assert_eq!(
        slow.chain.new_context().hash(),
        fast.chain.new_context().hash()
    );
}

#[test]
fn speculative_contexts_chain_across_heights() {
    let f = fixture();
    let (first, ctx1) = build(&f, GENESIS_TS + 1, true);
    let first = seal(&f, first, 0, 2);
    let ctx1 = Arc::new(ctx1);

    // Same leader: the per-formulator quota is not exhausted after one block.
    let ctx2 = ctx1.next_context(first.hash(), first.header.timestamp);
    let creator = BlockCreator::new(ctx2, first.header.generator, 0, RankPolicy::default());
    let (second, ctx2) = creator.finalize(Timestamp::from_nanos(GENESIS_TS + 2)).unwrap();
    let second = seal(&f, second, 0, 2);

    f.chain.connect_block_with_context(&first, &ctx1).unwrap();
    f.chain.connect_block_with_context(&second, &ctx2).unwrap();

    assert_eq!(f.chain.height(), 2);
    assert_eq!(balance(&f.chain, 0), Amount::new(100));
}

#[test]
fn stale_context_is_rejected() {
    let f = fixture();
    let (first, ctx1) = build(&f, GENESIS_TS + 1, false);
    let first = seal(&f, first, 0, 2);
    let ctx1 = Arc::new(ctx1);
    let ctx2 = ctx1.next_context(first.hash(), first.header.timestamp);
    let (second, ctx2) = BlockCreator::new(ctx2, first.header.generator, 0, RankPolicy::default())
        .finalize(Timestamp::from_nanos(GENESIS_TS + 2))
        .unwrap();
    let second = seal(&f, second, 0, 2);

    // The parent was never committed.
    assert!(matches!(
        f.chain.connect_block_with_context(&second, &ctx2),
        Err(LedgerError::InvalidHeight { expected: 1, got: 2 })
    ));
}

#[test]
fn duplicate_and_forked_blocks_are_detected() {
    let f = fixture();
    let (block, _) = build(&f, GENESIS_TS + 1, false);
    let block = seal(&f, block, 0, 2);
    f.chain.connect_block(&block, &SignerMap::new()).unwrap();

    assert!(matches!(
        f.chain.connect_block(&block, &SignerMap::new()),
        Err(LedgerError::AlreadyConnected(1))
    ));

    let mut rival = block.clone();
    rival.header.timestamp = Timestamp::from_nanos(GENESIS_TS + 5);
    let rival = seal(&f, Block::new(rival.header), 0, 2);
    let err = f.chain.connect_block(&rival, &SignerMap::new()).unwrap_err();
    assert!(matches!(err, LedgerError::ForkedBlock { height: 1 }));
    assert!(err.is_fatal());
}

#[test]
fn conflicting_block_without_quorum_is_not_a_fork() {
    let f = fixture();
    let (block, _) = build(&f, GENESIS_TS + 1, false);
    let block = seal(&f, block, 0, 2);
    f.chain.connect_block(&block, &SignerMap::new()).unwrap();

    let mut header = block.header.clone();
    header.timestamp = Timestamp::from_nanos(GENESIS_TS + 5);
    let unsigned = Block::new(header.clone());
    let err = f.chain.connect_block(&unsigned, &SignerMap::new()).unwrap_err();
    assert!(matches!(err, LedgerError::InvalidGeneratorSignature));
    assert!(!err.is_fatal());

    let under_quorum = seal(&f, Block::new(header), 0, 1);
    let err = f.chain.connect_block(&under_quorum, &SignerMap::new()).unwrap_err();
    assert!(matches!(err, LedgerError::Consensus(_)));
    assert!(!err.is_fatal());
    assert_eq!(f.chain.height(), 1);
}

#[test]
fn wrong_leader_signature_is_rejected() {
    let f = fixture();
    let (block, _) = build(&f, GENESIS_TS + 1, false);
    let block = seal(&f, block, 1, 2);
    assert!(matches!(
        f.chain.connect_block(&block, &SignerMap::new()),
        Err(LedgerError::InvalidGeneratorSignature)
    ));
    assert_eq!(f.chain.height(), 0);
}

#[test]
fn observer_quorum_is_required() {
    let f = fixture();
    let (block, _) = build(&f, GENESIS_TS + 1, false);
    let block = seal(&f, block, 0, 1);
    assert!(matches!(
        f.chain.connect_block(&block, &SignerMap::new()),
        Err(LedgerError::Consensus(
            ConsensusError::InsufficientObserverSignatures { have: 1, need: 2 }
        ))
    ));
}

#[test]
fn tampered_context_hash_is_rejected() {
    let f = fixture();
    let (mut block, _) = build(&f, GENESIS_TS + 1, true);
    block.header.context_hash = pof_types::Hash256::new([9; 32]);
    let block = seal(&f, block, 0, 2);
    assert!(matches!(
        f.chain.connect_block(&block, &SignerMap::new()),
        Err(LedgerError::InvalidContextHash)
    ));
}

#[test]
fn timeout_hands_the_slot_to_the_next_formulator() {
    let f = fixture();
    assert_eq!(f.chain.top_rank(0).unwrap().address, genesis_address(0));
    assert_eq!(f.chain.top_rank(1).unwrap().address, genesis_address(1));
}

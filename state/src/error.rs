use pof_types::Address;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("account does not exist: {0}")]
    NotExistAccount(Address),

    #[error("account is deleted: {0}")]
    DeletedAccount(Address),

    #[error("account already exists: {0}")]
    ExistAccount(Address),

    #[error("account name already exists: {0}")]
    ExistAccountName(String),

    #[error("account name does not exist: {0}")]
    NotExistAccountName(String),

    #[error("address {address} is not created at height {expected}")]
    InvalidAddressHeight { address: Address, expected: u32 },

    #[error("the empty address cannot hold an account")]
    EmptyAddressAccount,

    #[error("account name must not be an address: {0}")]
    AddressAsAccountName(String),

    #[error("utxo does not exist: {0}")]
    NotExistUtxo(u64),

    #[error("utxo is already spent: {0}")]
    UsedUtxo(u64),

    #[error("utxo already exists: {0}")]
    ExistUtxo(u64),

    #[error("invalid snapshot {0}")]
    InvalidSnapshot(usize),

    #[error("event counter overflow")]
    TooManyEvents,

    #[error("loader error: {0}")]
    Loader(String),
}

//! A context view bound to one process id.

use pof_types::{Address, Event};

use crate::context::Context;
use crate::error::StateError;
use crate::keys::{AccountDataKey, ProcessDataKey};

/// Scopes data access and event emission to a process.
pub struct ProcessScope<'a> {
    ctx: &'a mut Context,
    pid: u8,
}

impl<'a> ProcessScope<'a> {
    pub fn new(ctx: &'a mut Context, pid: u8) -> Self {
        Self { ctx, pid }
    }

    pub fn pid(&self) -> u8 {
        self.pid
    }

    pub fn context(&mut self) -> &mut Context {
        &mut *self.ctx
    }

    pub fn process_data(&mut self, name: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
        self.ctx.process_data(&ProcessDataKey::new(self.pid, name))
    }

    pub fn set_process_data(&mut self, name: &[u8], value: Vec<u8>) {
        self.ctx.set_process_data(ProcessDataKey::new(self.pid, name), value);
    }

    pub fn account_data(&mut self, address: Address, name: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
        self.ctx
            .account_data(&AccountDataKey::new(address, self.pid, name))
    }

    pub fn set_account_data(&mut self, address: Address, name: &[u8], value: Vec<u8>) {
        self.ctx
            .set_account_data(AccountDataKey::new(address, self.pid, name), value);
    }

    /// Emit an event from the transaction at `index` of the block being executed.
    pub fn emit(&mut self, index: u16, payload: Vec<u8>) -> Result<u16, StateError> {
        let event = Event::new(self.ctx.target_height(), index, self.pid, payload);
        self.ctx.emit_event(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextIdentity;
    use crate::loader::EmptyLoader;
    use pof_types::{ChainParams, Hash256, Timestamp};
    use std::sync::Arc;

    #[test]
    fn scopes_do_not_see_each_other() {
        let mut ctx = Context::new(
            Arc::new(EmptyLoader),
            ContextIdentity {
                params: ChainParams::default(),
                target_height: 1,
                last_hash: Hash256::ZERO,
                last_timestamp: Timestamp::EPOCH,
            },
        );
        ProcessScope::new(&mut ctx, 1).set_process_data(b"k", vec![1]);
        assert_eq!(ProcessScope::new(&mut ctx, 2).process_data(b"k").unwrap(), None);
        assert_eq!(
            ProcessScope::new(&mut ctx, 1).process_data(b"k").unwrap(),
            Some(vec![1])
        );
    }
}

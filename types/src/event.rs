//! Events emitted by transaction execution.

use serde::{Deserialize, Serialize};

/// One entry in a state layer's event log.
///
/// `n` is assigned by the layer at emission time; the emitter leaves it zero.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub height: u32,
    pub index: u16,
    pub n: u16,
    pub pid: u8,
    pub payload: Vec<u8>,
}

impl Event {
    pub fn new(height: u32, index: u16, pid: u8, payload: Vec<u8>) -> Self {
        Self {
            height,
            index,
            n: 0,
            pid,
            payload,
        }
    }
}

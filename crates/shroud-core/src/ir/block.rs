use serde::{Deserialize, Serialize};

use crate::define_entity;

use super::inst::{InstId, Terminator};

define_entity!(BlockId);

/// A basic block: a straight-line instruction sequence plus exactly one
/// terminator.
///
/// Blocks are arena-allocated and addressed by `BlockId`; "moving" a block
/// is a matter of where other terminators point, never of memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub insts: Vec<InstId>,
    pub term: Terminator,
}

impl Block {
    /// An empty block ending in `Return(None)`. Builders overwrite the
    /// terminator when one is emitted.
    pub fn new() -> Self {
        Self {
            insts: Vec::new(),
            term: Terminator::Return(None),
        }
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::new()
    }
}

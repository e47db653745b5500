use serde::{Deserialize, Serialize};

use crate::define_entity;

use super::block::BlockId;
use super::ty::Type;
use super::value::{Constant, ValueId};

define_entity!(InstId);

/// An IR instruction: an operation with an optional result value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inst {
    pub op: Op,
    /// The value produced by this instruction, if any.
    pub result: Option<ValueId>,
}

/// Comparison kind for relational operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpKind {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Non-terminator IR operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    /// Load a compile-time constant.
    Const(Constant),

    // -- Arithmetic --
    Add(ValueId, ValueId),
    Sub(ValueId, ValueId),
    Mul(ValueId, ValueId),
    Neg(ValueId),

    // -- Comparison & logic --
    Cmp(CmpKind, ValueId, ValueId),
    Not(ValueId),
    /// Conditional select: `cond ? on_true : on_false`
    Select {
        cond: ValueId,
        on_true: ValueId,
        on_false: ValueId,
    },

    // -- Memory --
    /// Allocate a mutable storage cell; the result is a reference to it.
    Alloc(Type),
    /// Load the current value of a cell.
    Load(ValueId),
    /// Store a value into a cell.
    Store { ptr: ValueId, value: ValueId },

    // -- Calls --
    /// Direct call by name. Opaque to the transforms; kept only so a
    /// function under obfuscation may contain calls.
    Call { func: String, args: Vec<ValueId> },
}

/// Control-transfer instruction ending a block.
///
/// A closed set: every consumer pattern-matches exhaustively, so adding a
/// terminator kind is a compile-time-checked change, not a silent runtime
/// fallthrough on successor count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Terminator {
    /// Return from the function.
    Return(Option<ValueId>),
    /// Unconditional jump.
    Jump(BlockId),
    /// Two-way conditional branch.
    Branch {
        cond: ValueId,
        then_target: BlockId,
        else_target: BlockId,
    },
    /// Multi-way dispatch on an integer value. Produced by the flattener;
    /// functions containing one are rejected as flattening input.
    Switch {
        value: ValueId,
        cases: Vec<(i64, BlockId)>,
        default: BlockId,
    },
}

impl Terminator {
    /// Successor blocks, in branch order.
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Return(_) => vec![],
            Terminator::Jump(target) => vec![*target],
            Terminator::Branch {
                then_target,
                else_target,
                ..
            } => vec![*then_target, *else_target],
            Terminator::Switch { cases, default, .. } => {
                let mut targets: Vec<BlockId> = cases.iter().map(|&(_, t)| t).collect();
                targets.push(*default);
                targets
            }
        }
    }
}

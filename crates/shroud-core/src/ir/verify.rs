//! Structural well-formedness checks for functions.
//!
//! The host pipeline hands transforms pre-verified IR; this checker exists
//! for tests and the CLI, which verify transform *output*.

use std::collections::{HashSet, VecDeque};

use crate::error::CoreError;

use super::block::BlockId;
use super::func::Function;
use super::inst::{Op, Terminator};
use super::value::ValueId;

/// All blocks reachable from the entry via terminator edges.
pub fn reachable_blocks(func: &Function) -> HashSet<BlockId> {
    let mut reachable = HashSet::new();
    let mut worklist = VecDeque::new();
    reachable.insert(func.entry);
    worklist.push_back(func.entry);

    while let Some(block_id) = worklist.pop_front() {
        for target in func.blocks[block_id].term.successors() {
            if reachable.insert(target) {
                worklist.push_back(target);
            }
        }
    }

    reachable
}

/// Verify structural well-formedness of a function.
///
/// Checks: the entry block exists; every terminator target is a real block;
/// every value referenced by an instruction or terminator exists; switch
/// case values are distinct; no instruction is listed in two blocks.
pub fn verify_function(func: &Function) -> Result<(), CoreError> {
    let fail = |message: String| Err(CoreError::Verify(format!("{}: {message}", func.name)));

    if !func.blocks.contains(func.entry) {
        return fail("entry block does not exist".into());
    }

    let check_value = |value: ValueId| -> Result<(), CoreError> {
        if func.value_types.contains(value) {
            Ok(())
        } else {
            fail(format!("reference to undefined value {value:?}"))
        }
    };
    let check_target = |target: BlockId| -> Result<(), CoreError> {
        if func.blocks.contains(target) {
            Ok(())
        } else {
            fail(format!("branch to nonexistent block {target:?}"))
        }
    };

    let mut seen_insts = HashSet::new();
    for (block_id, block) in func.blocks.iter() {
        for &inst_id in &block.insts {
            if !func.insts.contains(inst_id) {
                return fail(format!("block {block_id:?} lists nonexistent inst"));
            }
            if !seen_insts.insert(inst_id) {
                return fail(format!("inst {inst_id:?} appears in more than one block"));
            }
            for operand in value_operands(&func.insts[inst_id].op) {
                check_value(operand)?;
            }
            if let Some(result) = func.insts[inst_id].result {
                check_value(result)?;
            }
        }

        match &block.term {
            Terminator::Return(value) => {
                if let Some(value) = value {
                    check_value(*value)?;
                }
            }
            Terminator::Jump(target) => check_target(*target)?,
            Terminator::Branch {
                cond,
                then_target,
                else_target,
            } => {
                check_value(*cond)?;
                check_target(*then_target)?;
                check_target(*else_target)?;
            }
            Terminator::Switch {
                value,
                cases,
                default,
            } => {
                check_value(*value)?;
                check_target(*default)?;
                let mut keys = HashSet::new();
                for &(key, target) in cases {
                    check_target(target)?;
                    if !keys.insert(key) {
                        return fail(format!("duplicate switch case {key}"));
                    }
                }
            }
        }
    }

    Ok(())
}

/// Extract all `ValueId` operands from an op.
pub fn value_operands(op: &Op) -> Vec<ValueId> {
    match op {
        Op::Const(_) | Op::Alloc(_) => vec![],
        Op::Add(a, b) | Op::Sub(a, b) | Op::Mul(a, b) | Op::Cmp(_, a, b) => vec![*a, *b],
        Op::Neg(a) | Op::Not(a) | Op::Load(a) => vec![*a],
        Op::Select {
            cond,
            on_true,
            on_false,
        } => vec![*cond, *on_true, *on_false],
        Op::Store { ptr, value } => vec![*ptr, *value],
        Op::Call { args, .. } => args.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityRef;
    use crate::ir::builder::FunctionBuilder;
    use crate::ir::ty::{FunctionSig, Type};

    #[test]
    fn well_formed_function_passes() {
        let sig = FunctionSig {
            params: vec![Type::Int(64)],
            return_ty: Type::Int(64),
        };
        let mut fb = FunctionBuilder::new("id", sig);
        let p = fb.param(0);
        fb.ret(Some(p));
        let func = fb.build();
        assert!(verify_function(&func).is_ok());
        assert_eq!(reachable_blocks(&func).len(), 1);
    }

    #[test]
    fn dangling_target_rejected() {
        let mut fb = FunctionBuilder::new("bad", FunctionSig::default());
        fb.jump(BlockId::new(7));
        let func = fb.build();
        assert!(matches!(
            verify_function(&func),
            Err(CoreError::Verify(_))
        ));
    }

    #[test]
    fn duplicate_switch_case_rejected() {
        let mut fb = FunctionBuilder::new("bad", FunctionSig::default());
        let other = fb.create_block();
        let s = fb.const_int(0);
        fb.switch(s, vec![(0, other), (0, other)], other);
        let func = fb.build();
        assert!(verify_function(&func).is_err());
    }
}

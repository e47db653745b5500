//! Control-flow flattening.
//!
//! Rewrites a function's CFG into a single dispatch loop. A mutable
//! integer cell (the dispatcher) is allocated in the entry block; a loop
//! head re-reads it every iteration and a switch selects which original
//! block runs next. Every original terminator becomes a store of the
//! successor's case id followed by a jump back to the loop head. A
//! conditional branch becomes a `Select` between two case ids, turning a
//! control-flow choice into a data choice.
//!
//! Skeleton, per function:
//!
//! ```text
//! entry:      <original insts>; dispatcher = alloc; store initial; jump loop_head
//! loop_head:  state = load dispatcher; branch (state < cases) dispatch, exit
//! dispatch:   switch state [0 => case0, 1 => case1, ...], default
//! default:    store (load dispatcher) + 1; jump loop_head
//! exit:       return <zero of return type>
//! ```
//!
//! Original `Return` blocks keep their terminators and leave directly; the
//! synthetic exit is reached only through the reserved out-of-table case id
//! stored for a successor with no case, which fails the loop-head bounds
//! check on the next iteration.

use std::collections::HashMap;

use crate::error::CoreError;
use crate::ir::{
    Block, BlockId, CmpKind, Constant, Function, Inst, Module, Op, Terminator, Type, ValueId,
};
use crate::pipeline::{PassContext, Transform, TransformResult};

/// Control-flow flattening transform.
pub struct ControlFlowFlattening;

/// Append an instruction with a result to a block.
fn emit_value(func: &mut Function, block: BlockId, op: Op, ty: Type) -> ValueId {
    let value = func.value_types.push(ty);
    let inst_id = func.insts.push(Inst {
        op,
        result: Some(value),
    });
    func.blocks[block].insts.push(inst_id);
    value
}

/// Append a void instruction to a block.
fn emit_stmt(func: &mut Function, block: BlockId, op: Op) {
    let inst_id = func.insts.push(Inst { op, result: None });
    func.blocks[block].insts.push(inst_id);
}

fn unsupported(func: &Function, reason: &str) -> CoreError {
    CoreError::UnsupportedShape {
        function: func.name.clone(),
        reason: reason.to_string(),
    }
}

/// Check that every terminator is a shape the flattener can rewrite.
///
/// Rejections leave the function untouched: a `Switch` has more than two
/// successors, and an edge back into the entry block cannot be represented
/// because the entry is the one block that is never given a case id.
fn check_shape(func: &Function) -> Result<(), CoreError> {
    for block in func.blocks.values() {
        match &block.term {
            Terminator::Return(_) => {}
            Terminator::Jump(target) => {
                if *target == func.entry {
                    return Err(unsupported(func, "edge back into the entry block"));
                }
            }
            Terminator::Branch {
                then_target,
                else_target,
                ..
            } => {
                if *then_target == func.entry || *else_target == func.entry {
                    return Err(unsupported(func, "edge back into the entry block"));
                }
            }
            Terminator::Switch { .. } => {
                return Err(unsupported(
                    func,
                    "terminator with more than two successors",
                ));
            }
        }
    }
    Ok(())
}

/// Flatten one function in place. Returns whether it changed.
fn flatten_function(func: &mut Function) -> Result<bool, CoreError> {
    // Nothing to flatten: empty or single-block functions stay untouched.
    if func.blocks.len() <= 1 {
        return Ok(false);
    }

    check_shape(func)?;

    let entry = func.entry;

    // The entry keeps its instructions and is not relocated; its successor
    // must be reachable from the initial dispatcher value, so it gets case
    // 0. A branch entry selects between its two successor ids instead.
    let (primary, entry_branch) = match func.blocks[entry].term.clone() {
        // Everything past the entry is unreachable; leave the dead blocks
        // to a cleanup pass rather than flattening them.
        Terminator::Return(_) => return Ok(false),
        Terminator::Jump(target) => (target, None),
        Terminator::Branch {
            cond,
            then_target,
            else_target,
        } => (then_target, Some((cond, else_target))),
        // Rejected by check_shape.
        Terminator::Switch { .. } => {
            return Err(unsupported(func, "terminator with more than two successors"))
        }
    };

    // Case assignment: dense ids in encounter order, entry-successor first.
    // Deterministic, so repeated runs on the same input produce identical
    // IR.
    let mut order: Vec<BlockId> = vec![primary];
    for block_id in func.blocks.keys() {
        if block_id != entry && block_id != primary {
            order.push(block_id);
        }
    }
    let case_of: HashMap<BlockId, i64> = order
        .iter()
        .enumerate()
        .map(|(i, &block_id)| (block_id, i as i64))
        .collect();
    let case_count = order.len() as i64;
    // Stored for a successor with no assigned case; one past the table, so
    // it fails the bounds check and leaves through the exit block.
    let reserved_exit_case = case_count;

    let state_ty = Type::Int(32);
    let loop_head = func.blocks.push(Block::new());
    let dispatch = func.blocks.push(Block::new());
    let default_block = func.blocks.push(Block::new());
    let exit = func.blocks.push(Block::new());

    // Entry: allocate the dispatcher cell, seed it, enter the loop.
    let dispatcher = emit_value(func, entry, Op::Alloc(state_ty.clone()), state_ty.clone());
    let initial = match entry_branch {
        None => emit_value(func, entry, Op::Const(Constant::Int(0)), state_ty.clone()),
        Some((cond, else_target)) => {
            let on_true = emit_value(func, entry, Op::Const(Constant::Int(0)), state_ty.clone());
            let on_false = emit_value(
                func,
                entry,
                Op::Const(Constant::Int(case_of[&else_target])),
                state_ty.clone(),
            );
            emit_value(
                func,
                entry,
                Op::Select {
                    cond,
                    on_true,
                    on_false,
                },
                state_ty.clone(),
            )
        }
    };
    emit_stmt(
        func,
        entry,
        Op::Store {
            ptr: dispatcher,
            value: initial,
        },
    );
    func.blocks[entry].term = Terminator::Jump(loop_head);

    // Loop head: a genuine per-iteration re-read of the dispatcher, then a
    // bounds check against the case table.
    let state = emit_value(func, loop_head, Op::Load(dispatcher), state_ty.clone());
    let bound = emit_value(
        func,
        loop_head,
        Op::Const(Constant::Int(case_count)),
        state_ty.clone(),
    );
    let in_table = emit_value(func, loop_head, Op::Cmp(CmpKind::Lt, state, bound), Type::Bool);
    func.blocks[loop_head].term = Terminator::Branch {
        cond: in_table,
        then_target: dispatch,
        else_target: exit,
    };

    // Dispatch: the multi-way selector over the case table.
    let cases: Vec<(i64, BlockId)> = order
        .iter()
        .enumerate()
        .map(|(i, &block_id)| (i as i64, block_id))
        .collect();
    func.blocks[dispatch].term = Terminator::Switch {
        value: state,
        cases,
        default: default_block,
    };

    // Default: same state walks forward one id per iteration. Unreachable
    // under a correctly assigned case table except past the genuine exit.
    let current = emit_value(func, default_block, Op::Load(dispatcher), state_ty.clone());
    let one = emit_value(
        func,
        default_block,
        Op::Const(Constant::Int(1)),
        state_ty.clone(),
    );
    let next = emit_value(func, default_block, Op::Add(current, one), state_ty.clone());
    emit_stmt(
        func,
        default_block,
        Op::Store {
            ptr: dispatcher,
            value: next,
        },
    );
    func.blocks[default_block].term = Terminator::Jump(loop_head);

    // Exit: the function's return shape with its zero value.
    match Constant::zero_of(&func.sig.return_ty) {
        None => func.blocks[exit].term = Terminator::Return(None),
        Some(zero) => {
            let ty = func.sig.return_ty.clone();
            let value = emit_value(func, exit, Op::Const(zero), ty);
            func.blocks[exit].term = Terminator::Return(Some(value));
        }
    }

    // Terminator rewrite. Runs only after every case id is assigned, so
    // forward references resolve; this ordering is the one hard sequencing
    // constraint of the whole transform.
    for &block_id in &order {
        match func.blocks[block_id].term.clone() {
            // Returns leave the loop directly; funneling the return value
            // through the integer dispatcher is not attempted.
            Terminator::Return(_) => {}
            Terminator::Jump(target) => {
                let case = case_of.get(&target).copied().unwrap_or(reserved_exit_case);
                let value = emit_value(
                    func,
                    block_id,
                    Op::Const(Constant::Int(case)),
                    state_ty.clone(),
                );
                emit_stmt(
                    func,
                    block_id,
                    Op::Store {
                        ptr: dispatcher,
                        value,
                    },
                );
                func.blocks[block_id].term = Terminator::Jump(loop_head);
            }
            Terminator::Branch {
                cond,
                then_target,
                else_target,
            } => {
                let then_case = case_of
                    .get(&then_target)
                    .copied()
                    .unwrap_or(reserved_exit_case);
                let else_case = case_of
                    .get(&else_target)
                    .copied()
                    .unwrap_or(reserved_exit_case);
                let on_true = emit_value(
                    func,
                    block_id,
                    Op::Const(Constant::Int(then_case)),
                    state_ty.clone(),
                );
                let on_false = emit_value(
                    func,
                    block_id,
                    Op::Const(Constant::Int(else_case)),
                    state_ty.clone(),
                );
                let selected = emit_value(
                    func,
                    block_id,
                    Op::Select {
                        cond,
                        on_true,
                        on_false,
                    },
                    state_ty.clone(),
                );
                emit_stmt(
                    func,
                    block_id,
                    Op::Store {
                        ptr: dispatcher,
                        value: selected,
                    },
                );
                func.blocks[block_id].term = Terminator::Jump(loop_head);
            }
            // Rejected by check_shape before any mutation.
            Terminator::Switch { .. } => {}
        }
    }

    Ok(true)
}

impl Transform for ControlFlowFlattening {
    fn name(&self) -> &str {
        "flattening"
    }

    fn apply(&self, mut module: Module, cx: &mut PassContext) -> Result<TransformResult, CoreError> {
        let mut changed = false;
        for func_id in module.functions.keys().collect::<Vec<_>>() {
            if flatten_function(&mut module.functions[func_id])? {
                // The instruction list changed; cached analyses are stale.
                cx.analyses.bump(func_id);
                if cx.trace {
                    eprintln!("[flattening] {}", module.functions[func_id].name);
                }
                changed = true;
            }
        }
        Ok(TransformResult { module, changed })
    }

    /// A flattened function contains the dispatch switch, which this pass
    /// rejects as input; skip repeat fixpoint iterations instead of
    /// erroring on our own output.
    fn run_once(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityRef, PrimaryMap};
    use crate::ir::builder::FunctionBuilder;
    use crate::ir::interp::{eval_function, Value};
    use crate::ir::ty::FunctionSig;
    use crate::ir::verify::reachable_blocks;
    use crate::transforms::util::test_helpers::assert_well_formed;

    /// `fn(cond) { if cond { return 1 } else { return 0 } }`
    fn branch_function() -> Function {
        let sig = FunctionSig {
            params: vec![Type::Bool],
            return_ty: Type::Int(64),
        };
        let mut fb = FunctionBuilder::new("pick", sig);
        let cond = fb.param(0);
        let yes = fb.create_block();
        let no = fb.create_block();
        fb.branch(cond, yes, no);

        fb.switch_to_block(yes);
        let one = fb.const_int(1);
        fb.ret(Some(one));

        fb.switch_to_block(no);
        let zero = fb.const_int(0);
        fb.ret(Some(zero));

        fb.build()
    }

    /// `fn(x) { if x > 0 { return x + 1 } else { return x - 1 } }`
    fn step_function() -> Function {
        let sig = FunctionSig {
            params: vec![Type::Int(64)],
            return_ty: Type::Int(64),
        };
        let mut fb = FunctionBuilder::new("step", sig);
        let x = fb.param(0);
        let plus = fb.create_block();
        let minus = fb.create_block();
        let zero = fb.const_int(0);
        let positive = fb.cmp(CmpKind::Gt, x, zero);
        fb.branch(positive, plus, minus);

        fb.switch_to_block(plus);
        let one = fb.const_int(1);
        let up = fb.add(x, one);
        fb.ret(Some(up));

        fb.switch_to_block(minus);
        let one = fb.const_int(1);
        let down = fb.sub(x, one);
        fb.ret(Some(down));

        fb.build()
    }

    /// `fn(n) { acc = 0; for i in 0..n { acc += i }; return acc }`
    /// using explicit cells, so values never cross block boundaries.
    fn loop_function() -> Function {
        let sig = FunctionSig {
            params: vec![Type::Int(64)],
            return_ty: Type::Int(64),
        };
        let mut fb = FunctionBuilder::new("triangle", sig);
        let n = fb.param(0);
        let header = fb.create_block();
        let body = fb.create_block();
        let done = fb.create_block();

        let i_cell = fb.alloc(Type::Int(64));
        let acc_cell = fb.alloc(Type::Int(64));
        let zero = fb.const_int(0);
        fb.store(i_cell, zero);
        fb.store(acc_cell, zero);
        fb.jump(header);

        fb.switch_to_block(header);
        let i = fb.load(i_cell);
        let more = fb.cmp(CmpKind::Lt, i, n);
        fb.branch(more, body, done);

        fb.switch_to_block(body);
        let i = fb.load(i_cell);
        let acc = fb.load(acc_cell);
        let acc = fb.add(acc, i);
        fb.store(acc_cell, acc);
        let one = fb.const_int(1);
        let i = fb.add(i, one);
        fb.store(i_cell, i);
        fb.jump(header);

        fb.switch_to_block(done);
        let acc = fb.load(acc_cell);
        fb.ret(Some(acc));

        fb.build()
    }

    fn dispatch_switch(func: &Function) -> (&Vec<(i64, BlockId)>, BlockId) {
        let mut found = None;
        for block in func.blocks.values() {
            if let Terminator::Switch { cases, default, .. } = &block.term {
                assert!(found.is_none(), "more than one dispatch switch");
                found = Some((cases, *default));
            }
        }
        found.expect("no dispatch switch after flattening")
    }

    #[test]
    fn single_block_function_untouched() {
        let sig = FunctionSig {
            params: vec![Type::Int(64)],
            return_ty: Type::Int(64),
        };
        let mut fb = FunctionBuilder::new("id", sig);
        let p = fb.param(0);
        fb.ret(Some(p));
        let mut func = fb.build();
        let before = func.clone();

        assert!(!flatten_function(&mut func).unwrap());
        assert_eq!(func, before);
    }

    #[test]
    fn empty_module_and_empty_function_are_noops() {
        let mut cx = PassContext::new();
        let result = ControlFlowFlattening
            .apply(Module::new("hollow".into()), &mut cx)
            .unwrap();
        assert!(!result.changed);
        assert_eq!(result.module.functions.len(), 0);

        // A function with no blocks at all is a successful no-op too.
        let func = Function {
            name: "hollow".into(),
            sig: FunctionSig::default(),
            params: Vec::new(),
            blocks: PrimaryMap::new(),
            insts: PrimaryMap::new(),
            value_types: PrimaryMap::new(),
            entry: BlockId::new(0),
        };
        let mut module = Module::new("m".into());
        let func_id = module.functions.push(func.clone());
        let result = ControlFlowFlattening.apply(module, &mut cx).unwrap();
        assert!(!result.changed);
        assert_eq!(result.module.functions[func_id], func);
    }

    #[test]
    fn branch_scenario_case_table() {
        let mut func = branch_function();
        let yes_block = match func.blocks[func.entry].term {
            Terminator::Branch { then_target, .. } => then_target,
            _ => unreachable!(),
        };

        assert!(flatten_function(&mut func).unwrap());
        assert_well_formed(&func);

        // Three original blocks + four skeleton blocks, all reachable.
        assert_eq!(func.blocks.len(), 7);
        assert_eq!(reachable_blocks(&func).len(), 7);

        // Case ids are unique and contiguous from 0; case 0 is the entry's
        // primary successor.
        let (cases, _default) = dispatch_switch(&func);
        let mut ids: Vec<i64> = cases.iter().map(|&(id, _)| id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1]);
        assert_eq!(cases[0], (0, yes_block));

        assert_eq!(
            eval_function(&func, &[Value::Bool(true)]).unwrap(),
            Value::Int(1)
        );
        assert_eq!(
            eval_function(&func, &[Value::Bool(false)]).unwrap(),
            Value::Int(0)
        );
    }

    #[test]
    fn step_function_equivalence() {
        let original = step_function();
        let mut flattened = original.clone();
        assert!(flatten_function(&mut flattened).unwrap());
        assert_well_formed(&flattened);

        for x in [5i64, -3, 0, 1, -1, i64::MAX - 1] {
            let args = [Value::Int(x)];
            assert_eq!(
                eval_function(&original, &args).unwrap(),
                eval_function(&flattened, &args).unwrap(),
                "diverged at x={x}"
            );
        }
    }

    #[test]
    fn loop_function_equivalence() {
        let original = loop_function();
        let mut flattened = original.clone();
        assert!(flatten_function(&mut flattened).unwrap());
        assert_well_formed(&flattened);

        for n in [0i64, 1, 5, 17] {
            let args = [Value::Int(n)];
            assert_eq!(
                eval_function(&original, &args).unwrap(),
                eval_function(&flattened, &args).unwrap(),
                "diverged at n={n}"
            );
        }
        assert_eq!(
            eval_function(&flattened, &[Value::Int(5)]).unwrap(),
            Value::Int(10)
        );
    }

    #[test]
    fn jump_chain_equivalence() {
        let sig = FunctionSig {
            params: vec![],
            return_ty: Type::Int(64),
        };
        let mut fb = FunctionBuilder::new("chain", sig);
        let a = fb.create_block();
        let b = fb.create_block();
        let c = fb.create_block();
        fb.jump(a);
        fb.switch_to_block(a);
        fb.jump(b);
        fb.switch_to_block(b);
        fb.jump(c);
        fb.switch_to_block(c);
        let answer = fb.const_int(42);
        fb.ret(Some(answer));

        let mut func = fb.build();
        assert!(flatten_function(&mut func).unwrap());
        assert_well_formed(&func);
        assert_eq!(eval_function(&func, &[]).unwrap(), Value::Int(42));
    }

    #[test]
    fn switch_input_rejected_untouched() {
        let sig = FunctionSig {
            params: vec![Type::Int(64)],
            return_ty: Type::Int(64),
        };
        let mut fb = FunctionBuilder::new("multi", sig);
        let x = fb.param(0);
        let a = fb.create_block();
        let b = fb.create_block();
        fb.switch(x, vec![(0, a)], b);
        fb.switch_to_block(a);
        let one = fb.const_int(1);
        fb.ret(Some(one));
        fb.switch_to_block(b);
        let two = fb.const_int(2);
        fb.ret(Some(two));

        let mut func = fb.build();
        let before = func.clone();
        assert!(matches!(
            flatten_function(&mut func),
            Err(CoreError::UnsupportedShape { .. })
        ));
        assert_eq!(func, before);
    }

    #[test]
    fn entry_edge_rejected_untouched() {
        let mut fb = FunctionBuilder::new("reenter", FunctionSig::default());
        let entry = fb.entry_block();
        let a = fb.create_block();
        fb.jump(a);
        fb.switch_to_block(a);
        fb.jump(entry);

        let mut func = fb.build();
        let before = func.clone();
        assert!(matches!(
            flatten_function(&mut func),
            Err(CoreError::UnsupportedShape { .. })
        ));
        assert_eq!(func, before);
    }

    #[test]
    fn entry_return_with_dead_blocks_is_noop() {
        let mut fb = FunctionBuilder::new("dead_tail", FunctionSig::default());
        let dead = fb.create_block();
        fb.ret(None);
        fb.switch_to_block(dead);
        fb.ret(None);

        let mut func = fb.build();
        let before = func.clone();
        assert!(!flatten_function(&mut func).unwrap());
        assert_eq!(func, before);
    }

    #[test]
    fn repeated_runs_are_deterministic() {
        let mut first = step_function();
        let mut second = step_function();
        flatten_function(&mut first).unwrap();
        flatten_function(&mut second).unwrap();
        assert_eq!(format!("{first}"), format!("{second}"));
    }

    #[test]
    fn double_application_rejects_but_preserves() {
        let mut func = step_function();
        assert!(flatten_function(&mut func).unwrap());
        let once = func.clone();

        // The dispatch switch has more than two successors, so a second
        // application is a clean rejection: error out, change nothing.
        assert!(matches!(
            flatten_function(&mut func),
            Err(CoreError::UnsupportedShape { .. })
        ));
        assert_eq!(func, once);
        assert_well_formed(&func);
        assert_eq!(
            eval_function(&func, &[Value::Int(5)]).unwrap(),
            Value::Int(6)
        );
    }

    #[test]
    fn void_function_flattens() {
        let mut fb = FunctionBuilder::new("quiet", FunctionSig::default());
        let a = fb.create_block();
        fb.jump(a);
        fb.switch_to_block(a);
        fb.ret(None);

        let mut func = fb.build();
        assert!(flatten_function(&mut func).unwrap());
        assert_well_formed(&func);
        assert_eq!(eval_function(&func, &[]).unwrap(), Value::Unit);
    }
}

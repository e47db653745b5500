//! Arithmetic instruction substitution.
//!
//! Rewrites each eligible `add`/`sub` as the equivalent longer form:
//!
//! ```text
//! r = add a, b      ->    n = neg b; r = sub a, n
//! r = sub a, b      ->    n = neg b; r = add a, n
//! ```
//!
//! The eligible set comes from the cached analysis in the pass context.
//! Each expansion inserts the two new instructions where the original
//! stood and unlinks the original, so processing one entry never disturbs
//! the identity of a later one. After the batch, every use of an original
//! result is rewritten to the replacement and the consumed cache slot is
//! invalidated; the instruction identities it held are gone.

use std::collections::{HashMap, HashSet};

use crate::ir::{Function, Inst, InstId, Module, Op, ValueId};
use crate::pipeline::{PassContext, Transform, TransformResult};
use crate::error::CoreError;

use super::util::{substitute_values_in_op, substitute_values_in_term};

/// Instruction substitution transform.
pub struct InstructionSubstitution;

#[derive(Default)]
struct SubstStats {
    adds: usize,
    subs: usize,
}

impl SubstStats {
    fn total(&self) -> usize {
        self.adds + self.subs
    }
}

fn substitute_in_function(func: &mut Function, eligible: &[InstId]) -> SubstStats {
    let eligible_set: HashSet<InstId> = eligible.iter().copied().collect();
    let mut stats = SubstStats::default();
    let mut replaced: HashMap<ValueId, ValueId> = HashMap::new();

    for block_id in func.blocks.keys().collect::<Vec<_>>() {
        let old_insts = std::mem::take(&mut func.blocks[block_id].insts);
        let mut new_insts = Vec::with_capacity(old_insts.len());

        for inst_id in old_insts {
            if !eligible_set.contains(&inst_id) {
                new_insts.push(inst_id);
                continue;
            }
            // The analysis only collects add/sub with results; anything
            // else is kept as-is.
            let (a, b, is_add) = match func.insts[inst_id].op {
                Op::Add(a, b) => (a, b, true),
                Op::Sub(a, b) => (a, b, false),
                _ => {
                    new_insts.push(inst_id);
                    continue;
                }
            };
            let Some(old_result) = func.insts[inst_id].result else {
                new_insts.push(inst_id);
                continue;
            };

            let operand_ty = func.value_types[b].clone();
            let negated = func.value_types.push(operand_ty);
            let neg_id = func.insts.push(Inst {
                op: Op::Neg(b),
                result: Some(negated),
            });

            let result_ty = func.value_types[old_result].clone();
            let new_result = func.value_types.push(result_ty);
            let expanded = if is_add {
                Op::Sub(a, negated)
            } else {
                Op::Add(a, negated)
            };
            let expanded_id = func.insts.push(Inst {
                op: expanded,
                result: Some(new_result),
            });

            // Splice in place of the original; the original stays in the
            // arena (unlinked) until compaction.
            new_insts.push(neg_id);
            new_insts.push(expanded_id);
            replaced.insert(old_result, new_result);
            if is_add {
                stats.adds += 1;
            } else {
                stats.subs += 1;
            }
        }

        func.blocks[block_id].insts = new_insts;
    }

    if !replaced.is_empty() {
        // Replace all uses of the original results, in ops and terminators
        // alike. Replacement instructions themselves may reference a
        // replaced result (chained arithmetic) and are rewritten too.
        for inst in func.insts.values_mut() {
            substitute_values_in_op(&mut inst.op, &replaced);
        }
        for block in func.blocks.values_mut() {
            substitute_values_in_term(&mut block.term, &replaced);
        }
    }

    stats
}

impl Transform for InstructionSubstitution {
    fn name(&self) -> &str {
        "substitution"
    }

    fn apply(&self, mut module: Module, cx: &mut PassContext) -> Result<TransformResult, CoreError> {
        let mut changed = false;
        for func_id in module.functions.keys().collect::<Vec<_>>() {
            let eligible = cx
                .analyses
                .eligible_insts(func_id, &module.functions[func_id])
                .to_vec();
            if eligible.is_empty() {
                continue;
            }

            let func = &mut module.functions[func_id];
            let stats = substitute_in_function(func, &eligible);
            if stats.total() == 0 {
                continue;
            }
            if cx.trace {
                eprintln!(
                    "[substitution] {}: {} add, {} sub",
                    func.name, stats.adds, stats.subs
                );
            }

            // The instruction identities the analysis indexed are dangling
            // now; drop the consumed slot and mark the function mutated.
            cx.analyses.bump(func_id);
            cx.analyses.invalidate(func_id);
            changed = true;
        }
        Ok(TransformResult { module, changed })
    }

    /// The expanded forms are themselves eligible, so repeat applications
    /// never converge. One application per pipeline run.
    fn run_once(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityRef;
    use crate::ir::builder::{FunctionBuilder, ModuleBuilder};
    use crate::ir::interp::{eval_function, Value};
    use crate::ir::ty::{FunctionSig, Type};
    use crate::ir::FuncId;
    use crate::transforms::util::test_helpers::assert_well_formed;

    fn int_binop_function(name: &str, op: fn(&mut FunctionBuilder, ValueId, ValueId) -> ValueId) -> Function {
        let sig = FunctionSig {
            params: vec![Type::Int(64), Type::Int(64)],
            return_ty: Type::Int(64),
        };
        let mut fb = FunctionBuilder::new(name, sig);
        let a = fb.param(0);
        let b = fb.param(1);
        let r = op(&mut fb, a, b);
        fb.ret(Some(r));
        fb.build()
    }

    fn apply_substitution(func: Function) -> (Function, PassContext, bool) {
        let mut mb = ModuleBuilder::new("test");
        mb.add_function(func);
        let mut cx = PassContext::new();
        let result = InstructionSubstitution.apply(mb.build(), &mut cx).unwrap();
        (
            result.module.functions[FuncId::new(0)].clone(),
            cx,
            result.changed,
        )
    }

    fn live_ops(func: &Function) -> Vec<&Op> {
        func.blocks
            .values()
            .flat_map(|b| b.insts.iter().map(|&id| &func.insts[id].op))
            .collect()
    }

    #[test]
    fn add_expands_to_sub_of_neg() {
        let func = int_binop_function("plus", FunctionBuilder::add);
        let (func, _cx, changed) = apply_substitution(func);
        assert!(changed);
        assert_well_formed(&func);

        let ops = live_ops(&func);
        assert!(ops.iter().all(|op| !matches!(op, Op::Add(..))));
        assert!(ops.iter().any(|op| matches!(op, Op::Neg(_))));
        assert!(ops.iter().any(|op| matches!(op, Op::Sub(..))));

        assert_eq!(
            eval_function(&func, &[Value::Int(2), Value::Int(3)]).unwrap(),
            Value::Int(5)
        );
    }

    #[test]
    fn sub_expands_to_add_of_neg() {
        let func = int_binop_function("minus", FunctionBuilder::sub);
        let (func, _cx, changed) = apply_substitution(func);
        assert!(changed);
        assert_well_formed(&func);

        let ops = live_ops(&func);
        assert!(ops.iter().all(|op| !matches!(op, Op::Sub(..))));
        assert!(ops.iter().any(|op| matches!(op, Op::Add(..))));

        assert_eq!(
            eval_function(&func, &[Value::Int(2), Value::Int(3)]).unwrap(),
            Value::Int(-1)
        );
    }

    #[test]
    fn matches_wraparound_at_boundaries() {
        let cases = [
            (i64::MAX, 1),
            (i64::MIN, 1),
            (i64::MIN, i64::MIN),
            (i64::MAX, i64::MAX),
            (0, i64::MIN),
            (-1, i64::MAX),
        ];

        for &(a, b) in &cases {
            let original = int_binop_function("plus", FunctionBuilder::add);
            let (expanded, _, _) = apply_substitution(original.clone());
            let args = [Value::Int(a), Value::Int(b)];
            assert_eq!(
                eval_function(&original, &args).unwrap(),
                eval_function(&expanded, &args).unwrap(),
                "add diverged at ({a}, {b})"
            );

            let original = int_binop_function("minus", FunctionBuilder::sub);
            let (expanded, _, _) = apply_substitution(original.clone());
            assert_eq!(
                eval_function(&original, &args).unwrap(),
                eval_function(&expanded, &args).unwrap(),
                "sub diverged at ({a}, {b})"
            );
        }
    }

    #[test]
    fn chained_arithmetic_rewrites_uses() {
        // r = (a + b) - a; both eligible; the sub's operand is the add's
        // result and must be rewritten to the replacement.
        let sig = FunctionSig {
            params: vec![Type::Int(64), Type::Int(64)],
            return_ty: Type::Int(64),
        };
        let mut fb = FunctionBuilder::new("chain", sig);
        let a = fb.param(0);
        let b = fb.param(1);
        let sum = fb.add(a, b);
        let r = fb.sub(sum, a);
        fb.ret(Some(r));

        let (func, _, changed) = apply_substitution(fb.build());
        assert!(changed);
        assert_well_formed(&func);
        assert_eq!(
            eval_function(&func, &[Value::Int(10), Value::Int(4)]).unwrap(),
            Value::Int(4)
        );
    }

    #[test]
    fn uses_in_terminators_rewritten() {
        // The branch condition compares a replaced sum; the return value
        // is a replaced result directly.
        let func = int_binop_function("plus", FunctionBuilder::add);
        let old_return = match func.blocks[func.entry].term {
            crate::ir::Terminator::Return(Some(v)) => v,
            _ => unreachable!(),
        };
        let (func, _, _) = apply_substitution(func);
        match func.blocks[func.entry].term {
            crate::ir::Terminator::Return(Some(v)) => assert_ne!(v, old_return),
            ref other => panic!("unexpected terminator {other:?}"),
        }
    }

    #[test]
    fn cache_invalidated_and_recomputation_excludes_replaced_ids() {
        let sig = FunctionSig {
            params: vec![Type::Int(64), Type::Int(64)],
            return_ty: Type::Int(64),
        };
        let mut fb = FunctionBuilder::new("arith", sig);
        let a = fb.param(0);
        let b = fb.param(1);
        let s1 = fb.add(a, b);
        let s2 = fb.sub(s1, b);
        fb.ret(Some(s2));

        let mut mb = ModuleBuilder::new("test");
        mb.add_function(fb.build());
        let module = mb.build();
        let func_id = FuncId::new(0);

        let mut cx = PassContext::new();
        let before = cx
            .analyses
            .eligible_insts(func_id, &module.functions[func_id])
            .to_vec();
        assert_eq!(before.len(), 2);

        let result = InstructionSubstitution.apply(module, &mut cx).unwrap();
        assert!(result.changed);
        assert!(!cx.analyses.is_cached(func_id));

        // Recomputed result holds only the new instruction identities.
        let after = cx
            .analyses
            .eligible_insts(func_id, &result.module.functions[func_id])
            .to_vec();
        assert_eq!(after.len(), 2);
        for old in &before {
            assert!(!after.contains(old), "stale identity {old:?} returned");
        }
    }

    #[test]
    fn no_eligible_instructions_is_unchanged() {
        let sig = FunctionSig {
            params: vec![Type::Int(64)],
            return_ty: Type::Int(64),
        };
        let mut fb = FunctionBuilder::new("times", sig);
        let a = fb.param(0);
        let sq = fb.mul(a, a);
        fb.ret(Some(sq));

        let (func, _, changed) = apply_substitution(fb.build());
        assert!(!changed);
        assert!(live_ops(&func).iter().any(|op| matches!(op, Op::Mul(..))));
    }
}

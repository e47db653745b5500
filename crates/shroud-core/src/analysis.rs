//! Per-function analysis results and their cache.
//!
//! The cache is owned by the pipeline's [`PassContext`](crate::pipeline),
//! never a process-wide singleton. Each function carries a generation
//! counter; transforms that mutate a function's instruction list bump it,
//! and a cached result computed at an older generation is recomputed on the
//! next request instead of being trusted.

use crate::entity::SecondaryMap;
use crate::ir::{FuncId, Function, InstId, Op};

/// Ordered set of binary arithmetic instructions (add/sub) eligible for
/// substitution, in first-seen order: blocks in arena order, instructions
/// in block order. Valid only for the generation it was computed at.
#[derive(Debug, Clone)]
struct EligibleInsts {
    insts: Vec<InstId>,
    generation: u64,
}

/// Single linear scan for substitution-eligible instructions.
fn find_eligible_insts(func: &Function) -> Vec<InstId> {
    let mut eligible = Vec::new();
    for block in func.blocks.values() {
        for &inst_id in &block.insts {
            if matches!(func.insts[inst_id].op, Op::Add(..) | Op::Sub(..)) {
                eligible.push(inst_id);
            }
        }
    }
    eligible
}

/// Cache of per-function analysis results, keyed by function identity.
#[derive(Debug, Default)]
pub struct AnalysisCache {
    eligible: SecondaryMap<FuncId, EligibleInsts>,
    generations: SecondaryMap<FuncId, u64>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current mutation generation of a function. Starts at 0.
    pub fn generation(&self, func_id: FuncId) -> u64 {
        self.generations.get(func_id).copied().unwrap_or(0)
    }

    /// Record that a function's instruction list was mutated. Any cached
    /// result computed before this call is stale and will be recomputed.
    pub fn bump(&mut self, func_id: FuncId) {
        let next = self.generation(func_id) + 1;
        self.generations.insert(func_id, next);
    }

    /// The substitution-eligible instructions of `func`, computing and
    /// caching them if absent or stale.
    pub fn eligible_insts(&mut self, func_id: FuncId, func: &Function) -> &[InstId] {
        let generation = self.generation(func_id);
        let fresh = self
            .eligible
            .get(func_id)
            .is_some_and(|cached| cached.generation == generation);
        if !fresh {
            self.eligible.insert(
                func_id,
                EligibleInsts {
                    insts: find_eligible_insts(func),
                    generation,
                },
            );
        }
        self.eligible
            .get(func_id)
            .map(|cached| cached.insts.as_slice())
            .unwrap_or(&[])
    }

    /// Drop the cached result for a function outright. Used by a transform
    /// that consumed the result and then invalidated the instruction
    /// identities it held.
    pub fn invalidate(&mut self, func_id: FuncId) {
        self.eligible.remove(func_id);
    }

    /// Whether a result is currently cached for a function (stale or not).
    pub fn is_cached(&self, func_id: FuncId) -> bool {
        self.eligible.contains_key(func_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityRef;
    use crate::ir::builder::FunctionBuilder;
    use crate::ir::ty::{FunctionSig, Type};

    fn two_adds_one_sub() -> Function {
        let sig = FunctionSig {
            params: vec![Type::Int(64), Type::Int(64)],
            return_ty: Type::Int(64),
        };
        let mut fb = FunctionBuilder::new("arith", sig);
        let a = fb.param(0);
        let b = fb.param(1);
        let s1 = fb.add(a, b);
        let s2 = fb.sub(s1, a);
        let s3 = fb.add(s2, b);
        let _dead = fb.mul(s3, a); // not eligible
        fb.ret(Some(s3));
        fb.build()
    }

    #[test]
    fn scan_is_ordered_and_filters_kinds() {
        let func = two_adds_one_sub();
        let mut cache = AnalysisCache::new();
        let eligible = cache.eligible_insts(FuncId::new(0), &func);
        assert_eq!(eligible.len(), 3);
        assert!(matches!(func.insts[eligible[0]].op, Op::Add(..)));
        assert!(matches!(func.insts[eligible[1]].op, Op::Sub(..)));
        assert!(matches!(func.insts[eligible[2]].op, Op::Add(..)));
    }

    #[test]
    fn cache_hit_until_generation_bump() {
        let func = two_adds_one_sub();
        let mut cache = AnalysisCache::new();
        let func_id = FuncId::new(0);

        let first = cache.eligible_insts(func_id, &func).to_vec();
        assert!(cache.is_cached(func_id));
        let second = cache.eligible_insts(func_id, &func).to_vec();
        assert_eq!(first, second);

        cache.bump(func_id);
        assert_eq!(cache.generation(func_id), 1);
        // Still cached, but stale: the next request recomputes.
        let third = cache.eligible_insts(func_id, &func).to_vec();
        assert_eq!(first, third);
    }

    #[test]
    fn invalidate_removes_the_slot() {
        let func = two_adds_one_sub();
        let mut cache = AnalysisCache::new();
        let func_id = FuncId::new(0);
        cache.eligible_insts(func_id, &func);
        cache.invalidate(func_id);
        assert!(!cache.is_cached(func_id));
    }
}

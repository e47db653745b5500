use std::collections::HashMap;

use crate::ir::{Op, Terminator, ValueId};

/// Replace `ValueId`s in an op using a substitution map.
pub fn substitute_values_in_op(op: &mut Op, subst: &HashMap<ValueId, ValueId>) {
    let sub = |v: &mut ValueId| {
        if let Some(&new) = subst.get(v) {
            *v = new;
        }
    };

    match op {
        Op::Const(_) | Op::Alloc(_) => {}
        Op::Add(a, b) | Op::Sub(a, b) | Op::Mul(a, b) | Op::Cmp(_, a, b) => {
            sub(a);
            sub(b);
        }
        Op::Neg(a) | Op::Not(a) | Op::Load(a) => sub(a),
        Op::Select {
            cond,
            on_true,
            on_false,
        } => {
            sub(cond);
            sub(on_true);
            sub(on_false);
        }
        Op::Store { ptr, value } => {
            sub(ptr);
            sub(value);
        }
        Op::Call { args, .. } => {
            for a in args {
                sub(a);
            }
        }
    }
}

/// Replace `ValueId`s in a terminator using a substitution map.
pub fn substitute_values_in_term(term: &mut Terminator, subst: &HashMap<ValueId, ValueId>) {
    let sub = |v: &mut ValueId| {
        if let Some(&new) = subst.get(v) {
            *v = new;
        }
    };

    match term {
        Terminator::Return(None) => {}
        Terminator::Return(Some(value)) => sub(value),
        Terminator::Jump(_) => {}
        Terminator::Branch { cond, .. } => sub(cond),
        Terminator::Switch { value, .. } => sub(value),
    }
}

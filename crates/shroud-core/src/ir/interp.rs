//! Reference interpreter.
//!
//! Executes one function on concrete arguments, with two's-complement
//! wrapping integer semantics. Tests use it to check that a transformed
//! function computes exactly what the original did; the CLI exposes it as
//! `shroud eval`.

use std::collections::HashMap;

use crate::error::CoreError;

use super::func::Function;
use super::inst::{CmpKind, Op, Terminator};
use super::value::{Constant, ValueId};

/// A runtime value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    /// Reference to a storage cell created by `Alloc`.
    Ref(usize),
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::UInt(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Ref(cell) => write!(f, "&cell{cell}"),
        }
    }
}

/// Execution budget: flattened functions loop, and a miscompiled dispatch
/// table would spin forever. Generous enough for any test workload.
const MAX_STEPS: usize = 1_000_000;

struct Interp<'a> {
    func: &'a Function,
    env: HashMap<ValueId, Value>,
    cells: Vec<Value>,
    steps: usize,
}

/// Run `func` on the given arguments and return its result
/// (`Value::Unit` for a void return).
pub fn eval_function(func: &Function, args: &[Value]) -> Result<Value, CoreError> {
    if args.len() != func.params.len() {
        return Err(CoreError::Eval(format!(
            "{}: expected {} arguments, got {}",
            func.name,
            func.params.len(),
            args.len()
        )));
    }

    let mut interp = Interp {
        func,
        env: func.params.iter().copied().zip(args.iter().copied()).collect(),
        cells: Vec::new(),
        steps: 0,
    };
    interp.run()
}

impl<'a> Interp<'a> {
    fn run(&mut self) -> Result<Value, CoreError> {
        let mut block_id = self.func.entry;
        loop {
            let block = &self.func.blocks[block_id];
            for &inst_id in &block.insts {
                self.step()?;
                let inst = &self.func.insts[inst_id];
                let value = self.eval_op(&inst.op)?;
                if let Some(result) = inst.result {
                    self.env.insert(result, value);
                }
            }

            self.step()?;
            match &block.term {
                Terminator::Return(None) => return Ok(Value::Unit),
                Terminator::Return(Some(value)) => return self.get(*value),
                Terminator::Jump(target) => block_id = *target,
                Terminator::Branch {
                    cond,
                    then_target,
                    else_target,
                } => {
                    block_id = if self.get_bool(*cond)? {
                        *then_target
                    } else {
                        *else_target
                    };
                }
                Terminator::Switch {
                    value,
                    cases,
                    default,
                } => {
                    let key = self.get_int(*value)?;
                    block_id = cases
                        .iter()
                        .find(|&&(case, _)| case == key)
                        .map(|&(_, target)| target)
                        .unwrap_or(*default);
                }
            }
        }
    }

    fn step(&mut self) -> Result<(), CoreError> {
        self.steps += 1;
        if self.steps > MAX_STEPS {
            return Err(CoreError::Eval(format!(
                "{}: step budget exceeded (runaway loop?)",
                self.func.name
            )));
        }
        Ok(())
    }

    fn get(&self, value: ValueId) -> Result<Value, CoreError> {
        self.env.get(&value).copied().ok_or_else(|| {
            CoreError::Eval(format!("{}: use of unset value {value:?}", self.func.name))
        })
    }

    fn get_bool(&self, value: ValueId) -> Result<bool, CoreError> {
        match self.get(value)? {
            Value::Bool(b) => Ok(b),
            other => Err(self.type_error("bool", other)),
        }
    }

    fn get_int(&self, value: ValueId) -> Result<i64, CoreError> {
        match self.get(value)? {
            Value::Int(i) => Ok(i),
            Value::UInt(u) => Ok(u as i64),
            other => Err(self.type_error("integer", other)),
        }
    }

    fn type_error(&self, expected: &str, got: Value) -> CoreError {
        CoreError::Eval(format!(
            "{}: expected {expected}, got {got:?}",
            self.func.name
        ))
    }

    fn eval_op(&mut self, op: &Op) -> Result<Value, CoreError> {
        match op {
            Op::Const(c) => Ok(match c {
                Constant::Bool(b) => Value::Bool(*b),
                Constant::Int(i) => Value::Int(*i),
                Constant::UInt(u) => Value::UInt(*u),
                Constant::Float(f) => Value::Float(*f),
            }),
            Op::Add(a, b) => self.arith(*a, *b, i64::wrapping_add, u64::wrapping_add, |x, y| x + y),
            Op::Sub(a, b) => self.arith(*a, *b, i64::wrapping_sub, u64::wrapping_sub, |x, y| x - y),
            Op::Mul(a, b) => self.arith(*a, *b, i64::wrapping_mul, u64::wrapping_mul, |x, y| x * y),
            Op::Neg(a) => match self.get(*a)? {
                Value::Int(i) => Ok(Value::Int(i.wrapping_neg())),
                Value::UInt(u) => Ok(Value::UInt(u.wrapping_neg())),
                Value::Float(f) => Ok(Value::Float(-f)),
                other => Err(self.type_error("number", other)),
            },
            Op::Cmp(kind, a, b) => {
                let ordering = match (self.get(*a)?, self.get(*b)?) {
                    (Value::Int(x), Value::Int(y)) => x.partial_cmp(&y),
                    (Value::UInt(x), Value::UInt(y)) => x.partial_cmp(&y),
                    (Value::Float(x), Value::Float(y)) => x.partial_cmp(&y),
                    (Value::Bool(x), Value::Bool(y)) => x.partial_cmp(&y),
                    (x, y) => {
                        return Err(CoreError::Eval(format!(
                            "{}: incomparable values {x:?} and {y:?}",
                            self.func.name
                        )))
                    }
                };
                let result = match (kind, ordering) {
                    (CmpKind::Eq, ord) => ord == Some(std::cmp::Ordering::Equal),
                    (CmpKind::Ne, ord) => ord != Some(std::cmp::Ordering::Equal),
                    (CmpKind::Lt, ord) => ord == Some(std::cmp::Ordering::Less),
                    (CmpKind::Le, ord) => {
                        matches!(ord, Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal))
                    }
                    (CmpKind::Gt, ord) => ord == Some(std::cmp::Ordering::Greater),
                    (CmpKind::Ge, ord) => matches!(
                        ord,
                        Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
                    ),
                };
                Ok(Value::Bool(result))
            }
            Op::Not(a) => Ok(Value::Bool(!self.get_bool(*a)?)),
            Op::Select {
                cond,
                on_true,
                on_false,
            } => {
                if self.get_bool(*cond)? {
                    self.get(*on_true)
                } else {
                    self.get(*on_false)
                }
            }
            Op::Alloc(_) => {
                self.cells.push(Value::Unit);
                Ok(Value::Ref(self.cells.len() - 1))
            }
            Op::Load(ptr) => match self.get(*ptr)? {
                Value::Ref(idx) => Ok(self.cells[idx]),
                other => Err(self.type_error("cell reference", other)),
            },
            Op::Store { ptr, value } => match self.get(*ptr)? {
                Value::Ref(idx) => {
                    self.cells[idx] = self.get(*value)?;
                    Ok(Value::Unit)
                }
                other => Err(self.type_error("cell reference", other)),
            },
            Op::Call { func, .. } => Err(CoreError::Eval(format!(
                "{}: call to `{func}`: calls are not supported by the reference interpreter",
                self.func.name
            ))),
        }
    }

    fn arith(
        &self,
        a: ValueId,
        b: ValueId,
        int_op: fn(i64, i64) -> i64,
        uint_op: fn(u64, u64) -> u64,
        float_op: fn(f64, f64) -> f64,
    ) -> Result<Value, CoreError> {
        match (self.get(a)?, self.get(b)?) {
            (Value::Int(x), Value::Int(y)) => Ok(Value::Int(int_op(x, y))),
            (Value::UInt(x), Value::UInt(y)) => Ok(Value::UInt(uint_op(x, y))),
            (Value::Float(x), Value::Float(y)) => Ok(Value::Float(float_op(x, y))),
            (x, y) => Err(CoreError::Eval(format!(
                "{}: mismatched arithmetic operands {x:?} and {y:?}",
                self.func.name
            ))),
        }
    }
}

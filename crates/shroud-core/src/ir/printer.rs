//! Human-readable IR printing, used by `--dump-ir-after` and test output.

use std::fmt;

use crate::entity::EntityRef;

use super::func::Function;
use super::inst::{CmpKind, Op, Terminator};
use super::value::{Constant, ValueId};

fn v(value: ValueId) -> String {
    format!("v{}", value.index())
}

fn list(values: &[ValueId]) -> String {
    values.iter().map(|&x| v(x)).collect::<Vec<_>>().join(", ")
}

fn cmp_kind(kind: CmpKind) -> &'static str {
    match kind {
        CmpKind::Eq => "eq",
        CmpKind::Ne => "ne",
        CmpKind::Lt => "lt",
        CmpKind::Le => "le",
        CmpKind::Gt => "gt",
        CmpKind::Ge => "ge",
    }
}

fn constant(c: &Constant) -> String {
    match c {
        Constant::Bool(b) => b.to_string(),
        Constant::Int(i) => i.to_string(),
        Constant::UInt(u) => format!("{u}u"),
        Constant::Float(f) => format!("{f:?}"),
    }
}

fn op(o: &Op) -> String {
    match o {
        Op::Const(c) => format!("const {}", constant(c)),
        Op::Add(a, b) => format!("add {}, {}", v(*a), v(*b)),
        Op::Sub(a, b) => format!("sub {}, {}", v(*a), v(*b)),
        Op::Mul(a, b) => format!("mul {}, {}", v(*a), v(*b)),
        Op::Neg(a) => format!("neg {}", v(*a)),
        Op::Cmp(kind, a, b) => format!("cmp.{} {}, {}", cmp_kind(*kind), v(*a), v(*b)),
        Op::Not(a) => format!("not {}", v(*a)),
        Op::Select {
            cond,
            on_true,
            on_false,
        } => format!("select {}, {}, {}", v(*cond), v(*on_true), v(*on_false)),
        Op::Alloc(ty) => format!("alloc {ty:?}"),
        Op::Load(ptr) => format!("load {}", v(*ptr)),
        Op::Store { ptr, value } => format!("store {}, {}", v(*ptr), v(*value)),
        Op::Call { func, args } => format!("call {func}({})", list(args)),
    }
}

fn term(t: &Terminator) -> String {
    match t {
        Terminator::Return(None) => "return".to_string(),
        Terminator::Return(Some(value)) => format!("return {}", v(*value)),
        Terminator::Jump(target) => format!("jump block{}", target.index()),
        Terminator::Branch {
            cond,
            then_target,
            else_target,
        } => format!(
            "branch {}, block{}, block{}",
            v(*cond),
            then_target.index(),
            else_target.index()
        ),
        Terminator::Switch {
            value,
            cases,
            default,
        } => {
            let arms: Vec<String> = cases
                .iter()
                .map(|(id, target)| format!("{id} => block{}", target.index()))
                .collect();
            format!(
                "switch {} [{}], default block{}",
                v(*value),
                arms.join(", "),
                default.index()
            )
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "fn {}({}) {{", self.name, list(&self.params))?;
        for (block_id, block) in self.blocks.iter() {
            let marker = if block_id == self.entry { " (entry)" } else { "" };
            writeln!(f, "block{}:{}", block_id.index(), marker)?;
            for &inst_id in &block.insts {
                let inst = &self.insts[inst_id];
                match inst.result {
                    Some(r) => writeln!(f, "    {} = {}", v(r), op(&inst.op))?,
                    None => writeln!(f, "    {}", op(&inst.op))?,
                }
            }
            writeln!(f, "    {}", term(&block.term))?;
        }
        write!(f, "}}")
    }
}

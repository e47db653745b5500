use serde::{Deserialize, Serialize};

use crate::define_entity;

use super::ty::Type;

define_entity!(ValueId);

/// A compile-time constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl Constant {
    /// Infer the type of this constant.
    pub fn ty(&self) -> Type {
        match self {
            Constant::Bool(_) => Type::Bool,
            Constant::Int(_) => Type::Int(64),
            Constant::UInt(_) => Type::UInt(64),
            Constant::Float(_) => Type::Float(64),
        }
    }

    /// The zero value of a type, used by the flattener's synthetic exit
    /// block. `None` for `Type::Void`.
    pub fn zero_of(ty: &Type) -> Option<Constant> {
        match ty {
            Type::Void => None,
            Type::Bool => Some(Constant::Bool(false)),
            Type::Int(_) => Some(Constant::Int(0)),
            Type::UInt(_) => Some(Constant::UInt(0)),
            Type::Float(_) => Some(Constant::Float(0.0)),
        }
    }
}

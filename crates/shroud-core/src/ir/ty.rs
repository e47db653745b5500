use serde::{Deserialize, Serialize};

/// A type in the IR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Type {
    /// Void / unit.
    Void,
    /// Boolean.
    Bool,
    /// Signed integer with bit width.
    Int(u8),
    /// Unsigned integer with bit width.
    UInt(u8),
    /// Floating point with bit width (32 or 64).
    Float(u8),
}

/// Function signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSig {
    pub params: Vec<Type>,
    pub return_ty: Type,
}

impl Default for FunctionSig {
    fn default() -> Self {
        Self {
            params: Vec::new(),
            return_ty: Type::Void,
        }
    }
}
